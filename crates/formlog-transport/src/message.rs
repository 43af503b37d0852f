//! Pipe framing: one JSON object per line in each direction.

use std::io;

use formlog::{Envelope, ErrorKind};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Key the pipe uses for correlation ids in both directions.
pub const ID_KEY: &str = "id";

/// An inbound pipe message: `{action, data, id}`.
#[derive(Debug, Clone, PartialEq)]
pub struct PipeRequest {
    pub action: String,
    pub data: Value,
    pub id: Value,
}

impl PipeRequest {
    /// Decode one line.
    ///
    /// On failure, returns the envelope to send back instead. The id is
    /// recovered whenever the line is at least a JSON object.
    pub fn parse(line: &[u8]) -> Result<Self, Envelope> {
        let value: Value = serde_json::from_slice(line).map_err(|e| {
            Envelope::failure(
                Value::Null,
                ErrorKind::MalformedRequest,
                format!("invalid JSON: {}", e),
            )
        })?;

        let Value::Object(mut map) = value else {
            return Err(Envelope::failure(
                Value::Null,
                ErrorKind::MalformedRequest,
                "message must be a JSON object",
            ));
        };

        let id = map.remove(ID_KEY).unwrap_or(Value::Null);
        let data = map.remove("data").unwrap_or(Value::Null);

        match map.remove("action") {
            Some(Value::String(action)) => Ok(Self { action, data, id }),
            Some(_) => Err(Envelope::failure(
                id,
                ErrorKind::MalformedRequest,
                "action must be a string",
            )),
            None => Err(Envelope::failure(
                id,
                ErrorKind::MalformedRequest,
                "message has no action",
            )),
        }
    }
}

/// Longest line accepted on the pipe, line ending included.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// One inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// The line's bytes, without the line ending.
    Message(Vec<u8>),
    /// The line exceeded the size limit. Its bytes were discarded.
    Oversized { len: usize },
}

/// Read the next non-blank line, without its line ending.
///
/// Returns `None` at end of stream. Bytes are returned as-is so that
/// invalid UTF-8 becomes a decode error for that message only. A line
/// longer than `max_len` is skipped up to its newline and reported as
/// [`Frame::Oversized`] without being buffered.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> io::Result<Option<Frame>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        let mut len = 0usize;
        let mut oversized = false;

        loop {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                break;
            }
            let (used, done) = match available.iter().position(|b| *b == b'\n') {
                Some(i) => (i + 1, true),
                None => (available.len(), false),
            };

            if !oversized {
                if line.len() + used > max_len {
                    oversized = true;
                    line = Vec::new();
                } else {
                    line.extend_from_slice(&available[..used]);
                }
            }
            len += used;
            reader.consume(used);
            if done {
                break;
            }
        }

        if len == 0 {
            return Ok(None);
        }
        if oversized {
            return Ok(Some(Frame::Oversized { len }));
        }

        while matches!(line.last(), Some(b'\n' | b'\r')) {
            line.pop();
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        return Ok(Some(Frame::Message(line)));
    }
}

/// Write one value followed by a newline, then flush.
pub async fn write_frame<W>(writer: &mut W, value: &Value) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut encoded =
        serde_json::to_vec(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}
