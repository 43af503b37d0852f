//! Pipe adapter: JSON lines in, JSON lines out.
//!
//! Each inbound line is `{action, data, id}` and produces exactly one
//! outbound line carrying the same `id`. Requests are handled concurrently,
//! so responses may come back in a different order than the requests.

use formlog::{Dispatcher, Envelope, ErrorKind};
use formlog_store::Log;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::error::{Result, TransportError};
use crate::message::{read_frame, write_frame, Frame, PipeRequest, ID_KEY, MAX_FRAME_BYTES};

/// Responses buffered before request handlers wait on the writer.
const RESPONSE_BUFFER: usize = 256;

/// Counters for one pipe session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipeStats {
    /// Non-blank lines read.
    pub received: u64,
    /// Responses written.
    pub answered: u64,
}

/// Serve requests from `reader` until end of stream.
///
/// Every request that was read is answered before this returns: end of
/// input stops reading, then the remaining handlers finish and the writer
/// drains and shuts down. If the output stream fails, reading stops at the
/// next line and no further requests are dispatched.
pub async fn run<L, R, W>(dispatcher: Dispatcher<L>, reader: R, writer: W) -> Result<PipeStats>
where
    L: Log + 'static,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Value>(RESPONSE_BUFFER);
    let writer = tokio::spawn(write_responses(writer, rx));

    let read_result = read_requests(&dispatcher, reader, tx).await;

    // All senders are gone once the last handler finishes, which ends the writer.
    let answered = writer
        .await
        .map_err(|e| TransportError::Writer(e.to_string()))??;

    let received = read_result?;
    tracing::debug!(received, answered, "pipe closed");
    Ok(PipeStats { received, answered })
}

/// Serve requests on the process's stdin and stdout.
pub async fn run_stdio<L: Log + 'static>(dispatcher: Dispatcher<L>) -> Result<PipeStats> {
    run(
        dispatcher,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

async fn read_requests<L, R>(
    dispatcher: &Dispatcher<L>,
    mut reader: R,
    tx: mpsc::Sender<Value>,
) -> Result<u64>
where
    L: Log + 'static,
    R: AsyncBufRead + Unpin,
{
    let mut received = 0u64;

    while let Some(frame) = read_frame(&mut reader, MAX_FRAME_BYTES).await? {
        if tx.is_closed() {
            tracing::warn!(received, "pipe output closed, no longer reading requests");
            break;
        }
        received += 1;

        let line = match frame {
            Frame::Message(line) => line,
            Frame::Oversized { len } => {
                tracing::debug!(len, "oversized pipe message");
                let envelope = Envelope::failure(
                    Value::Null,
                    ErrorKind::MalformedRequest,
                    format!("message of {} bytes exceeds {} byte limit", len, MAX_FRAME_BYTES),
                );
                if tx.send(envelope.to_value_keyed(ID_KEY)).await.is_err() {
                    break;
                }
                continue;
            }
        };

        match PipeRequest::parse(&line) {
            Ok(request) => {
                let dispatcher = dispatcher.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let envelope = dispatcher
                        .dispatch(&request.action, request.data, request.id)
                        .await;
                    // The writer only goes away if the output stream broke.
                    let _ = tx.send(envelope.to_value_keyed(ID_KEY)).await;
                });
            }
            Err(envelope) => {
                tracing::debug!(error_kind = ?envelope.error_kind(), "malformed pipe message");
                if tx.send(envelope.to_value_keyed(ID_KEY)).await.is_err() {
                    break;
                }
            }
        }
    }

    Ok(received)
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::Receiver<Value>) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut answered = 0u64;
    while let Some(response) = rx.recv().await {
        write_frame(&mut writer, &response).await?;
        answered += 1;
    }
    writer.shutdown().await?;
    Ok(answered)
}
