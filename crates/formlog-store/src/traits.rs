//! Log trait: the abstract interface for the durable append-only log.
//!
//! This trait keeps the record store storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Domain separator mixed into every log identity.
const IDENTITY_DOMAIN: &[u8] = b"formlog-log-v0:";

/// Derive the public identity of a log from its creation nonce.
///
/// Lowercase hex of `Blake3(domain || nonce)`.
pub fn log_identity(nonce: &[u8]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(IDENTITY_DOMAIN);
    hasher.update(nonce);
    hex::encode(hasher.finalize().as_bytes())
}

/// The Log trait: async interface over an append-only sequence of entries.
///
/// Entries are opaque bytes. Indices are 0-based and contiguous.
///
/// # Design Notes
///
/// - **Atomic append**: an append either writes the whole entry and returns
///   its index, or fails and leaves the log unchanged.
/// - **Write-once**: nothing ever rewrites or removes an entry.
/// - **Writability** is fixed when the log is opened.
#[async_trait]
pub trait Log: Send + Sync {
    /// Append an entry, returning the index it was written at.
    async fn append(&self, entry: Bytes) -> Result<u64>;

    /// Read the entry at `index`, if it exists.
    async fn read_at(&self, index: u64) -> Result<Option<Bytes>>;

    /// Read entries with `start <= index < end`, ordered by index.
    async fn read_range(&self, start: u64, end: u64) -> Result<Vec<(u64, Bytes)>>;

    /// Number of entries.
    async fn length(&self) -> Result<u64>;

    /// Total size of all entries in bytes.
    async fn byte_size(&self) -> Result<u64>;

    /// Stable opaque identifier of this log.
    fn identity(&self) -> &str;

    /// Whether this handle may append.
    fn is_writable(&self) -> bool;
}

#[async_trait]
impl<L: Log + ?Sized> Log for Arc<L> {
    async fn append(&self, entry: Bytes) -> Result<u64> {
        (**self).append(entry).await
    }

    async fn read_at(&self, index: u64) -> Result<Option<Bytes>> {
        (**self).read_at(index).await
    }

    async fn read_range(&self, start: u64, end: u64) -> Result<Vec<(u64, Bytes)>> {
        (**self).read_range(start, end).await
    }

    async fn length(&self) -> Result<u64> {
        (**self).length().await
    }

    async fn byte_size(&self) -> Result<u64> {
        (**self).byte_size().await
    }

    fn identity(&self) -> &str {
        (**self).identity()
    }

    fn is_writable(&self) -> bool {
        (**self).is_writable()
    }
}
