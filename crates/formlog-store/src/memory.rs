//! In-memory implementation of the Log trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use rand::RngCore;

use crate::error::{Result, StoreError};
use crate::traits::{log_identity, Log};

/// In-memory log implementation.
///
/// All data is lost when the log is dropped. Thread-safe via RwLock.
pub struct MemoryLog {
    entries: RwLock<Vec<Bytes>>,
    identity: String,
    writable: bool,
}

impl MemoryLog {
    /// Create a new empty, writable log.
    pub fn new() -> Self {
        Self::with_writable(true)
    }

    /// Create a new empty log that rejects appends.
    pub fn read_only() -> Self {
        Self::with_writable(false)
    }

    fn with_writable(writable: bool) -> Self {
        let mut nonce = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut nonce);
        Self {
            entries: RwLock::new(Vec::new()),
            identity: log_identity(&nonce),
            writable,
        }
    }

    fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
        StoreError::LockPoisoned(format!("memory log: {}", e))
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Log for MemoryLog {
    async fn append(&self, entry: Bytes) -> Result<u64> {
        if !self.writable {
            return Err(StoreError::ReadOnly("memory log opened read-only".into()));
        }
        let mut entries = self.entries.write().map_err(Self::poisoned)?;
        let index = entries.len() as u64;
        entries.push(entry);
        Ok(index)
    }

    async fn read_at(&self, index: u64) -> Result<Option<Bytes>> {
        let entries = self.entries.read().map_err(Self::poisoned)?;
        Ok(usize::try_from(index)
            .ok()
            .and_then(|i| entries.get(i))
            .cloned())
    }

    async fn read_range(&self, start: u64, end: u64) -> Result<Vec<(u64, Bytes)>> {
        let entries = self.entries.read().map_err(Self::poisoned)?;
        let end = end.min(entries.len() as u64);
        Ok((start..end)
            .map(|i| (i, entries[i as usize].clone()))
            .collect())
    }

    async fn length(&self) -> Result<u64> {
        let entries = self.entries.read().map_err(Self::poisoned)?;
        Ok(entries.len() as u64)
    }

    async fn byte_size(&self) -> Result<u64> {
        let entries = self.entries.read().map_err(Self::poisoned)?;
        Ok(entries.iter().map(|e| e.len() as u64).sum())
    }

    fn identity(&self) -> &str {
        &self.identity
    }

    fn is_writable(&self) -> bool {
        self.writable
    }
}
