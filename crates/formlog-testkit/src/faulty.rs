//! A fault-injecting log wrapper.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use formlog_store::{Log, MemoryLog, Result, StoreError};

/// What a [`FaultyLog`] does on the next operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Fault {
    /// Pass through to the inner log.
    None = 0,
    /// Fail every operation with an I/O error.
    Fail = 1,
    /// Panic inside every operation.
    Panic = 2,
    /// Report a successful append at the wrong index.
    WrongIndex = 3,
}

impl Fault {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Fault::Fail,
            2 => Fault::Panic,
            3 => Fault::WrongIndex,
            _ => Fault::None,
        }
    }
}

/// Wraps a log and injects failures on demand.
pub struct FaultyLog<L: Log = MemoryLog> {
    inner: L,
    fault: AtomicU8,
    injected: AtomicUsize,
}

impl FaultyLog<MemoryLog> {
    /// Wrap a fresh in-memory log.
    pub fn new() -> Self {
        Self::wrap(MemoryLog::new())
    }
}

impl Default for FaultyLog<MemoryLog> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Log> FaultyLog<L> {
    pub fn wrap(inner: L) -> Self {
        Self {
            inner,
            fault: AtomicU8::new(Fault::None as u8),
            injected: AtomicUsize::new(0),
        }
    }

    /// Change behaviour for all subsequent operations.
    pub fn set_fault(&self, fault: Fault) {
        self.fault.store(fault as u8, Ordering::SeqCst);
    }

    pub fn fault(&self) -> Fault {
        Fault::from_u8(self.fault.load(Ordering::SeqCst))
    }

    /// How many operations were sabotaged so far.
    pub fn injected(&self) -> usize {
        self.injected.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    fn check(&self, op: &str) -> Result<()> {
        match self.fault() {
            Fault::Fail => {
                self.injected.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("injected failure in {}", op),
                )))
            }
            Fault::Panic => {
                self.injected.fetch_add(1, Ordering::SeqCst);
                panic!("injected panic in {}", op);
            }
            Fault::None | Fault::WrongIndex => Ok(()),
        }
    }
}

#[async_trait]
impl<L: Log> Log for FaultyLog<L> {
    async fn append(&self, entry: Bytes) -> Result<u64> {
        self.check("append")?;
        let index = self.inner.append(entry).await?;
        if self.fault() == Fault::WrongIndex {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Ok(index + 1);
        }
        Ok(index)
    }

    async fn read_at(&self, index: u64) -> Result<Option<Bytes>> {
        self.check("read_at")?;
        self.inner.read_at(index).await
    }

    async fn read_range(&self, start: u64, end: u64) -> Result<Vec<(u64, Bytes)>> {
        self.check("read_range")?;
        self.inner.read_range(start, end).await
    }

    async fn length(&self) -> Result<u64> {
        self.check("length")?;
        self.inner.length().await
    }

    async fn byte_size(&self) -> Result<u64> {
        self.check("byte_size")?;
        self.inner.byte_size().await
    }

    fn identity(&self) -> &str {
        self.inner.identity()
    }

    fn is_writable(&self) -> bool {
        self.inner.is_writable()
    }
}
