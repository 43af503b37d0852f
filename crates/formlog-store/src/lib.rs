//! # formlog Store
//!
//! Durable, append-only storage for validated form submissions.
//!
//! ## Overview
//!
//! Two layers live here:
//!
//! - The [`Log`] trait: the minimal capability set required from the
//!   underlying storage technology (append an entry and get its index, read
//!   the entry at an index, length, identity, writability). [`SqliteLog`] is
//!   the durable implementation and [`MemoryLog`] backs tests.
//! - [`RecordStore`]: owns a log, assigns record indices, serializes
//!   appends, answers point and bulk reads, and moves to a failed state when
//!   the log keeps erroring.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use formlog_core::{Document, TracingSink};
//! use formlog_store::{RecordStore, StoreConfig};
//! use serde_json::json;
//!
//! async fn example() -> formlog_store::Result<()> {
//!     let config = StoreConfig::default().data_dir("./storage/formlog");
//!     let store = RecordStore::open(&config, Arc::new(TracingSink)).await?;
//!
//!     let doc = Document::try_from(json!({"username": "alice", "description": "hi"}))
//!         .expect("valid document");
//!     let record = store.append(doc).await?;
//!     assert_eq!(store.get(record.index).await?, record);
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Serialized appends**: one append at a time per store; index = length.
//! - **Visibility point**: the cached length is published only after the log
//!   confirms the write, so readers never see a half-written record.
//! - **Single writer across processes**: a [`WriterLease`] taken at open time
//!   decides whether this instance may append at all.

pub mod config;
pub mod error;
pub mod lease;
pub mod memory;
pub mod migration;
pub mod record_store;
pub mod sqlite;
pub mod traits;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use lease::WriterLease;
pub use memory::MemoryLog;
pub use record_store::{RecordStore, StoreState};
pub use sqlite::SqliteLog;
pub use traits::{log_identity, Log};
