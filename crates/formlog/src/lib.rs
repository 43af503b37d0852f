//! # formlog
//!
//! A validated, append-only record store for form submissions, with a
//! single command dispatcher shared by every transport.
//!
//! ## Overview
//!
//! - **Documents** are JSON objects that pass the schema: `username` and
//!   `description` are required non-empty strings, `github` is an optional
//!   string.
//! - **Records** are documents plus the index they were appended at and the
//!   append time. Records are write-once.
//! - **The dispatcher** maps an action name and payload to a store
//!   operation and answers with an [`Envelope`].
//!
//! ## Actions
//!
//! | Action | Payload | Success body |
//! |---|---|---|
//! | `submit` | document | `record`, `totalRecords` |
//! | `getRecords` | ignored | `records`, `totalRecords` |
//! | `getRecord` | `{index}` | `record` |
//! | `getInfo` | ignored | `info` |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use formlog::{Config, Dispatcher};
//! use formlog::core::TracingSink;
//! use serde_json::{json, Value};
//!
//! async fn example() -> formlog::Result<()> {
//!     let config = Config::default();
//!     let dispatcher = Dispatcher::open(&config.store, Arc::new(TracingSink)).await?;
//!
//!     let envelope = dispatcher
//!         .dispatch(
//!             "submit",
//!             json!({"username": "alice", "description": "hello"}),
//!             json!("req-1"),
//!         )
//!         .await;
//!     assert!(envelope.success());
//!
//!     let info = dispatcher.dispatch("getInfo", Value::Null, Value::Null).await;
//!     println!("{}", info.to_value());
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `formlog::core` - Documents, records, validation, events
//! - `formlog::store` - Log trait, SQLite log, record store

pub mod action;
pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod error;

// Re-export component crates
pub use formlog_core as core;
pub use formlog_store as store;

// Re-export main types for convenience
pub use action::Action;
pub use config::{Config, HttpConfig};
pub use dispatcher::Dispatcher;
pub use envelope::{Envelope, Failure, Payload, CORRELATION_KEY};
pub use error::{DispatchError, Result};

// Re-export commonly used core types
pub use formlog_core::{Document, ErrorKind, LogInfo, Record};
