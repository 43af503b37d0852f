//! # formlog Core
//!
//! Pure primitives for formlog: documents, records, schema validation and
//! the event-reporting interface.
//!
//! This crate contains no I/O, no storage, no networking, and no clock.
//! Everything here is deterministic computation over JSON values.
//!
//! ## Key Types
//!
//! - [`Document`] - A submission that passed schema validation
//! - [`Record`] - A document plus its log index and append timestamp
//! - [`LogInfo`] - Metadata snapshot of the underlying log
//! - [`ValidationResult`] - Every schema violation found in one pass
//! - [`EventSink`] - Injectable reporter for store and dispatcher transitions
//!
//! ## Validation
//!
//! A [`Document`] can only be built through [`validate`], so any API that
//! takes a `Document` is guaranteed to receive schema-valid input.

pub mod error;
pub mod events;
pub mod types;
pub mod validation;

pub use error::{ErrorKind, ValidationError};
pub use events::{Event, EventSink, NoopSink, TracingSink};
pub use types::{Document, LogInfo, Record};
pub use validation::{validate, FieldError, ValidationResult, Violation};
