//! # formlog Transport
//!
//! Adapters that expose one [`Dispatcher`](formlog::Dispatcher) to the
//! outside world.
//!
//! - [`http`]: an axum router over `/api/*`, with permissive CORS and
//!   request tracing.
//! - [`pipe`]: newline-delimited JSON over any async reader/writer pair,
//!   used by the worker on stdin/stdout.
//!
//! Both adapters decode the request into `(action, payload, correlation
//! id)`, call the dispatcher, and encode the returned envelope. Neither
//! holds any state of its own, so any number of them may share a
//! dispatcher.

pub mod error;
pub mod http;
pub mod message;
pub mod pipe;

pub use error::{Result, TransportError};
pub use formlog::HttpConfig;
pub use message::PipeRequest;
pub use pipe::PipeStats;
