//! # formlog Testkit
//!
//! Testing utilities for formlog.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Document vectors**: Named schema edge cases with expected outcomes
//! - **Generators**: Proptest strategies for valid and invalid documents
//! - **Fixtures**: Temp-dir stores and ready-made dispatchers
//! - **Fault injection**: A log wrapper that fails, panics, or lies on demand
//!
//! ## Document Vectors
//!
//! ```rust
//! use formlog_testkit::vectors::all_vectors;
//! use formlog_core::validate;
//!
//! for vector in all_vectors() {
//!     assert_eq!(validate(vector.value()).ok(), vector.is_valid(), "{}", vector.name);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use formlog_testkit::generators::DocumentParams;
//!
//! proptest! {
//!     #[test]
//!     fn generated_documents_validate(params: DocumentParams) {
//!         prop_assert!(formlog_core::validate(params.to_value()).ok());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use formlog_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let writer = fixture.dispatcher().await;
//! let follower = fixture.dispatcher().await; // read-only, lease is taken
//! ```

pub mod faulty;
pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use faulty::{Fault, FaultyLog};
pub use fixtures::{dispatcher_over, document, memory_dispatcher, submission, TestFixture};
pub use generators::DocumentParams;
pub use vectors::{all_vectors, verify_all_vectors, DocumentVector};
