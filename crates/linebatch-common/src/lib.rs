//! linebatch Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the linebatch workspace.
//!
//! # Overview
//!
//! This crate provides functionality used by both the coordinator and the workers:
//!
//! - **Error Handling**: the shared [`LinebatchError`] and [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//! - **Protocol**: the JSON bodies exchanged between workers and the coordinator
//! - **Records**: deterministic identifiers and payloads for embedded records
//! - **Sanitize**: text normalization applied before embedding
//!
//! # Example
//!
//! ```no_run
//! use linebatch_common::record::record_id;
//! use linebatch_common::sanitize::Sanitizer;
//! use linebatch_common::Result;
//!
//! fn describe(line: &str) -> Result<String> {
//!     let record: serde_json::Value = serde_json::from_str(line)?;
//!     let title = record["title"].as_str().unwrap_or_default();
//!     Ok(format!("{} -> {}", Sanitizer::new()?.clean(title), record_id(&record)?))
//! }
//! ```

pub mod error;
pub mod logging;
pub mod protocol;
pub mod record;
pub mod sanitize;

// Re-export commonly used types
pub use error::{LinebatchError, Result};
