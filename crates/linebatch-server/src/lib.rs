//! linebatch Coordinator Library
//!
//! Hands out fixed-size batches of a large newline-delimited JSON file to remote workers
//! and tracks which batches are done, surviving restarts without rescanning the file.
//!
//! # Overview
//!
//! - **Dataset**: a persisted byte-offset index over every line, and a resolver that reads
//!   exactly the slice of one batch
//! - **State**: the batch pool (random mode), the progress cursor (sequential mode) and a
//!   manifest recording the batch size the pool was cut with
//! - **Coordinator**: startup sequence and the operations behind every endpoint
//! - **API**: axum routes speaking the `linebatch_common::protocol` bodies
//!
//! Both modes are served at once and keep independent state.
//!
//! # Example
//!
//! ```no_run
//! use linebatch_server::{api, config::Config, coordinator::Coordinator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let coordinator = Coordinator::open(&config)?;
//!     let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.server.port)).await?;
//!     axum::serve(listener, api::router(coordinator)).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod coordinator;
pub mod dataset;
pub mod error;
pub mod middleware;
pub mod state;

pub use coordinator::Coordinator;
pub use error::{AppError, AppResult};
