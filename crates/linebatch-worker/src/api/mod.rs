//! Coordinator HTTP API

pub mod client;
pub mod endpoints;

pub use client::CoordinatorClient;
