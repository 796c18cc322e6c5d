//! Coinpulse library
//!
//! Exposes the store, fetch pipeline, portfolio and HTTP layers so the binary
//! and the integration tests share one implementation.

pub mod cache;
pub mod cli;
pub mod data;
pub mod portfolio;
pub mod server;
