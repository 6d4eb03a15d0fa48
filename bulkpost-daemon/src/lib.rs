//! bulkpost daemon library.
//!
//! This library exposes internal modules for integration testing.
//! In production, `bulkpost-daemon` is used as a binary (main.rs).

pub mod cli;
pub mod input;
pub mod logging;
pub mod metrics_server;
pub mod runner;
pub mod sinks;
