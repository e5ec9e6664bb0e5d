//! Shared utilities for chatlink.
//!
//! - Logging setup with tracing
//! - Platform directories for config, data and logs

pub mod log;
pub mod paths;

pub use log::{LogConfig, LogLevel};
