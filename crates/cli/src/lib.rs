//! Library interface for the dropwatch binary
//!
//! Exposes the pipeline context and logging setup so integration tests can
//! drive the same wiring as `main.rs`.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod logging;
pub mod pipeline;

// Re-export commonly needed types for tests
pub use anyhow::Result;
pub use dropwatch_core::Config;
pub use pipeline::Pipeline;
