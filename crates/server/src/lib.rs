//! HTTP status API for the dropwatch pipeline
//!
//! Read-only endpoints over the record store and the task queue:
//! `/health`, `/stats` and `/files`.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod rest_server;

pub use rest_server::{
    bind, build_router, run_rest_server, ApiError, AppState, StatsResponse, MAX_FILES_LIMIT,
};

// Re-export error types from core
pub use dropwatch_core::error::{Error, Result};
