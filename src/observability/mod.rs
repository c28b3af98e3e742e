// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! This module provides centralized message types for all diagnostic and
//! operational logging in the crate. Message types follow a struct-based
//! pattern with `Display` trait implementation to:
//!
//! * Eliminate magic strings scattered throughout the codebase
//! * Keep field names consistent between events of the same kind
//! * Provide consistent, structured logging output
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::engine` - dependency graph runs and task execution
//! * `messages::pipeline` - sequences, fold loops and latches
//! * `messages::scheduler` - interval scheduler lifecycle and invocations
//!
//! # Usage
//!
//! ```rust
//! use dagwood_flow::errors::FlowError;
//! use dagwood_flow::observability::messages::scheduler::InvocationFailed;
//!
//! let error = FlowError::failed("upstream timed out");
//! let msg = InvocationFailed {
//!     invocation: 7,
//!     error: &error,
//! };
//!
//! tracing::error!("{}", msg);
//! ```

pub mod messages;

use crate::config::LoggingOptions;
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber filtered by `RUST_LOG`, falling back to the
/// configured level.
///
/// Returns `false` when a global subscriber was already installed, which makes
/// repeated calls (for example from several tests) harmless.
pub fn init_tracing(options: &LoggingOptions) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&options.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(options.show_target)
        .try_init()
        .is_ok()
}
