// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for a human-readable line and
//! [`StructuredLog`] to emit the same event with structured fields at the
//! level documented on the type.
//!
//! # Organization
//!
//! * `engine` - dependency graph run lifecycle and task events
//! * `pipeline` - sequence, fold loop and latch events
//! * `scheduler` - interval scheduler lifecycle and invocation events
//!
//! # Usage Pattern
//!
//! ```rust
//! use dagwood_flow::observability::messages::engine::RunStarted;
//! use dagwood_flow::observability::messages::StructuredLog;
//!
//! let msg = RunStarted {
//!     task_count: 3,
//!     initial_bindings: 1,
//! };
//!
//! msg.log();
//! ```

use tracing::Span;

pub mod engine;
pub mod pipeline;
pub mod scheduler;

/// A message that knows how to emit itself as a structured tracing event.
pub trait StructuredLog {
    /// Emit the event at the level documented for the message type.
    fn log(&self);

    /// Build a span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
