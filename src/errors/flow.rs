// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors reported through completion callbacks.

use std::any::Any;
use thiserror::Error;

/// The single error type delivered to every completion callback in the crate.
///
/// Explicit failures (a continuation resolved with an error) and synchronous
/// faults (caller code returning `Err` or panicking) both arrive here, so a
/// caller only ever has one channel to watch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    /// A task, step or reporter explicitly reported a failure.
    #[error("{0}")]
    Failed(String),

    /// Caller code panicked while the engine was running it.
    #[error("panicked: {0}")]
    Panicked(String),

    /// A guard that expected an error observed a success instead.
    #[error("expected failure did not occur: {0}")]
    ExpectedFailure(String),

    /// A one-shot completion handle was dropped without being signalled.
    #[error("completion abandoned: {0}")]
    Abandoned(String),
}

impl FlowError {
    /// Shorthand for an explicit failure with a message.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// Builds a `Panicked` error from a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked(message)
    }

    /// True for errors that came from a caught panic rather than a returned error.
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }
}
