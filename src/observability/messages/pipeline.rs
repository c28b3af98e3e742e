// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for sequences, fold loops and latches.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A step in a sequence faulted and the remaining chain was skipped.
///
/// # Log Level
/// `warn!` - The failure is delivered to the sequence's done callback
///
/// # Example
/// ```
/// use dagwood_flow::errors::FlowError;
/// use dagwood_flow::observability::messages::pipeline::StepFaulted;
///
/// let error = FlowError::failed("disk full");
/// let msg = StepFaulted { index: 2, step_count: 5, error: &error };
///
/// assert_eq!(msg.to_string(), "Sequence step 2 of 5 faulted: disk full");
/// ```
pub struct StepFaulted<'a> {
    pub index: usize,
    pub step_count: usize,
    pub error: &'a dyn std::error::Error,
}

impl Display for StepFaulted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Sequence step {} of {} faulted: {}",
            self.index, self.step_count, self.error
        )
    }
}

impl StructuredLog for StepFaulted<'_> {
    fn log(&self) {
        tracing::warn!(
            index = self.index,
            step_count = self.step_count,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "step_faulted",
            span_name = name,
            index = self.index,
            step_count = self.step_count,
        )
    }
}

/// A sequence is starting.
///
/// # Log Level
/// `debug!`
pub struct SequenceStarted {
    pub step_count: usize,
}

impl Display for SequenceStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Starting sequence of {} steps", self.step_count)
    }
}

impl StructuredLog for SequenceStarted {
    fn log(&self) {
        tracing::debug!(step_count = self.step_count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("sequence", span_name = name, step_count = self.step_count)
    }
}

/// A fold loop is starting.
///
/// # Log Level
/// `debug!`
pub struct FoldStarted<'a> {
    pub times: usize,
    pub field: &'a str,
}

impl Display for FoldStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Folding '{}' over {} iterations", self.field, self.times)
    }
}

impl StructuredLog for FoldStarted<'_> {
    fn log(&self) {
        tracing::debug!(times = self.times, field = self.field, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "fold",
            span_name = name,
            times = self.times,
            field = self.field,
        )
    }
}

/// A latch received a report after it had already fired.
///
/// # Log Level
/// `debug!` - Expected after an early failure
pub struct LatchReportIgnored {
    pub was_error: bool,
}

impl Display for LatchReportIgnored {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let kind = if self.was_error { "error" } else { "success" };
        write!(f, "Latch already fired, ignoring {} report", kind)
    }
}

impl StructuredLog for LatchReportIgnored {
    fn log(&self) {
        tracing::debug!(was_error = self.was_error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("latch_report_ignored", span_name = name)
    }
}

/// A sequence continuation was invoked after its run had finished.
///
/// # Log Level
/// `warn!` - The continuation's values are dropped
pub struct LateContinuation {
    pub step: usize,
    pub was_error: bool,
}

impl Display for LateContinuation {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let kind = if self.was_error { "error" } else { "success" };
        write!(
            f,
            "Ignoring late {} continuation of step {}: sequence already finished",
            kind, self.step
        )
    }
}

impl StructuredLog for LateContinuation {
    fn log(&self) {
        tracing::warn!(step = self.step, was_error = self.was_error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("late_continuation", span_name = name, step = self.step)
    }
}
