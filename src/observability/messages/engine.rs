// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for dependency graph runs.
//!
//! This module contains message types for logging events related to:
//! * Run lifecycle (start, completion, failure)
//! * Task execution as inputs become bound
//! * Resolutions that arrive after a run has finished

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A dependency graph run is starting.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use dagwood_flow::observability::messages::engine::RunStarted;
///
/// let msg = RunStarted {
///     task_count: 4,
///     initial_bindings: 0,
/// };
///
/// assert_eq!(msg.to_string(), "Starting dependency graph run: 4 tasks, 0 initial bindings");
/// ```
pub struct RunStarted {
    pub task_count: usize,
    pub initial_bindings: usize,
}

impl Display for RunStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting dependency graph run: {} tasks, {} initial bindings",
            self.task_count, self.initial_bindings
        )
    }
}

impl StructuredLog for RunStarted {
    fn log(&self) {
        tracing::info!(
            task_count = self.task_count,
            initial_bindings = self.initial_bindings,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "dependency_run",
            span_name = name,
            task_count = self.task_count,
            initial_bindings = self.initial_bindings,
        )
    }
}

/// A dependency graph run finished successfully.
///
/// # Log Level
/// `info!` - Important operational event
pub struct RunCompleted {
    pub executed: usize,
    pub duration: std::time::Duration,
}

impl Display for RunCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dependency graph run completed: {} tasks executed in {:?}",
            self.executed, self.duration
        )
    }
}

impl StructuredLog for RunCompleted {
    fn log(&self) {
        tracing::info!(
            executed = self.executed,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "dependency_run_completed",
            span_name = name,
            executed = self.executed,
            duration = ?self.duration,
        )
    }
}

/// A dependency graph run aborted with an error.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use dagwood_flow::errors::FlowError;
/// use dagwood_flow::observability::messages::engine::RunFailed;
///
/// let error = FlowError::failed("boom");
/// let msg = RunFailed {
///     task: Some("load_patch"),
///     error: &error,
/// };
///
/// assert_eq!(msg.to_string(), "Dependency graph run failed in task 'load_patch': boom");
/// ```
pub struct RunFailed<'a> {
    pub task: Option<&'a str>,
    pub error: &'a dyn std::error::Error,
}

impl Display for RunFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.task {
            Some(task) => write!(
                f,
                "Dependency graph run failed in task '{}': {}",
                task, self.error
            ),
            None => write!(f, "Dependency graph run failed: {}", self.error),
        }
    }
}

impl StructuredLog for RunFailed<'_> {
    fn log(&self) {
        tracing::error!(
            task = self.task,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "dependency_run_failed",
            span_name = name,
            task = self.task,
            error = %self.error,
        )
    }
}

/// A task became ready and is being executed.
///
/// # Log Level
/// `debug!` - Per-task detail
pub struct TaskExecuting<'a> {
    pub task: &'a str,
    pub input_count: usize,
    pub wants_continuation: bool,
}

impl Display for TaskExecuting<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Executing task '{}' with {} bound inputs",
            self.task, self.input_count
        )
    }
}

impl StructuredLog for TaskExecuting<'_> {
    fn log(&self) {
        tracing::debug!(
            task = self.task,
            input_count = self.input_count,
            wants_continuation = self.wants_continuation,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "task",
            span_name = name,
            task = self.task,
            input_count = self.input_count,
        )
    }
}

/// Names were bound by a resolver.
///
/// # Log Level
/// `trace!` - Binding detail
pub struct ValuesBound<'a> {
    pub task: &'a str,
    pub names: &'a [String],
}

impl Display for ValuesBound<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Task '{}' bound [{}]", self.task, self.names.join(", "))
    }
}

impl StructuredLog for ValuesBound<'_> {
    fn log(&self) {
        tracing::trace!(task = self.task, names = ?self.names, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!("values_bound", span_name = name, task = self.task)
    }
}

/// A resolver was invoked after its run had already finished.
///
/// # Log Level
/// `warn!` - Caller bug, ignored by the engine
pub struct LateResolution<'a> {
    pub task: &'a str,
}

impl Display for LateResolution<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Ignoring resolution from task '{}': run already finished",
            self.task
        )
    }
}

impl StructuredLog for LateResolution<'_> {
    fn log(&self) {
        tracing::warn!(task = self.task, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("late_resolution", span_name = name, task = self.task)
    }
}

/// A settle pass found pending tasks but none of them ready.
///
/// # Log Level
/// `debug!` - Normal while waiting on deferred resolvers, a stall otherwise
pub struct SettleWaiting {
    pub pending: usize,
    pub outstanding: usize,
}

impl Display for SettleWaiting {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Waiting on bindings: {} pending tasks, {} outstanding continuations",
            self.pending, self.outstanding
        )
    }
}

impl StructuredLog for SettleWaiting {
    fn log(&self) {
        tracing::debug!(
            pending = self.pending,
            outstanding = self.outstanding,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "settle_waiting",
            span_name = name,
            pending = self.pending,
            outstanding = self.outstanding,
        )
    }
}
