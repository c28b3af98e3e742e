// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the interval scheduler.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// The scheduler began ticking.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use std::time::Duration;
/// use dagwood_flow::observability::messages::scheduler::SchedulerStarted;
///
/// let msg = SchedulerStarted {
///     interval: Duration::from_millis(100),
///     max_instances: Some(2),
/// };
///
/// assert_eq!(msg.to_string(), "Interval scheduler started: interval=100ms, max_instances=2");
/// ```
pub struct SchedulerStarted {
    pub interval: Duration,
    pub max_instances: Option<usize>,
}

impl Display for SchedulerStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.max_instances {
            Some(max) => write!(
                f,
                "Interval scheduler started: interval={:?}, max_instances={}",
                self.interval, max
            ),
            None => write!(
                f,
                "Interval scheduler started: interval={:?}, max_instances=unbounded",
                self.interval
            ),
        }
    }
}

impl StructuredLog for SchedulerStarted {
    fn log(&self) {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            max_instances = self.max_instances,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "interval_scheduler",
            span_name = name,
            interval = ?self.interval,
            max_instances = self.max_instances,
        )
    }
}

/// The scheduler stopped scheduling new invocations.
///
/// # Log Level
/// `info!`
pub struct SchedulerStopped {
    pub invocations: u64,
    pub in_flight: usize,
}

impl Display for SchedulerStopped {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Interval scheduler stopped after {} invocations ({} still in flight)",
            self.invocations, self.in_flight
        )
    }
}

impl StructuredLog for SchedulerStopped {
    fn log(&self) {
        tracing::info!(
            invocations = self.invocations,
            in_flight = self.in_flight,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("scheduler_stopped", span_name = name)
    }
}

/// A tick was skipped because the concurrency cap was reached.
///
/// # Log Level
/// `debug!`
pub struct TickSkipped {
    pub in_flight: usize,
    pub max_instances: usize,
}

impl Display for TickSkipped {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Skipping tick: {} of {} instances in flight",
            self.in_flight, self.max_instances
        )
    }
}

impl StructuredLog for TickSkipped {
    fn log(&self) {
        tracing::debug!(
            in_flight = self.in_flight,
            max_instances = self.max_instances,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("tick_skipped", span_name = name)
    }
}

/// A work invocation reported a failure.
///
/// # Log Level
/// `error!` - Reported to the diagnostic sink, never escalated
pub struct InvocationFailed<'a> {
    pub invocation: u64,
    pub error: &'a dyn std::error::Error,
}

impl Display for InvocationFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Invocation #{} failed: {}", self.invocation, self.error)
    }
}

impl StructuredLog for InvocationFailed<'_> {
    fn log(&self) {
        tracing::error!(
            invocation = self.invocation,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "invocation_failed",
            span_name = name,
            invocation = self.invocation,
        )
    }
}

/// A scheduler invocation was handed to an async job.
///
/// # Log Level
/// `debug!`
///
/// # Example
/// ```
/// use dagwood_flow::observability::messages::scheduler::JobSpawned;
///
/// let msg = JobSpawned {
///     job: "poll-feeds",
///     invocation: 7,
/// };
///
/// assert_eq!(msg.to_string(), "Spawning job 'poll-feeds' for invocation #7");
/// ```
pub struct JobSpawned<'a> {
    pub job: &'a str,
    pub invocation: u64,
}

impl Display for JobSpawned<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Spawning job '{}' for invocation #{}", self.job, self.invocation)
    }
}

impl StructuredLog for JobSpawned<'_> {
    fn log(&self) {
        tracing::debug!(job = self.job, invocation = self.invocation, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "job_run",
            span_name = name,
            job = self.job,
            invocation = self.invocation,
        )
    }
}
