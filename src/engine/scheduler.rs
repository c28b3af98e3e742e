// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Bounded-concurrency interval scheduler.
//!
//! Once [`IntervalScheduler::start`]ed, a tokio task ticks every `interval`
//! (the first tick fires immediately) and hands the work function a fresh
//! [`Invocation`]. With `max_instances` set, a tick that finds the cap
//! reached is skipped and the next decision waits for the following tick.
//! Ticks delayed by a busy runtime are pushed back rather than bunched up,
//! so two starts are never closer than `interval`.
//!
//! Every invocation signals completion exactly once through
//! [`Invocation::finish`]. A failed result, a panic in the work function and
//! an invocation dropped without finishing all reach the [`DiagnosticSink`]
//! and free the slot; none of them stop the scheduler.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use dagwood_flow::engine::scheduler::IntervalScheduler;
//!
//! # async fn demo() {
//! let scheduler = IntervalScheduler::new(Duration::from_millis(250), |invocation| {
//!     tokio::spawn(async move {
//!         // poll something
//!         invocation.finish(Ok(()));
//!     });
//! })
//! .with_max_instances(1);
//!
//! scheduler.start();
//! tokio::time::sleep(Duration::from_secs(2)).await;
//! scheduler.stop();
//! # }
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::SchedulerOptions;
use crate::errors::FlowError;
use crate::observability::messages::{
    scheduler::{JobSpawned, SchedulerStarted, SchedulerStopped, TickSkipped},
    StructuredLog,
};
use crate::traits::{DiagnosticSink, Job, TracingSink};

type Work = Arc<dyn Fn(Invocation) + Send + Sync>;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Default)]
struct Stats {
    in_flight: AtomicUsize,
    invocations: AtomicU64,
    skipped_ticks: AtomicU64,
}

struct InvocationState {
    id: u64,
    finished: AtomicBool,
    // Set while the work function runs on the ticking task.
    in_work_call: AtomicBool,
    stats: Arc<Stats>,
    sink: Arc<dyn DiagnosticSink>,
}

impl InvocationState {
    fn settle(&self, result: Result<(), FlowError>) -> bool {
        if self.finished.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.stats.in_flight.fetch_sub(1, Ordering::AcqRel);
        if let Err(error) = result {
            self.sink.report(self.id, &error);
        }
        true
    }
}

/// One-shot completion handle for a single run of the work function.
pub struct Invocation {
    state: Arc<InvocationState>,
}

impl Invocation {
    /// Sequence number of this invocation, starting at 1.
    pub fn id(&self) -> u64 {
        self.state.id
    }

    /// Signals completion and frees the slot. Errors go to the diagnostic sink.
    pub fn finish(self, result: Result<(), FlowError>) {
        self.state.settle(result);
    }
}

impl Drop for Invocation {
    fn drop(&mut self) {
        if self.state.finished.load(Ordering::Acquire) {
            return;
        }
        // A panic inside the work call is settled by the tick loop with the
        // real panic payload.
        if std::thread::panicking() && self.state.in_work_call.load(Ordering::Acquire) {
            return;
        }
        self.state.settle(Err(FlowError::Abandoned(format!(
            "invocation #{} dropped without finishing",
            self.state.id
        ))));
    }
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("id", &self.state.id)
            .field("finished", &self.state.finished.load(Ordering::Acquire))
            .finish()
    }
}

/// Periodically triggers a work function with a cap on concurrent invocations.
pub struct IntervalScheduler {
    interval: Duration,
    max_instances: Option<usize>,
    work: Work,
    sink: Arc<dyn DiagnosticSink>,
    stats: Arc<Stats>,
    running: Mutex<Option<CancellationToken>>,
}

impl IntervalScheduler {
    /// A zero `interval` is raised to one millisecond.
    pub fn new<F>(interval: Duration, work: F) -> Self
    where
        F: Fn(Invocation) + Send + Sync + 'static,
    {
        Self {
            interval: interval.max(MIN_INTERVAL),
            max_instances: None,
            work: Arc::new(work),
            sink: Arc::new(TracingSink),
            stats: Arc::new(Stats::default()),
            running: Mutex::new(None),
        }
    }

    /// Builds a scheduler from loaded configuration.
    pub fn from_options<F>(options: &SchedulerOptions, work: F) -> Self
    where
        F: Fn(Invocation) + Send + Sync + 'static,
    {
        let scheduler = Self::new(options.interval(), work);
        match options.max_instances {
            Some(max) => scheduler.with_max_instances(max),
            None => scheduler,
        }
    }

    /// Runs `job` on every tick, each invocation spawned on the tokio runtime
    /// and finished with the job's result.
    pub fn for_job(interval: Duration, job: Arc<dyn Job>) -> Self {
        Self::new(interval, move |invocation| {
            let job = Arc::clone(&job);
            let spawned = JobSpawned {
                job: job.name(),
                invocation: invocation.id(),
            };
            spawned.log();
            let span = spawned.span("job");
            tokio::spawn(
                async move {
                    let result = job.run().await;
                    invocation.finish(result);
                }
                .instrument(span),
            );
        })
    }

    /// Caps concurrent invocations. A cap of 0 means unbounded.
    pub fn with_max_instances(mut self, max_instances: usize) -> Self {
        self.max_instances = Some(max_instances).filter(|&n| n > 0);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_instances(&self) -> Option<usize> {
        self.max_instances
    }

    /// Invocations started and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.stats.in_flight.load(Ordering::Acquire)
    }

    /// Invocations started since construction.
    pub fn invocations(&self) -> u64 {
        self.stats.invocations.load(Ordering::Acquire)
    }

    /// Ticks skipped because the cap was reached.
    pub fn skipped_ticks(&self) -> u64 {
        self.stats.skipped_ticks.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or_else(|poisoned| poisoned.into_inner().is_some())
    }

    /// Starts ticking on the current tokio runtime. Calling `start` on a
    /// running scheduler does nothing.
    ///
    /// # Panics
    /// When called outside a tokio runtime.
    pub fn start(&self) {
        let mut running = self.running.lock().unwrap_or_else(|p| p.into_inner());
        if running.is_some() {
            return;
        }
        let token = CancellationToken::new();
        *running = Some(token.clone());
        drop(running);

        let started = SchedulerStarted {
            interval: self.interval,
            max_instances: self.max_instances,
        };
        started.log();

        let ticker = TickLoop {
            interval: self.interval,
            max_instances: self.max_instances,
            work: Arc::clone(&self.work),
            sink: Arc::clone(&self.sink),
            stats: Arc::clone(&self.stats),
        };
        tokio::spawn(ticker.run(token).instrument(started.span("tick_loop")));
    }

    /// Stops scheduling new invocations. In-flight invocations are unaffected.
    pub fn stop(&self) {
        let token = self
            .running
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(token) = token {
            token.cancel();
        }
    }
}

impl Drop for IntervalScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for IntervalScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntervalScheduler")
            .field("interval", &self.interval)
            .field("max_instances", &self.max_instances)
            .field("stats", &self.stats)
            .field("running", &self.is_running())
            .finish()
    }
}

struct TickLoop {
    interval: Duration,
    max_instances: Option<usize>,
    work: Work,
    sink: Arc<dyn DiagnosticSink>,
    stats: Arc<Stats>,
}

impl TickLoop {
    async fn run(self, token: CancellationToken) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => self.on_tick(),
            }
        }

        SchedulerStopped {
            invocations: self.stats.invocations.load(Ordering::Acquire),
            in_flight: self.stats.in_flight.load(Ordering::Acquire),
        }
        .log();
    }

    fn on_tick(&self) {
        if let Some(max_instances) = self.max_instances {
            let in_flight = self.stats.in_flight.load(Ordering::Acquire);
            if in_flight >= max_instances {
                self.stats.skipped_ticks.fetch_add(1, Ordering::AcqRel);
                TickSkipped {
                    in_flight,
                    max_instances,
                }
                .log();
                return;
            }
        }

        self.stats.in_flight.fetch_add(1, Ordering::AcqRel);
        let id = self.stats.invocations.fetch_add(1, Ordering::AcqRel) + 1;
        let state = Arc::new(InvocationState {
            id,
            finished: AtomicBool::new(false),
            in_work_call: AtomicBool::new(true),
            stats: Arc::clone(&self.stats),
            sink: Arc::clone(&self.sink),
        });
        let invocation = Invocation {
            state: Arc::clone(&state),
        };

        let work = Arc::clone(&self.work);
        let outcome = panic::catch_unwind(AssertUnwindSafe(move || work(invocation)));
        state.in_work_call.store(false, Ordering::Release);
        if let Err(payload) = outcome {
            state.settle(Err(FlowError::from_panic(payload)));
        }
    }
}
