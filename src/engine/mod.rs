// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod context;
pub mod dependency_graph;
pub mod fold;
pub mod guard;
pub mod latch;
pub mod scheduler;
pub mod sequence;
pub(crate) mod trampoline;

pub use context::Context;
pub use dependency_graph::{
    run, ContinuationBuilder, DependencyGraphExecutor, Resolver, RunHandle, Task, TaskArgs,
    TaskSpec,
};
pub use fold::{repeat, repeat_with};
pub use guard::{expect_failure, protect, run_guarded, Completion};
pub use latch::Latch;
pub use scheduler::{IntervalScheduler, Invocation};
pub use sequence::{compose, Next, Sequence, Start, Step};
