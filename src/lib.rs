// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod config;     // YAML/TOML settings
pub mod engine;     // executor, composition primitives, scheduler
pub mod errors;     // error handling
pub mod mapping;    // patch-mapping consumer
pub mod observability;
pub mod traits;     // caller-supplied seams

pub use engine::{DependencyGraphExecutor, IntervalScheduler, Latch, Sequence, Task};
pub use errors::{ConfigError, FlowError};
