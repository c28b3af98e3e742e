// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Seams where callers plug their own behaviour into the engine.

pub mod job;
pub mod mapper;
pub mod sink;

pub use job::Job;
pub use mapper::{DefinitionStore, LookupCallback, PatchMapper};
pub use sink::{DiagnosticSink, TracingSink};
