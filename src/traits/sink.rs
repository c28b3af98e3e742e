// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::FlowError;
use crate::observability::messages::{scheduler::InvocationFailed, StructuredLog};

/// Receives failures of scheduler invocations. Reports never escalate.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, invocation: u64, error: &FlowError);
}

/// Default sink: logs each failure at `error` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, invocation: u64, error: &FlowError) {
        InvocationFailed { invocation, error }.log();
    }
}
