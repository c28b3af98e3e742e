// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::errors::FlowError;

/// An async unit of work the interval scheduler can run repeatedly.
///
/// Each tick spawns one `run` on the tokio runtime; its result becomes the
/// invocation's completion signal.
#[async_trait]
pub trait Job: Send + Sync {
    async fn run(&self) -> Result<(), FlowError>;

    fn name(&self) -> &str {
        "job"
    }
}
