// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Patch-mapping consumer of the dependency graph executor.
//!
//! A state key names a stored mapping definition whose `"mapper"` field
//! selects a [`PatchMapper`](crate::traits::PatchMapper) from a
//! [`MapperRegistry`]. Applying a patch loads the definition and the patch
//! concurrently, then runs the selected mapper forwards or backwards.

pub mod patch;
pub mod registry;

pub use patch::{Direction, PatchMapping};
pub use registry::MapperRegistry;
