// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::Value;

use crate::errors::FlowError;

/// A registered patch transformation with a fixed `{map, unmap}` contract.
///
/// `definition` is the stored mapping definition that selected this mapper;
/// every derived patch is handed to `emit`.
pub trait PatchMapper {
    fn map(
        &self,
        definition: &Value,
        patch: &Value,
        emit: &mut dyn FnMut(Value),
    ) -> Result<(), FlowError>;

    fn unmap(
        &self,
        definition: &Value,
        patch: &Value,
        emit: &mut dyn FnMut(Value),
    ) -> Result<(), FlowError>;
}

/// Callback used by [`DefinitionStore::lookup`].
pub type LookupCallback = Box<dyn FnOnce(Result<Value, FlowError>)>;

/// Lookup collaborator returning stored values by key. May answer
/// synchronously or later.
pub trait DefinitionStore {
    fn lookup(&self, key: &str, done: LookupCallback);
}
