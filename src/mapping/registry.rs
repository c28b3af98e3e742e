// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::errors::FlowError;
use crate::traits::PatchMapper;

/// Field of a mapping definition naming its mapper.
pub const MAPPER_FIELD: &str = "mapper";

/// Resolves mapper keys to registered handlers.
#[derive(Default, Clone)]
pub struct MapperRegistry {
    mappers: HashMap<String, Rc<dyn PatchMapper>>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `mapper` under `key`, replacing any earlier registration.
    pub fn register(mut self, key: impl Into<String>, mapper: impl PatchMapper + 'static) -> Self {
        self.mappers.insert(key.into(), Rc::new(mapper));
        self
    }

    pub fn get(&self, key: &str) -> Option<Rc<dyn PatchMapper>> {
        self.mappers.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.mappers.contains_key(key)
    }

    /// Finds the mapper a stored definition refers to.
    pub fn resolve(&self, definition: &Value) -> Result<Rc<dyn PatchMapper>, FlowError> {
        let key = definition
            .get(MAPPER_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                FlowError::failed(format!(
                    "mapping definition has no string '{MAPPER_FIELD}' field"
                ))
            })?;

        self.get(key)
            .ok_or_else(|| FlowError::failed(format!("no mapper registered for '{key}'")))
    }
}

impl fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.mappers.keys().collect();
        keys.sort();
        f.debug_struct("MapperRegistry")
            .field("mapper_count", &self.mappers.len())
            .field("mapper_keys", &keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    impl PatchMapper for Echo {
        fn map(&self, _: &Value, patch: &Value, emit: &mut dyn FnMut(Value)) -> Result<(), FlowError> {
            emit(patch.clone());
            Ok(())
        }

        fn unmap(&self, _: &Value, patch: &Value, emit: &mut dyn FnMut(Value)) -> Result<(), FlowError> {
            emit(patch.clone());
            Ok(())
        }
    }

    #[test]
    fn resolves_by_definition_field() {
        let registry = MapperRegistry::new().register("echo", Echo);

        assert!(registry.contains("echo"));
        assert!(registry.resolve(&json!({"mapper": "echo"})).is_ok());
    }

    #[test]
    fn unknown_or_missing_mapper_is_an_error() {
        let registry = MapperRegistry::new().register("echo", Echo);

        let err = registry.resolve(&json!({"mapper": "rot13"})).err().unwrap();
        assert_eq!(err.to_string(), "no mapper registered for 'rot13'");

        let err = registry.resolve(&json!({"kind": "echo"})).err().unwrap();
        assert_eq!(err.to_string(), "mapping definition has no string 'mapper' field");
    }

    #[test]
    fn debug_lists_sorted_keys() {
        let registry = MapperRegistry::new().register("b", Echo).register("a", Echo);
        let debug = format!("{registry:?}");

        assert!(debug.contains("mapper_count: 2"));
        assert!(debug.contains(r#"["a", "b"]"#));
    }
}
