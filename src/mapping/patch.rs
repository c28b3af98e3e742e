// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

use crate::engine::dependency_graph::{DependencyGraphExecutor, RunHandle, Task};
use crate::errors::FlowError;
use crate::mapping::registry::MapperRegistry;
use crate::traits::DefinitionStore;

/// Which half of the mapper contract to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Map,
    Unmap,
}

/// Applies stored patches through registered mappers.
#[derive(Clone)]
pub struct PatchMapping {
    registry: Rc<MapperRegistry>,
    store: Rc<dyn DefinitionStore>,
}

impl PatchMapping {
    pub fn new(registry: MapperRegistry, store: Rc<dyn DefinitionStore>) -> Self {
        Self {
            registry: Rc::new(registry),
            store,
        }
    }

    /// Loads the definition under `state_key` and the patch under
    /// `patch_key`, then runs the selected mapper in `direction`. Every
    /// emitted patch reaches `on_effect`; `done` receives `state_key` once the
    /// mapper returned, or the first lookup or mapper error.
    pub fn apply(
        &self,
        state_key: impl Into<String>,
        patch_key: impl Into<String>,
        direction: Direction,
        on_effect: impl FnMut(Value) + 'static,
        done: impl FnOnce(Result<String, FlowError>) + 'static,
    ) -> RunHandle {
        let state_key = state_key.into();
        let patch_key = patch_key.into();

        let definition_store = Rc::clone(&self.store);
        let definition_key = state_key.clone();
        let load_definition = Task::new("load_definition")
            .produces(["definition"])
            .body(move |mut args| {
                let resolver = args.continuation()?.outputs();
                definition_store.lookup(
                    &definition_key,
                    Box::new(move |result| resolver.resolve(result.map(|v| vec![v]))),
                );
                Ok(())
            });

        let patch_store = Rc::clone(&self.store);
        let load_patch = Task::new("load_patch")
            .produces(["patch"])
            .body(move |mut args| {
                let resolver = args.continuation()?.outputs();
                patch_store.lookup(
                    &patch_key,
                    Box::new(move |result| resolver.resolve(result.map(|v| vec![v]))),
                );
                Ok(())
            });

        let registry = Rc::clone(&self.registry);
        let on_effect = Rc::new(RefCell::new(on_effect));
        let apply_mapper = Task::new("apply_mapper")
            .needs(["definition", "patch"])
            .body(move |args| {
                let definition = args.get("definition").cloned().unwrap_or(Value::Null);
                let patch = args.get("patch").cloned().unwrap_or(Value::Null);
                let mapper = registry.resolve(&definition)?;

                let mut emit = |effect: Value| (*on_effect.borrow_mut())(effect);
                match direction {
                    Direction::Map => mapper.map(&definition, &patch, &mut emit),
                    Direction::Unmap => mapper.unmap(&definition, &patch, &mut emit),
                }
            });

        DependencyGraphExecutor::new()
            .task(load_definition)
            .task(load_patch)
            .task(apply_mapper)
            .run(move |result| done(result.map(|()| state_key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{LookupCallback, PatchMapper};
    use serde_json::json;
    use std::collections::HashMap;

    /// Answers lookups from a fixed map, optionally parking them.
    #[derive(Default)]
    struct MemoryStore {
        values: HashMap<String, Value>,
        deferred: bool,
        parked: RefCell<Vec<(String, LookupCallback)>>,
    }

    impl MemoryStore {
        fn with(mut self, key: &str, value: Value) -> Self {
            self.values.insert(key.to_string(), value);
            self
        }

        fn answer(&self, key: &str, done: LookupCallback) {
            match self.values.get(key) {
                Some(value) => done(Ok(value.clone())),
                None => done(Err(FlowError::failed(format!("unknown key '{key}'")))),
            }
        }

        fn release(&self) {
            let parked: Vec<_> = self.parked.borrow_mut().drain(..).collect();
            for (key, done) in parked {
                self.answer(&key, done);
            }
        }
    }

    impl DefinitionStore for MemoryStore {
        fn lookup(&self, key: &str, done: LookupCallback) {
            if self.deferred {
                self.parked.borrow_mut().push((key.to_string(), done));
            } else {
                self.answer(key, done);
            }
        }
    }

    /// Splits `{"set": {k: v, ..}}` into one effect per field; unmap emits
    /// the field names to remove.
    struct FieldSplitter;

    impl PatchMapper for FieldSplitter {
        fn map(&self, definition: &Value, patch: &Value, emit: &mut dyn FnMut(Value)) -> Result<(), FlowError> {
            let prefix = definition.get("prefix").and_then(Value::as_str).unwrap_or("");
            let fields = patch
                .get("set")
                .and_then(Value::as_object)
                .ok_or_else(|| FlowError::failed("patch has no 'set' object"))?;
            for (key, value) in fields {
                emit(json!({ "field": format!("{prefix}{key}"), "value": value }));
            }
            Ok(())
        }

        fn unmap(&self, definition: &Value, patch: &Value, emit: &mut dyn FnMut(Value)) -> Result<(), FlowError> {
            let prefix = definition.get("prefix").and_then(Value::as_str).unwrap_or("");
            if let Some(fields) = patch.get("set").and_then(Value::as_object) {
                for key in fields.keys() {
                    emit(json!({ "remove": format!("{prefix}{key}") }));
                }
            }
            Ok(())
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::default()
            .with("state-1", json!({ "mapper": "split", "prefix": "user." }))
            .with("patch-1", json!({ "set": { "name": "ada" } }))
            .with("bad-patch", json!({ "unset": ["name"] }))
    }

    fn mapping(store: Rc<dyn DefinitionStore>) -> PatchMapping {
        PatchMapping::new(MapperRegistry::new().register("split", FieldSplitter), store)
    }

    type Effects = Rc<RefCell<Vec<Value>>>;
    type Outcome = Rc<RefCell<Vec<Result<String, FlowError>>>>;

    fn recorders() -> (Effects, Outcome) {
        (Rc::new(RefCell::new(Vec::new())), Rc::new(RefCell::new(Vec::new())))
    }

    #[test]
    fn map_emits_effects_and_returns_state_key() {
        let (effects, outcome) = recorders();
        let (e, o) = (effects.clone(), outcome.clone());

        mapping(Rc::new(store())).apply(
            "state-1",
            "patch-1",
            Direction::Map,
            move |effect| e.borrow_mut().push(effect),
            move |r| o.borrow_mut().push(r),
        );

        assert_eq!(*effects.borrow(), vec![json!({"field": "user.name", "value": "ada"})]);
        assert_eq!(*outcome.borrow(), vec![Ok("state-1".to_string())]);
    }

    #[test]
    fn unmap_runs_the_inverse() {
        let (effects, outcome) = recorders();
        let (e, o) = (effects.clone(), outcome.clone());

        mapping(Rc::new(store())).apply(
            "state-1",
            "patch-1",
            Direction::Unmap,
            move |effect| e.borrow_mut().push(effect),
            move |r| o.borrow_mut().push(r),
        );

        assert_eq!(*effects.borrow(), vec![json!({"remove": "user.name"})]);
        assert_eq!(*outcome.borrow(), vec![Ok("state-1".to_string())]);
    }

    #[test]
    fn lookups_answered_later_still_complete() {
        let (effects, outcome) = recorders();
        let (e, o) = (effects.clone(), outcome.clone());
        let store = Rc::new(MemoryStore {
            deferred: true,
            ..store()
        });

        let handle = mapping(store.clone()).apply(
            "state-1",
            "patch-1",
            Direction::Map,
            move |effect| e.borrow_mut().push(effect),
            move |r| o.borrow_mut().push(r),
        );

        assert!(outcome.borrow().is_empty());
        assert_eq!(handle.pending_tasks(), vec!["apply_mapper".to_string()]);

        store.release();

        assert_eq!(effects.borrow().len(), 1);
        assert_eq!(*outcome.borrow(), vec![Ok("state-1".to_string())]);
    }

    #[test]
    fn missing_definition_fails_without_effects() {
        let (effects, outcome) = recorders();
        let (e, o) = (effects.clone(), outcome.clone());

        mapping(Rc::new(store())).apply(
            "state-404",
            "patch-1",
            Direction::Map,
            move |effect| e.borrow_mut().push(effect),
            move |r| o.borrow_mut().push(r),
        );

        assert!(effects.borrow().is_empty());
        assert_eq!(
            *outcome.borrow(),
            vec![Err(FlowError::failed("unknown key 'state-404'"))]
        );
    }

    #[test]
    fn mapper_error_reaches_done() {
        let (effects, outcome) = recorders();
        let (e, o) = (effects.clone(), outcome.clone());

        mapping(Rc::new(store())).apply(
            "state-1",
            "bad-patch",
            Direction::Map,
            move |effect| e.borrow_mut().push(effect),
            move |r| o.borrow_mut().push(r),
        );

        assert!(effects.borrow().is_empty());
        assert_eq!(
            *outcome.borrow(),
            vec![Err(FlowError::failed("patch has no 'set' object"))]
        );
    }
}
