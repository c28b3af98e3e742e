// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Ordered pipeline of guarded continuation-passing steps.
//!
//! Step *i* receives the run's accumulator, a [`Next`] continuation and the
//! positional results the previous step passed on. It must eventually call
//! the continuation, synchronously or later. Every step runs under
//! [`run_guarded`], so an `Err` return or a panic short-circuits the rest of
//! the chain and reaches `done` as an error. `done` fires exactly once.
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use serde_json::json;
//! use dagwood_flow::engine::sequence::Sequence;
//!
//! let result = Rc::new(RefCell::new(None));
//! let sink = result.clone();
//!
//! Sequence::new()
//!     .step(|_acc, next, _| {
//!         next.to(["width", "height"]).ok(vec![json!(3), json!(4)]);
//!         Ok(())
//!     })
//!     .step(|acc, next, _| {
//!         let area = acc.get_i64("width").unwrap_or(0) * acc.get_i64("height").unwrap_or(0);
//!         next.ok(vec![json!(area)]);
//!         Ok(())
//!     })
//!     .compose(move |r| *sink.borrow_mut() = Some(r))
//!     .start();
//!
//! assert_eq!(*result.borrow(), Some(Ok(vec![json!(12)])));
//! ```

use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

use crate::engine::context::Context;
use crate::engine::guard::{run_guarded, Completion};
use crate::engine::trampoline::Trampoline;
use crate::errors::FlowError;
use crate::observability::messages::{
    pipeline::{LateContinuation, SequenceStarted, StepFaulted},
    StructuredLog,
};

/// A boxed sequence step.
pub type Step = Box<dyn FnOnce(&Context, Next, Vec<Value>) -> Result<(), FlowError>>;

struct SequenceRun {
    steps: RefCell<Vec<Option<Step>>>,
    accumulator: Context,
    done: Completion<Vec<Value>>,
    trampoline: Rc<Trampoline>,
}

impl SequenceRun {
    fn finish(&self, result: Result<Vec<Value>, FlowError>) {
        if result.is_err() {
            // Partial accumulator state of an aborted run is never exposed.
            self.accumulator.clear();
            self.trampoline.clear();
        }
        self.done.complete(result);
    }

    fn advance(self: &Rc<Self>, index: usize, incoming: Result<Vec<Value>, FlowError>) {
        if self.done.is_done() {
            return;
        }
        let values = match incoming {
            Ok(values) => values,
            Err(error) => return self.finish(Err(error)),
        };

        let step = {
            let mut steps = self.steps.borrow_mut();
            if index >= steps.len() {
                drop(steps);
                return self.finish(Ok(values));
            }
            steps[index].take()
        };
        let Some(step) = step else {
            // Continuation of an earlier step was invoked twice.
            return;
        };

        let next = Next {
            run: Rc::clone(self),
            index: index + 1,
            names: Vec::new(),
        };
        let accumulator = self.accumulator.clone();
        if let Err(error) = run_guarded(|| step(&accumulator, next, values)) {
            StepFaulted {
                index,
                step_count: self.steps.borrow().len(),
                error: &error,
            }
            .log();
            self.finish(Err(error));
        }
    }
}

/// Continuation handed to a step. Consuming it advances the sequence.
pub struct Next {
    run: Rc<SequenceRun>,
    index: usize,
    names: Vec<String>,
}

impl Next {
    /// Renaming decoration: on success, positional result *i* is also stored
    /// in the accumulator under `names[i]`. Names without a matching value are
    /// set to `Value::Null`.
    pub fn to<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Ignored, apart from a warning, once the sequence has finished.
    pub fn resolve(self, result: Result<Vec<Value>, FlowError>) {
        let Next { run, index, names } = self;
        if run.done.is_done() {
            LateContinuation {
                step: index - 1,
                was_error: result.is_err(),
            }
            .log();
            return;
        }
        if let Ok(values) = &result {
            for (i, name) in names.into_iter().enumerate() {
                let value = values.get(i).cloned().unwrap_or(Value::Null);
                run.accumulator.set(name, value);
            }
        }
        let trampoline = Rc::clone(&run.trampoline);
        trampoline.schedule(move || run.advance(index, result));
    }

    /// Passes `values` on to the next step.
    pub fn ok(self, values: Vec<Value>) {
        self.resolve(Ok(values));
    }

    /// Advances without positional results.
    pub fn done(self) {
        self.resolve(Ok(Vec::new()));
    }

    /// Aborts the sequence with `error`.
    pub fn fail(self, error: FlowError) {
        self.resolve(Err(error));
    }

    /// The accumulator of the run this continuation belongs to.
    pub fn accumulator(&self) -> &Context {
        &self.run.accumulator
    }
}

/// Builder for an ordered chain of steps.
#[derive(Default)]
pub struct Sequence {
    steps: Vec<Step>,
    accumulator: Context,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a caller-owned accumulator instead of a fresh one.
    pub fn with_accumulator(mut self, accumulator: Context) -> Self {
        self.accumulator = accumulator;
        self
    }

    pub fn step<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&Context, Next, Vec<Value>) -> Result<(), FlowError> + 'static,
    {
        self.steps.push(Box::new(f));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Wires the steps to `done` and returns the handle that starts the run.
    pub fn compose(self, done: impl FnOnce(Result<Vec<Value>, FlowError>) + 'static) -> Start {
        compose(self.steps, self.accumulator, done)
    }
}

/// Wires `steps` into a chain ending in `done`, sharing `accumulator`.
pub fn compose(
    steps: Vec<Step>,
    accumulator: Context,
    done: impl FnOnce(Result<Vec<Value>, FlowError>) + 'static,
) -> Start {
    let run = Rc::new(SequenceRun {
        steps: RefCell::new(steps.into_iter().map(Some).collect()),
        accumulator,
        done: Completion::new(done),
        trampoline: Trampoline::new(),
    });
    Start { run }
}

/// Entry point of a composed sequence. Starting consumes it.
pub struct Start {
    run: Rc<SequenceRun>,
}

impl Start {
    pub fn start(self) {
        SequenceStarted {
            step_count: self.run.steps.borrow().len(),
        }
        .log();

        let run = self.run;
        let trampoline = Rc::clone(&run.trampoline);
        trampoline.schedule(move || run.advance(0, Ok(Vec::new())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    type Outcome = Rc<RefCell<Vec<Result<Vec<Value>, FlowError>>>>;

    fn recorder() -> (Outcome, impl FnOnce(Result<Vec<Value>, FlowError>) + 'static) {
        let calls: Outcome = Rc::new(RefCell::new(Vec::new()));
        let sink = calls.clone();
        (calls, move |r| sink.borrow_mut().push(r))
    }

    #[test]
    fn empty_sequence_completes_immediately() {
        let (calls, done) = recorder();
        Sequence::new().compose(done).start();

        assert_eq!(*calls.borrow(), vec![Ok(vec![])]);
    }

    #[test]
    fn steps_run_in_order_and_pass_positional_results() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let (calls, done) = recorder();

        let o1 = order.clone();
        let o2 = order.clone();
        let o3 = order.clone();
        Sequence::new()
            .step(move |_, next, prev| {
                o1.borrow_mut().push(format!("first {prev:?}"));
                next.ok(vec![json!("a"), json!(1)]);
                Ok(())
            })
            .step(move |_, next, prev| {
                o2.borrow_mut().push(format!("second {}", prev.len()));
                next.ok(vec![prev[1].clone()]);
                Ok(())
            })
            .step(move |_, next, prev| {
                o3.borrow_mut().push("third".to_string());
                next.ok(vec![json!(prev[0].as_i64().unwrap() + 1)]);
                Ok(())
            })
            .compose(done)
            .start();

        assert_eq!(*order.borrow(), vec!["first []", "second 2", "third"]);
        assert_eq!(*calls.borrow(), vec![Ok(vec![json!(2)])]);
    }

    #[test]
    fn to_stores_results_in_accumulator() {
        let acc = Context::new();
        let (calls, done) = recorder();

        Sequence::new()
            .with_accumulator(acc.clone())
            .step(|_, next, _| {
                next.to(["user", "role", "missing"])
                    .ok(vec![json!("ada"), json!("admin")]);
                Ok(())
            })
            .step(|acc, next, _| {
                assert_eq!(acc.get("user"), Some(json!("ada")));
                next.done();
                Ok(())
            })
            .compose(done)
            .start();

        assert_eq!(calls.borrow().len(), 1);
        assert_eq!(acc.get("role"), Some(json!("admin")));
        assert_eq!(acc.get("missing"), Some(Value::Null));
    }

    #[test]
    fn explicit_failure_short_circuits() {
        let reached = Rc::new(Cell::new(false));
        let flag = reached.clone();
        let (calls, done) = recorder();

        Sequence::new()
            .step(|_, next, _| {
                next.fail(FlowError::failed("no quota"));
                Ok(())
            })
            .step(move |_, next, _| {
                flag.set(true);
                next.done();
                Ok(())
            })
            .compose(done)
            .start();

        assert!(!reached.get());
        assert_eq!(*calls.borrow(), vec![Err(FlowError::failed("no quota"))]);
    }

    #[test]
    fn returned_error_becomes_done_error() {
        let (calls, done) = recorder();

        Sequence::new()
            .step(|_, _next, _| Err(FlowError::failed("boom")))
            .compose(done)
            .start();

        assert_eq!(*calls.borrow(), vec![Err(FlowError::failed("boom"))]);
    }

    #[test]
    fn panic_after_continuing_still_fires_done_once() {
        let later = Rc::new(Cell::new(false));
        let flag = later.clone();
        let acc = Context::new();
        let (calls, done) = recorder();

        Sequence::new()
            .with_accumulator(acc.clone())
            .step(|acc, next, _| {
                acc.set("partial", true);
                next.done();
                panic!("boom");
            })
            .step(move |_, next, _| {
                flag.set(true);
                next.done();
                Ok(())
            })
            .compose(done)
            .start();

        assert!(!later.get());
        assert_eq!(*calls.borrow(), vec![Err(FlowError::Panicked("boom".to_string()))]);
        assert!(acc.is_empty());
    }

    #[test]
    fn continuation_after_failed_run_leaves_accumulator_cleared() {
        let parked: Rc<RefCell<Option<Next>>> = Rc::new(RefCell::new(None));
        let slot = parked.clone();
        let acc = Context::new();
        let (calls, done) = recorder();

        Sequence::new()
            .with_accumulator(acc.clone())
            .step(move |acc, next, _| {
                acc.set("partial", 1);
                *slot.borrow_mut() = Some(next);
                Err(FlowError::failed("aborted"))
            })
            .compose(done)
            .start();

        assert_eq!(*calls.borrow(), vec![Err(FlowError::failed("aborted"))]);
        assert!(acc.is_empty());

        let next = parked.borrow_mut().take().unwrap();
        next.to(["leaked"]).ok(vec![json!("partial")]);

        assert!(acc.is_empty());
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn deferred_continuation_resumes_the_chain() {
        let parked: Rc<RefCell<Option<Next>>> = Rc::new(RefCell::new(None));
        let slot = parked.clone();
        let (calls, done) = recorder();

        Sequence::new()
            .step(move |_, next, _| {
                *slot.borrow_mut() = Some(next);
                Ok(())
            })
            .step(|_, next, prev| {
                next.ok(prev);
                Ok(())
            })
            .compose(done)
            .start();

        assert!(calls.borrow().is_empty());

        let next = parked.borrow_mut().take().unwrap();
        next.ok(vec![json!("later")]);

        assert_eq!(*calls.borrow(), vec![Ok(vec![json!("later")])]);
    }
}
