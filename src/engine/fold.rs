// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Asynchronous reduce built on [`Sequence`].
//!
//! `repeat(times, field, initial, body, done)` seeds `accumulator[field]`,
//! runs `body(accumulator, next, i)` for `i` in `0..times` strictly one after
//! another (iteration `i + 1` starts only once iteration `i` called its
//! continuation), then hands the final `accumulator[field]` to `done`.
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use serde_json::json;
//! use dagwood_flow::engine::fold::repeat;
//!
//! let total = Rc::new(RefCell::new(None));
//! let sink = total.clone();
//!
//! repeat(
//!     4,
//!     "product",
//!     1,
//!     |acc, next, i| {
//!         let product = acc.get_i64("product").unwrap_or(0) * (i as i64 + 1);
//!         next.to(["product"]).ok(vec![json!(product)]);
//!         Ok(())
//!     },
//!     move |r| *sink.borrow_mut() = Some(r),
//! );
//!
//! assert_eq!(*total.borrow(), Some(Ok(json!(24))));
//! ```

use serde_json::Value;
use std::rc::Rc;

use crate::engine::context::Context;
use crate::engine::sequence::{Next, Sequence};
use crate::errors::FlowError;
use crate::observability::messages::{pipeline::FoldStarted, StructuredLog};

pub fn repeat<B>(
    times: usize,
    field: impl Into<String>,
    initial: impl Into<Value>,
    body: B,
    done: impl FnOnce(Result<Value, FlowError>) + 'static,
) where
    B: Fn(&Context, Next, usize) -> Result<(), FlowError> + 'static,
{
    repeat_with(Context::new(), times, field, initial, body, done)
}

/// Same as [`repeat`], folding into a caller-owned accumulator.
pub fn repeat_with<B>(
    accumulator: Context,
    times: usize,
    field: impl Into<String>,
    initial: impl Into<Value>,
    body: B,
    done: impl FnOnce(Result<Value, FlowError>) + 'static,
) where
    B: Fn(&Context, Next, usize) -> Result<(), FlowError> + 'static,
{
    let field = field.into();
    let initial = initial.into();
    FoldStarted {
        times,
        field: &field,
    }
    .log();

    let body = Rc::new(body);
    let seed_field = field.clone();
    let mut sequence = Sequence::new()
        .with_accumulator(accumulator)
        .step(move |acc, next, _| {
            acc.set(seed_field, initial);
            next.done();
            Ok(())
        });

    for iteration in 0..times {
        let body = Rc::clone(&body);
        sequence = sequence.step(move |acc, next, _| body(acc, next, iteration));
    }

    sequence = sequence.step(move |acc, next, _| {
        let value = acc.get(&field).unwrap_or(Value::Null);
        next.ok(vec![value]);
        Ok(())
    });

    sequence
        .compose(move |result| {
            done(result.map(|mut values| values.pop().unwrap_or(Value::Null)))
        })
        .start();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    type Outcome = Rc<RefCell<Vec<Result<Value, FlowError>>>>;

    fn recorder() -> (Outcome, impl FnOnce(Result<Value, FlowError>) + 'static) {
        let calls: Outcome = Rc::new(RefCell::new(Vec::new()));
        let sink = calls.clone();
        (calls, move |r| sink.borrow_mut().push(r))
    }

    #[test]
    fn sums_iteration_indices() {
        let (calls, done) = recorder();

        repeat(
            3,
            "sum",
            0,
            |acc, next, i| {
                let sum = acc.get_i64("sum").unwrap_or(0) + i as i64;
                acc.set("sum", sum);
                next.done();
                Ok(())
            },
            done,
        );

        assert_eq!(*calls.borrow(), vec![Ok(json!(3))]);
    }

    #[test]
    fn zero_iterations_yield_initial_value() {
        let (calls, done) = recorder();

        repeat(0, "v", "seed", |_, next, _| { next.done(); Ok(()) }, done);

        assert_eq!(*calls.borrow(), vec![Ok(json!("seed"))]);
    }

    #[test]
    fn iterations_are_strictly_sequential_even_when_deferred() {
        let parked: Rc<RefCell<Vec<(usize, Next)>>> = Rc::new(RefCell::new(Vec::new()));
        let slot = parked.clone();
        let (calls, done) = recorder();

        repeat(
            3,
            "log",
            json!([]),
            move |acc, next, i| {
                acc.with("log", |log| log.as_array_mut().unwrap().push(json!(i)));
                slot.borrow_mut().push((i, next));
                Ok(())
            },
            done,
        );

        // Only iteration 0 has started; each release starts exactly one more.
        for expected in 0..3 {
            let mut waiting = parked.borrow_mut();
            assert_eq!(waiting.len(), 1);
            let (i, next) = waiting.pop().unwrap();
            drop(waiting);
            assert_eq!(i, expected);
            next.done();
        }

        assert_eq!(*calls.borrow(), vec![Ok(json!([0, 1, 2]))]);
    }

    #[test]
    fn failure_in_body_stops_the_loop() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let (calls, done) = recorder();

        repeat(
            5,
            "n",
            0,
            move |_, next, i| {
                log.borrow_mut().push(i);
                if i == 2 {
                    return Err(FlowError::failed("iteration 2 failed"));
                }
                next.done();
                Ok(())
            },
            done,
        );

        assert_eq!(*seen.borrow(), vec![0, 1, 2]);
        assert_eq!(*calls.borrow(), vec![Err(FlowError::failed("iteration 2 failed"))]);
    }

    #[test]
    fn late_continuation_of_failed_iteration_is_ignored() {
        let parked: Rc<RefCell<Option<Next>>> = Rc::new(RefCell::new(None));
        let slot = parked.clone();
        let acc = Context::new();
        let (calls, done) = recorder();

        repeat_with(
            acc.clone(),
            3,
            "count",
            0,
            move |_, next, i| {
                if i == 1 {
                    *slot.borrow_mut() = Some(next);
                    return Err(FlowError::failed("iteration 1 gave up"));
                }
                next.to(["count"]).ok(vec![json!(i + 1)]);
                Ok(())
            },
            done,
        );

        assert_eq!(*calls.borrow(), vec![Err(FlowError::failed("iteration 1 gave up"))]);
        assert!(acc.is_empty());

        let next = parked.borrow_mut().take().unwrap();
        next.to(["count"]).ok(vec![json!(99)]);

        assert!(acc.is_empty());
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn large_fold_completes_without_deep_recursion() {
        let (calls, done) = recorder();

        repeat(
            50_000,
            "count",
            0,
            |acc, next, _| {
                let count = acc.get_i64("count").unwrap_or(0) + 1;
                next.to(["count"]).ok(vec![json!(count)]);
                Ok(())
            },
            done,
        );

        assert_eq!(*calls.borrow(), vec![Ok(json!(50_000))]);
    }
}
