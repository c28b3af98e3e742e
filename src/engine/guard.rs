// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Guard combinators around completion callbacks.
//!
//! Every entry point into caller code goes through [`run_guarded`], so an
//! `Err` return and a panic both surface as a [`FlowError`] on the owning
//! completion instead of unwinding through the engine. [`Completion`] makes
//! the "fires exactly once" rule structural: later calls are dropped.

use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::errors::FlowError;

type Callback<T> = Box<dyn FnOnce(Result<T, FlowError>)>;

/// An at-most-once completion slot shared by every party that may finish a run.
pub struct Completion<T> {
    slot: Rc<RefCell<Option<Callback<T>>>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T: 'static> Completion<T> {
    pub fn new(done: impl FnOnce(Result<T, FlowError>) + 'static) -> Self {
        Self {
            slot: Rc::new(RefCell::new(Some(Box::new(done)))),
        }
    }

    /// Delivers `result` if nothing has been delivered yet. Returns whether
    /// this call was the one that fired.
    pub fn complete(&self, result: Result<T, FlowError>) -> bool {
        // Take the callback out before calling it so a re-entrant complete()
        // from inside the callback sees an empty slot.
        let callback = self.slot.borrow_mut().take();
        match callback {
            Some(callback) => {
                callback(result);
                true
            }
            None => false,
        }
    }

    pub fn succeed(&self, value: T) -> bool {
        self.complete(Ok(value))
    }

    pub fn fail(&self, error: FlowError) -> bool {
        self.complete(Err(error))
    }

    pub fn is_done(&self) -> bool {
        self.slot.borrow().is_none()
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("done", &self.slot.borrow().is_none())
            .finish()
    }
}

/// Runs caller code, turning a panic into [`FlowError::Panicked`].
pub fn run_guarded<R>(f: impl FnOnce() -> Result<R, FlowError>) -> Result<R, FlowError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(FlowError::from_panic(payload)),
    }
}

/// Wraps `f` so that an incoming error, an `Err` from `f`, or a panic in `f`
/// all finish `done` with that error.
///
/// On success `f` receives the value and is responsible for eventually
/// completing `done` itself (usually through a clone it captured).
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use dagwood_flow::engine::guard::{protect, Completion};
/// use dagwood_flow::errors::FlowError;
///
/// let seen = Rc::new(RefCell::new(None));
/// let sink = seen.clone();
/// let done = Completion::new(move |r: Result<u32, FlowError>| *sink.borrow_mut() = Some(r));
///
/// let on_read = protect(done.clone(), move |n: u32| {
///     if n > 10 {
///         return Err(FlowError::failed("too large"));
///     }
///     done.succeed(n * 2);
///     Ok(())
/// });
///
/// on_read(Ok(50));
/// assert_eq!(*seen.borrow(), Some(Err(FlowError::failed("too large"))));
/// ```
pub fn protect<A, T, F>(done: Completion<T>, f: F) -> impl FnOnce(Result<A, FlowError>)
where
    T: 'static,
    F: FnOnce(A) -> Result<(), FlowError>,
{
    move |incoming| match incoming {
        Err(error) => {
            done.fail(error);
        }
        Ok(value) => {
            if let Err(error) = run_guarded(|| f(value)) {
                done.fail(error);
            }
        }
    }
}

/// The inverse of [`protect`]: success is turned into
/// [`FlowError::ExpectedFailure`] carrying `description`, while an incoming
/// error is handed to `f` under the same guard.
pub fn expect_failure<A, T, F>(
    done: Completion<T>,
    description: impl Into<String>,
    f: F,
) -> impl FnOnce(Result<A, FlowError>)
where
    T: 'static,
    F: FnOnce(FlowError) -> Result<(), FlowError>,
{
    let description = description.into();
    move |incoming| match incoming {
        Ok(_) => {
            done.fail(FlowError::ExpectedFailure(description));
        }
        Err(error) => {
            if let Err(fault) = run_guarded(|| f(error)) {
                done.fail(fault);
            }
        }
    }
}
