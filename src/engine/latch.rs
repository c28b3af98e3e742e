// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Countdown completion gate for N independent reporters.
//!
//! Each of the N operations gets a clone of the [`Latch`] (or a one-shot
//! [`Latch::callback`]) and reports once. The first error fires `done` with
//! that error immediately and closes the latch; otherwise `done(Ok(()))` fires
//! when the N-th success arrives. Reports arriving after the latch fired are
//! ignored, so `done` runs exactly once whatever the arrival order.
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use dagwood_flow::engine::latch::Latch;
//!
//! let outcome = Rc::new(RefCell::new(None));
//! let sink = outcome.clone();
//! let latch = Latch::new(2, move |r| *sink.borrow_mut() = Some(r));
//!
//! latch.success();
//! assert!(outcome.borrow().is_none());
//! latch.success();
//! assert_eq!(*outcome.borrow(), Some(Ok(())));
//! ```

use std::cell::Cell;
use std::rc::Rc;

use crate::engine::guard::Completion;
use crate::errors::FlowError;
use crate::observability::messages::{pipeline::LatchReportIgnored, StructuredLog};

/// Reporter handle shared by the operations a latch is waiting on.
#[derive(Clone)]
pub struct Latch {
    remaining: Rc<Cell<usize>>,
    done: Completion<()>,
}

impl Latch {
    /// Creates a latch waiting for `n` successful reports.
    ///
    /// With `n == 0` there is nothing to wait for and `done(Ok(()))` fires
    /// before this returns.
    pub fn new(n: usize, done: impl FnOnce(Result<(), FlowError>) + 'static) -> Self {
        let latch = Self {
            remaining: Rc::new(Cell::new(n)),
            done: Completion::new(done),
        };
        if n == 0 {
            latch.done.succeed(());
        }
        latch
    }

    /// Records one report. Returns `true` if this report fired `done`.
    pub fn report(&self, result: Result<(), FlowError>) -> bool {
        if self.done.is_done() {
            LatchReportIgnored {
                was_error: result.is_err(),
            }
            .log();
            return false;
        }

        match result {
            Err(error) => {
                self.remaining.set(0);
                self.done.fail(error)
            }
            Ok(()) => {
                let left = self.remaining.get().saturating_sub(1);
                self.remaining.set(left);
                left == 0 && self.done.succeed(())
            }
        }
    }

    pub fn success(&self) -> bool {
        self.report(Ok(()))
    }

    pub fn failure(&self, error: FlowError) -> bool {
        self.report(Err(error))
    }

    /// A one-shot callback suitable for handing to a single operation.
    pub fn callback(&self) -> impl FnOnce(Result<(), FlowError>) + 'static {
        let latch = self.clone();
        move |result| {
            latch.report(result);
        }
    }

    /// Successful reports still needed; zero once the latch has fired.
    pub fn remaining(&self) -> usize {
        self.remaining.get()
    }

    pub fn is_fired(&self) -> bool {
        self.done.is_done()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recording(n: usize) -> (Latch, Rc<RefCell<Vec<Result<(), FlowError>>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = calls.clone();
        let latch = Latch::new(n, move |r| sink.borrow_mut().push(r));
        (latch, calls)
    }

    #[test]
    fn fires_after_n_successes() {
        let (latch, calls) = recording(3);

        assert!(!latch.success());
        assert!(!latch.success());
        assert_eq!(latch.remaining(), 1);
        assert!(calls.borrow().is_empty());

        assert!(latch.success());
        assert_eq!(*calls.borrow(), vec![Ok(())]);
    }

    #[test]
    fn error_first_then_successes_fires_once_with_error() {
        let (latch, calls) = recording(3);

        assert!(latch.failure(FlowError::failed("disk full")));
        assert!(!latch.success());
        assert!(!latch.success());

        assert_eq!(*calls.borrow(), vec![Err(FlowError::failed("disk full"))]);
    }

    #[test]
    fn error_after_last_success_is_ignored() {
        let (latch, calls) = recording(2);

        latch.success();
        latch.success();
        latch.failure(FlowError::failed("too late"));

        assert_eq!(*calls.borrow(), vec![Ok(())]);
    }

    #[test]
    fn error_between_successes_fires_once() {
        let (latch, calls) = recording(3);

        latch.success();
        latch.failure(FlowError::failed("second op failed"));
        latch.success();
        latch.success();
        latch.failure(FlowError::failed("another"));

        assert_eq!(calls.borrow().len(), 1);
        assert_eq!(calls.borrow()[0], Err(FlowError::failed("second op failed")));
        assert!(latch.is_fired());
        assert_eq!(latch.remaining(), 0);
    }

    #[test]
    fn every_ordering_of_reports_fires_once() {
        // 3 reporters, each either succeeding or failing, in every order.
        for mask in 0..8u8 {
            let outcomes: Vec<bool> = (0..3).map(|i| mask & (1 << i) == 0).collect();
            let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
            for order in orders {
                let (latch, calls) = recording(3);
                for &i in &order {
                    if outcomes[i] {
                        latch.success();
                    } else {
                        latch.failure(FlowError::failed(format!("op {i}")));
                    }
                }

                let calls = calls.borrow();
                assert_eq!(calls.len(), 1, "mask={mask} order={order:?}");
                let first_failure = order.iter().find(|&&i| !outcomes[i]);
                match first_failure {
                    Some(i) => assert_eq!(calls[0], Err(FlowError::failed(format!("op {i}")))),
                    None => assert_eq!(calls[0], Ok(())),
                }
            }
        }
    }

    #[test]
    fn zero_reporters_fires_immediately() {
        let (latch, calls) = recording(0);

        assert_eq!(*calls.borrow(), vec![Ok(())]);
        assert!(!latch.success());
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn callbacks_report_through_the_shared_latch() {
        let (latch, calls) = recording(2);
        let first = latch.callback();
        let second = latch.callback();

        second(Ok(()));
        first(Ok(()));

        assert_eq!(*calls.borrow(), vec![Ok(())]);
    }
}
