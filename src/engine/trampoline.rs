// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Explicit worklist that replaces recursive re-entry.
//!
//! A continuation invoked while the worklist is already draining is queued
//! and picked up by the outer loop; one invoked from outside (a deferred
//! resolution) drains the queue on the spot. Stack depth therefore stays flat
//! no matter how long a dependency chain or fold loop is, while jobs still
//! run in the order they were scheduled.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

type Job = Box<dyn FnOnce()>;

#[derive(Default)]
pub(crate) struct Trampoline {
    queue: RefCell<VecDeque<Job>>,
    draining: Cell<bool>,
}

/// Resets the draining flag even if a job unwinds.
struct DrainGuard<'a>(&'a Cell<bool>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Trampoline {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn schedule(&self, job: impl FnOnce() + 'static) {
        self.queue.borrow_mut().push_back(Box::new(job));
        if self.draining.get() {
            return;
        }

        self.draining.set(true);
        let _guard = DrainGuard(&self.draining);
        loop {
            let next = self.queue.borrow_mut().pop_front();
            match next {
                Some(job) => job(),
                None => break,
            }
        }
    }

    /// Drops every queued job without running it.
    pub(crate) fn clear(&self) {
        self.queue.borrow_mut().clear();
    }

    #[cfg(test)]
    fn queued(&self) -> usize {
        self.queue.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_schedules_run_after_the_current_job() {
        let trampoline = Trampoline::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let t = trampoline.clone();
        let o = order.clone();
        trampoline.schedule(move || {
            o.borrow_mut().push("outer:start");
            let inner = o.clone();
            t.schedule(move || inner.borrow_mut().push("inner"));
            o.borrow_mut().push("outer:end");
        });

        assert_eq!(*order.borrow(), vec!["outer:start", "outer:end", "inner"]);
        assert_eq!(trampoline.queued(), 0);
    }

    #[test]
    fn long_chains_do_not_grow_the_stack() {
        fn step(t: Rc<Trampoline>, remaining: usize, count: Rc<Cell<usize>>) {
            count.set(count.get() + 1);
            if remaining > 0 {
                let next = t.clone();
                t.schedule(move || step(next, remaining - 1, count));
            }
        }

        let trampoline = Trampoline::new();
        let count = Rc::new(Cell::new(0));
        let t = trampoline.clone();
        let c = count.clone();
        trampoline.schedule(move || step(t, 200_000, c));

        assert_eq!(count.get(), 200_001);
    }

    #[test]
    fn draining_flag_resets_after_a_panicking_job() {
        let trampoline = Trampoline::new();
        let t = trampoline.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            t.schedule(|| panic!("job failed"));
        }));
        assert!(result.is_err());

        trampoline.clear();
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        trampoline.schedule(move || flag.set(true));
        assert!(ran.get());
    }
}
