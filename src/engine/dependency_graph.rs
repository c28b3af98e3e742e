// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Implicit dataflow executor driven by declared task inputs.
//!
//! Callers hand the executor an unordered pool of [`Task`]s. Each task
//! declares the names it needs and, when it produces values, the names it
//! will bind through a continuation. The executor keeps a `pending` pool and
//! a `bindings` map and repeatedly *settles*: every pending task whose inputs
//! are all bound is taken out of the pool and executed with those values.
//!
//! # Execution Flow
//!
//! 1. **Settle**: snapshot the batch of tasks whose inputs are bound, remove
//!    them from `pending`, execute them in declaration order
//! 2. **Resolve**: a task's [`Resolver`] binds its output names (or aborts the
//!    run with an error) and schedules another settle pass
//! 3. **Finish**: when `pending` is empty and no executed task still owes a
//!    resolution, `on_done(Ok(()))` fires
//!
//! Re-entrant resolutions (a task resolving synchronously from inside its own
//! body) are queued on a worklist instead of recursing, so long dependency
//! chains run at constant stack depth and a settle pass never sees the pool
//! change underneath it.
//!
//! # Failure Semantics
//!
//! The first error, whether a resolver's explicit failure, an `Err` returned
//! from a task body, or a panic inside one, fires `on_done(Err(..))` exactly
//! once. No task executes afterwards, bindings are dropped and the execution
//! context is cleared. A task whose inputs never become bound leaves the run
//! stalled: `on_done` is never called. [`RunHandle::pending_tasks`] shows what
//! a stalled run is waiting on.
//!
//! # Examples
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use serde_json::json;
//! use dagwood_flow::engine::dependency_graph::{DependencyGraphExecutor, Task};
//! use dagwood_flow::engine::context::Context;
//!
//! let ctx = Context::new();
//! let outcome = Rc::new(RefCell::new(None));
//! let sink = outcome.clone();
//!
//! DependencyGraphExecutor::new()
//!     .with_context(ctx.clone())
//!     .bind("celsius", json!(100))
//!     .task(
//!         Task::new("report")
//!             .needs(["fahrenheit"])
//!             .body(|args| {
//!                 args.context().set("report", format!("{}F", args.input_i64("fahrenheit")?));
//!                 Ok(())
//!             }),
//!     )
//!     .task(
//!         Task::new("convert")
//!             .needs(["celsius"])
//!             .produces(["fahrenheit"])
//!             .body(|mut args| {
//!                 let f = args.input_i64("celsius")? * 9 / 5 + 32;
//!                 args.continuation()?.outputs().ok(vec![json!(f)]);
//!                 Ok(())
//!             }),
//!     )
//!     .run(move |r| *sink.borrow_mut() = Some(r));
//!
//! assert_eq!(*outcome.borrow(), Some(Ok(())));
//! assert_eq!(ctx.get("report"), Some(json!("212F")));
//! ```

use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

use crate::engine::context::Context;
use crate::engine::guard::{run_guarded, Completion};
use crate::engine::trampoline::Trampoline;
use crate::errors::FlowError;
use crate::observability::messages::{
    engine::{
        LateResolution, RunCompleted, RunFailed, RunStarted, SettleWaiting, TaskExecuting,
        ValuesBound,
    },
    StructuredLog,
};

type TaskBody = Box<dyn FnOnce(TaskArgs) -> Result<(), FlowError>>;

/// A unit of work with an explicit input/output declaration.
pub struct Task {
    id: usize,
    name: Rc<str>,
    inputs: Vec<String>,
    outputs: Rc<[String]>,
    wants_continuation: bool,
    body: TaskBody,
}

impl Task {
    /// Starts declaring a task. Finish the declaration with [`TaskSpec::body`].
    pub fn new(name: impl Into<String>) -> TaskSpec {
        TaskSpec {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            wants_continuation: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn wants_continuation(&self) -> bool {
        self.wants_continuation
    }

    fn is_ready(&self, bindings: &HashMap<String, Value>) -> bool {
        self.inputs.iter().all(|name| bindings.contains_key(name))
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("wants_continuation", &self.wants_continuation)
            .finish()
    }
}

/// Declaration of a task before its body is attached.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    name: String,
    inputs: Vec<String>,
    outputs: Vec<String>,
    wants_continuation: bool,
}

impl TaskSpec {
    /// Names that must be bound before the task can run.
    pub fn needs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.extend(names.into_iter().map(Into::into));
        self
    }

    /// Names the task will bind through [`ContinuationBuilder::outputs`].
    /// Declaring outputs implies a continuation.
    pub fn produces<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs.extend(names.into_iter().map(Into::into));
        self.wants_continuation = true;
        self
    }

    /// Requests a continuation without declaring output names up front.
    pub fn with_continuation(mut self) -> Self {
        self.wants_continuation = true;
        self
    }

    pub fn body<F>(self, f: F) -> Task
    where
        F: FnOnce(TaskArgs) -> Result<(), FlowError> + 'static,
    {
        Task {
            id: 0,
            name: Rc::from(self.name),
            inputs: self.inputs,
            outputs: Rc::from(self.outputs),
            wants_continuation: self.wants_continuation,
            body: Box::new(f),
        }
    }
}

/// What a task body receives when it runs.
pub struct TaskArgs {
    task: Rc<str>,
    inputs: Vec<(String, Value)>,
    context: Context,
    continuation: Option<ContinuationBuilder>,
}

impl TaskArgs {
    pub fn task_name(&self) -> &str {
        &self.task
    }

    /// The bound value of a declared input.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.inputs
            .iter()
            .find(|(input, _)| input == name)
            .map(|(_, value)| value)
    }

    /// The bound value of the declared input at `index`.
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.inputs.get(index).map(|(_, value)| value)
    }

    /// All bound inputs in declaration order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.inputs.iter().map(|(_, value)| value)
    }

    pub fn input_i64(&self, name: &str) -> Result<i64, FlowError> {
        self.get(name).and_then(Value::as_i64).ok_or_else(|| {
            FlowError::failed(format!(
                "task '{}': input '{}' is not an integer",
                self.task, name
            ))
        })
    }

    pub fn input_str(&self, name: &str) -> Result<&str, FlowError> {
        self.get(name).and_then(Value::as_str).ok_or_else(|| {
            FlowError::failed(format!(
                "task '{}': input '{}' is not a string",
                self.task, name
            ))
        })
    }

    /// The run's execution context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// The continuation builder. Fails for tasks that did not declare outputs
    /// or [`TaskSpec::with_continuation`].
    pub fn continuation(&mut self) -> Result<ContinuationBuilder, FlowError> {
        self.continuation.clone().ok_or_else(|| {
            FlowError::failed(format!(
                "task '{}' did not declare a continuation",
                self.task
            ))
        })
    }
}

struct RunState {
    pending: RefCell<Vec<Task>>,
    bindings: RefCell<HashMap<String, Value>>,
    outstanding: RefCell<HashSet<usize>>,
    context: Context,
    done: Completion<()>,
    trampoline: Rc<Trampoline>,
    executed: Cell<usize>,
    started: Instant,
}

impl RunState {
    fn settle(self: &Rc<Self>) {
        if self.done.is_done() {
            return;
        }

        loop {
            let ready = self.take_ready();
            if ready.is_empty() {
                break;
            }
            for task in ready {
                if self.done.is_done() {
                    return;
                }
                self.execute(task);
            }
        }

        if self.done.is_done() {
            return;
        }
        let pending = self.pending.borrow().len();
        let outstanding = self.outstanding.borrow().len();
        if pending == 0 && outstanding == 0 {
            self.succeed();
        } else {
            SettleWaiting {
                pending,
                outstanding,
            }
            .log();
        }
    }

    /// Removes and returns every pending task whose inputs are bound.
    fn take_ready(&self) -> Vec<Task> {
        let bindings = self.bindings.borrow();
        let mut pending = self.pending.borrow_mut();
        let (ready, waiting): (Vec<Task>, Vec<Task>) =
            pending.drain(..).partition(|task| task.is_ready(&bindings));
        *pending = waiting;
        ready
    }

    fn execute(self: &Rc<Self>, task: Task) {
        let Task {
            id,
            name,
            inputs,
            outputs,
            wants_continuation,
            body,
        } = task;

        let inputs: Vec<(String, Value)> = {
            let bindings = self.bindings.borrow();
            inputs
                .into_iter()
                .map(|input| {
                    let value = bindings.get(&input).cloned().unwrap_or(Value::Null);
                    (input, value)
                })
                .collect()
        };

        TaskExecuting {
            task: &name,
            input_count: inputs.len(),
            wants_continuation,
        }
        .log();
        self.executed.set(self.executed.get() + 1);

        let continuation = if wants_continuation {
            self.outstanding.borrow_mut().insert(id);
            Some(ContinuationBuilder {
                run: Rc::clone(self),
                task_id: id,
                task: Rc::clone(&name),
                declared: outputs,
            })
        } else {
            None
        };

        let args = TaskArgs {
            task: Rc::clone(&name),
            inputs,
            context: self.context.clone(),
            continuation,
        };

        if let Err(error) = run_guarded(|| body(args)) {
            self.fail(Some(&*name), error);
        }
    }

    fn bind(self: &Rc<Self>, task_id: usize, task: &str, names: Vec<String>, values: Vec<Value>) {
        ValuesBound {
            task,
            names: &names,
        }
        .log();

        {
            let mut bindings = self.bindings.borrow_mut();
            let mut values = values.into_iter();
            for name in names {
                bindings.insert(name, values.next().unwrap_or(Value::Null));
            }
        }
        self.outstanding.borrow_mut().remove(&task_id);

        let run = Rc::clone(self);
        self.trampoline.schedule(move || run.settle());
    }

    fn succeed(&self) {
        self.bindings.borrow_mut().clear();
        RunCompleted {
            executed: self.executed.get(),
            duration: self.started.elapsed(),
        }
        .log();
        self.done.succeed(());
    }

    fn fail(&self, task: Option<&str>, error: FlowError) {
        if self.done.is_done() {
            return;
        }
        RunFailed {
            task,
            error: &error,
        }
        .log();

        self.pending.borrow_mut().clear();
        self.bindings.borrow_mut().clear();
        self.outstanding.borrow_mut().clear();
        self.context.clear();
        self.trampoline.clear();
        self.done.fail(error);
    }
}

/// Handed to a task that requested a continuation; builds resolvers that
/// bind named outputs.
#[derive(Clone)]
pub struct ContinuationBuilder {
    run: Rc<RunState>,
    task_id: usize,
    task: Rc<str>,
    declared: Rc<[String]>,
}

impl ContinuationBuilder {
    /// A resolver that binds `names` positionally.
    pub fn build<I, S>(&self, names: I) -> Resolver
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Resolver {
            builder: self.clone(),
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// A resolver for the outputs the task declared with [`TaskSpec::produces`].
    pub fn outputs(&self) -> Resolver {
        Resolver {
            builder: self.clone(),
            names: self.declared.to_vec(),
        }
    }
}

/// One-shot handle that reports a task's outputs or failure.
pub struct Resolver {
    builder: ContinuationBuilder,
    names: Vec<String>,
}

impl Resolver {
    /// Binds the names to `values` (missing values bind `Value::Null`, extra
    /// values are ignored) or aborts the run with the error.
    pub fn resolve(self, result: Result<Vec<Value>, FlowError>) {
        let ContinuationBuilder {
            run, task_id, task, ..
        } = self.builder;

        if run.done.is_done() {
            LateResolution { task: &task }.log();
            return;
        }

        match result {
            Err(error) => run.fail(Some(&*task), error),
            Ok(values) => run.bind(task_id, &task, self.names, values),
        }
    }

    pub fn ok(self, values: Vec<Value>) {
        self.resolve(Ok(values));
    }

    pub fn fail(self, error: FlowError) {
        self.resolve(Err(error));
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Observer for a run in progress.
#[derive(Clone)]
pub struct RunHandle {
    run: Rc<RunState>,
}

impl RunHandle {
    pub fn is_finished(&self) -> bool {
        self.run.done.is_done()
    }

    /// Names of the tasks still waiting for inputs.
    pub fn pending_tasks(&self) -> Vec<String> {
        self.run
            .pending
            .borrow()
            .iter()
            .map(|task| task.name().to_string())
            .collect()
    }

    /// Currently bound names, sorted. Empty once the run has finished.
    pub fn bound_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.run.bindings.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn executed_count(&self) -> usize {
        self.run.executed.get()
    }
}

/// Builder for a single dependency graph run.
#[derive(Default)]
pub struct DependencyGraphExecutor {
    tasks: Vec<Task>,
    bindings: HashMap<String, Value>,
    context: Context,
}

impl DependencyGraphExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn tasks(mut self, tasks: impl IntoIterator<Item = Task>) -> Self {
        self.tasks.extend(tasks);
        self
    }

    /// Binds a value before the run starts.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bindings.insert(name.into(), value.into());
        self
    }

    /// Uses a caller-owned execution context so results stashed by tasks stay
    /// reachable after the run.
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Starts the run. `on_done` fires exactly once, or never if the run stalls.
    pub fn run(self, on_done: impl FnOnce(Result<(), FlowError>) + 'static) -> RunHandle {
        let started = RunStarted {
            task_count: self.tasks.len(),
            initial_bindings: self.bindings.len(),
        };
        started.log();
        let _span = started.span("run").entered();

        let tasks: Vec<Task> = self
            .tasks
            .into_iter()
            .enumerate()
            .map(|(id, mut task)| {
                task.id = id;
                task
            })
            .collect();

        let run = Rc::new(RunState {
            pending: RefCell::new(tasks),
            bindings: RefCell::new(self.bindings),
            outstanding: RefCell::new(HashSet::new()),
            context: self.context,
            done: Completion::new(on_done),
            trampoline: Trampoline::new(),
            executed: Cell::new(0),
            started: Instant::now(),
        });

        let settling = Rc::clone(&run);
        run.trampoline.schedule(move || settling.settle());
        RunHandle { run }
    }
}

/// Runs `tasks` with a fresh context and no initial bindings.
pub fn run(tasks: Vec<Task>, on_done: impl FnOnce(Result<(), FlowError>) + 'static) -> RunHandle {
    DependencyGraphExecutor::new().tasks(tasks).run(on_done)
}
