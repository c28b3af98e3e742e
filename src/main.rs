// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use serde_json::json;
use std::cell::RefCell;
use std::env;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dagwood_flow::config::{load_and_validate_config, Config};
use dagwood_flow::engine::{repeat, Context, DependencyGraphExecutor, IntervalScheduler, Task};
use dagwood_flow::observability::init_tracing;

/// How long the scheduler demo keeps ticking
const SCHEDULER_WINDOW: Duration = Duration::from_millis(1_500);

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let config = match args.get(1) {
        Some(path) => load_and_validate_config(path)
            .with_context(|| format!("loading configuration from {path}"))?,
        None => Config::default(),
    };
    init_tracing(&config.logging);

    println!("🚀 dagwood-flow demo");
    println!("═══════════════════════════════════");

    run_graph_demo()?;
    run_fold_demo()?;
    run_scheduler_demo(&config).await;

    Ok(())
}

/// Converts a temperature through a small dependency graph declared out of order.
fn run_graph_demo() -> Result<()> {
    println!("\n📊 Dependency graph");

    let ctx = Context::new();
    let outcome = Rc::new(RefCell::new(None));
    let sink = outcome.clone();

    DependencyGraphExecutor::new()
        .with_context(ctx.clone())
        .bind("celsius", json!(21))
        .task(Task::new("describe").needs(["fahrenheit", "label"]).body(|args| {
            let line = format!("{} {}F", args.input_str("label")?, args.input_i64("fahrenheit")?);
            args.context().set("report", line);
            Ok(())
        }))
        .task(Task::new("label").needs(["fahrenheit"]).produces(["label"]).body(|mut args| {
            let label = if args.input_i64("fahrenheit")? > 75 { "warm" } else { "mild" };
            args.continuation()?.outputs().ok(vec![json!(label)]);
            Ok(())
        }))
        .task(Task::new("convert").needs(["celsius"]).produces(["fahrenheit"]).body(|mut args| {
            let fahrenheit = args.input_i64("celsius")? * 9 / 5 + 32;
            args.continuation()?.outputs().ok(vec![json!(fahrenheit)]);
            Ok(())
        }))
        .run(move |result| *sink.borrow_mut() = Some(result));

    let result = outcome
        .borrow_mut()
        .take()
        .context("dependency graph did not finish")?;
    result?;
    let report = ctx
        .get("report")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    println!("   ✅ {report}");
    Ok(())
}

/// Folds the first ten squares into a running total.
fn run_fold_demo() -> Result<()> {
    println!("\n🔁 Fold loop");

    let outcome = Rc::new(RefCell::new(None));
    let sink = outcome.clone();

    repeat(
        10,
        "total",
        0,
        |acc, next, i| {
            let total = acc.get_i64("total").unwrap_or(0) + (i as i64 + 1).pow(2);
            next.to(["total"]).ok(vec![json!(total)]);
            Ok(())
        },
        move |result| *sink.borrow_mut() = Some(result),
    );

    let total = outcome
        .borrow_mut()
        .take()
        .context("fold loop did not finish")??;
    println!("   ✅ sum of squares 1..=10 = {total}");
    Ok(())
}

/// Runs a slow poller under the configured cap for a short window.
async fn run_scheduler_demo(config: &Config) {
    println!("\n⏱️  Interval scheduler");

    let completed = Arc::new(AtomicU64::new(0));
    let counter = completed.clone();
    let scheduler = IntervalScheduler::from_options(&config.scheduler, move |invocation| {
        let counter = counter.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            counter.fetch_add(1, Ordering::SeqCst);
            invocation.finish(Ok(()));
        });
    });

    scheduler.start();
    tokio::time::sleep(SCHEDULER_WINDOW).await;
    scheduler.stop();

    println!(
        "   ✅ {} invocations started, {} completed, {} ticks skipped",
        scheduler.invocations(),
        completed.load(Ordering::SeqCst),
        scheduler.skipped_ticks()
    );
}
