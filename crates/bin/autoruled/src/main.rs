//! # autoruled: autorule daemon
//!
//! Composition root that wires the rule engine to its adapters and runs it.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Initialize logging
//! - Initialize the `SQLite` connection pool and run migrations
//! - Mark executions interrupted by a previous crash as abandoned
//! - Seed rules, register the built-in action handlers
//! - Start the worker pool, trigger dispatcher and scheduler
//! - Feed change notifications read from stdin into the engine
//! - Handle graceful shutdown (Ctrl-C)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer: no domain logic belongs here.

mod config;
mod feed;
mod lookup;
mod seed;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use autorule_adapter_storage_sqlite_sqlx::{
    Config as StorageConfig, SqliteExecutionLogStore, SqliteRuleRepository,
};
use autorule_app::actions::{ActionRegistry, LogHandler};
use autorule_app::change_feed::InProcessChangeFeed;
use autorule_app::clock::SystemClock;
use autorule_app::coordinator::ExecutionCoordinator;
use autorule_app::dispatcher::TriggerDispatcher;
use autorule_app::job::job_queue;
use autorule_app::ports::ExecutionLogStore;
use autorule_app::scheduler::Scheduler;
use autorule_app::services::rule_service::RuleService;
use autorule_app::worker_pool::WorkerPool;
use autorule_domain::time;

use crate::config::Config;
use crate::lookup::DetachedLookup;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.filter).context("invalid logging filter")?,
        )
        .init();

    // Database
    let db = StorageConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await
    .context("failed to open database")?;
    let pool = db.pool().clone();

    // Repositories
    let rules = Arc::new(SqliteRuleRepository::new(pool.clone()));
    let log = SqliteExecutionLogStore::new(pool);

    let abandoned = log.abandon_incomplete(time::now()).await?;
    tracing::info!(abandoned, "execution log recovered");

    if let Some(path) = &config.rules.seed_file {
        let service = RuleService::new(Arc::clone(&rules));
        let seeded = seed::apply_file(&service, path)
            .await
            .with_context(|| format!("failed to seed rules from {}", path.display()))?;
        tracing::info!(seeded, "rules seeded");
    }

    // Actions
    let registry = ActionRegistry::new();
    registry.register(LogHandler::ACTION_TYPE, LogHandler);
    tracing::info!(action_types = ?registry.action_types(), "action handlers registered");

    // Engine
    let (jobs, job_receiver) = job_queue(config.engine.queue_capacity);
    let coordinator = Arc::new(ExecutionCoordinator::new(
        log.clone(),
        DetachedLookup,
        Arc::new(registry),
        config.engine.action_timeout(),
        SystemClock,
    ));
    let workers = WorkerPool::new(
        coordinator,
        jobs.clone(),
        SystemClock,
        config.engine.workers,
    );
    let feed = InProcessChangeFeed::new(config.engine.feed_capacity);
    let dispatcher = TriggerDispatcher::new(
        Arc::clone(&rules),
        log.clone(),
        jobs.clone(),
        SystemClock,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    tasks.push(tokio::spawn({
        let shutdown = shutdown_rx.clone();
        async move { workers.run(job_receiver, shutdown).await }
    }));
    tasks.push(tokio::spawn({
        let shutdown = shutdown_rx.clone();
        let subscription = feed.subscribe();
        async move { dispatcher.run(subscription, shutdown).await }
    }));
    if config.scheduler.enabled {
        let scheduler = Scheduler::new(
            rules,
            log,
            jobs,
            SystemClock,
            config.scheduler.cadence(),
        );
        let shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move { scheduler.run(shutdown).await }));
    } else {
        drop(jobs);
    }
    tasks.push(tokio::spawn({
        let lines = feed::spawn_stdin_reader(config.engine.feed_capacity);
        async move {
            feed::ingest(lines, feed, shutdown_rx).await;
        }
    }));

    tracing::info!(
        workers = config.engine.workers,
        scheduler = config.scheduler.enabled,
        "autoruled running, reading change notifications from stdin"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown requested");
    shutdown_tx.send_replace(true);

    for task in tasks {
        task.await.context("engine task panicked")?;
    }
    db.close().await;
    tracing::info!("autoruled stopped");

    Ok(())
}
