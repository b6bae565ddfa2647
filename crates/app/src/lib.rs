//! # autorule-app
//!
//! Application layer: the rule engine and its **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `RuleRepository`: CRUD for rules, active rule lookup, schedule bookkeeping
//!   - `ExecutionLogStore`: append, update and query execution records
//!   - `EntityLookup`: resolve fields that are not in the change snapshot
//!   - `Clock`: the current instant
//! - Define **driving/inbound ports** as use-case structs:
//!   - `RuleService`: create, update, activate, list, delete rules
//!   - `ExecutionService`: read the execution log
//!   - `TriggerDispatcher` and `Scheduler`: turn changes and cron ticks into jobs
//! - Run jobs: `WorkerPool` → `ExecutionCoordinator` → `ConditionEvaluator`
//!   and `ActionExecutor`
//! - Provide **in-process infrastructure** (change feed, job queue, action
//!   registry) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `autorule-domain` only (plus `tokio` for channels and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod actions;
pub mod change_feed;
pub mod clock;
pub mod condition_evaluator;
pub mod coordinator;
pub mod dispatcher;
pub mod field_resolver;
pub mod job;
pub mod ports;
pub mod scheduler;
pub mod services;
pub mod worker_pool;

#[cfg(test)]
mod testing;
