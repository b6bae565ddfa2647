//! # autorule-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement `RuleRepository` and `ExecutionLogStore` from `autorule-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `autorule-app` (for port traits) and `autorule-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod error;
pub mod execution_log;
pub mod pool;
pub mod rule_repo;

mod column;

pub use execution_log::SqliteExecutionLogStore;
pub use pool::{Config, Database};
pub use rule_repo::SqliteRuleRepository;
