//! # autorule-domain
//!
//! Pure domain model for the autorule automation rule engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **tagged values** used by condition literals, snapshots and action parameters
//! - Define **Rules** (trigger → conditions → ordered actions) and their invariants
//! - Define the **cron** expression matcher used by schedule triggers
//! - Define **change notifications** and **trigger contexts**
//! - Define **Execution Records** and the per-invocation state machine
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;
pub mod value;

pub mod change;
pub mod context;
pub mod cron;
pub mod execution;
pub mod rule;
