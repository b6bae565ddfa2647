//! Management services: use-case implementations for rule authoring and
//! execution log queries.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod execution_service;
pub mod rule_service;
