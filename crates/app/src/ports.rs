//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the engine and the outside world.
//! They are defined here (in `app`) so that both the engine and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod change_feed;
pub mod clock;
pub mod entity_lookup;
pub mod execution_log;
pub mod job_sink;
pub mod rule_repo;

pub use change_feed::ChangePublisher;
pub use clock::Clock;
pub use entity_lookup::{EntityLookup, EntityRef, LookupResult};
pub use execution_log::{ExecutionLogStore, ExecutionQuery};
pub use job_sink::JobSink;
pub use rule_repo::RuleRepository;
