//! Clock port: injectable wall clock.

use std::sync::Arc;

use autorule_domain::time::Timestamp;

/// Source of "now" in UTC.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}
