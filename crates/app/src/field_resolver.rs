//! Field resolver: turns a condition's field path into a value.
//!
//! Paths are split on [`PATH_SEPARATOR`]. A single segment reads the
//! subject's current snapshot first and falls back to the entity lookup.
//! Longer paths walk relations through the lookup, one hop per segment.
//! Paths starting with `$` name system fields derived from the fire time
//! and resolve in every context; everything else is unresolvable for
//! schedule-triggered contexts.

use chrono::{Datelike, Timelike};

use autorule_domain::context::TriggerContext;
use autorule_domain::rule::PATH_SEPARATOR;
use autorule_domain::time::Timestamp;
use autorule_domain::value::Value;

use crate::ports::{EntityLookup, EntityRef, LookupResult};

/// Resolves field paths against a trigger context.
pub struct FieldResolver<E> {
    lookup: E,
}

impl<E: EntityLookup> FieldResolver<E> {
    pub fn new(lookup: E) -> Self {
        Self { lookup }
    }

    /// Resolve `path`, returning `None` when any hop is missing.
    ///
    /// Never fails: lookup errors are logged and read as missing.
    pub async fn resolve(&self, path: &str, context: &TriggerContext) -> Option<Value> {
        if let Some(name) = path.strip_prefix('$') {
            return system_field(name, context.fired_at);
        }

        let change = context.change()?;
        let segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
        let subject = EntityRef::new(&change.subject_type, &change.subject_id);

        let direct = match segments.as_slice() {
            [field] => change.current().and_then(|snapshot| snapshot.get(*field)),
            _ => None,
        };
        if let Some(value) = direct {
            return Some(value.clone());
        }

        let mut current = subject;
        let last = segments.len() - 1;
        for (index, segment) in segments.iter().enumerate() {
            match self.lookup(context, &current, segment).await {
                LookupResult::Value(value) if index == last => return Some(value),
                LookupResult::Related(target) if index == last => {
                    return Some(Value::String(target.entity_id));
                }
                LookupResult::Related(target) => current = target,
                // A scalar cannot be traversed further.
                LookupResult::Value(_) | LookupResult::NotFound => return None,
            }
        }
        None
    }

    async fn lookup(
        &self,
        context: &TriggerContext,
        entity: &EntityRef,
        field: &str,
    ) -> LookupResult {
        match self.lookup.lookup(&context.tenant_id, entity, field).await {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(
                    tenant = %context.tenant_id,
                    entity_type = %entity.entity_type,
                    entity_id = %entity.entity_id,
                    field,
                    error = %error,
                    "entity lookup failed, treating field as missing"
                );
                LookupResult::NotFound
            }
        }
    }
}

fn system_field(name: &str, at: Timestamp) -> Option<Value> {
    let value = match name {
        "now" => Value::String(at.to_rfc3339()),
        "timestamp" => Value::from(at.timestamp()),
        "minute" => Value::from(i64::from(at.minute())),
        "hour" => Value::from(i64::from(at.hour())),
        "day_of_month" => Value::from(i64::from(at.day())),
        "month" => Value::from(i64::from(at.month())),
        "day_of_week" => Value::from(i64::from(at.weekday().num_days_from_sunday())),
        _ => return None,
    };
    Some(value)
}
