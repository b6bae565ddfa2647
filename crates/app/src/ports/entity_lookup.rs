//! Entity lookup port: read access to business records for field paths.

use std::future::Future;
use std::sync::Arc;

use autorule_domain::error::AutoruleError;
use autorule_domain::id::TenantId;
use autorule_domain::value::Value;

/// Pointer to one business record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub entity_type: String,
    pub entity_id: String,
}

impl EntityRef {
    #[must_use]
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }
}

/// What a field or relation name resolves to on a record.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupResult {
    Value(Value),
    /// The name is a relation pointing at another record.
    Related(EntityRef),
    /// Record missing, field unknown, or relation null.
    NotFound,
}

/// Resolves fields and relations on records owned by the storage
/// collaborator, scoped to a tenant.
pub trait EntityLookup {
    fn lookup(
        &self,
        tenant_id: &TenantId,
        entity: &EntityRef,
        field: &str,
    ) -> impl Future<Output = Result<LookupResult, AutoruleError>> + Send;
}

impl<T: EntityLookup + Send + Sync> EntityLookup for Arc<T> {
    fn lookup(
        &self,
        tenant_id: &TenantId,
        entity: &EntityRef,
        field: &str,
    ) -> impl Future<Output = Result<LookupResult, AutoruleError>> + Send {
        (**self).lookup(tenant_id, entity, field)
    }
}
