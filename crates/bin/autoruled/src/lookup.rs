//! Entity lookup used when the daemon runs without a record store.

use autorule_app::ports::{EntityLookup, EntityRef, LookupResult};
use autorule_domain::error::AutoruleError;
use autorule_domain::id::TenantId;

/// Resolves nothing: conditions only see what the change snapshots carry.
///
/// Multi-hop paths and fields missing from a snapshot read as not found,
/// which only `is_null` accepts.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedLookup;

impl EntityLookup for DetachedLookup {
    async fn lookup(
        &self,
        _tenant_id: &TenantId,
        entity: &EntityRef,
        field: &str,
    ) -> Result<LookupResult, AutoruleError> {
        tracing::trace!(
            entity_type = %entity.entity_type,
            entity_id = %entity.entity_id,
            field,
            "no record store attached"
        );
        Ok(LookupResult::NotFound)
    }
}
