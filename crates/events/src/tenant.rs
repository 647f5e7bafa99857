use pinkparrot_core::TenantId;

use crate::EventEnvelope;

/// Marks messages that belong to exactly one tenant.
///
/// Infrastructure uses this to reject anything that crosses a tenant boundary,
/// e.g. a store returning another tenant's event for a stream load.
pub trait TenantScoped {
    fn tenant_id(&self) -> TenantId;

    fn belongs_to(&self, tenant_id: TenantId) -> bool {
        self.tenant_id() == tenant_id
    }
}

impl<E> TenantScoped for EventEnvelope<E> {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id()
    }
}
