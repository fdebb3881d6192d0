use atelier_core::TenantId;

/// Tenant context for a request.
///
/// Set by [`crate::middleware::tenant_middleware`] and required by every
/// sizing route.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
