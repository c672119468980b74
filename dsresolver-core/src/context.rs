//! Execution context supplied by the caller.

use serde::{Deserialize, Serialize};

use crate::identity::TenantId;

/// Per-request context. The cache reads the tenant from here and never
/// infers tenant identity itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestContext {
    tenant_id: TenantId,
}

impl RequestContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    /// Tenant the current caller acts for.
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl From<TenantId> for RequestContext {
    fn from(tenant_id: TenantId) -> Self {
        Self::new(tenant_id)
    }
}
