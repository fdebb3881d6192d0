use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use atelier_core::TenantId;

use crate::app::errors;
use crate::context::TenantContext;

/// Header carrying the caller's tenant id (UUID).
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Resolve the tenant from `x-tenant-id` and attach a [`TenantContext`].
///
/// Authentication happens upstream; this layer only scopes the request.
pub async fn tenant_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let tenant_id = match extract_tenant(req.headers()) {
        Ok(t) => t,
        Err(message) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "missing_tenant", message);
        }
    };

    req.extensions_mut().insert(TenantContext::new(tenant_id));

    next.run(req).await
}

fn extract_tenant(headers: &HeaderMap) -> Result<TenantId, &'static str> {
    let header = headers
        .get(TENANT_HEADER)
        .ok_or("x-tenant-id header is required")?;

    let raw = header.to_str().map_err(|_| "x-tenant-id must be ASCII")?;

    raw.parse().map_err(|_| "x-tenant-id must be a UUID")
}
