use std::sync::Arc;

use axum::{extract::Extension, Json};

use crate::app::dto::StockReportRow;
use crate::app::services::AppServices;
use crate::context::TenantContext;

/// Tenant-wide stock report, served from the projection (eventually consistent).
pub async fn stock_report(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> Json<Vec<StockReportRow>> {
    let mut rows: Vec<StockReportRow> = services
        .stock_report(tenant.tenant_id())
        .into_iter()
        .map(StockReportRow::from)
        .collect();
    rows.sort_by_key(|row| row.product_id.0.to_string());
    Json(rows)
}
