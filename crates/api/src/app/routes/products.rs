use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};

use atelier_core::ExpectedVersion;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product))
        .route("/:id/sizes", get(get_sizes).put(replace_sizes).post(add_sizes))
        .route("/:id/sizes/:size", delete(remove_size))
        .route("/:id/standard", put(assign_standard).delete(clear_standard))
        .route("/:id/stock", get(get_stock).put(set_stock))
        .route("/:id/stock/mutations", post(mutate_stock))
}

/// Unwraps a parse step or returns its error response from the handler.
macro_rules! try_or_respond {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(resp) => return resp,
        }
    };
}

fn body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    body.map(|Json(b)| b).map_err(errors::json_rejection)
}

fn expected(version: Option<u64>) -> ExpectedVersion {
    version.map_or(ExpectedVersion::Any, ExpectedVersion::Exact)
}

fn respond<T: serde::Serialize>(
    result: Result<T, atelier_infra::DispatchError>,
) -> axum::response::Response {
    match result {
        Ok(view) => Json(view).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// Register a product in the dev directory. Product CRUD itself lives elsewhere.
pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    req: Result<Json<dto::CreateProductRequest>, JsonRejection>,
) -> axum::response::Response {
    let req = try_or_respond!(body(req));
    let record = services.directory.register(tenant.tenant_id(), req.category);

    tracing::info!(product_id = %record.product_id, category = %record.category, "product registered");

    (
        StatusCode::CREATED,
        Json(dto::ProductCreatedResponse {
            id: record.product_id,
            category: record.category,
        }),
    )
        .into_response()
}

pub async fn get_sizes(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id = try_or_respond!(dto::parse_product_id(&id));
    respond(services.sizing.active_sizes(tenant.tenant_id(), product_id))
}

pub async fn replace_sizes(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    req: Result<Json<dto::ReplaceSizesRequest>, JsonRejection>,
) -> axum::response::Response {
    let product_id = try_or_respond!(dto::parse_product_id(&id));
    let req = try_or_respond!(body(req));
    let sizes = try_or_respond!(dto::parse_labels(&req.sizes));
    let stock = try_or_respond!(dto::parse_initial_stock(&req.stock));

    respond(services.sizing.replace_sizes(
        tenant.tenant_id(),
        product_id,
        sizes,
        stock,
        expected(req.expected_version),
    ))
}

pub async fn add_sizes(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    req: Result<Json<dto::AddSizesRequest>, JsonRejection>,
) -> axum::response::Response {
    let product_id = try_or_respond!(dto::parse_product_id(&id));
    let req = try_or_respond!(body(req));
    let sizes = try_or_respond!(dto::parse_labels(&req.sizes));

    respond(services.sizing.add_sizes(tenant.tenant_id(), product_id, sizes))
}

pub async fn remove_size(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path((id, size)): Path<(String, String)>,
) -> axum::response::Response {
    let product_id = try_or_respond!(dto::parse_product_id(&id));
    let size = try_or_respond!(dto::parse_label(&size));

    respond(services.sizing.remove_size(tenant.tenant_id(), product_id, size))
}

pub async fn assign_standard(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    req: Result<Json<dto::AssignStandardRequest>, JsonRejection>,
) -> axum::response::Response {
    let product_id = try_or_respond!(dto::parse_product_id(&id));
    let req = try_or_respond!(body(req));

    respond(services.sizing.assign_standard(tenant.tenant_id(), product_id, req.standard))
}

pub async fn clear_standard(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id = try_or_respond!(dto::parse_product_id(&id));
    respond(services.sizing.clear_standard(tenant.tenant_id(), product_id))
}

pub async fn get_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id = try_or_respond!(dto::parse_product_id(&id));
    respond(services.sizing.stock(tenant.tenant_id(), product_id))
}

pub async fn set_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    req: Result<Json<dto::SetStockRequest>, JsonRejection>,
) -> axum::response::Response {
    let product_id = try_or_respond!(dto::parse_product_id(&id));
    let req = try_or_respond!(body(req));
    let entries = try_or_respond!(dto::parse_stock_entries(&req.entries));

    respond(services.sizing.set_stock(
        tenant.tenant_id(),
        product_id,
        entries,
        expected(req.expected_version),
    ))
}

pub async fn mutate_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    req: Result<Json<dto::MutateStockRequest>, JsonRejection>,
) -> axum::response::Response {
    let product_id = try_or_respond!(dto::parse_product_id(&id));
    let req = try_or_respond!(body(req));
    let size = try_or_respond!(req.size.as_deref().map(dto::parse_label).transpose());

    respond(services.sizing.mutate_stock(
        tenant.tenant_id(),
        product_id,
        size,
        req.mode,
        req.amount,
    ))
}
