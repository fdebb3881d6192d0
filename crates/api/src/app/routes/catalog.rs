use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use atelier_sizing::Category;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// `GET /catalog/:category?standard=`: labels valid for the pair, in catalog order.
pub async fn resolve_catalog(
    Extension(services): Extension<Arc<AppServices>>,
    Path(category): Path<String>,
    query: Result<Query<dto::CatalogQuery>, QueryRejection>,
) -> axum::response::Response {
    let category = match parse_category(&category) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::query_rejection(rejection),
    };

    let sizes = services.sizing.resolve_catalog(category, query.standard);
    Json(dto::CatalogResponse {
        category,
        standard: query.standard,
        sizes,
    })
    .into_response()
}

fn parse_category(raw: &str) -> Result<Category, axum::response::Response> {
    raw.parse::<Category>()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_request", e.to_string()))
}
