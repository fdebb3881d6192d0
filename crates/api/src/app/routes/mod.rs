use axum::{routing::get, Router};

pub mod catalog;
pub mod products;
pub mod stock;
pub mod system;

/// Router for all tenant-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/catalog/:category", get(catalog::resolve_catalog))
        .route("/stock", get(stock::stock_report))
        .nest("/products", products::router())
}
