use std::collections::BTreeMap;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use atelier_core::AggregateId;
use atelier_infra::projections::ProductStockReadModel;
use atelier_sizing::{
    Category, MutationMode, ProductId, Quantity, SizeLabel, SizeStandard, StockEntry, StockKey,
};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub category: Category,
}

#[derive(Debug, Deserialize)]
pub struct StockEntryRequest {
    /// Omitted or `null` for the single bucket of a variant-less product.
    #[serde(default)]
    pub size: Option<String>,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceSizesRequest {
    pub sizes: Vec<String>,
    /// Initial quantities for labels of the new selection.
    #[serde(default)]
    pub stock: Vec<StockEntryRequest>,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct AddSizesRequest {
    pub sizes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignStandardRequest {
    pub standard: SizeStandard,
}

#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub entries: Vec<StockEntryRequest>,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct MutateStockRequest {
    #[serde(default)]
    pub size: Option<String>,
    pub mode: MutationMode,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    pub standard: Option<SizeStandard>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct ProductCreatedResponse {
    pub id: ProductId,
    pub category: Category,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub category: Category,
    pub standard: Option<SizeStandard>,
    pub sizes: Vec<SizeLabel>,
}

#[derive(Debug, Serialize)]
pub struct StockReportRow {
    pub product_id: ProductId,
    pub standard: Option<SizeStandard>,
    pub sizes: Vec<SizeLabel>,
    pub entries: Vec<StockEntry>,
    pub total: Quantity,
    pub version: u64,
}

impl From<ProductStockReadModel> for StockReportRow {
    fn from(row: ProductStockReadModel) -> Self {
        Self {
            entries: row.entries(),
            total: row.total(),
            product_id: row.product_id,
            standard: row.standard,
            sizes: row.sizes,
            version: row.version,
        }
    }
}

// -------------------------
// Mapping helpers
// -------------------------

pub fn parse_product_id(raw: &str) -> Result<ProductId, axum::response::Response> {
    raw.parse::<AggregateId>()
        .map(ProductId::new)
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"))
}

/// Blank labels can never be in a catalog, so they fail like unknown ones.
pub fn parse_label(raw: &str) -> Result<SizeLabel, axum::response::Response> {
    SizeLabel::new(raw).map_err(|e| {
        errors::json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_label", e.to_string())
    })
}

pub fn parse_labels(raw: &[String]) -> Result<Vec<SizeLabel>, axum::response::Response> {
    raw.iter().map(|l| parse_label(l)).collect()
}

/// Bulk entries keyed by stock key. A key listed twice is ambiguous and rejected.
pub fn parse_stock_entries(
    entries: &[StockEntryRequest],
) -> Result<BTreeMap<StockKey, i64>, axum::response::Response> {
    let mut out = BTreeMap::new();
    for entry in entries {
        let key = StockKey::from(entry.size.as_deref().map(parse_label).transpose()?);
        if out.insert(key.clone(), entry.quantity).is_some() {
            return Err(errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                format!("stock entry for '{key}' listed twice"),
            ));
        }
    }
    Ok(out)
}

/// Initial quantities for a size replace; every entry must name a size.
pub fn parse_initial_stock(
    entries: &[StockEntryRequest],
) -> Result<BTreeMap<SizeLabel, i64>, axum::response::Response> {
    let mut out = BTreeMap::new();
    for (key, quantity) in parse_stock_entries(entries)? {
        match key {
            StockKey::Size(label) => {
                out.insert(label, quantity);
            }
            StockKey::NoSize => {
                return Err(errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_request",
                    "initial stock entries must name a size",
                ));
            }
        }
    }
    Ok(out)
}
