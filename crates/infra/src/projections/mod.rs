//! Projection implementations (read model builders).
//!
//! Projections consume published sizing events and build query-friendly read
//! models. They are rebuildable from the event store, tenant-isolated, and
//! idempotent under at-least-once delivery.

pub mod variant_stock;

pub use variant_stock::{ProductStockReadModel, ProjectionError, VariantStockProjection};
