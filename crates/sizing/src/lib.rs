//! Product sizing domain module (event-sourced).
//!
//! Decides which size labels are valid for a product, which of them are on
//! offer, and how their stock quantities change. Pure domain logic: no IO,
//! no HTTP, no storage.
//!
//! - [`catalog`]: category/standard → ordered size labels.
//! - [`selection`]: the active subset of a product's catalog.
//! - [`ledger`]: per-size stock quantities.
//! - [`mutation`]: the single engine through which stock changes.
//! - [`product`]: the `ProductSizing` aggregate tying them together.

pub mod catalog;
pub mod error;
pub mod ledger;
pub mod mutation;
pub mod product;
pub mod selection;

pub use catalog::{Category, SizeCatalog, SizeLabel, SizeStandard, order_labels};
pub use error::SizingError;
pub use ledger::{Quantity, StockEntry, StockKey, StockLedger};
pub use mutation::{MutationMode, StockChange, StockMutation, StockMutationEngine};
pub use product::{
    AddSizes, AssignStandard, ClearStandard, MutateStock, ProductId, ProductSizing, RemoveSize,
    ReplaceSizes, SizesReplaced, SizingCommand, SizingEvent, StandardAssigned, StandardCleared,
    StockEntrySet, StockReplaced,
};
pub use selection::SizeSelection;

/// Aggregate type tag under which sizing streams are stored.
pub const AGGREGATE_TYPE: &str = "sizing.product";
