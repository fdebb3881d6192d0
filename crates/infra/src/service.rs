//! Sizing application service.
//!
//! The operation surface consumed by the HTTP layer (and any other front end):
//! catalog resolution, standard assignment, size selection and stock
//! mutation. Each write goes through the [`CommandDispatcher`]; each read
//! rehydrates the product from its stream.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{info, instrument};

use atelier_core::{AggregateRoot, ExpectedVersion, TenantId};
use atelier_events::{EventBus, EventEnvelope};
use atelier_sizing::{
    AGGREGATE_TYPE, AddSizes, AssignStandard, Category, ClearStandard, MutateStock, MutationMode,
    ProductId, ProductSizing, Quantity, RemoveSize, ReplaceSizes, SizeCatalog, SizeLabel,
    SizeStandard, SizingCommand, SizingEvent, StockEntry, StockKey, StockMutation,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError, Dispatched};
use crate::event_store::EventStore;
use crate::products::ProductDirectory;

/// Sizing state of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizesView {
    pub product_id: ProductId,
    pub category: Category,
    pub standard: Option<SizeStandard>,
    /// Labels the product may select right now.
    pub catalog: Vec<SizeLabel>,
    /// Active labels, in catalog order.
    pub sizes: Vec<SizeLabel>,
    pub version: u64,
}

/// Stock ledger snapshot of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockView {
    pub product_id: ProductId,
    pub category: Category,
    pub entries: Vec<StockEntry>,
    pub total: Quantity,
    pub version: u64,
}

/// Result of a single-entry stock mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    pub product_id: ProductId,
    #[serde(rename = "size")]
    pub key: StockKey,
    pub quantity: Quantity,
    /// A decrement asked for more than was in stock and stopped at zero.
    pub floored: bool,
    pub version: u64,
}

impl SizesView {
    fn of(product: &ProductSizing) -> Self {
        Self {
            product_id: product.id_typed(),
            category: product.category(),
            standard: product.standard(),
            catalog: product.catalog_labels().to_vec(),
            sizes: product.active_sizes().to_vec(),
            version: product.version(),
        }
    }
}

impl StockView {
    fn of(product: &ProductSizing) -> Self {
        Self {
            product_id: product.id_typed(),
            category: product.category(),
            entries: product.stock(),
            total: product.ledger().total(),
            version: product.version(),
        }
    }
}

pub struct SizingService<S, B, D> {
    dispatcher: CommandDispatcher<S, B>,
    directory: D,
    catalog: Arc<SizeCatalog>,
}

impl<S, B, D> SizingService<S, B, D>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    D: ProductDirectory,
{
    pub fn new(dispatcher: CommandDispatcher<S, B>, directory: D, catalog: Arc<SizeCatalog>) -> Self {
        Self {
            dispatcher,
            directory,
            catalog,
        }
    }

    /// Labels valid for `category` under `standard` (empty when no sizing applies).
    pub fn resolve_catalog(&self, category: Category, standard: Option<SizeStandard>) -> Vec<SizeLabel> {
        self.catalog.resolve(category, standard).to_vec()
    }

    #[instrument(skip(self), fields(%tenant_id, %product_id))]
    pub fn active_sizes(&self, tenant_id: TenantId, product_id: ProductId) -> Result<SizesView, DispatchError> {
        Ok(SizesView::of(&self.load(tenant_id, product_id)?))
    }

    #[instrument(skip(self), fields(%tenant_id, %product_id))]
    pub fn stock(&self, tenant_id: TenantId, product_id: ProductId) -> Result<StockView, DispatchError> {
        Ok(StockView::of(&self.load(tenant_id, product_id)?))
    }

    #[instrument(skip(self), fields(%tenant_id, %product_id, %standard))]
    pub fn assign_standard(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        standard: SizeStandard,
    ) -> Result<SizesView, DispatchError> {
        let done = self.execute(
            tenant_id,
            product_id,
            ExpectedVersion::Any,
            SizingCommand::AssignStandard(AssignStandard {
                tenant_id,
                product_id,
                standard,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(SizesView::of(&done.aggregate))
    }

    #[instrument(skip(self), fields(%tenant_id, %product_id))]
    pub fn clear_standard(&self, tenant_id: TenantId, product_id: ProductId) -> Result<SizesView, DispatchError> {
        let done = self.execute(
            tenant_id,
            product_id,
            ExpectedVersion::Any,
            SizingCommand::ClearStandard(ClearStandard {
                tenant_id,
                product_id,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(SizesView::of(&done.aggregate))
    }

    /// Replace the selection, optionally setting quantities in the same commit.
    #[instrument(skip(self, sizes, stock), fields(%tenant_id, %product_id, sizes = sizes.len()))]
    pub fn replace_sizes(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        sizes: Vec<SizeLabel>,
        stock: BTreeMap<SizeLabel, i64>,
        expected: ExpectedVersion,
    ) -> Result<SizesView, DispatchError> {
        let done = self.execute(
            tenant_id,
            product_id,
            expected,
            SizingCommand::ReplaceSizes(ReplaceSizes {
                tenant_id,
                product_id,
                sizes,
                stock,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(SizesView::of(&done.aggregate))
    }

    #[instrument(skip(self, sizes), fields(%tenant_id, %product_id, sizes = sizes.len()))]
    pub fn add_sizes(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        sizes: Vec<SizeLabel>,
    ) -> Result<SizesView, DispatchError> {
        let done = self.execute(
            tenant_id,
            product_id,
            ExpectedVersion::Any,
            SizingCommand::AddSizes(AddSizes {
                tenant_id,
                product_id,
                sizes,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(SizesView::of(&done.aggregate))
    }

    #[instrument(skip(self), fields(%tenant_id, %product_id, %size))]
    pub fn remove_size(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        size: SizeLabel,
    ) -> Result<SizesView, DispatchError> {
        let done = self.execute(
            tenant_id,
            product_id,
            ExpectedVersion::Any,
            SizingCommand::RemoveSize(RemoveSize {
                tenant_id,
                product_id,
                size,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(SizesView::of(&done.aggregate))
    }

    /// Replace the whole ledger. Active keys missing from `entries` go to 0.
    #[instrument(skip(self, entries), fields(%tenant_id, %product_id, entries = entries.len()))]
    pub fn set_stock(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        entries: BTreeMap<StockKey, i64>,
        expected: ExpectedVersion,
    ) -> Result<StockView, DispatchError> {
        let done = self.execute(
            tenant_id,
            product_id,
            expected,
            SizingCommand::MutateStock(MutateStock {
                tenant_id,
                product_id,
                mutation: StockMutation::Bulk(entries),
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(StockView::of(&done.aggregate))
    }

    /// Set, increment or decrement one entry. `size = None` targets the
    /// single bucket of a variant-less product.
    #[instrument(skip(self), fields(%tenant_id, %product_id, ?size, ?mode, amount))]
    pub fn mutate_stock(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        size: Option<SizeLabel>,
        mode: MutationMode,
        amount: i64,
    ) -> Result<MutationOutcome, DispatchError> {
        let key = StockKey::from(size.clone());
        let done = self.execute(
            tenant_id,
            product_id,
            ExpectedVersion::Any,
            SizingCommand::MutateStock(MutateStock {
                tenant_id,
                product_id,
                mutation: StockMutation::one(size, mode, amount),
                occurred_at: Utc::now(),
            }),
        )?;

        let floored = done.events.iter().any(|ev| matches!(ev, SizingEvent::StockEntrySet(e) if e.floored));
        if floored {
            info!(%key, amount, "decrement floored at zero");
        }

        Ok(MutationOutcome {
            product_id,
            quantity: done.aggregate.quantity(&key).unwrap_or(0),
            key,
            floored,
            version: done.version(),
        })
    }

    fn category(&self, tenant_id: TenantId, product_id: ProductId) -> Result<Category, DispatchError> {
        self.directory
            .category(tenant_id, product_id)
            .ok_or(DispatchError::NotFound)
    }

    fn load(&self, tenant_id: TenantId, product_id: ProductId) -> Result<ProductSizing, DispatchError> {
        let category = self.category(tenant_id, product_id)?;
        let catalog = self.catalog.clone();
        self.dispatcher.load(tenant_id, product_id.0, move |_, _| {
            ProductSizing::empty(product_id, category, catalog)
        })
    }

    fn execute(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        expected: ExpectedVersion,
        command: SizingCommand,
    ) -> Result<Dispatched<ProductSizing>, DispatchError> {
        let category = self.category(tenant_id, product_id)?;
        let catalog = self.catalog.clone();
        let done = self.dispatcher.dispatch(
            tenant_id,
            product_id.0,
            AGGREGATE_TYPE,
            expected,
            command,
            move |_, _| ProductSizing::empty(product_id, category, catalog),
        )?;

        if done.is_noop() {
            info!(version = done.version(), "no change");
        } else {
            info!(
                events = done.committed.len(),
                version = done.version(),
                "sizing change committed"
            );
        }
        Ok(done)
    }
}
