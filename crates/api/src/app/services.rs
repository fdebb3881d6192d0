use std::sync::Arc;

use serde_json::Value as JsonValue;

use atelier_core::TenantId;
use atelier_events::{EventEnvelope, InMemoryEventBus};
use atelier_infra::{
    command_dispatcher::CommandDispatcher,
    config::SizingConfig,
    event_store::InMemoryEventStore,
    products::InMemoryProductDirectory,
    projections::{ProductStockReadModel, VariantStockProjection},
    read_model::InMemoryTenantStore,
    service::SizingService,
    workers::{ProjectionWorker, WorkerHandle},
};
use atelier_sizing::{AGGREGATE_TYPE, ProductId};

pub type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type Sizing = SizingService<Arc<InMemoryEventStore>, Bus, Arc<InMemoryProductDirectory>>;
pub type StockProjection =
    VariantStockProjection<Arc<InMemoryTenantStore<ProductId, ProductStockReadModel>>>;

/// Everything a handler can reach, shared behind one `Arc`.
pub struct AppServices {
    pub sizing: Sizing,
    pub directory: Arc<InMemoryProductDirectory>,
    pub stock: Arc<StockProjection>,
    // Held so the worker lives as long as the app; shut down on drop.
    worker: Option<WorkerHandle>,
}

impl AppServices {
    pub fn stock_report(&self, tenant_id: TenantId) -> Vec<ProductStockReadModel> {
        self.stock.list(tenant_id)
    }
}

impl Drop for AppServices {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
    }
}

/// Wire the in-memory store, bus, projection worker and sizing service.
pub fn build_services(config: &SizingConfig) -> anyhow::Result<AppServices> {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let directory = Arc::new(InMemoryProductDirectory::new());
    let stock: Arc<StockProjection> =
        Arc::new(VariantStockProjection::new(Arc::new(InMemoryTenantStore::new())));

    // Subscribe before the first command can publish.
    let sink = stock.clone();
    let history = store.clone();
    let worker = ProjectionWorker::spawn(
        "variant-stock-projection",
        &bus,
        move |env: EventEnvelope<JsonValue>| {
            if !env.is_for(AGGREGATE_TYPE) {
                return Ok(());
            }
            sink.apply_or_rebuild(&env, &history)
        },
    )?;

    let sizing = SizingService::new(
        CommandDispatcher::new(store, bus),
        directory.clone(),
        Arc::new(config.catalog.clone()),
    );

    tracing::info!(projection = "variant-stock", "services ready");

    Ok(AppServices {
        sizing,
        directory,
        stock,
        worker: Some(worker),
    })
}
