use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::warn;

use atelier_core::{AggregateId, TenantId};
use atelier_events::EventEnvelope;
use atelier_sizing::{
    AGGREGATE_TYPE, ProductId, Quantity, SizeLabel, SizeStandard, SizingEvent, StockEntry, StockKey,
};

use crate::event_store::{EventStore, StoredEvent};
use crate::read_model::TenantStore;

/// Queryable per-product stock row for tenant-wide reports.
///
/// Products appear once their first sizing event is published, so a bag
/// whose single bucket was never touched is absent rather than listed at 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductStockReadModel {
    pub product_id: ProductId,
    pub standard: Option<SizeStandard>,
    pub sizes: Vec<SizeLabel>,
    stock: BTreeMap<StockKey, Quantity>,
    /// Sequence number of the last applied event.
    pub version: u64,
}

impl ProductStockReadModel {
    fn new(product_id: ProductId) -> Self {
        Self {
            product_id,
            standard: None,
            sizes: Vec::new(),
            stock: BTreeMap::new(),
            version: 0,
        }
    }

    /// Entries with the no-size bucket first, then sizes in selection order.
    pub fn entries(&self) -> Vec<StockEntry> {
        let sentinel = self.stock.get(&StockKey::NoSize).map(|q| StockEntry {
            key: StockKey::NoSize,
            quantity: *q,
        });
        let sized = self.sizes.iter().filter_map(|label| {
            let key = StockKey::Size(label.clone());
            self.stock.get(&key).map(|q| StockEntry { key, quantity: *q })
        });
        sentinel.into_iter().chain(sized).collect()
    }

    pub fn total(&self) -> Quantity {
        self.stock.values().fold(0, |acc, q| acc.saturating_add(*q))
    }

    fn apply(&mut self, event: SizingEvent) {
        match event {
            SizingEvent::StandardAssigned(e) => {
                self.standard = Some(e.standard);
                self.sizes = e.retained_sizes;
                self.align();
            }
            SizingEvent::StandardCleared(_) => {
                self.standard = None;
                self.sizes.clear();
                self.align();
            }
            SizingEvent::SizesReplaced(e) => {
                self.sizes = e.sizes;
                self.align();
            }
            SizingEvent::StockReplaced(e) => {
                self.stock = e.entries.into_iter().map(|en| (en.key, en.quantity)).collect();
            }
            SizingEvent::StockEntrySet(e) => {
                self.stock.insert(e.key, e.quantity);
            }
        }
    }

    /// Mirror the aggregate's reconciliation: sized keys follow the selection.
    fn align(&mut self) {
        let sizes = &self.sizes;
        self.stock.retain(|key, _| match key {
            StockKey::NoSize => true,
            StockKey::Size(label) => sizes.contains(label),
        });
        for label in sizes {
            self.stock.entry(StockKey::Size(label.clone())).or_insert(0);
        }
    }
}

/// Tenant+aggregate cursor to support at-least-once delivery (idempotent projection).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize sizing event: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("projection lock poisoned")]
    Poisoned,

    #[error("failed to reload events for rebuild: {0}")]
    Reload(String),
}

/// Variant stock projection.
///
/// Consumes published envelopes (JSON payloads) and maintains a tenant-isolated
/// read model. Read models are disposable and rebuildable from the event store.
#[derive(Debug)]
pub struct VariantStockProjection<S>
where
    S: TenantStore<ProductId, ProductStockReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl<S> VariantStockProjection<S>
where
    S: TenantStore<ProductId, ProductStockReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, tenant_id: TenantId, product_id: &ProductId) -> Option<ProductStockReadModel> {
        self.store.get(tenant_id, product_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<ProductStockReadModel> {
        self.store.list(tenant_id)
    }

    /// Apply a published envelope into the projection.
    ///
    /// Replays at or below the stream cursor are ignored; gaps are rejected.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let mut cursors = self.cursors.write().map_err(|_| ProjectionError::Poisoned)?;
        let key = CursorKey {
            tenant_id,
            aggregate_id,
        };
        let last = cursors.get(&key).copied().unwrap_or(0);

        if seq <= last {
            // Duplicate or replay; safe to ignore.
            return Ok(());
        }
        if seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let event: SizingEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        if event.tenant_id() != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        let product_id = event.product_id();
        if product_id.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event product_id does not match envelope aggregate_id".to_string(),
            ));
        }

        let mut row = self
            .store
            .get(tenant_id, &product_id)
            .unwrap_or_else(|| ProductStockReadModel::new(product_id));
        row.apply(event);
        row.version = seq;
        self.store.upsert(tenant_id, product_id, row);

        cursors.insert(key, seq);
        Ok(())
    }

    /// Apply an envelope, repairing the tenant from `store` when it reveals a gap.
    ///
    /// A gap means an earlier envelope was never delivered. Every later one
    /// for that stream would be refused, so the tenant is replayed from the
    /// store instead, which also covers the envelope at hand.
    pub fn apply_or_rebuild<E>(
        &self,
        envelope: &EventEnvelope<JsonValue>,
        store: &E,
    ) -> Result<(), ProjectionError>
    where
        E: EventStore,
    {
        match self.apply_envelope(envelope) {
            Err(ProjectionError::NonMonotonicSequence { last, found }) => {
                let tenant_id = envelope.tenant_id();
                warn!(
                    %tenant_id,
                    aggregate_id = %envelope.aggregate_id(),
                    last,
                    found,
                    "sequence gap in stock projection; rebuilding tenant"
                );
                let history = store
                    .load_tenant(tenant_id)
                    .map_err(|e| ProjectionError::Reload(e.to_string()))?;
                self.rebuild_tenant(
                    tenant_id,
                    history
                        .iter()
                        .filter(|e| e.aggregate_type == AGGREGATE_TYPE)
                        .map(StoredEvent::to_envelope),
                )
            }
            other => other,
        }
    }

    /// Rebuild one tenant's rows from scratch by replaying envelopes.
    pub fn rebuild_tenant(
        &self,
        tenant_id: TenantId,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.store.clear_tenant(tenant_id);
        self.cursors
            .write()
            .map_err(|_| ProjectionError::Poisoned)?
            .retain(|key, _| key.tenant_id != tenant_id);

        let mut envs: Vec<_> = envelopes
            .into_iter()
            .filter(|e| e.tenant_id() == tenant_id)
            .collect();

        // Deterministic replay order: aggregate, sequence.
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use uuid::Uuid;

    use atelier_core::ExpectedVersion;
    use atelier_sizing::{SizesReplaced, StandardAssigned, StockEntrySet};

    use crate::event_store::{InMemoryEventStore, UncommittedEvent};
    use crate::read_model::InMemoryTenantStore;

    type Projection =
        VariantStockProjection<Arc<InMemoryTenantStore<ProductId, ProductStockReadModel>>>;

    fn label(raw: &str) -> SizeLabel {
        SizeLabel::new(raw).unwrap()
    }

    fn envelope(
        tenant_id: TenantId,
        product_id: ProductId,
        seq: u64,
        event: &SizingEvent,
    ) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            product_id.0,
            "sizing.product",
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    fn history(tenant_id: TenantId, product_id: ProductId) -> Vec<SizingEvent> {
        let now = Utc::now();
        vec![
            SizingEvent::StandardAssigned(StandardAssigned {
                tenant_id,
                product_id,
                standard: SizeStandard::Us,
                retained_sizes: vec![],
                occurred_at: now,
            }),
            SizingEvent::SizesReplaced(SizesReplaced {
                tenant_id,
                product_id,
                sizes: vec![label("S"), label("M")],
                occurred_at: now,
            }),
            SizingEvent::StockEntrySet(StockEntrySet {
                tenant_id,
                product_id,
                key: StockKey::Size(label("M")),
                quantity: 7,
                floored: false,
                occurred_at: now,
            }),
            SizingEvent::SizesReplaced(SizesReplaced {
                tenant_id,
                product_id,
                sizes: vec![label("M")],
                occurred_at: now,
            }),
        ]
    }

    fn setup() -> (Projection, TenantId, ProductId) {
        (
            VariantStockProjection::new(Arc::new(InMemoryTenantStore::new())),
            TenantId::new(),
            ProductId::new(AggregateId::new()),
        )
    }

    #[test]
    fn rows_follow_selection_and_stock_events() {
        let (projection, t, p) = setup();
        for (idx, ev) in history(t, p).iter().enumerate() {
            projection.apply_envelope(&envelope(t, p, idx as u64 + 1, ev)).unwrap();
        }

        let row = projection.get(t, &p).unwrap();
        assert_eq!(row.standard, Some(SizeStandard::Us));
        assert_eq!(row.sizes, vec![label("M")]);
        assert_eq!(
            row.entries(),
            vec![StockEntry {
                key: StockKey::Size(label("M")),
                quantity: 7
            }]
        );
        assert_eq!(row.total(), 7);
        assert_eq!(row.version, 4);
    }

    #[test]
    fn duplicate_delivery_is_ignored() {
        let (projection, t, p) = setup();
        let events = history(t, p);
        projection.apply_envelope(&envelope(t, p, 1, &events[0])).unwrap();
        projection.apply_envelope(&envelope(t, p, 2, &events[1])).unwrap();
        projection.apply_envelope(&envelope(t, p, 2, &events[1])).unwrap();

        assert_eq!(projection.get(t, &p).unwrap().version, 2);
    }

    #[test]
    fn sequence_gap_is_rejected() {
        let (projection, t, p) = setup();
        let events = history(t, p);

        let err = projection.apply_envelope(&envelope(t, p, 2, &events[1])).unwrap_err();

        assert!(matches!(err, ProjectionError::NonMonotonicSequence { last: 0, found: 2 }));
    }

    #[test]
    fn envelope_for_other_tenant_is_rejected() {
        let (projection, t, p) = setup();
        let events = history(t, p);

        let err = projection
            .apply_envelope(&envelope(TenantId::new(), p, 1, &events[0]))
            .unwrap_err();

        assert!(matches!(err, ProjectionError::TenantIsolation(_)));
    }

    #[test]
    fn gap_triggers_rebuild_from_the_store() {
        let (projection, t, p) = setup();
        let store = InMemoryEventStore::new();
        let uncommitted = history(t, p)
            .iter()
            .map(|ev| UncommittedEvent::from_typed(t, p.0, AGGREGATE_TYPE, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        let stored = store.append(uncommitted, ExpectedVersion::Exact(0)).unwrap();

        // Envelope 2 is lost in transit.
        projection.apply_or_rebuild(&stored[0].to_envelope(), &store).unwrap();
        projection.apply_or_rebuild(&stored[2].to_envelope(), &store).unwrap();

        let row = projection.get(t, &p).unwrap();
        assert_eq!(row.version, 4);
        assert_eq!(row.sizes, vec![label("M")]);
        assert_eq!(row.total(), 7);

        // Late delivery of the remaining envelopes is a harmless replay.
        projection.apply_or_rebuild(&stored[3].to_envelope(), &store).unwrap();
        assert_eq!(projection.get(t, &p).unwrap(), row);
    }

    #[test]
    fn rebuild_matches_live_application() {
        let (projection, t, p) = setup();
        let envs: Vec<_> = history(t, p)
            .iter()
            .enumerate()
            .map(|(idx, ev)| envelope(t, p, idx as u64 + 1, ev))
            .collect();
        for env in &envs {
            projection.apply_envelope(env).unwrap();
        }
        let live = projection.get(t, &p).unwrap();

        projection.rebuild_tenant(t, envs.into_iter().rev()).unwrap();

        assert_eq!(projection.get(t, &p).unwrap(), live);
    }
}
