use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atelier_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use atelier_events::Event;

use crate::catalog::{Category, SizeCatalog, SizeLabel, SizeStandard};
use crate::error::SizingError;
use crate::ledger::{Quantity, StockEntry, StockKey, StockLedger};
use crate::mutation::{MutationMode, StockChange, StockMutation, StockMutationEngine};
use crate::selection::SizeSelection;

/// Product identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: the sizing and stock state of one product.
///
/// The category comes from the product directory and never changes here. The
/// catalog is injected so every decision resolves against the same tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSizing {
    id: ProductId,
    tenant_id: Option<TenantId>,
    category: Category,
    catalog: Arc<SizeCatalog>,
    standard: Option<SizeStandard>,
    selection: SizeSelection,
    ledger: StockLedger,
    version: u64,
}

impl ProductSizing {
    /// Create the initial state for rehydration.
    ///
    /// Variant-less products start with their single bucket at zero.
    pub fn empty(id: ProductId, category: Category, catalog: Arc<SizeCatalog>) -> Self {
        let ledger = if category.is_variant_less() {
            StockLedger::variant_less()
        } else {
            StockLedger::empty()
        };
        Self {
            id,
            tenant_id: None,
            category,
            catalog,
            standard: None,
            selection: SizeSelection::empty(),
            ledger,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn standard(&self) -> Option<SizeStandard> {
        self.standard
    }

    /// Labels resolvable for this product right now.
    pub fn catalog_labels(&self) -> &[SizeLabel] {
        self.catalog.resolve(self.category, self.standard)
    }

    /// Active labels in catalog order (empty for variant-less products).
    pub fn active_sizes(&self) -> &[SizeLabel] {
        self.selection.labels()
    }

    pub fn ledger(&self) -> &StockLedger {
        &self.ledger
    }

    /// Ledger entries ordered for presentation.
    pub fn stock(&self) -> Vec<StockEntry> {
        self.ledger.snapshot(self.selection.labels())
    }

    pub fn quantity(&self, key: &StockKey) -> Option<Quantity> {
        self.ledger.get(key)
    }
}

impl AggregateRoot for ProductSizing {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: AssignStandard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignStandard {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub standard: SizeStandard,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ClearStandard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearStandard {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReplaceSizes.
///
/// `stock` optionally sets quantities for labels of the new selection in the
/// same commit; labels it leaves out keep their quantity (new ones start at 0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceSizes {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sizes: Vec<SizeLabel>,
    pub stock: BTreeMap<SizeLabel, i64>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddSizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddSizes {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sizes: Vec<SizeLabel>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveSize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveSize {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub size: SizeLabel,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MutateStock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutateStock {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub mutation: StockMutation,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizingCommand {
    AssignStandard(AssignStandard),
    ClearStandard(ClearStandard),
    ReplaceSizes(ReplaceSizes),
    AddSizes(AddSizes),
    RemoveSize(RemoveSize),
    MutateStock(MutateStock),
}

impl SizingCommand {
    fn target(&self) -> (TenantId, ProductId, DateTime<Utc>) {
        match self {
            SizingCommand::AssignStandard(c) => (c.tenant_id, c.product_id, c.occurred_at),
            SizingCommand::ClearStandard(c) => (c.tenant_id, c.product_id, c.occurred_at),
            SizingCommand::ReplaceSizes(c) => (c.tenant_id, c.product_id, c.occurred_at),
            SizingCommand::AddSizes(c) => (c.tenant_id, c.product_id, c.occurred_at),
            SizingCommand::RemoveSize(c) => (c.tenant_id, c.product_id, c.occurred_at),
            SizingCommand::MutateStock(c) => (c.tenant_id, c.product_id, c.occurred_at),
        }
    }
}

/// Event: StandardAssigned. `retained_sizes` is the selection that survives
/// the switch to the new catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardAssigned {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub standard: SizeStandard,
    pub retained_sizes: Vec<SizeLabel>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StandardCleared. Selection and sized stock go with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardCleared {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SizesReplaced. `sizes` is the complete new selection, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizesReplaced {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sizes: Vec<SizeLabel>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReplaced (bulk set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReplaced {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub entries: Vec<StockEntry>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockEntrySet (one entry, absolute quantity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntrySet {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub key: StockKey,
    pub quantity: Quantity,
    pub floored: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizingEvent {
    StandardAssigned(StandardAssigned),
    StandardCleared(StandardCleared),
    SizesReplaced(SizesReplaced),
    StockReplaced(StockReplaced),
    StockEntrySet(StockEntrySet),
}

impl SizingEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            SizingEvent::StandardAssigned(e) => e.tenant_id,
            SizingEvent::StandardCleared(e) => e.tenant_id,
            SizingEvent::SizesReplaced(e) => e.tenant_id,
            SizingEvent::StockReplaced(e) => e.tenant_id,
            SizingEvent::StockEntrySet(e) => e.tenant_id,
        }
    }

    pub fn product_id(&self) -> ProductId {
        match self {
            SizingEvent::StandardAssigned(e) => e.product_id,
            SizingEvent::StandardCleared(e) => e.product_id,
            SizingEvent::SizesReplaced(e) => e.product_id,
            SizingEvent::StockReplaced(e) => e.product_id,
            SizingEvent::StockEntrySet(e) => e.product_id,
        }
    }
}

impl Event for SizingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SizingEvent::StandardAssigned(_) => "sizing.standard.assigned",
            SizingEvent::StandardCleared(_) => "sizing.standard.cleared",
            SizingEvent::SizesReplaced(_) => "sizing.sizes.replaced",
            SizingEvent::StockReplaced(_) => "sizing.stock.replaced",
            SizingEvent::StockEntrySet(_) => "sizing.stock.entry_set",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SizingEvent::StandardAssigned(e) => e.occurred_at,
            SizingEvent::StandardCleared(e) => e.occurred_at,
            SizingEvent::SizesReplaced(e) => e.occurred_at,
            SizingEvent::StockReplaced(e) => e.occurred_at,
            SizingEvent::StockEntrySet(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ProductSizing {
    type Command = SizingCommand;
    type Event = SizingEvent;
    type Error = SizingError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SizingEvent::StandardAssigned(e) => {
                self.standard = Some(e.standard);
                self.selection = SizeSelection::from_recorded(e.retained_sizes.clone());
            }
            SizingEvent::StandardCleared(_) => {
                self.standard = None;
                self.selection = SizeSelection::empty();
            }
            SizingEvent::SizesReplaced(e) => {
                self.selection = SizeSelection::from_recorded(e.sizes.clone());
            }
            SizingEvent::StockReplaced(e) => {
                self.ledger.replace(e.entries.iter().cloned());
            }
            SizingEvent::StockEntrySet(e) => {
                self.ledger.set(e.key.clone(), e.quantity);
            }
        }

        // Every event leaves the ledger keyed by exactly the active sizes.
        self.reconcile();
        self.tenant_id = Some(event.tenant_id());
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let (tenant_id, product_id, _) = command.target();
        self.ensure_tenant(tenant_id)?;
        self.ensure_product_id(product_id)?;

        match command {
            SizingCommand::AssignStandard(cmd) => self.handle_assign(cmd),
            SizingCommand::ClearStandard(cmd) => self.handle_clear(cmd),
            SizingCommand::ReplaceSizes(cmd) => self.handle_replace(cmd),
            SizingCommand::AddSizes(cmd) => self.handle_add(cmd),
            SizingCommand::RemoveSize(cmd) => self.handle_remove(cmd),
            SizingCommand::MutateStock(cmd) => self.handle_mutate(cmd),
        }
    }
}

impl ProductSizing {
    fn reconcile(&mut self) {
        if self.category.is_variant_less() {
            self.ledger.align_to_sentinel();
        } else {
            self.ledger.align_to(self.selection.labels());
        }
    }

    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        match self.tenant_id {
            Some(owner) if owner != tenant_id => Err(DomainError::invariant("tenant mismatch")),
            _ => Ok(()),
        }
    }

    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    /// Validate a full label set for this product under its current standard.
    fn select(&self, sizes: &[SizeLabel]) -> Result<SizeSelection, SizingError> {
        if sizes.is_empty() {
            return Ok(SizeSelection::empty());
        }
        if self.category.is_variant_less() {
            return Err(SizingError::InvalidLabel(sizes[0].to_string()));
        }
        let standard = self.standard.ok_or(SizingError::StandardNotSet)?;
        SizeSelection::from_labels(
            self.catalog.resolve(self.category, Some(standard)),
            sizes.iter().cloned(),
        )
    }

    fn entry_event(
        &self,
        tenant_id: TenantId,
        occurred_at: DateTime<Utc>,
        change: StockChange,
    ) -> SizingEvent {
        match change {
            StockChange::Replace(entries) => SizingEvent::StockReplaced(StockReplaced {
                tenant_id,
                product_id: self.id,
                entries,
                occurred_at,
            }),
            StockChange::Entry {
                key,
                quantity,
                floored,
            } => SizingEvent::StockEntrySet(StockEntrySet {
                tenant_id,
                product_id: self.id,
                key,
                quantity,
                floored,
                occurred_at,
            }),
        }
    }

    fn handle_assign(&self, cmd: &AssignStandard) -> Result<Vec<SizingEvent>, SizingError> {
        let standard = self
            .category
            .standard_for(cmd.standard)
            .ok_or(SizingError::InvalidStandardForCategory {
                category: self.category,
            })?;

        if self.standard == Some(standard) {
            return Ok(vec![]);
        }

        let retained = self
            .selection
            .retained_in(self.catalog.resolve(self.category, Some(standard)));

        Ok(vec![SizingEvent::StandardAssigned(StandardAssigned {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            standard,
            retained_sizes: retained.labels().to_vec(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_clear(&self, cmd: &ClearStandard) -> Result<Vec<SizingEvent>, SizingError> {
        if self.standard.is_none() {
            return Ok(vec![]);
        }
        Ok(vec![SizingEvent::StandardCleared(StandardCleared {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_replace(&self, cmd: &ReplaceSizes) -> Result<Vec<SizingEvent>, SizingError> {
        let selection = self.select(&cmd.sizes)?;

        let mut events = Vec::new();
        let mut projected = self.ledger.clone();
        if selection != self.selection {
            projected.align_to(selection.labels());
            events.push(SizingEvent::SizesReplaced(SizesReplaced {
                tenant_id: cmd.tenant_id,
                product_id: cmd.product_id,
                sizes: selection.labels().to_vec(),
                occurred_at: cmd.occurred_at,
            }));
        }

        // Initial quantities go through the engine against the post-replace ledger.
        for (label, amount) in &cmd.stock {
            let mutation = StockMutation::one(Some(label.clone()), MutationMode::Set, *amount);
            let change = StockMutationEngine::plan(&projected, &mutation)?;
            if let StockChange::Entry { key, quantity, .. } = &change {
                if projected.get(key) == Some(*quantity) {
                    continue;
                }
                projected.set(key.clone(), *quantity);
            }
            events.push(self.entry_event(cmd.tenant_id, cmd.occurred_at, change));
        }

        Ok(events)
    }

    fn handle_add(&self, cmd: &AddSizes) -> Result<Vec<SizingEvent>, SizingError> {
        let union: Vec<SizeLabel> = self
            .selection
            .labels()
            .iter()
            .chain(cmd.sizes.iter())
            .cloned()
            .collect();
        let selection = self.select(&union)?;

        if selection == self.selection {
            return Ok(vec![]);
        }
        Ok(vec![SizingEvent::SizesReplaced(SizesReplaced {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            sizes: selection.labels().to_vec(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove(&self, cmd: &RemoveSize) -> Result<Vec<SizingEvent>, SizingError> {
        if !self.selection.contains(&cmd.size) {
            return Ok(vec![]);
        }
        Ok(vec![SizingEvent::SizesReplaced(SizesReplaced {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            sizes: self.selection.without(&cmd.size).labels().to_vec(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mutate(&self, cmd: &MutateStock) -> Result<Vec<SizingEvent>, SizingError> {
        let change = StockMutationEngine::plan(&self.ledger, &cmd.mutation)?;
        Ok(vec![self.entry_event(cmd.tenant_id, cmd.occurred_at, change)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn label(raw: &str) -> SizeLabel {
        SizeLabel::new(raw).unwrap()
    }

    fn labels(raw: &[&str]) -> Vec<SizeLabel> {
        raw.iter().map(|l| label(l)).collect()
    }

    struct Fixture {
        tenant_id: TenantId,
        product: ProductSizing,
    }

    impl Fixture {
        fn new(category: Category) -> Self {
            Self {
                tenant_id: test_tenant_id(),
                product: ProductSizing::empty(
                    test_product_id(),
                    category,
                    Arc::new(SizeCatalog::default()),
                ),
            }
        }

        fn product_id(&self) -> ProductId {
            self.product.id_typed()
        }

        /// Handle + apply, as the dispatcher would.
        fn run(&mut self, command: SizingCommand) -> Result<Vec<SizingEvent>, SizingError> {
            let events = self.product.handle(&command)?;
            for event in &events {
                self.product.apply(event);
            }
            Ok(events)
        }

        fn assign(&mut self, standard: SizeStandard) -> Result<Vec<SizingEvent>, SizingError> {
            self.run(SizingCommand::AssignStandard(AssignStandard {
                tenant_id: self.tenant_id,
                product_id: self.product_id(),
                standard,
                occurred_at: Utc::now(),
            }))
        }

        fn clear(&mut self) -> Result<Vec<SizingEvent>, SizingError> {
            self.run(SizingCommand::ClearStandard(ClearStandard {
                tenant_id: self.tenant_id,
                product_id: self.product_id(),
                occurred_at: Utc::now(),
            }))
        }

        fn replace(&mut self, sizes: &[&str]) -> Result<Vec<SizingEvent>, SizingError> {
            self.replace_with_stock(sizes, &[])
        }

        fn replace_with_stock(
            &mut self,
            sizes: &[&str],
            stock: &[(&str, i64)],
        ) -> Result<Vec<SizingEvent>, SizingError> {
            self.run(SizingCommand::ReplaceSizes(ReplaceSizes {
                tenant_id: self.tenant_id,
                product_id: self.product_id(),
                sizes: labels(sizes),
                stock: stock.iter().map(|(l, q)| (label(l), *q)).collect(),
                occurred_at: Utc::now(),
            }))
        }

        fn add(&mut self, sizes: &[&str]) -> Result<Vec<SizingEvent>, SizingError> {
            self.run(SizingCommand::AddSizes(AddSizes {
                tenant_id: self.tenant_id,
                product_id: self.product_id(),
                sizes: labels(sizes),
                occurred_at: Utc::now(),
            }))
        }

        fn remove(&mut self, size: &str) -> Result<Vec<SizingEvent>, SizingError> {
            self.run(SizingCommand::RemoveSize(RemoveSize {
                tenant_id: self.tenant_id,
                product_id: self.product_id(),
                size: label(size),
                occurred_at: Utc::now(),
            }))
        }

        fn mutate(&mut self, mutation: StockMutation) -> Result<Vec<SizingEvent>, SizingError> {
            self.run(SizingCommand::MutateStock(MutateStock {
                tenant_id: self.tenant_id,
                product_id: self.product_id(),
                mutation,
                occurred_at: Utc::now(),
            }))
        }

        fn quantity(&self, size: Option<&str>) -> Option<Quantity> {
            self.product.quantity(&StockKey::from(size.map(label)))
        }

        fn assert_no_orphans(&self) {
            assert_no_orphans(&self.product);
        }
    }

    fn assert_no_orphans(product: &ProductSizing) {
        let keys: Vec<StockKey> = product.ledger().keys().cloned().collect();
        let expected: Vec<StockKey> = if product.category().is_variant_less() {
            vec![StockKey::NoSize]
        } else {
            let mut sized: Vec<StockKey> = product
                .active_sizes()
                .iter()
                .cloned()
                .map(StockKey::Size)
                .collect();
            sized.sort();
            sized
        };
        assert_eq!(keys, expected);
    }

    #[test]
    fn invalid_label_leaves_selection_unchanged() {
        let mut f = Fixture::new(Category::Clothing);
        f.assign(SizeStandard::Us).unwrap();
        f.replace(&["S", "M", "L"]).unwrap();

        let err = f.replace(&["S", "Z"]).unwrap_err();

        assert_eq!(err, SizingError::InvalidLabel("Z".to_string()));
        assert_eq!(f.product.active_sizes(), &labels(&["S", "M", "L"])[..]);
        f.assert_no_orphans();
    }

    #[test]
    fn bag_takes_no_standard_but_keeps_one_bucket() {
        let mut f = Fixture::new(Category::Bag);

        let err = f.assign(SizeStandard::Us).unwrap_err();
        assert_eq!(
            err,
            SizingError::InvalidStandardForCategory {
                category: Category::Bag
            }
        );

        f.mutate(StockMutation::one(None, MutationMode::Set, 10)).unwrap();

        assert_eq!(
            f.product.stock(),
            vec![StockEntry {
                key: StockKey::NoSize,
                quantity: 10
            }]
        );
        assert!(f.product.active_sizes().is_empty());
    }

    #[test]
    fn decrement_below_zero_floors_at_zero() {
        let mut f = Fixture::new(Category::Clothing);
        f.assign(SizeStandard::Us).unwrap();
        f.replace_with_stock(&["M"], &[("M", 3)]).unwrap();

        let events = f
            .mutate(StockMutation::one(Some(label("M")), MutationMode::Dec, 5))
            .unwrap();

        assert_eq!(f.quantity(Some("M")), Some(0));
        assert!(matches!(
            &events[0],
            SizingEvent::StockEntrySet(e) if e.floored && e.quantity == 0
        ));
    }

    #[test]
    fn selecting_before_a_standard_is_rejected() {
        let mut f = Fixture::new(Category::Clothing);

        assert_eq!(f.replace(&["M"]).unwrap_err(), SizingError::StandardNotSet);
        assert_eq!(f.add(&["M"]).unwrap_err(), SizingError::StandardNotSet);

        // An empty selection is always acceptable.
        assert!(f.replace(&[]).unwrap().is_empty());
    }

    #[test]
    fn shoe_needs_a_standard_and_always_numbers() {
        let mut f = Fixture::new(Category::Shoe);
        assert_eq!(f.product.catalog_labels().len(), 17);
        assert_eq!(f.replace(&["38"]).unwrap_err(), SizingError::StandardNotSet);

        f.assign(SizeStandard::Br).unwrap();
        assert_eq!(f.product.standard(), Some(SizeStandard::ShoeNumbering));

        f.replace(&["40", "38"]).unwrap();
        assert_eq!(f.product.active_sizes(), &labels(&["38", "40"])[..]);
    }

    #[test]
    fn bag_rejects_any_size_label() {
        let mut f = Fixture::new(Category::Bag);
        assert_eq!(
            f.replace(&["M"]).unwrap_err(),
            SizingError::InvalidLabel("M".to_string())
        );
        assert!(matches!(
            f.mutate(StockMutation::one(Some(label("M")), MutationMode::Inc, 1)),
            Err(SizingError::InvalidLabel(_))
        ));
    }

    #[test]
    fn clear_is_idempotent_and_drops_sized_stock() {
        let mut f = Fixture::new(Category::Clothing);
        f.assign(SizeStandard::Us).unwrap();
        f.replace_with_stock(&["S", "M"], &[("S", 2)]).unwrap();

        assert_eq!(f.clear().unwrap().len(), 1);
        let after_first = f.product.clone();
        assert!(f.clear().unwrap().is_empty());

        assert_eq!(f.product, after_first);
        assert_eq!(f.product.standard(), None);
        assert!(f.product.active_sizes().is_empty());
        assert!(f.product.ledger().is_empty());
    }

    #[test]
    fn reassigning_prunes_sizes_missing_from_new_catalog() {
        let mut f = Fixture::new(Category::Clothing);
        f.assign(SizeStandard::Us).unwrap();
        f.replace_with_stock(&["S", "M", "L"], &[("M", 5), ("L", 1)]).unwrap();

        f.assign(SizeStandard::Br).unwrap();

        assert_eq!(f.product.active_sizes(), &labels(&["M"])[..]);
        assert_eq!(f.quantity(Some("M")), Some(5));
        assert_eq!(f.quantity(Some("L")), None);
        f.assert_no_orphans();
    }

    #[test]
    fn reassigning_the_same_standard_emits_nothing() {
        let mut f = Fixture::new(Category::Clothing);
        f.assign(SizeStandard::Us).unwrap();
        assert!(f.assign(SizeStandard::Us).unwrap().is_empty());
        assert_eq!(f.product.version(), 1);
    }

    #[test]
    fn deselected_size_is_recreated_at_zero() {
        let mut f = Fixture::new(Category::Clothing);
        f.assign(SizeStandard::Us).unwrap();
        f.replace_with_stock(&["S", "M"], &[("S", 4)]).unwrap();

        f.remove("S").unwrap();
        assert_eq!(f.quantity(Some("S")), None);

        f.add(&["S"]).unwrap();
        assert_eq!(f.quantity(Some("S")), Some(0));
        assert_eq!(f.product.active_sizes(), &labels(&["S", "M"])[..]);
    }

    #[test]
    fn remove_of_absent_size_is_a_no_op() {
        let mut f = Fixture::new(Category::Clothing);
        f.assign(SizeStandard::Us).unwrap();
        f.replace(&["M"]).unwrap();

        assert!(f.remove("XL").unwrap().is_empty());
    }

    #[test]
    fn add_unions_with_existing_selection() {
        let mut f = Fixture::new(Category::Clothing);
        f.assign(SizeStandard::Us).unwrap();
        f.replace(&["M"]).unwrap();

        f.add(&["XS", "M"]).unwrap();
        assert_eq!(f.product.active_sizes(), &labels(&["XS", "M"])[..]);

        assert!(matches!(f.add(&["Q"]), Err(SizingError::InvalidLabel(l)) if l == "Q"));
        assert_eq!(f.product.active_sizes(), &labels(&["XS", "M"])[..]);
    }

    #[test]
    fn replace_with_stock_commits_selection_and_quantities_together() {
        let mut f = Fixture::new(Category::Clothing);
        f.assign(SizeStandard::Us).unwrap();
        f.replace_with_stock(&["S", "M"], &[("S", 3)]).unwrap();

        let events = f.replace_with_stock(&["M", "L"], &[("L", 6)]).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(f.quantity(Some("S")), None);
        assert_eq!(f.quantity(Some("M")), Some(0));
        assert_eq!(f.quantity(Some("L")), Some(6));
    }

    #[test]
    fn replace_with_stock_for_unselected_label_rejects_everything() {
        let mut f = Fixture::new(Category::Clothing);
        f.assign(SizeStandard::Us).unwrap();
        f.replace(&["S"]).unwrap();
        let before = f.product.clone();

        let err = f.replace_with_stock(&["M"], &[("S", 1)]).unwrap_err();

        assert_eq!(err, SizingError::InvalidLabel("S".to_string()));
        assert_eq!(f.product, before);
    }

    #[test]
    fn bulk_set_replaces_the_whole_ledger() {
        let mut f = Fixture::new(Category::Clothing);
        f.assign(SizeStandard::Us).unwrap();
        f.replace_with_stock(&["S", "M"], &[("S", 3), ("M", 4)]).unwrap();

        f.mutate(StockMutation::Bulk(BTreeMap::from([(
            StockKey::Size(label("M")),
            9,
        )])))
        .unwrap();

        assert_eq!(f.quantity(Some("S")), Some(0));
        assert_eq!(f.quantity(Some("M")), Some(9));

        let err = f
            .mutate(StockMutation::Bulk(BTreeMap::from([(
                StockKey::Size(label("XL")),
                1,
            )])))
            .unwrap_err();
        assert_eq!(err, SizingError::InvalidLabel("XL".to_string()));
        assert_eq!(f.quantity(Some("M")), Some(9));
    }

    #[test]
    fn bulk_set_on_a_bag_targets_only_the_single_bucket() {
        let mut f = Fixture::new(Category::Bag);

        f.mutate(StockMutation::Bulk(BTreeMap::from([(StockKey::NoSize, 7)])))
            .unwrap();
        assert_eq!(
            f.product.stock(),
            vec![StockEntry {
                key: StockKey::NoSize,
                quantity: 7
            }]
        );

        let before = f.product.clone();
        let err = f
            .mutate(StockMutation::Bulk(BTreeMap::from([(
                StockKey::Size(label("M")),
                1,
            )])))
            .unwrap_err();
        assert_eq!(err, SizingError::InvalidLabel("M".to_string()));
        assert_eq!(f.product, before);

        f.mutate(StockMutation::Bulk(BTreeMap::new())).unwrap();
        assert_eq!(f.quantity(None), Some(0));
        f.assert_no_orphans();
    }

    #[test]
    fn handle_rejects_wrong_tenant() {
        let mut f = Fixture::new(Category::Clothing);
        f.assign(SizeStandard::Us).unwrap();

        let err = f
            .product
            .handle(&SizingCommand::ClearStandard(ClearStandard {
                tenant_id: test_tenant_id(),
                product_id: f.product_id(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();

        assert!(matches!(err, SizingError::Domain(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let mut f = Fixture::new(Category::Clothing);
        f.assign(SizeStandard::Us).unwrap();
        let before = f.product.clone();

        let cmd = SizingCommand::ReplaceSizes(ReplaceSizes {
            tenant_id: f.tenant_id,
            product_id: f.product_id(),
            sizes: labels(&["S"]),
            stock: BTreeMap::new(),
            occurred_at: Utc::now(),
        });
        let first = f.product.handle(&cmd).unwrap();
        let second = f.product.handle(&cmd).unwrap();

        assert_eq!(first, second);
        assert_eq!(f.product, before);
    }

    #[test]
    fn apply_is_deterministic_and_versions_each_event() {
        let mut f = Fixture::new(Category::Clothing);
        let mut history = Vec::new();
        history.extend(f.assign(SizeStandard::Us).unwrap());
        history.extend(f.replace_with_stock(&["S", "M"], &[("M", 2)]).unwrap());
        history.extend(f.mutate(StockMutation::one(Some(label("M")), MutationMode::Inc, 1)).unwrap());

        let mut replayed =
            ProductSizing::empty(f.product_id(), Category::Clothing, Arc::new(SizeCatalog::default()));
        for event in &history {
            replayed.apply(event);
        }

        assert_eq!(replayed, f.product);
        assert_eq!(replayed.version(), history.len() as u64);
        assert_eq!(replayed.quantity(&StockKey::Size(label("M"))), Some(3));
    }

    #[test]
    fn events_round_trip_through_json() {
        let event = SizingEvent::StockEntrySet(StockEntrySet {
            tenant_id: test_tenant_id(),
            product_id: test_product_id(),
            key: StockKey::NoSize,
            quantity: 4,
            floored: false,
            occurred_at: Utc::now(),
        });

        let json = serde_json::to_value(&event).unwrap();
        let back: SizingEvent = serde_json::from_value(json).unwrap();

        assert_eq!(back, event);
        assert_eq!(back.event_type(), "sizing.stock.entry_set");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Assign(SizeStandard),
            Clear,
            Replace(Vec<&'static str>),
            Add(Vec<&'static str>),
            Remove(&'static str),
            Mutate(Option<&'static str>, MutationMode, i64),
            Bulk(Vec<(Option<&'static str>, i64)>),
        }

        const POOL: [&str; 10] = ["XS", "S", "M", "L", "XL", "PP", "G", "38", "41", "Z"];

        fn any_label() -> impl Strategy<Value = &'static str> {
            prop::sample::select(POOL.to_vec())
        }

        fn any_mode() -> impl Strategy<Value = MutationMode> {
            prop_oneof![
                Just(MutationMode::Set),
                Just(MutationMode::Inc),
                Just(MutationMode::Dec),
            ]
        }

        fn any_op() -> impl Strategy<Value = Op> {
            prop_oneof![
                prop_oneof![
                    Just(SizeStandard::Us),
                    Just(SizeStandard::Br),
                    Just(SizeStandard::ShoeNumbering),
                ]
                .prop_map(Op::Assign),
                Just(Op::Clear),
                prop::collection::vec(any_label(), 0..5).prop_map(Op::Replace),
                prop::collection::vec(any_label(), 0..3).prop_map(Op::Add),
                any_label().prop_map(Op::Remove),
                (prop::option::of(any_label()), any_mode(), -3i64..20)
                    .prop_map(|(l, m, a)| Op::Mutate(l, m, a)),
                prop::collection::vec((prop::option::of(any_label()), -2i64..20), 0..4)
                    .prop_map(Op::Bulk),
            ]
        }

        fn any_category() -> impl Strategy<Value = Category> {
            prop_oneof![Just(Category::Bag), Just(Category::Clothing), Just(Category::Shoe)]
        }

        fn run_op(f: &mut Fixture, op: Op) -> Result<Vec<SizingEvent>, SizingError> {
            match op {
                Op::Assign(s) => f.assign(s),
                Op::Clear => f.clear(),
                Op::Replace(sizes) => f.replace(&sizes),
                Op::Add(sizes) => f.add(&sizes),
                Op::Remove(size) => f.remove(size),
                Op::Mutate(size, mode, amount) => {
                    f.mutate(StockMutation::one(size.map(label), mode, amount))
                }
                Op::Bulk(entries) => f.mutate(StockMutation::Bulk(
                    entries
                        .into_iter()
                        .map(|(l, q)| (StockKey::from(l.map(label)), q))
                        .collect(),
                )),
            }
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: no ledger entry outlives its size, and every active size is in the catalog.
            #[test]
            fn ledger_keys_track_the_selection(
                category in any_category(),
                ops in prop::collection::vec(any_op(), 1..30)
            ) {
                let mut f = Fixture::new(category);
                for op in ops {
                    let before = f.product.clone();
                    if run_op(&mut f, op).is_err() {
                        // Rejections apply nothing.
                        prop_assert_eq!(&f.product, &before);
                    }
                    assert_no_orphans(&f.product);
                    for size in f.product.active_sizes() {
                        prop_assert!(f.product.catalog_labels().contains(size));
                    }
                }
            }

            /// Property: replace then read yields the catalog-ordered, de-duplicated set.
            #[test]
            fn replace_round_trips_in_catalog_order(
                picks in prop::collection::vec(0usize..9, 0..9)
            ) {
                let mut f = Fixture::new(Category::Clothing);
                f.assign(SizeStandard::Us).unwrap();
                let us = f.product.catalog_labels().to_vec();
                let chosen: Vec<&str> = picks.iter().map(|i| us[*i].as_str()).collect();

                f.replace(&chosen).unwrap();

                let mut expected: Vec<SizeLabel> = us
                    .iter()
                    .filter(|l| chosen.contains(&l.as_str()))
                    .cloned()
                    .collect();
                expected.dedup();
                prop_assert_eq!(f.product.active_sizes(), &expected[..]);
            }

            /// Property: decrement never underflows; the result is max(0, current - amount).
            #[test]
            fn decrement_is_floored(start in 0i64..50, amount in 0i64..100) {
                let mut f = Fixture::new(Category::Bag);
                f.mutate(StockMutation::one(None, MutationMode::Set, start)).unwrap();

                f.mutate(StockMutation::one(None, MutationMode::Dec, amount)).unwrap();

                prop_assert_eq!(f.quantity(None), Some((start - amount).max(0) as Quantity));
            }
        }
    }
}
