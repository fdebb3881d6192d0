//! Per-product stock ledger.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::SizeLabel;

/// Stock quantity. Unsigned, so a stored quantity can never go negative.
pub type Quantity = u64;

/// Ledger key: a size label, or the single bucket of a variant-less product.
///
/// Serialized as the label string, or `null` for [`StockKey::NoSize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "Option<SizeLabel>", into = "Option<SizeLabel>")]
pub enum StockKey {
    NoSize,
    Size(SizeLabel),
}

impl StockKey {
    pub fn label(&self) -> Option<&SizeLabel> {
        match self {
            StockKey::NoSize => None,
            StockKey::Size(label) => Some(label),
        }
    }
}

impl From<Option<SizeLabel>> for StockKey {
    fn from(value: Option<SizeLabel>) -> Self {
        value.map(StockKey::Size).unwrap_or(StockKey::NoSize)
    }
}

impl From<StockKey> for Option<SizeLabel> {
    fn from(value: StockKey) -> Self {
        match value {
            StockKey::NoSize => None,
            StockKey::Size(label) => Some(label),
        }
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StockKey::NoSize => f.write_str("(no size)"),
            StockKey::Size(label) => core::fmt::Display::fmt(label, f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntry {
    #[serde(rename = "size")]
    pub key: StockKey,
    pub quantity: Quantity,
}

/// Quantities keyed by [`StockKey`].
///
/// The owning aggregate keeps the key set equal to its active selection (or to
/// `{NoSize}` for variant-less products); values change only through
/// [`crate::mutation::StockMutationEngine`] decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockLedger {
    entries: BTreeMap<StockKey, Quantity>,
}

impl StockLedger {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Ledger of a variant-less product: one sentinel bucket at zero.
    pub fn variant_less() -> Self {
        Self {
            entries: BTreeMap::from([(StockKey::NoSize, 0)]),
        }
    }

    pub fn get(&self, key: &StockKey) -> Option<Quantity> {
        self.entries.get(key).copied()
    }

    pub fn contains(&self, key: &StockKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &StockKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> Quantity {
        self.entries.values().fold(0, |acc, q| acc.saturating_add(*q))
    }

    /// Entries ordered with the sentinel first, then by `order`.
    pub fn snapshot(&self, order: &[SizeLabel]) -> Vec<StockEntry> {
        let mut out = Vec::with_capacity(self.entries.len());
        if let Some(quantity) = self.get(&StockKey::NoSize) {
            out.push(StockEntry {
                key: StockKey::NoSize,
                quantity,
            });
        }
        for label in order {
            let key = StockKey::Size(label.clone());
            if let Some(quantity) = self.get(&key) {
                out.push(StockEntry { key, quantity });
            }
        }
        out
    }

    pub(crate) fn set(&mut self, key: StockKey, quantity: Quantity) {
        self.entries.insert(key, quantity);
    }

    pub(crate) fn replace(&mut self, entries: impl IntoIterator<Item = StockEntry>) {
        self.entries = entries.into_iter().map(|e| (e.key, e.quantity)).collect();
    }

    /// Make the key set exactly `labels`: deselected sizes are deleted and newly
    /// selected ones start at zero.
    pub(crate) fn align_to(&mut self, labels: &[SizeLabel]) {
        self.entries
            .retain(|key, _| key.label().is_some_and(|label| labels.contains(label)));
        for label in labels {
            self.entries.entry(StockKey::Size(label.clone())).or_insert(0);
        }
    }

    /// Make the key set exactly `{NoSize}`.
    pub(crate) fn align_to_sentinel(&mut self) {
        self.entries.retain(|key, _| *key == StockKey::NoSize);
        self.entries.entry(StockKey::NoSize).or_insert(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(raw: &str) -> StockKey {
        StockKey::Size(SizeLabel::new(raw).unwrap())
    }

    fn labels(raw: &[&str]) -> Vec<SizeLabel> {
        raw.iter().map(|l| SizeLabel::new(l).unwrap()).collect()
    }

    #[test]
    fn align_deletes_deselected_and_zeroes_new() {
        let mut ledger = StockLedger::empty();
        ledger.align_to(&labels(&["S", "M"]));
        ledger.set(size("S"), 4);
        ledger.set(size("M"), 2);

        ledger.align_to(&labels(&["M", "L"]));

        assert_eq!(ledger.get(&size("S")), None);
        assert_eq!(ledger.get(&size("M")), Some(2));
        assert_eq!(ledger.get(&size("L")), Some(0));
    }

    #[test]
    fn reselected_size_comes_back_at_zero() {
        let mut ledger = StockLedger::empty();
        ledger.align_to(&labels(&["S"]));
        ledger.set(size("S"), 9);

        ledger.align_to(&[]);
        ledger.align_to(&labels(&["S"]));

        assert_eq!(ledger.get(&size("S")), Some(0));
    }

    #[test]
    fn snapshot_follows_selection_order() {
        let mut ledger = StockLedger::empty();
        let order = labels(&["XS", "S", "XL"]);
        ledger.align_to(&order);
        ledger.set(size("XL"), 1);

        let keys: Vec<String> = ledger.snapshot(&order).iter().map(|e| e.key.to_string()).collect();

        assert_eq!(keys, vec!["XS", "S", "XL"]);
        assert_eq!(ledger.total(), 1);
    }

    #[test]
    fn variant_less_ledger_keeps_only_the_sentinel() {
        let mut ledger = StockLedger::variant_less();
        ledger.set(size("M"), 3);

        ledger.align_to_sentinel();

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get(&StockKey::NoSize), Some(0));
    }

    #[test]
    fn stock_key_serializes_as_label_or_null() {
        let entry = StockEntry {
            key: StockKey::NoSize,
            quantity: 10,
        };
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            serde_json::json!({ "size": null, "quantity": 10 })
        );
        let sized: StockEntry = serde_json::from_str(r#"{"size":"M","quantity":3}"#).unwrap();
        assert_eq!(sized.key, size("M"));
    }
}
