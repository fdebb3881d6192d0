//! Stock mutation engine.
//!
//! Bulk replacement, per-size changes and the variant-less bucket all pass
//! through [`StockMutationEngine::plan`], which is the only place that checks
//! quantities are non-negative and keys are active.

use std::collections::BTreeMap;

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use atelier_core::DomainError;

use crate::catalog::SizeLabel;
use crate::error::SizingError;
use crate::ledger::{Quantity, StockEntry, StockKey, StockLedger};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationMode {
    /// New quantity is the amount.
    Set,
    /// New quantity is current + amount.
    Inc,
    /// New quantity is current - amount, floored at zero.
    Dec,
}

impl FromStr for MutationMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "set" => Ok(MutationMode::Set),
            "inc" => Ok(MutationMode::Inc),
            "dec" => Ok(MutationMode::Dec),
            other => Err(DomainError::validation(format!(
                "unknown mutation mode '{other}' (expected set, inc or dec)"
            ))),
        }
    }
}

/// A requested change to a product's ledger.
///
/// Amounts are signed so that negative input can be rejected explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockMutation {
    /// Replace every entry; active keys missing from the map drop to zero.
    Bulk(BTreeMap<StockKey, i64>),
    /// Change one size of a variant-bearing product.
    Single {
        label: SizeLabel,
        mode: MutationMode,
        amount: i64,
    },
    /// Change the single bucket of a variant-less product.
    Sentinel { mode: MutationMode, amount: i64 },
}

impl StockMutation {
    /// One-entry mutation; no label targets the variant-less bucket.
    pub fn one(label: Option<SizeLabel>, mode: MutationMode, amount: i64) -> Self {
        match label {
            Some(label) => StockMutation::Single {
                label,
                mode,
                amount,
            },
            None => StockMutation::Sentinel { mode, amount },
        }
    }
}

/// Outcome decided by the engine, not yet applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockChange {
    /// The complete new ledger.
    Replace(Vec<StockEntry>),
    /// One entry's new quantity. `floored` is set when a decrement was clamped at zero.
    Entry {
        key: StockKey,
        quantity: Quantity,
        floored: bool,
    },
}

pub struct StockMutationEngine;

impl StockMutationEngine {
    /// Decide the effect of `mutation` on `ledger` without changing it.
    pub fn plan(ledger: &StockLedger, mutation: &StockMutation) -> Result<StockChange, SizingError> {
        match mutation {
            StockMutation::Bulk(entries) => {
                let mut next: BTreeMap<StockKey, Quantity> =
                    ledger.keys().map(|key| (key.clone(), 0)).collect();
                for (key, amount) in entries {
                    next.insert(key.clone(), Self::admit(ledger, key, *amount)?);
                }
                Ok(StockChange::Replace(
                    next.into_iter()
                        .map(|(key, quantity)| StockEntry { key, quantity })
                        .collect(),
                ))
            }
            StockMutation::Single {
                label,
                mode,
                amount,
            } => Self::plan_entry(ledger, StockKey::Size(label.clone()), *mode, *amount),
            StockMutation::Sentinel { mode, amount } => {
                Self::plan_entry(ledger, StockKey::NoSize, *mode, *amount)
            }
        }
    }

    fn admit(ledger: &StockLedger, key: &StockKey, amount: i64) -> Result<Quantity, SizingError> {
        if !ledger.contains(key) {
            return Err(SizingError::InvalidLabel(key.to_string()));
        }
        Quantity::try_from(amount).map_err(|_| SizingError::NegativeQuantity {
            key: key.to_string(),
            quantity: amount,
        })
    }

    fn plan_entry(
        ledger: &StockLedger,
        key: StockKey,
        mode: MutationMode,
        amount: i64,
    ) -> Result<StockChange, SizingError> {
        let amount = Self::admit(ledger, &key, amount)?;
        let current = ledger.get(&key).unwrap_or(0);

        let (quantity, floored) = match mode {
            MutationMode::Set => (amount, false),
            MutationMode::Inc => {
                let quantity = current.checked_add(amount).ok_or_else(|| {
                    DomainError::validation(format!("stock quantity for {key} would overflow"))
                })?;
                (quantity, false)
            }
            MutationMode::Dec => (current.saturating_sub(amount), amount > current),
        };

        Ok(StockChange::Entry {
            key,
            quantity,
            floored,
        })
    }
}
