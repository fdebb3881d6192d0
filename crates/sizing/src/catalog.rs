//! Size catalog resolution.
//!
//! A catalog is the ordered list of size labels valid for a `(category,
//! standard)` pair. The tables live in one immutable [`SizeCatalog`] value that
//! callers inject, so alternative tables can be configured without touching the
//! mutation rules.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use atelier_core::{DomainError, DomainResult, ValueObject};

const US_LETTERS: [&str; 9] = ["XXXS", "XXS", "XS", "S", "M", "L", "XL", "XXL", "XXXL"];
const BR_LETTERS: [&str; 7] = ["PP", "P", "M", "G", "XG", "G1", "G2"];
const SHOE_NUMBERS: core::ops::RangeInclusive<u32> = 30..=46;

/// Product class. Fixed when the product is created.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Bag,
    Clothing,
    Shoe,
}

impl Category {
    /// Variant-less products hold a single stock bucket and never take sizes.
    pub fn is_variant_less(self) -> bool {
        matches!(self, Category::Bag)
    }

    /// The standard actually stored when `requested` is assigned.
    ///
    /// Shoes always number their sizes; bags take no standard at all.
    pub fn standard_for(self, requested: SizeStandard) -> Option<SizeStandard> {
        match self {
            Category::Bag => None,
            Category::Shoe => Some(SizeStandard::ShoeNumbering),
            Category::Clothing => Some(requested),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Bag => "bag",
            Category::Clothing => "clothing",
            Category::Shoe => "shoe",
        }
    }
}

impl core::fmt::Display for Category {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bag" => Ok(Category::Bag),
            "clothing" => Ok(Category::Clothing),
            "shoe" => Ok(Category::Shoe),
            other => Err(DomainError::validation(format!(
                "unknown category '{other}' (expected bag, clothing or shoe)"
            ))),
        }
    }
}

/// Regional sizing scheme. "No standard" is `Option::<SizeStandard>::None`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SizeStandard {
    #[serde(rename = "us_standard", alias = "us")]
    Us,
    #[serde(rename = "br_standard", alias = "br")]
    Br,
    #[serde(rename = "shoe_numbering", alias = "shoe")]
    ShoeNumbering,
}

impl SizeStandard {
    pub fn as_str(self) -> &'static str {
        match self {
            SizeStandard::Us => "us_standard",
            SizeStandard::Br => "br_standard",
            SizeStandard::ShoeNumbering => "shoe_numbering",
        }
    }
}

impl core::fmt::Display for SizeStandard {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SizeStandard {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "us" | "us_standard" => Ok(SizeStandard::Us),
            "br" | "br_standard" => Ok(SizeStandard::Br),
            "shoe" | "shoe_numbering" => Ok(SizeStandard::ShoeNumbering),
            other => Err(DomainError::validation(format!("unknown size standard '{other}'"))),
        }
    }
}

/// A size label such as `"M"` or `"38"`. Trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SizeLabel(String);

impl SizeLabel {
    pub fn new(raw: impl AsRef<str>) -> DomainResult<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("size label cannot be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Integer value for numeric labels (shoe sizes).
    pub fn numeric(&self) -> Option<u32> {
        self.0.parse().ok()
    }
}

impl ValueObject for SizeLabel {}

impl core::fmt::Display for SizeLabel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SizeLabel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SizeLabel {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SizeLabel> for String {
    fn from(value: SizeLabel) -> Self {
        value.0
    }
}

/// Reference tables for every catalog the engine can resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeCatalog {
    us_standard: Vec<SizeLabel>,
    br_standard: Vec<SizeLabel>,
    shoe_numbering: Vec<SizeLabel>,
}

impl Default for SizeCatalog {
    fn default() -> Self {
        let letters = |labels: &[&str]| -> Vec<SizeLabel> {
            labels.iter().map(|l| SizeLabel(l.to_string())).collect()
        };
        Self {
            us_standard: letters(&US_LETTERS),
            br_standard: letters(&BR_LETTERS),
            shoe_numbering: SHOE_NUMBERS.map(|n| SizeLabel(n.to_string())).collect(),
        }
    }
}

impl SizeCatalog {
    /// Build a custom catalog. Every table must be non-empty and duplicate-free.
    pub fn new(
        us_standard: Vec<SizeLabel>,
        br_standard: Vec<SizeLabel>,
        shoe_numbering: Vec<SizeLabel>,
    ) -> DomainResult<Self> {
        let catalog = Self {
            us_standard,
            br_standard,
            shoe_numbering,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check the table invariants (used after deserializing a configured catalog).
    pub fn validate(&self) -> DomainResult<()> {
        for (name, table) in [
            ("us_standard", &self.us_standard),
            ("br_standard", &self.br_standard),
            ("shoe_numbering", &self.shoe_numbering),
        ] {
            if table.is_empty() {
                return Err(DomainError::validation(format!("catalog '{name}' is empty")));
            }
            for (idx, label) in table.iter().enumerate() {
                if table[..idx].contains(label) {
                    return Err(DomainError::validation(format!(
                        "catalog '{name}' lists '{label}' twice"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Ordered labels valid for a product of `category` under `standard`.
    ///
    /// An empty slice means no sizing applies. Shoes resolve to the numbering
    /// table whatever standard is passed.
    pub fn resolve(&self, category: Category, standard: Option<SizeStandard>) -> &[SizeLabel] {
        match (category, standard) {
            (Category::Bag, _) => &[],
            (Category::Shoe, _) | (Category::Clothing, Some(SizeStandard::ShoeNumbering)) => {
                &self.shoe_numbering
            }
            (Category::Clothing, Some(SizeStandard::Us)) => &self.us_standard,
            (Category::Clothing, Some(SizeStandard::Br)) => &self.br_standard,
            (Category::Clothing, None) => &[],
        }
    }
}

/// Sort `labels` for presentation and persistence.
///
/// Numeric labels go by integer value; the rest by their position in
/// `resolved` (so `XS` precedes `XL`). Unknown labels trail, lexically.
pub fn order_labels(resolved: &[SizeLabel], labels: &mut [SizeLabel]) {
    labels.sort_by(|a, b| order_key(resolved, a).cmp(&order_key(resolved, b)));
}

fn order_key<'a>(resolved: &[SizeLabel], label: &'a SizeLabel) -> (u8, usize, &'a str) {
    if let Some(n) = label.numeric() {
        return (0, n as usize, "");
    }
    match resolved.iter().position(|l| l == label) {
        Some(idx) => (1, idx, ""),
        None => (2, 0, label.as_str()),
    }
}
