//! Active size selection for one product.

use crate::catalog::{SizeLabel, order_labels};
use crate::error::SizingError;

/// The labels a product currently offers: a duplicate-free subset of its
/// resolved catalog, kept in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeSelection {
    labels: Vec<SizeLabel>,
}

impl SizeSelection {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate `labels` against `resolved` and order them.
    ///
    /// All-or-nothing: one unknown label rejects the whole set.
    pub fn from_labels(
        resolved: &[SizeLabel],
        labels: impl IntoIterator<Item = SizeLabel>,
    ) -> Result<Self, SizingError> {
        let mut picked: Vec<SizeLabel> = Vec::new();
        for label in labels {
            if !resolved.contains(&label) {
                return Err(SizingError::InvalidLabel(label.to_string()));
            }
            if !picked.contains(&label) {
                picked.push(label);
            }
        }
        order_labels(resolved, &mut picked);
        Ok(Self { labels: picked })
    }

    /// Rebuild from labels already recorded in an event.
    pub(crate) fn from_recorded(labels: Vec<SizeLabel>) -> Self {
        Self { labels }
    }

    pub fn labels(&self) -> &[SizeLabel] {
        &self.labels
    }

    pub fn contains(&self, label: &SizeLabel) -> bool {
        self.labels.contains(label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn without(&self, label: &SizeLabel) -> Self {
        Self {
            labels: self.labels.iter().filter(|l| *l != label).cloned().collect(),
        }
    }

    /// Keep only the labels that `resolved` still lists.
    pub fn retained_in(&self, resolved: &[SizeLabel]) -> Self {
        let mut labels: Vec<SizeLabel> =
            self.labels.iter().filter(|l| resolved.contains(l)).cloned().collect();
        order_labels(resolved, &mut labels);
        Self { labels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Category, SizeCatalog, SizeStandard};

    fn label(raw: &str) -> SizeLabel {
        SizeLabel::new(raw).unwrap()
    }

    #[test]
    fn from_labels_dedupes_and_orders_by_catalog() {
        let catalog = SizeCatalog::default();
        let us = catalog.resolve(Category::Clothing, Some(SizeStandard::Us));

        let selection =
            SizeSelection::from_labels(us, ["XL", "S", "XL", "XS"].map(label)).unwrap();

        assert_eq!(selection.labels(), &["XS", "S", "XL"].map(label));
    }

    #[test]
    fn unknown_label_rejects_the_whole_set() {
        let catalog = SizeCatalog::default();
        let us = catalog.resolve(Category::Clothing, Some(SizeStandard::Us));

        let err = SizeSelection::from_labels(us, ["S", "Z"].map(label)).unwrap_err();

        assert_eq!(err, SizingError::InvalidLabel("Z".to_string()));
    }

    #[test]
    fn retained_in_drops_labels_missing_from_new_catalog() {
        let catalog = SizeCatalog::default();
        let us = catalog.resolve(Category::Clothing, Some(SizeStandard::Us));
        let br = catalog.resolve(Category::Clothing, Some(SizeStandard::Br));
        let selection = SizeSelection::from_labels(us, ["S", "M", "L"].map(label)).unwrap();

        assert_eq!(selection.retained_in(br).labels(), &[label("M")]);
    }

    #[test]
    fn without_is_a_no_op_for_absent_labels() {
        let catalog = SizeCatalog::default();
        let us = catalog.resolve(Category::Clothing, Some(SizeStandard::Us));
        let selection = SizeSelection::from_labels(us, ["S", "M"].map(label)).unwrap();

        assert_eq!(selection.without(&label("XL")), selection);
        assert_eq!(selection.without(&label("S")).labels(), &[label("M")]);
    }
}
