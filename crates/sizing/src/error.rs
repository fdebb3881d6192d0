use thiserror::Error;

use atelier_core::DomainError;

use crate::catalog::Category;

/// Rejections produced by the sizing rules.
///
/// Every variant is a local validation failure: the command is refused as a
/// whole and nothing is applied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SizingError {
    /// A standard was assigned to a category that has no sizes (bags).
    #[error("category '{category}' does not take a size standard")]
    InvalidStandardForCategory { category: Category },

    /// Sizes were selected before any standard was assigned.
    #[error("no size standard assigned; define a size standard first")]
    StandardNotSet,

    /// The label is not in the resolved catalog, or not an active size.
    #[error("invalid size label: {0}")]
    InvalidLabel(String),

    /// A stock quantity below zero was supplied.
    #[error("negative stock quantity for {key}: {quantity}")]
    NegativeQuantity { key: String, quantity: i64 },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl SizingError {
    /// Stable machine-readable code for this rejection.
    pub fn code(&self) -> &'static str {
        match self {
            SizingError::InvalidStandardForCategory { .. } => "invalid_standard_for_category",
            SizingError::StandardNotSet => "standard_not_set",
            SizingError::InvalidLabel(_) => "invalid_label",
            SizingError::NegativeQuantity { .. } => "negative_quantity",
            SizingError::Domain(DomainError::Validation(_)) => "validation_error",
            SizingError::Domain(DomainError::InvariantViolation(_)) => "invariant_violation",
            SizingError::Domain(DomainError::InvalidId(_)) => "invalid_id",
            SizingError::Domain(DomainError::NotFound) => "not_found",
            SizingError::Domain(DomainError::Conflict(_)) => "concurrent_conflict",
        }
    }
}
