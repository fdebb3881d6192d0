//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attributes. A size label
/// `"M"` is the same label wherever it appears; to change one, build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
