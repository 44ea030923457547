//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values: two
/// GSTINs with the same characters are the same GSTIN, two line inputs with the
/// same quantity, rate and GST rate compute the same tax.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
