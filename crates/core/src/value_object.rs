//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one,
/// build a new value and replace the old one wholesale; there are no partial
/// setters. A postal address is the canonical example here: an order keeps
/// the copy it was placed with even after the customer moves.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
