//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Customers and catalog items are entities: they change over time through
/// explicit change-sets but keep their identity.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
