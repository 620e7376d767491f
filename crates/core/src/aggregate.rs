//! Aggregate root trait.

/// Aggregate root marker + minimal interface.
///
/// An aggregate is created, mutated and persisted as one consistency unit.
/// Its owned parts (e.g. order lines) are only reachable through the root,
/// and the store writes root and parts in a single unit of work.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;
}
