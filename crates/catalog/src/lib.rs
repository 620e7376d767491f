//! Catalog domain module: items, their kinds, and the inventory ledger.
//!
//! This crate contains business rules only (no IO, no storage). Stock moves
//! exclusively through `Item::decrement` / `Item::increment`.

pub mod item;
pub mod kind;

pub use item::{Item, ItemChanges, ItemId, MAX_PRICE};
pub use kind::ItemKind;
