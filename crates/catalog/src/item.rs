use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, Entity};

use crate::kind::ItemKind;

/// Highest accepted unit price; prices are stored as signed 64-bit money columns.
pub const MAX_PRICE: u64 = i64::MAX as u64;

storefront_core::typed_id!(
    /// Catalog item identifier.
    ItemId,
    "ItemId"
);

/// Entity: a sellable catalog item with finite stock.
///
/// `stock` is private and only moves through [`Item::decrement`] and
/// [`Item::increment`], which makes them the single enforcement point for
/// the non-negative stock invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    id: ItemId,
    name: String,
    /// Price in smallest currency unit (e.g., cents).
    price: u64,
    stock: i64,
    kind: ItemKind,
}

/// Explicit change-set for catalog maintenance.
///
/// `None` keeps the current value. Stock is deliberately absent: restocking
/// goes through the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemChanges {
    pub name: Option<String>,
    pub price: Option<u64>,
}

impl Item {
    /// Register a new catalog item.
    pub fn register(
        id: ItemId,
        name: impl Into<String>,
        price: u64,
        initial_stock: i64,
        kind: ItemKind,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("item name cannot be empty"));
        }
        if initial_stock < 0 {
            return Err(DomainError::validation("initial stock cannot be negative"));
        }
        ensure_price(price)?;
        Ok(Self {
            id,
            name,
            price,
            stock: initial_stock,
            kind,
        })
    }

    /// Rebuild an item from persisted state.
    ///
    /// Only stores call this; a negative persisted stock means the row is corrupt.
    pub fn restore(
        id: ItemId,
        name: String,
        price: u64,
        stock: i64,
        kind: ItemKind,
    ) -> DomainResult<Self> {
        if stock < 0 {
            return Err(DomainError::invariant(format!(
                "persisted stock for item {id} is negative ({stock})"
            )));
        }
        Ok(Self {
            id,
            name,
            price,
            stock,
            kind,
        })
    }

    pub fn id_typed(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> u64 {
        self.price
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    pub fn kind(&self) -> &ItemKind {
        &self.kind
    }

    /// Take `quantity` units out of stock.
    ///
    /// Leaves stock untouched on failure.
    pub fn decrement(&mut self, quantity: i64) -> DomainResult<()> {
        ensure_positive(quantity)?;
        let rest = self.stock - quantity;
        if rest < 0 {
            return Err(DomainError::InsufficientStock {
                item_id: self.id.0,
                requested: quantity,
                available: self.stock,
            });
        }
        self.stock = rest;
        Ok(())
    }

    /// Put `quantity` units back (cancellation) or add new ones (restocking).
    pub fn increment(&mut self, quantity: i64) -> DomainResult<()> {
        ensure_positive(quantity)?;
        self.stock = self
            .stock
            .checked_add(quantity)
            .ok_or_else(|| DomainError::invariant("stock overflow"))?;
        Ok(())
    }

    /// Apply a change-set and return the updated item.
    pub fn apply_changes(mut self, changes: &ItemChanges) -> DomainResult<Self> {
        if let Some(name) = &changes.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("item name cannot be empty"));
            }
            self.name = name.clone();
        }
        if let Some(price) = changes.price {
            ensure_price(price)?;
            self.price = price;
        }
        Ok(self)
    }
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn ensure_price(price: u64) -> DomainResult<()> {
    if price > MAX_PRICE {
        return Err(DomainError::validation(format!(
            "price cannot exceed {MAX_PRICE}"
        )));
    }
    Ok(())
}

fn ensure_positive(quantity: i64) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation("quantity must be positive"));
    }
    Ok(())
}
