use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, Entity};

use crate::address::Address;

storefront_core::typed_id!(
    /// Customer identifier.
    CustomerId,
    "CustomerId"
);

/// Entity: a customer who can place orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Customer {
    id: CustomerId,
    name: String,
    address: Address,
}

/// Explicit change-set for a customer.
///
/// `None` keeps the current value; an address is always replaced whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerChanges {
    pub name: Option<String>,
    pub address: Option<Address>,
}

impl Customer {
    pub fn register(id: CustomerId, name: impl Into<String>, address: Address) -> DomainResult<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self { id, name, address })
    }

    /// Rebuild a customer from persisted state (stores only).
    pub fn restore(id: CustomerId, name: String, address: Address) -> Self {
        Self { id, name, address }
    }

    pub fn id_typed(&self) -> CustomerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Apply a change-set and return the updated customer.
    pub fn apply_changes(mut self, changes: &CustomerChanges) -> DomainResult<Self> {
        if let Some(name) = &changes.name {
            validate_name(name)?;
            self.name = name.clone();
        }
        if let Some(address) = &changes.address {
            self.address = address.clone();
        }
        Ok(self)
    }
}

impl Entity for Customer {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn validate_name(name: &str) -> DomainResult<()> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("customer name cannot be empty"));
    }
    Ok(())
}
