use serde::{Deserialize, Serialize};

use storefront_core::ValueObject;

/// Postal address.
///
/// Fields are private and there are no setters: an address is replaced as a
/// whole, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    city: String,
    street: String,
    zipcode: String,
}

impl Address {
    pub fn new(
        city: impl Into<String>,
        street: impl Into<String>,
        zipcode: impl Into<String>,
    ) -> Self {
        Self {
            city: city.into(),
            street: street.into(),
            zipcode: zipcode.into(),
        }
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn street(&self) -> &str {
        &self.street
    }

    pub fn zipcode(&self) -> &str {
        &self.zipcode
    }
}

impl ValueObject for Address {}
