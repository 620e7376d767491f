//! Customers domain module.
//!
//! Customers own a postal address value object. Orders reference customers by
//! id only; "orders of a customer" is a store query, not a field here.

pub mod address;
pub mod customer;

pub use address::Address;
pub use customer::{Customer, CustomerChanges, CustomerId};
