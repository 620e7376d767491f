//! Storage seams for the storefront.
//!
//! The write side is a unit of work: [`TransactionalStore::begin`] opens one,
//! loads go through `*_for_update` methods that lock what they return, and
//! nothing is visible to other units until [`UnitOfWork::commit`]. Dropping a
//! unit of work without committing rolls it back.
//!
//! The read side ([`ReadStore`]) exposes point reads plus the primitives the
//! order listing strategies are built from. Each query a read issues bumps
//! [`ReadStore::query_count`]; the listing primitives issue exactly one, and a
//! batch lookup for no ids issues none.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use storefront_catalog::{Item, ItemId};
use storefront_core::DomainError;
use storefront_customers::{Address, Customer, CustomerId};
use storefront_orders::{Order, OrderId, OrderLine, OrderStatus};

use crate::projection::{OrderFlatRow, OrderLineProjection, OrderSummary};
use crate::query::{OrderFilter, Page};

/// Infrastructure failures. Business rule violations never travel here.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Unique or serialization violation; the caller may retry the whole request.
    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),

    /// A persisted row could not be turned back into a valid domain value.
    #[error("cannot decode persisted {entity}: {reason}")]
    Decode { entity: &'static str, reason: String },
}

impl StoreError {
    pub(crate) fn decode(entity: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::Decode {
            entity,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn from_domain(entity: &'static str, err: DomainError) -> Self {
        Self::decode(entity, err)
    }
}

/// Order-level columns without joins (one `orders` row).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRow {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub placed_at: DateTime<Utc>,
    pub status: OrderStatus,
}

/// One transactional unit of work.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn customer(&mut self, id: CustomerId) -> Result<Option<Customer>, StoreError>;

    async fn customer_for_update(
        &mut self,
        id: CustomerId,
    ) -> Result<Option<Customer>, StoreError>;

    /// Customers whose name equals `name` exactly.
    async fn customers_named(&mut self, name: &str) -> Result<Vec<Customer>, StoreError>;

    /// Load an item and lock it until the unit of work ends.
    async fn item_for_update(&mut self, id: ItemId) -> Result<Option<Item>, StoreError>;

    /// Load an order and lock it until the unit of work ends.
    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>, StoreError>;

    async fn insert_customer(&mut self, customer: &Customer) -> Result<(), StoreError>;

    async fn update_customer(&mut self, customer: &Customer) -> Result<(), StoreError>;

    async fn insert_item(&mut self, item: &Item) -> Result<(), StoreError>;

    /// Persist name, price and stock of an existing item.
    async fn save_item(&mut self, item: &Item) -> Result<(), StoreError>;

    /// Insert the order row, its delivery and its lines.
    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError>;

    async fn update_order_status(&mut self, order: &Order) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TransactionalStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;
}

/// Read-only access, outside any unit of work.
#[async_trait]
pub trait ReadStore: Send + Sync {
    /// Point lookup of a whole order aggregate.
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    async fn find_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError>;

    async fn find_item(&self, id: ItemId) -> Result<Option<Item>, StoreError>;

    /// All customers in registration order.
    async fn all_customers(&self) -> Result<Vec<Customer>, StoreError>;

    /// All items in registration order.
    async fn all_items(&self) -> Result<Vec<Item>, StoreError>;

    /// Bare order rows matching `filter`, in placement order, paginated.
    async fn order_rows(
        &self,
        filter: &OrderFilter,
        page: Page,
    ) -> Result<Vec<OrderRow>, StoreError>;

    async fn delivery_address(&self, order_id: OrderId) -> Result<Option<Address>, StoreError>;

    /// Lines of one order in `line_no` order.
    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>, StoreError>;

    /// Orders joined with their customer and delivery, paginated.
    async fn order_summaries(
        &self,
        filter: &OrderFilter,
        page: Page,
    ) -> Result<Vec<OrderSummary>, StoreError>;

    /// Lines joined with their items for every order in `order_ids`.
    ///
    /// Ordered by order, then `line_no`.
    async fn lines_for_orders(
        &self,
        order_ids: &[OrderId],
    ) -> Result<Vec<OrderLineProjection>, StoreError>;

    /// Full order/customer/delivery/line/item inner join, one row per line.
    async fn flat_rows(&self) -> Result<Vec<OrderFlatRow>, StoreError>;

    /// Number of read queries issued so far.
    fn query_count(&self) -> u64;
}

/// Everything a storefront backend provides.
pub trait Store: TransactionalStore + ReadStore {}

impl<S> Store for S where S: TransactionalStore + ReadStore + ?Sized {}

#[async_trait]
impl<S> TransactionalStore for Arc<S>
where
    S: TransactionalStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        (**self).begin().await
    }
}

#[async_trait]
impl<S> ReadStore for Arc<S>
where
    S: ReadStore + ?Sized,
{
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        (**self).find_by_id(id).await
    }

    async fn find_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        (**self).find_customer(id).await
    }

    async fn find_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        (**self).find_item(id).await
    }

    async fn all_customers(&self) -> Result<Vec<Customer>, StoreError> {
        (**self).all_customers().await
    }

    async fn all_items(&self) -> Result<Vec<Item>, StoreError> {
        (**self).all_items().await
    }

    async fn order_rows(
        &self,
        filter: &OrderFilter,
        page: Page,
    ) -> Result<Vec<OrderRow>, StoreError> {
        (**self).order_rows(filter, page).await
    }

    async fn delivery_address(&self, order_id: OrderId) -> Result<Option<Address>, StoreError> {
        (**self).delivery_address(order_id).await
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>, StoreError> {
        (**self).order_lines(order_id).await
    }

    async fn order_summaries(
        &self,
        filter: &OrderFilter,
        page: Page,
    ) -> Result<Vec<OrderSummary>, StoreError> {
        (**self).order_summaries(filter, page).await
    }

    async fn lines_for_orders(
        &self,
        order_ids: &[OrderId],
    ) -> Result<Vec<OrderLineProjection>, StoreError> {
        (**self).lines_for_orders(order_ids).await
    }

    async fn flat_rows(&self) -> Result<Vec<OrderFlatRow>, StoreError> {
        (**self).flat_rows().await
    }

    fn query_count(&self) -> u64 {
        (**self).query_count()
    }
}
