use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use storefront_catalog::{Item, ItemId};
use storefront_core::Entity;
use storefront_customers::{Address, Customer, CustomerId};
use storefront_orders::{Order, OrderId, OrderLine};

use super::{OrderRow, ReadStore, StoreError, TransactionalStore, UnitOfWork};
use crate::projection::{OrderFlatRow, OrderLineProjection, OrderSummary};
use crate::query::{OrderFilter, Page};

#[derive(Debug, Clone, Default)]
struct Tables {
    customers: Vec<Customer>,
    items: Vec<Item>,
    /// Placement order.
    orders: Vec<Order>,
}

impl Tables {
    fn customer(&self, id: CustomerId) -> Option<&Customer> {
        self.customers.iter().find(|c| c.id_typed() == id)
    }

    fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|i| i.id_typed() == id)
    }

    fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.iter().find(|o| o.id_typed() == id)
    }

    /// Orders matching `filter` joined with their customer, in placement order.
    fn matching_orders<'a>(
        &'a self,
        filter: &'a OrderFilter,
    ) -> impl Iterator<Item = (&'a Order, &'a Customer)> + 'a {
        self.orders.iter().filter_map(move |order| {
            let customer = self.customer(order.customer_id())?;
            filter
                .matches(
                    order.id_typed(),
                    customer.id_typed(),
                    customer.name(),
                    order.status(),
                )
                .then_some((order, customer))
        })
    }

    fn line_projections(&self, order: &Order) -> Vec<OrderLineProjection> {
        order
            .lines()
            .iter()
            .filter_map(|line| {
                let item = self.item(line.item_id)?;
                Some(OrderLineProjection {
                    order_id: order.id_typed(),
                    item_name: item.name().to_string(),
                    unit_price: line.unit_price,
                    quantity: line.quantity,
                })
            })
            .collect()
    }
}

fn summary_of(order: &Order, customer: &Customer) -> OrderSummary {
    OrderSummary {
        order_id: order.id_typed(),
        customer_name: customer.name().to_string(),
        placed_at: order.placed_at(),
        status: order.status(),
        delivery_address: order.delivery_address().clone(),
    }
}

/// In-memory storefront store for tests and local development.
///
/// A unit of work holds the single table lock for its whole lifetime and
/// mutates a private copy, written back only on commit. Reads wait for any
/// open unit of work to finish.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    queries: Arc<AtomicU64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl TransactionalStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryUnitOfWork { guard, working }))
    }
}

struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn customer(&mut self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        Ok(self.working.customer(id).cloned())
    }

    async fn customer_for_update(
        &mut self,
        id: CustomerId,
    ) -> Result<Option<Customer>, StoreError> {
        Ok(self.working.customer(id).cloned())
    }

    async fn customers_named(&mut self, name: &str) -> Result<Vec<Customer>, StoreError> {
        Ok(self
            .working
            .customers
            .iter()
            .filter(|c| c.name() == name)
            .cloned()
            .collect())
    }

    async fn item_for_update(&mut self, id: ItemId) -> Result<Option<Item>, StoreError> {
        Ok(self.working.item(id).cloned())
    }

    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.working.order(id).cloned())
    }

    async fn insert_customer(&mut self, customer: &Customer) -> Result<(), StoreError> {
        let clash = self
            .working
            .customers
            .iter()
            .any(|c| c.id() == customer.id() || c.name() == customer.name());
        if clash {
            return Err(StoreError::Conflict(format!(
                "customer {} already exists",
                customer.id()
            )));
        }
        self.working.customers.push(customer.clone());
        Ok(())
    }

    async fn update_customer(&mut self, customer: &Customer) -> Result<(), StoreError> {
        if self
            .working
            .customers
            .iter()
            .any(|c| c.id() != customer.id() && c.name() == customer.name())
        {
            return Err(StoreError::Conflict(format!(
                "customer name {} already taken",
                customer.name()
            )));
        }
        let slot = self
            .working
            .customers
            .iter_mut()
            .find(|c| c.id() == customer.id())
            .ok_or_else(|| StoreError::Database(format!("no customer row {}", customer.id())))?;
        *slot = customer.clone();
        Ok(())
    }

    async fn insert_item(&mut self, item: &Item) -> Result<(), StoreError> {
        if self.working.item(item.id_typed()).is_some() {
            return Err(StoreError::Conflict(format!("item {} already exists", item.id())));
        }
        self.working.items.push(item.clone());
        Ok(())
    }

    async fn save_item(&mut self, item: &Item) -> Result<(), StoreError> {
        let slot = self
            .working
            .items
            .iter_mut()
            .find(|i| i.id() == item.id())
            .ok_or_else(|| StoreError::Database(format!("no item row {}", item.id())))?;
        *slot = item.clone();
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        if self.working.order(order.id_typed()).is_some() {
            return Err(StoreError::Conflict(format!(
                "order {} already exists",
                order.id_typed()
            )));
        }
        self.working.orders.push(order.clone());
        Ok(())
    }

    async fn update_order_status(&mut self, order: &Order) -> Result<(), StoreError> {
        let slot = self
            .working
            .orders
            .iter_mut()
            .find(|o| o.id_typed() == order.id_typed())
            .ok_or_else(|| StoreError::Database(format!("no order row {}", order.id_typed())))?;
        *slot = order.clone();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl ReadStore for InMemoryStore {
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.bump();
        Ok(self.tables.lock().await.order(id).cloned())
    }

    async fn find_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        self.bump();
        Ok(self.tables.lock().await.customer(id).cloned())
    }

    async fn find_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        self.bump();
        Ok(self.tables.lock().await.item(id).cloned())
    }

    async fn all_customers(&self) -> Result<Vec<Customer>, StoreError> {
        self.bump();
        Ok(self.tables.lock().await.customers.clone())
    }

    async fn all_items(&self) -> Result<Vec<Item>, StoreError> {
        self.bump();
        Ok(self.tables.lock().await.items.clone())
    }

    async fn order_rows(
        &self,
        filter: &OrderFilter,
        page: Page,
    ) -> Result<Vec<OrderRow>, StoreError> {
        self.bump();
        let tables = self.tables.lock().await;
        let matching: Vec<_> = tables.matching_orders(filter).collect();
        Ok(matching[page.range(matching.len())]
            .iter()
            .map(|(order, _)| OrderRow {
                order_id: order.id_typed(),
                customer_id: order.customer_id(),
                placed_at: order.placed_at(),
                status: order.status(),
            })
            .collect())
    }

    async fn delivery_address(&self, order_id: OrderId) -> Result<Option<Address>, StoreError> {
        self.bump();
        let tables = self.tables.lock().await;
        Ok(tables
            .order(order_id)
            .map(|order| order.delivery_address().clone()))
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>, StoreError> {
        self.bump();
        let tables = self.tables.lock().await;
        Ok(tables
            .order(order_id)
            .map(|order| order.lines().to_vec())
            .unwrap_or_default())
    }

    async fn order_summaries(
        &self,
        filter: &OrderFilter,
        page: Page,
    ) -> Result<Vec<OrderSummary>, StoreError> {
        self.bump();
        let tables = self.tables.lock().await;
        let matching: Vec<_> = tables.matching_orders(filter).collect();
        Ok(matching[page.range(matching.len())]
            .iter()
            .map(|(order, customer)| summary_of(order, customer))
            .collect())
    }

    async fn lines_for_orders(
        &self,
        order_ids: &[OrderId],
    ) -> Result<Vec<OrderLineProjection>, StoreError> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.bump();
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .iter()
            .filter(|order| order_ids.contains(&order.id_typed()))
            .flat_map(|order| tables.line_projections(order))
            .collect())
    }

    async fn flat_rows(&self) -> Result<Vec<OrderFlatRow>, StoreError> {
        self.bump();
        let tables = self.tables.lock().await;
        let everything = OrderFilter::default();
        let mut rows = Vec::new();
        for (order, customer) in tables.matching_orders(&everything) {
            for line in tables.line_projections(order) {
                rows.push(OrderFlatRow {
                    order_id: order.id_typed(),
                    customer_name: customer.name().to_string(),
                    placed_at: order.placed_at(),
                    status: order.status(),
                    delivery_address: order.delivery_address().clone(),
                    item_name: line.item_name,
                    unit_price: line.unit_price,
                    quantity: line.quantity,
                });
            }
        }
        Ok(rows)
    }

    fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }
}
