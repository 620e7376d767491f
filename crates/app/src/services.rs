//! Use cases. Every write runs in one unit of work and commits once.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, instrument, warn};

use storefront_catalog::{Item, ItemChanges, ItemId, ItemKind};
use storefront_core::{Clock, DomainError, SystemClock};
use storefront_customers::{Address, Customer, CustomerChanges, CustomerId};
use storefront_infra::query::MAX_PAGE_LIMIT;
use storefront_infra::{
    InMemoryStore, OrderFilter, OrderProjection, OrderQueryRepository, OrderSummary, Page,
    PostgresStore, Store, UnitOfWork,
};
use storefront_orders::{LineRequest, Order, OrderId};

use crate::config::AppConfig;
use crate::errors::ServiceResult;

/// Store handle shared by every service of a process.
pub type DynStore = Arc<dyn Store>;

pub struct AppServices {
    pub orders: OrderService<DynStore>,
    pub customers: CustomerService<DynStore>,
    pub catalog: CatalogService<DynStore>,
    pub config: AppConfig,
}

impl AppServices {
    pub fn new(store: DynStore, clock: Arc<dyn Clock>, config: &AppConfig) -> Self {
        Self {
            orders: OrderService::new(store.clone(), clock)
                .with_max_page_limit(config.max_page_limit),
            customers: CustomerService::new(store.clone()),
            catalog: CatalogService::new(store),
            config: config.clone(),
        }
    }
}

/// Wire services against Postgres when a database URL is configured, else in memory.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store: DynStore = match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url, config.db_max_connections)
                .await
                .context("failed to connect to Postgres")?;
            store
                .ensure_schema()
                .await
                .context("failed to create the storefront schema")?;
            info!(max_connections = config.db_max_connections, "using postgres store");
            Arc::new(store)
        }
        None => {
            info!("using in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };
    Ok(AppServices::new(store, Arc::new(SystemClock), config))
}

/// Load `ids` for update in ascending id order so concurrent units of work
/// lock shared items in the same sequence. Missing items are left out.
async fn lock_items(
    uow: &mut dyn UnitOfWork,
    mut ids: Vec<ItemId>,
) -> ServiceResult<HashMap<ItemId, Item>> {
    ids.sort();
    ids.dedup();
    let mut items = HashMap::with_capacity(ids.len());
    for id in ids {
        if let Some(item) = uow.item_for_update(id).await? {
            items.insert(id, item);
        }
    }
    Ok(items)
}

async fn save_items(
    uow: &mut dyn UnitOfWork,
    items: &HashMap<ItemId, Item>,
) -> ServiceResult<()> {
    for item in items.values() {
        uow.save_item(item).await?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct OrderService<S> {
    store: S,
    queries: OrderQueryRepository<S>,
    clock: Arc<dyn Clock>,
    max_page_limit: u32,
}

impl<S> OrderService<S>
where
    S: Store + Clone,
{
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            queries: OrderQueryRepository::new(store.clone()),
            store,
            clock,
            max_page_limit: MAX_PAGE_LIMIT,
        }
    }

    pub fn with_max_page_limit(mut self, max_page_limit: u32) -> Self {
        self.max_page_limit = max_page_limit;
        self
    }

    /// Place an order for `customer_id`, drawing stock for every line.
    ///
    /// All-or-nothing: if any line fails, no stock moves and no order exists.
    #[instrument(
        skip(self, lines),
        fields(customer_id = %customer_id, line_count = lines.len()),
        err
    )]
    pub async fn place_order(
        &self,
        customer_id: CustomerId,
        lines: &[LineRequest],
    ) -> ServiceResult<OrderId> {
        let mut uow = self.store.begin().await?;

        let customer = uow
            .customer(customer_id)
            .await?
            .ok_or_else(|| DomainError::not_found("customer", customer_id))?;
        let mut items = lock_items(&mut *uow, lines.iter().map(|l| l.item_id).collect()).await?;

        let order = Order::place(
            OrderId::generate(),
            &customer,
            lines,
            &mut items,
            self.clock.now(),
        )
        .inspect_err(|err| warn!(error = %err, "order rejected"))?;

        save_items(&mut *uow, &items).await?;
        uow.insert_order(&order).await?;
        uow.commit().await?;

        info!(
            order_id = %order.id_typed(),
            total_price = order.total_price(),
            "order placed"
        );
        Ok(order.id_typed())
    }

    /// Cancel a placed order and return its stock.
    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub async fn cancel_order(&self, order_id: OrderId) -> ServiceResult<()> {
        let mut uow = self.store.begin().await?;

        let mut order = uow
            .order_for_update(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", order_id))?;

        let mut items = if order.is_cancellable() {
            lock_items(&mut *uow, order.item_ids()).await?
        } else {
            HashMap::new()
        };

        order
            .cancel(&mut items)
            .inspect_err(|err| warn!(error = %err, "cancellation rejected"))?;

        save_items(&mut *uow, &items).await?;
        uow.update_order_status(&order).await?;
        uow.commit().await?;

        info!(order_id = %order_id, "order cancelled");
        Ok(())
    }

    pub async fn get_order(&self, order_id: OrderId) -> ServiceResult<OrderProjection> {
        let found = self.queries.find_one(order_id).await?;
        Ok(found.ok_or_else(|| DomainError::not_found("order", order_id))?)
    }

    /// Orders with their lines: one order query plus one batched line query.
    pub async fn list_orders(
        &self,
        filter: &OrderFilter,
        page: Page,
    ) -> ServiceResult<Vec<OrderProjection>> {
        let page = page.capped(self.max_page_limit);
        Ok(self.queries.find_batched(filter, page).await?)
    }

    /// Same result as [`list_orders`](Self::list_orders), one query per reference.
    pub async fn list_orders_naive(
        &self,
        filter: &OrderFilter,
        page: Page,
    ) -> ServiceResult<Vec<OrderProjection>> {
        let page = page.capped(self.max_page_limit);
        Ok(self.queries.find_naive(filter, page).await?)
    }

    /// Every order from a single flat join, regrouped. Unpaginated.
    pub async fn list_orders_flat(&self) -> ServiceResult<Vec<OrderProjection>> {
        Ok(self.queries.find_flat().await?)
    }

    pub async fn list_order_summaries(
        &self,
        filter: &OrderFilter,
        page: Page,
    ) -> ServiceResult<Vec<OrderSummary>> {
        let page = page.capped(self.max_page_limit);
        Ok(self.queries.find_summaries(filter, page).await?)
    }
}

#[derive(Clone)]
pub struct CustomerService<S> {
    store: S,
}

impl<S> CustomerService<S>
where
    S: Store,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Register a customer. Names are unique.
    #[instrument(skip(self, address), err)]
    pub async fn join(&self, name: &str, address: Address) -> ServiceResult<CustomerId> {
        let mut uow = self.store.begin().await?;
        ensure_name_free(&mut *uow, name, None).await?;

        let customer = Customer::register(CustomerId::generate(), name, address)?;
        uow.insert_customer(&customer).await?;
        uow.commit().await?;

        info!(customer_id = %customer.id_typed(), "customer joined");
        Ok(customer.id_typed())
    }

    #[instrument(skip(self, changes), fields(customer_id = %id), err)]
    pub async fn update(&self, id: CustomerId, changes: CustomerChanges) -> ServiceResult<Customer> {
        let mut uow = self.store.begin().await?;
        let customer = uow
            .customer_for_update(id)
            .await?
            .ok_or_else(|| DomainError::not_found("customer", id))?;
        if let Some(name) = changes.name.as_deref() {
            ensure_name_free(&mut *uow, name, Some(id)).await?;
        }

        let updated = customer.apply_changes(&changes)?;
        uow.update_customer(&updated).await?;
        uow.commit().await?;
        Ok(updated)
    }

    pub async fn find(&self, id: CustomerId) -> ServiceResult<Customer> {
        let found = self.store.find_customer(id).await?;
        Ok(found.ok_or_else(|| DomainError::not_found("customer", id))?)
    }

    pub async fn list(&self) -> ServiceResult<Vec<Customer>> {
        Ok(self.store.all_customers().await?)
    }
}

async fn ensure_name_free(
    uow: &mut dyn UnitOfWork,
    name: &str,
    owner: Option<CustomerId>,
) -> ServiceResult<()> {
    let taken = uow
        .customers_named(name)
        .await?
        .iter()
        .any(|c| Some(c.id_typed()) != owner);
    if taken {
        warn!(name, "duplicate customer name");
        return Err(DomainError::conflict(format!("customer name {name:?} is already taken")).into());
    }
    Ok(())
}

#[derive(Clone)]
pub struct CatalogService<S> {
    store: S,
}

impl<S> CatalogService<S>
where
    S: Store,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip(self, kind), fields(kind = kind.tag()), err)]
    pub async fn register_item(
        &self,
        name: &str,
        price: u64,
        initial_stock: i64,
        kind: ItemKind,
    ) -> ServiceResult<ItemId> {
        let item = Item::register(ItemId::generate(), name, price, initial_stock, kind)?;
        let mut uow = self.store.begin().await?;
        uow.insert_item(&item).await?;
        uow.commit().await?;

        info!(item_id = %item.id_typed(), "item registered");
        Ok(item.id_typed())
    }

    /// Apply a name/price change-set. Stock is untouched.
    #[instrument(skip(self, changes), fields(item_id = %id), err)]
    pub async fn update_item(&self, id: ItemId, changes: ItemChanges) -> ServiceResult<Item> {
        let mut uow = self.store.begin().await?;
        let item = uow
            .item_for_update(id)
            .await?
            .ok_or_else(|| DomainError::not_found("item", id))?;
        let updated = item.apply_changes(&changes)?;
        uow.save_item(&updated).await?;
        uow.commit().await?;
        Ok(updated)
    }

    /// Add `quantity` units to stock.
    #[instrument(skip(self), fields(item_id = %id), err)]
    pub async fn restock(&self, id: ItemId, quantity: i64) -> ServiceResult<Item> {
        let mut uow = self.store.begin().await?;
        let mut item = uow
            .item_for_update(id)
            .await?
            .ok_or_else(|| DomainError::not_found("item", id))?;
        item.increment(quantity)?;
        uow.save_item(&item).await?;
        uow.commit().await?;

        info!(stock = item.stock(), "item restocked");
        Ok(item)
    }

    pub async fn find(&self, id: ItemId) -> ServiceResult<Item> {
        let found = self.store.find_item(id).await?;
        Ok(found.ok_or_else(|| DomainError::not_found("item", id))?)
    }

    pub async fn list(&self) -> ServiceResult<Vec<Item>> {
        Ok(self.store.all_items().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use storefront_catalog::MAX_PRICE;
    use storefront_core::FixedClock;
    use storefront_infra::ReadStore;
    use storefront_orders::OrderStatus;

    use crate::errors::ServiceError;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn seoul() -> Address {
        Address::new("Seoul", "Gangga", "123-213")
    }

    fn book(author: &str) -> ItemKind {
        ItemKind::Book {
            author: author.into(),
            isbn: "1234".into(),
        }
    }

    struct Harness {
        store: InMemoryStore,
        orders: OrderService<InMemoryStore>,
        customers: CustomerService<InMemoryStore>,
        catalog: CatalogService<InMemoryStore>,
    }

    fn harness() -> Harness {
        let store = InMemoryStore::new();
        Harness {
            orders: OrderService::new(store.clone(), Arc::new(FixedClock(now()))),
            customers: CustomerService::new(store.clone()),
            catalog: CatalogService::new(store.clone()),
            store,
        }
    }

    impl Harness {
        async fn customer(&self, name: &str) -> CustomerId {
            self.customers.join(name, seoul()).await.unwrap()
        }

        async fn item(&self, name: &str, price: u64, stock: i64) -> ItemId {
            self.catalog
                .register_item(name, price, stock, book("Kim"))
                .await
                .unwrap()
        }

        async fn stock(&self, id: ItemId) -> i64 {
            self.catalog.find(id).await.unwrap().stock()
        }
    }

    fn domain(err: ServiceError) -> DomainError {
        match err {
            ServiceError::Domain(e) => e,
            ServiceError::Store(e) => panic!("expected a domain error, got {e}"),
        }
    }

    #[tokio::test]
    async fn place_and_cancel_move_stock_both_ways() {
        let h = harness();
        let kim = h.customer("kim").await;
        let i1 = h.item("JPA Book", 10_000, 10).await;

        let order_id = h.orders.place_order(kim, &[LineRequest::new(i1, 2)]).await.unwrap();
        assert_eq!(h.stock(i1).await, 8);

        let order = h.orders.get_order(order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Placed);
        assert_eq!(order.total_price(), 20_000);
        assert_eq!(order.placed_at, now());
        assert_eq!(order.delivery_address, seoul());

        let err = domain(
            h.orders
                .place_order(kim, &[LineRequest::new(i1, 11)])
                .await
                .unwrap_err(),
        );
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                item_id: i1.0,
                requested: 11,
                available: 8,
            }
        );
        assert_eq!(h.stock(i1).await, 8);

        h.orders.cancel_order(order_id).await.unwrap();
        assert_eq!(h.stock(i1).await, 10);
        let order = h.orders.get_order(order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn failed_line_rolls_back_earlier_lines() {
        let h = harness();
        let kim = h.customer("kim").await;
        let plenty = h.item("plenty", 1_000, 5).await;
        let scarce = h.item("scarce", 1_000, 1).await;

        let err = h
            .orders
            .place_order(kim, &[LineRequest::new(plenty, 2), LineRequest::new(scarce, 3)])
            .await
            .unwrap_err();

        assert!(matches!(domain(err), DomainError::InsufficientStock { .. }));
        assert_eq!(h.stock(plenty).await, 5);
        assert_eq!(h.stock(scarce).await, 1);
        let orders = h.orders.list_orders(&OrderFilter::default(), Page::default()).await.unwrap();
        assert!(orders.is_empty());
    }

    #[tokio::test]
    async fn cancelling_twice_is_an_invalid_transition() {
        let h = harness();
        let kim = h.customer("kim").await;
        let i1 = h.item("book", 100, 4).await;
        let order_id = h.orders.place_order(kim, &[LineRequest::new(i1, 4)]).await.unwrap();

        h.orders.cancel_order(order_id).await.unwrap();
        let err = domain(h.orders.cancel_order(order_id).await.unwrap_err());

        assert_eq!(
            err,
            DomainError::InvalidStateTransition {
                from: "cancelled",
                to: "cancelled",
            }
        );
        assert_eq!(h.stock(i1).await, 4);
    }

    #[tokio::test]
    async fn repeated_item_lines_each_draw_stock() {
        let h = harness();
        let kim = h.customer("kim").await;
        let i1 = h.item("book", 100, 5).await;

        let order_id = h
            .orders
            .place_order(kim, &[LineRequest::new(i1, 2), LineRequest::new(i1, 3)])
            .await
            .unwrap();
        assert_eq!(h.stock(i1).await, 0);
        assert_eq!(h.orders.get_order(order_id).await.unwrap().lines.len(), 2);

        h.orders.cancel_order(order_id).await.unwrap();
        assert_eq!(h.stock(i1).await, 5);
    }

    #[tokio::test]
    async fn unknown_references_are_not_found() {
        let h = harness();
        let kim = h.customer("kim").await;
        let i1 = h.item("book", 100, 5).await;

        let err = h
            .orders
            .place_order(CustomerId::generate(), &[LineRequest::new(i1, 1)])
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = h
            .orders
            .place_order(kim, &[LineRequest::new(i1, 1), LineRequest::new(ItemId::generate(), 1)])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(h.stock(i1).await, 5);

        assert!(h.orders.get_order(OrderId::generate()).await.unwrap_err().is_not_found());
        assert!(h.orders.cancel_order(OrderId::generate()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn empty_or_non_positive_requests_are_rejected() {
        let h = harness();
        let kim = h.customer("kim").await;
        let i1 = h.item("book", 100, 5).await;

        let err = domain(h.orders.place_order(kim, &[]).await.unwrap_err());
        assert!(matches!(err, DomainError::Validation(_)));
        let err = domain(
            h.orders
                .place_order(kim, &[LineRequest::new(i1, 0)])
                .await
                .unwrap_err(),
        );
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(h.stock(i1).await, 5);
    }

    #[tokio::test]
    async fn orders_keep_price_and_address_from_placement_time() {
        let h = harness();
        let kim = h.customer("kim").await;
        let i1 = h.item("book", 10_000, 5).await;
        let order_id = h.orders.place_order(kim, &[LineRequest::new(i1, 2)]).await.unwrap();

        h.catalog
            .update_item(
                i1,
                ItemChanges {
                    name: None,
                    price: Some(50_000),
                },
            )
            .await
            .unwrap();
        let busan = Address::new("Busan", "Haeundae", "48000");
        h.customers
            .update(
                kim,
                CustomerChanges {
                    name: None,
                    address: Some(busan.clone()),
                },
            )
            .await
            .unwrap();

        let order = h.orders.get_order(order_id).await.unwrap();
        assert_eq!(order.total_price(), 20_000);
        assert_eq!(order.delivery_address, seoul());
        assert_eq!(h.customers.find(kim).await.unwrap().address(), &busan);
    }

    #[tokio::test]
    async fn listing_strategies_agree_and_cost_what_they_claim() {
        let h = harness();
        let user_a = h.customer("userA").await;
        let user_b = h.customer("userB").await;
        let jpa1 = h.item("JPA1 BOOK", 10_000, 100).await;
        let jpa2 = h.item("JPA2 BOOK", 20_000, 100).await;
        let spring1 = h.item("SPRING1 BOOK", 20_000, 200).await;
        let spring2 = h.item("SPRING2 BOOK", 40_000, 300).await;
        h.orders
            .place_order(user_a, &[LineRequest::new(jpa1, 1), LineRequest::new(jpa2, 2)])
            .await
            .unwrap();
        h.orders
            .place_order(user_b, &[LineRequest::new(spring1, 3), LineRequest::new(spring2, 4)])
            .await
            .unwrap();
        let all = OrderFilter::default();

        let before = h.store.query_count();
        let naive = h.orders.list_orders_naive(&all, Page::default()).await.unwrap();
        assert_eq!(h.store.query_count() - before, 1 + 3 * 2 + 4);

        let before = h.store.query_count();
        let batched = h.orders.list_orders(&all, Page::default()).await.unwrap();
        assert_eq!(h.store.query_count() - before, 2);

        let before = h.store.query_count();
        let flat = h.orders.list_orders_flat().await.unwrap();
        assert_eq!(h.store.query_count() - before, 1);

        assert_eq!(naive, batched);
        assert_eq!(batched, flat);

        let summaries = h.orders.list_order_summaries(&all, Page::default()).await.unwrap();
        let from_lists: Vec<_> = batched.iter().map(OrderProjection::summary).collect();
        assert_eq!(summaries, from_lists);
    }

    #[tokio::test]
    async fn orders_of_a_customer_are_a_filtered_query() {
        let h = harness();
        let kim = h.customer("kim").await;
        let lee = h.customer("lee").await;
        let i1 = h.item("book", 100, 50).await;
        for _ in 0..3 {
            h.orders.place_order(kim, &[LineRequest::new(i1, 1)]).await.unwrap();
        }
        h.orders.place_order(lee, &[LineRequest::new(i1, 1)]).await.unwrap();

        let kims = h
            .orders
            .list_orders(&OrderFilter::default().for_customer(kim), Page::default())
            .await
            .unwrap();
        assert_eq!(kims.len(), 3);
        assert!(kims.iter().all(|o| o.customer_name == "kim"));
    }

    #[tokio::test]
    async fn page_limit_is_capped() {
        let h = harness();
        let kim = h.customer("kim").await;
        let i1 = h.item("book", 100, 50).await;
        for _ in 0..4 {
            h.orders.place_order(kim, &[LineRequest::new(i1, 1)]).await.unwrap();
        }
        let orders = h.orders.clone().with_max_page_limit(3);

        let page = Page {
            offset: 0,
            limit: 1_000,
        };
        assert_eq!(orders.list_orders(&OrderFilter::default(), page).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn concurrent_placements_never_oversell() {
        let h = harness();
        let kim = h.customer("kim").await;
        let i1 = h.item("book", 100, 5).await;

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..10 {
            let orders = h.orders.clone();
            tasks.spawn(async move { orders.place_order(kim, &[LineRequest::new(i1, 1)]).await });
        }
        let mut placed = 0;
        while let Some(result) = tasks.join_next().await {
            if result.unwrap().is_ok() {
                placed += 1;
            }
        }

        assert_eq!(placed, 5);
        assert_eq!(h.stock(i1).await, 0);
    }

    #[tokio::test]
    async fn customer_names_are_unique() {
        let h = harness();
        let kim = h.customer("kim").await;
        let lee = h.customer("lee").await;

        let err = domain(h.customers.join("kim", seoul()).await.unwrap_err());
        assert!(matches!(err, DomainError::Conflict(_)));

        let err = domain(
            h.customers
                .update(
                    lee,
                    CustomerChanges {
                        name: Some("kim".into()),
                        address: None,
                    },
                )
                .await
                .unwrap_err(),
        );
        assert!(matches!(err, DomainError::Conflict(_)));

        // Keeping one's own name is not a clash.
        let same = h
            .customers
            .update(
                kim,
                CustomerChanges {
                    name: Some("kim".into()),
                    address: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(same.name(), "kim");

        let names: Vec<_> = h
            .customers
            .list()
            .await
            .unwrap()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["kim", "lee"]);
    }

    #[tokio::test]
    async fn catalog_maintenance() {
        let h = harness();
        let id = h
            .catalog
            .register_item(
                "Album",
                15_000,
                3,
                ItemKind::Album {
                    artist: "IU".into(),
                    etc: String::new(),
                },
            )
            .await
            .unwrap();

        let restocked = h.catalog.restock(id, 7).await.unwrap();
        assert_eq!(restocked.stock(), 10);
        let err = domain(h.catalog.restock(id, 0).await.unwrap_err());
        assert!(matches!(err, DomainError::Validation(_)));

        let updated = h
            .catalog
            .update_item(
                id,
                ItemChanges {
                    name: Some("Album (remastered)".into()),
                    price: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name(), "Album (remastered)");
        assert_eq!(updated.price(), 15_000);
        assert_eq!(updated.stock(), 10);

        assert_eq!(h.catalog.list().await.unwrap(), vec![updated]);
        assert!(h.catalog.find(ItemId::generate()).await.unwrap_err().is_not_found());
        let err = domain(
            h.catalog
                .register_item("", 1, 1, book("x"))
                .await
                .unwrap_err(),
        );
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn oversized_prices_and_totals_are_rejected_as_validation() {
        let h = harness();
        let kim = h.customer("kim").await;

        let err = domain(
            h.catalog
                .register_item("gold", MAX_PRICE + 1, 1, book("x"))
                .await
                .unwrap_err(),
        );
        assert!(matches!(err, DomainError::Validation(_)));

        let gold = h.item("gold", 1 << 62, 4).await;
        let err = domain(
            h.orders
                .place_order(kim, &[LineRequest::new(gold, 4)])
                .await
                .unwrap_err(),
        );
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(h.stock(gold).await, 4);

        let order_id = h
            .orders
            .place_order(kim, &[LineRequest::new(gold, 3)])
            .await
            .unwrap();
        let order = h.orders.get_order(order_id).await.unwrap();
        assert_eq!(order.total_price(), 3 << 62);
        assert_eq!(h.orders.list_orders_flat().await.unwrap()[0].total_price(), 3 << 62);
    }

    #[tokio::test]
    async fn in_memory_services_build_from_default_config() {
        let services = build_services(&AppConfig::default()).await.unwrap();
        let kim = services.customers.join("kim", seoul()).await.unwrap();
        let item = services
            .catalog
            .register_item("book", 100, 1, book("Kim"))
            .await
            .unwrap();
        let order_id = services
            .orders
            .place_order(kim, &[LineRequest::new(item, 1)])
            .await
            .unwrap();
        let json = serde_json::to_value(services.orders.get_order(order_id).await.unwrap()).unwrap();
        assert_eq!(json["customer_name"], "kim");
        assert_eq!(json["lines"][0]["quantity"], 1);
    }
}
