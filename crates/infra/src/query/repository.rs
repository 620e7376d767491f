use tracing::{debug, instrument};

use storefront_orders::OrderId;

use super::{OrderFilter, Page};
use crate::projection::{self, OrderFlatRow, OrderLineProjection, OrderProjection, OrderSummary};
use crate::store::{ReadStore, StoreError};

/// Order listings over a [`ReadStore`].
///
/// Three ways to build the same nested projection, trading query count for
/// row multiplication:
///
/// | Method | Queries | Paginable |
/// |---|---|---|
/// | [`find_naive`](Self::find_naive) | 1 + 3N + M (N orders, M lines) | yes |
/// | [`find_batched`](Self::find_batched) | 2 (1 on an empty page) | yes |
/// | [`find_flat`](Self::find_flat) | 1, one row per line | no |
#[derive(Debug, Clone)]
pub struct OrderQueryRepository<S> {
    store: S,
}

impl<S> OrderQueryRepository<S>
where
    S: ReadStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Walk the graph one reference at a time.
    ///
    /// Per order: its customer, its delivery address and its lines; per line:
    /// its item.
    #[instrument(skip(self), err)]
    pub async fn find_naive(
        &self,
        filter: &OrderFilter,
        page: Page,
    ) -> Result<Vec<OrderProjection>, StoreError> {
        let rows = self.store.order_rows(filter, page).await?;
        let mut orders = Vec::with_capacity(rows.len());

        for row in rows {
            let customer = self
                .store
                .find_customer(row.customer_id)
                .await?
                .ok_or_else(|| dangling("customer", row.order_id))?;
            let delivery_address = self
                .store
                .delivery_address(row.order_id)
                .await?
                .ok_or_else(|| dangling("delivery", row.order_id))?;

            let lines = self.store.order_lines(row.order_id).await?;
            let mut projected = Vec::with_capacity(lines.len());
            for line in lines {
                let item = self
                    .store
                    .find_item(line.item_id)
                    .await?
                    .ok_or_else(|| dangling("item", row.order_id))?;
                projected.push(OrderLineProjection {
                    order_id: row.order_id,
                    item_name: item.name().to_string(),
                    unit_price: line.unit_price,
                    quantity: line.quantity,
                });
            }

            orders.push(OrderProjection {
                order_id: row.order_id,
                customer_name: customer.name().to_string(),
                placed_at: row.placed_at,
                status: row.status,
                delivery_address,
                lines: projected,
            });
        }

        Ok(orders)
    }

    /// Join the single-valued references in one query, then fetch every line
    /// of the page in one batch keyed by order id.
    #[instrument(skip(self), err)]
    pub async fn find_batched(
        &self,
        filter: &OrderFilter,
        page: Page,
    ) -> Result<Vec<OrderProjection>, StoreError> {
        let summaries = self.store.order_summaries(filter, page).await?;
        if summaries.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<OrderId> = summaries.iter().map(|s| s.order_id).collect();
        let lines = self.store.lines_for_orders(&ids).await?;
        debug!(orders = ids.len(), lines = lines.len(), "batched order lines");

        let mut by_order = projection::group_lines_by_order(lines);
        Ok(summaries
            .into_iter()
            .map(|summary| {
                let lines = by_order.remove(&summary.order_id).unwrap_or_default();
                OrderProjection::from_summary(summary, lines)
            })
            .collect())
    }

    /// Order-level fields only; the first half of [`find_batched`](Self::find_batched).
    pub async fn find_summaries(
        &self,
        filter: &OrderFilter,
        page: Page,
    ) -> Result<Vec<OrderSummary>, StoreError> {
        self.store.order_summaries(filter, page).await
    }

    /// Every order with its lines from one flat join.
    ///
    /// Unpaginated: a row limit would cut orders between their lines.
    #[instrument(skip(self), err)]
    pub async fn find_flat(&self) -> Result<Vec<OrderProjection>, StoreError> {
        let rows = self.find_flat_rows().await?;
        Ok(projection::regroup(rows))
    }

    /// The raw flat join rows, one per order line.
    pub async fn find_flat_rows(&self) -> Result<Vec<OrderFlatRow>, StoreError> {
        self.store.flat_rows().await
    }

    /// One order by id, through the batched path.
    pub async fn find_one(&self, id: OrderId) -> Result<Option<OrderProjection>, StoreError> {
        let page = Page {
            offset: 0,
            limit: 1,
        };
        let mut found = self.find_batched(&OrderFilter::by_id(id), page).await?;
        Ok(found.pop())
    }
}

fn dangling(what: &'static str, order_id: OrderId) -> StoreError {
    StoreError::decode("order", format!("order {order_id} references a missing {what}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use chrono::{DateTime, Duration, Utc};

    use storefront_catalog::{Item, ItemId, ItemKind};
    use storefront_customers::{Address, Customer, CustomerId};
    use storefront_orders::{LineRequest, Order, OrderStatus};

    use crate::store::{InMemoryStore, TransactionalStore};

    fn t(minutes: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap() + Duration::minutes(minutes)
    }

    fn item(name: &str, price: u64) -> Item {
        Item::register(
            ItemId::generate(),
            name,
            price,
            100,
            ItemKind::Book {
                author: "Kim".into(),
                isbn: "1234".into(),
            },
        )
        .unwrap()
    }

    struct Fixture {
        store: InMemoryStore,
        user_a: Customer,
        user_b: Customer,
        jpa1: ItemId,
        jpa2: ItemId,
        spring1: ItemId,
        spring2: ItemId,
    }

    /// Two customers, four books, two orders of two lines each.
    async fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let user_a = Customer::register(
            CustomerId::generate(),
            "userA",
            Address::new("Seoul", "1", "1111"),
        )
        .unwrap();
        let user_b = Customer::register(
            CustomerId::generate(),
            "userB",
            Address::new("Jinju", "2", "2222"),
        )
        .unwrap();
        let items = [
            item("JPA1 BOOK", 10_000),
            item("JPA2 BOOK", 20_000),
            item("SPRING1 BOOK", 20_000),
            item("SPRING2 BOOK", 40_000),
        ];
        let ids: Vec<ItemId> = items.iter().map(Item::id_typed).collect();

        let mut uow = store.begin().await.unwrap();
        uow.insert_customer(&user_a).await.unwrap();
        uow.insert_customer(&user_b).await.unwrap();
        for item in &items {
            uow.insert_item(item).await.unwrap();
        }
        uow.commit().await.unwrap();

        let fixture = Fixture {
            store,
            user_a,
            user_b,
            jpa1: ids[0],
            jpa2: ids[1],
            spring1: ids[2],
            spring2: ids[3],
        };
        place(&fixture, &fixture.user_a, &[(fixture.jpa1, 1), (fixture.jpa2, 2)], t(0)).await;
        place(&fixture, &fixture.user_b, &[(fixture.spring1, 3), (fixture.spring2, 4)], t(1))
            .await;
        fixture
    }

    async fn place(
        fixture: &Fixture,
        customer: &Customer,
        lines: &[(ItemId, i64)],
        at: DateTime<Utc>,
    ) -> OrderId {
        let mut uow = fixture.store.begin().await.unwrap();
        let mut items = HashMap::new();
        for (id, _) in lines {
            items.insert(*id, uow.item_for_update(*id).await.unwrap().unwrap());
        }
        let requests: Vec<_> = lines.iter().map(|(id, q)| LineRequest::new(*id, *q)).collect();
        let order = Order::place(OrderId::generate(), customer, &requests, &mut items, at).unwrap();
        for item in items.values() {
            uow.save_item(item).await.unwrap();
        }
        uow.insert_order(&order).await.unwrap();
        uow.commit().await.unwrap();
        order.id_typed()
    }

    fn item_names(order: &OrderProjection) -> Vec<&str> {
        order.lines.iter().map(|l| l.item_name.as_str()).collect()
    }

    #[tokio::test]
    async fn naive_walk_costs_one_plus_three_per_order_plus_one_per_line() {
        let f = fixture().await;
        let repo = OrderQueryRepository::new(f.store.clone());

        let before = f.store.query_count();
        let orders = repo.find_naive(&OrderFilter::default(), Page::default()).await.unwrap();
        let issued = f.store.query_count() - before;

        // N = 2 orders, M = 4 lines
        assert_eq!(issued, 1 + 3 * 2 + 4);
        assert_eq!(orders.len(), 2);
    }

    #[tokio::test]
    async fn batched_fetch_costs_two_queries() {
        let f = fixture().await;
        let repo = OrderQueryRepository::new(f.store.clone());

        let before = f.store.query_count();
        let orders = repo.find_batched(&OrderFilter::default(), Page::default()).await.unwrap();

        assert_eq!(f.store.query_count() - before, 2);
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].customer_name, "userA");
        assert_eq!(item_names(&orders[0]), vec!["JPA1 BOOK", "JPA2 BOOK"]);
        assert_eq!(orders[0].delivery_address, *f.user_a.address());
        assert_eq!(orders[1].customer_name, "userB");
        assert_eq!(item_names(&orders[1]), vec!["SPRING1 BOOK", "SPRING2 BOOK"]);
    }

    #[tokio::test]
    async fn flat_join_costs_one_query_and_regroups() {
        let f = fixture().await;
        let repo = OrderQueryRepository::new(f.store.clone());

        let rows = repo.find_flat_rows().await.unwrap();
        assert_eq!(rows.len(), 4, "one row per order line");

        let before = f.store.query_count();
        let orders = repo.find_flat().await.unwrap();
        assert_eq!(f.store.query_count() - before, 1);
        assert_eq!(orders.len(), 2);
    }

    #[tokio::test]
    async fn all_strategies_agree() {
        let f = fixture().await;
        let repo = OrderQueryRepository::new(f.store.clone());
        let all = OrderFilter::default();

        let naive = repo.find_naive(&all, Page::default()).await.unwrap();
        let batched = repo.find_batched(&all, Page::default()).await.unwrap();
        let flat = repo.find_flat().await.unwrap();

        assert_eq!(naive, batched);
        assert_eq!(batched, flat);
        assert_eq!(batched[0].total_price(), 10_000 + 2 * 20_000);
    }

    #[tokio::test]
    async fn empty_page_skips_the_batch_query() {
        let f = fixture().await;
        let repo = OrderQueryRepository::new(f.store.clone());
        let nobody = OrderFilter::default().customer_name_contains("nobody");

        let before = f.store.query_count();
        let orders = repo.find_batched(&nobody, Page::default()).await.unwrap();

        assert!(orders.is_empty());
        assert_eq!(f.store.query_count() - before, 1);
        assert!(repo.find_naive(&nobody, Page::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pagination_applies_to_orders_not_lines() {
        let f = fixture().await;
        let repo = OrderQueryRepository::new(f.store.clone());
        let page = Page {
            offset: 1,
            limit: 1,
        };

        let orders = repo.find_batched(&OrderFilter::default(), page).await.unwrap();

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].customer_name, "userB");
        assert_eq!(orders[0].lines.len(), 2, "both lines of the paged order");
    }

    #[tokio::test]
    async fn naive_walk_only_visits_the_paged_orders() {
        let f = fixture().await;
        let repo = OrderQueryRepository::new(f.store.clone());
        let page = Page {
            offset: 1,
            limit: 1,
        };

        let before = f.store.query_count();
        let orders = repo.find_naive(&OrderFilter::default(), page).await.unwrap();
        let issued = f.store.query_count() - before;

        // N = 1 paged order, M = its 2 lines
        assert_eq!(issued, 1 + 3 + 2);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].customer_name, "userB");
        assert_eq!(orders[0].lines.len(), 2);
        assert_eq!(
            orders,
            repo.find_batched(&OrderFilter::default(), page).await.unwrap()
        );

        let past_end = Page {
            offset: 2,
            limit: 10,
        };
        let before = f.store.query_count();
        assert!(repo.find_naive(&OrderFilter::default(), past_end).await.unwrap().is_empty());
        assert_eq!(f.store.query_count() - before, 1);
    }

    #[tokio::test]
    async fn filters_narrow_every_paginable_strategy() {
        let f = fixture().await;
        let extra = place(&f, &f.user_a, &[(f.spring2, 1)], t(2)).await;
        let repo = OrderQueryRepository::new(f.store.clone());

        let user_a = OrderFilter::default().customer_name_contains("A");
        let batched = repo.find_batched(&user_a, Page::default()).await.unwrap();
        let naive = repo.find_naive(&user_a, Page::default()).await.unwrap();
        assert_eq!(batched, naive);
        assert_eq!(batched.len(), 2);
        assert_eq!(batched[1].order_id, extra);

        let by_customer = OrderFilter::default().for_customer(f.user_b.id_typed());
        let summaries = repo.find_summaries(&by_customer, Page::default()).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].customer_name, "userB");

        let cancelled = OrderFilter::default().with_status(OrderStatus::Cancelled);
        assert!(repo.find_batched(&cancelled, Page::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn find_one_returns_the_order_or_nothing() {
        let f = fixture().await;
        let id = place(&f, &f.user_b, &[(f.jpa1, 5)], t(3)).await;
        let repo = OrderQueryRepository::new(f.store.clone());

        let found = repo.find_one(id).await.unwrap().unwrap();
        assert_eq!(found.order_id, id);
        assert_eq!(item_names(&found), vec!["JPA1 BOOK"]);
        assert_eq!(found.total_price(), 50_000);

        assert!(repo.find_one(OrderId::generate()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn projections_keep_the_price_paid() {
        let f = fixture().await;
        let mut uow = f.store.begin().await.unwrap();
        let repriced = uow
            .item_for_update(f.jpa1)
            .await
            .unwrap()
            .unwrap()
            .apply_changes(&storefront_catalog::ItemChanges {
                name: None,
                price: Some(99_999),
            })
            .unwrap();
        uow.save_item(&repriced).await.unwrap();
        uow.commit().await.unwrap();

        let repo = OrderQueryRepository::new(f.store.clone());
        let orders = repo.find_batched(&OrderFilter::default(), Page::default()).await.unwrap();
        assert_eq!(orders[0].lines[0].unit_price, 10_000);
    }
}
