//! Postgres-backed storefront store.
//!
//! Units of work are `READ COMMITTED` transactions. Items and orders are read
//! with `SELECT ... FOR UPDATE`, so concurrent placements and cancellations
//! touching the same rows serialize on the row locks and never lose a stock
//! update.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (serialization failure / deadlock) | `40001` / `40P01` | `Conflict` |
//! | Database (other) | any other | `Database` |
//! | PoolClosed / PoolTimedOut / Io | N/A | `Unavailable` |
//! | ColumnDecode / ColumnNotFound | N/A | `Decode` |
//! | Other | N/A | `Database` |

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use storefront_catalog::{Item, ItemId, ItemKind};
use storefront_core::AggregateId;
use storefront_customers::{Address, Customer, CustomerId};
use storefront_orders::{Order, OrderId, OrderLine, OrderStatus};

use super::{OrderRow, ReadStore, StoreError, TransactionalStore, UnitOfWork};
use crate::projection::{OrderFlatRow, OrderLineProjection, OrderSummary};
use crate::query::{OrderFilter, Page};

const SCHEMA: &str = include_str!("../../migrations/0001_storefront.sql");

macro_rules! item_select {
    () => {
        "SELECT i.item_id, i.name, i.price, i.stock, i.kind, \
         i.author, i.isbn, i.artist, i.etc, i.director, i.actor \
         FROM items i"
    };
}

macro_rules! customer_select {
    () => {
        "SELECT c.customer_id, c.name, c.city, c.street, c.zipcode FROM customers c"
    };
}

/// Shared WHERE / ORDER BY / OFFSET / LIMIT for order listings.
///
/// Expects `orders o` joined with `customers c`; binds are `$1..$6`, see
/// [`bind_filter`].
macro_rules! order_filter {
    () => {
        " WHERE ($1::uuid IS NULL OR o.order_id = $1) \
           AND ($2::text IS NULL OR strpos(c.name, $2) > 0) \
           AND ($3::text IS NULL OR o.status = $3) \
           AND ($4::uuid IS NULL OR o.customer_id = $4) \
         ORDER BY o.placed_at ASC, o.order_id ASC \
         OFFSET $5 LIMIT $6"
    };
}

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
    queries: Arc<AtomicU64>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            queries: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Open a pool against `database_url`.
    #[instrument(skip(database_url), err)]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the storefront tables if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    fn bump(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    async fn conn(&self) -> Result<sqlx::pool::PoolConnection<Postgres>, StoreError> {
        self.pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))
    }
}

#[async_trait]
impl TransactionalStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(Box::new(PostgresUnitOfWork { tx }))
    }
}

struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn customer(&mut self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        load_customer(&mut self.tx, id, false).await
    }

    async fn customer_for_update(
        &mut self,
        id: CustomerId,
    ) -> Result<Option<Customer>, StoreError> {
        load_customer(&mut self.tx, id, true).await
    }

    async fn customers_named(&mut self, name: &str) -> Result<Vec<Customer>, StoreError> {
        let rows = sqlx::query(concat!(customer_select!(), " WHERE c.name = $1"))
            .bind(name)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("customers_named", e))?;
        rows.iter().map(customer_from_row).collect()
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn item_for_update(&mut self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query(concat!(item_select!(), " WHERE i.item_id = $1 FOR UPDATE"))
            .bind(id.0.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("item_for_update", e))?;
        row.as_ref().map(item_from_row).transpose()
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        load_order(&mut self.tx, id, true).await
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.id_typed()), err)]
    async fn insert_customer(&mut self, customer: &Customer) -> Result<(), StoreError> {
        let address = customer.address();
        sqlx::query(
            r#"
            INSERT INTO customers (customer_id, name, city, street, zipcode)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(customer.id_typed().0.as_uuid())
        .bind(customer.name())
        .bind(address.city())
        .bind(address.street())
        .bind(address.zipcode())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_customer", e))?;
        Ok(())
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.id_typed()), err)]
    async fn update_customer(&mut self, customer: &Customer) -> Result<(), StoreError> {
        let address = customer.address();
        sqlx::query(
            r#"
            UPDATE customers
            SET name = $2, city = $3, street = $4, zipcode = $5
            WHERE customer_id = $1
            "#,
        )
        .bind(customer.id_typed().0.as_uuid())
        .bind(customer.name())
        .bind(address.city())
        .bind(address.street())
        .bind(address.zipcode())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_customer", e))?;
        Ok(())
    }

    #[instrument(skip(self, item), fields(item_id = %item.id_typed()), err)]
    async fn insert_item(&mut self, item: &Item) -> Result<(), StoreError> {
        let [author, isbn, artist, etc, director, actor] = kind_columns(item.kind());
        sqlx::query(
            r#"
            INSERT INTO items
                (item_id, name, price, stock, kind, author, isbn, artist, etc, director, actor)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(item.id_typed().0.as_uuid())
        .bind(item.name())
        .bind(money_to_sql(item.price())?)
        .bind(item.stock())
        .bind(item.kind().tag())
        .bind(author)
        .bind(isbn)
        .bind(artist)
        .bind(etc)
        .bind(director)
        .bind(actor)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;
        Ok(())
    }

    #[instrument(skip(self, item), fields(item_id = %item.id_typed(), stock = item.stock()), err)]
    async fn save_item(&mut self, item: &Item) -> Result<(), StoreError> {
        sqlx::query("UPDATE items SET name = $2, price = $3, stock = $4 WHERE item_id = $1")
            .bind(item.id_typed().0.as_uuid())
            .bind(item.name())
            .bind(money_to_sql(item.price())?)
            .bind(item.stock())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("save_item", e))?;
        Ok(())
    }

    #[instrument(
        skip(self, order),
        fields(order_id = %order.id_typed(), line_count = order.lines().len()),
        err
    )]
    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        let order_id = *order.id_typed().0.as_uuid();

        sqlx::query(
            r#"
            INSERT INTO orders (order_id, customer_id, placed_at, status)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order_id)
        .bind(order.customer_id().0.as_uuid())
        .bind(order.placed_at())
        .bind(order.status().as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        let address = order.delivery_address();
        sqlx::query(
            r#"
            INSERT INTO deliveries (order_id, city, street, zipcode)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order_id)
        .bind(address.city())
        .bind(address.street())
        .bind(address.zipcode())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_delivery", e))?;

        for line in order.lines() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, line_no, item_id, unit_price, quantity)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order_id)
            .bind(line.line_no as i32)
            .bind(line.item_id.0.as_uuid())
            .bind(money_to_sql(line.unit_price)?)
            .bind(line.quantity)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_line", e))?;
        }

        Ok(())
    }

    #[instrument(skip(self, order), fields(order_id = %order.id_typed(), status = %order.status()), err)]
    async fn update_order_status(&mut self, order: &Order) -> Result<(), StoreError> {
        sqlx::query("UPDATE orders SET status = $2 WHERE order_id = $1")
            .bind(order.id_typed().0.as_uuid())
            .bind(order.status().as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_order_status", e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }
}

#[async_trait]
impl ReadStore for PostgresStore {
    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        // Order row plus lines: two round trips.
        self.bump();
        self.bump();
        let mut conn = self.conn().await?;
        load_order(&mut conn, id, false).await
    }

    async fn find_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        self.bump();
        let mut conn = self.conn().await?;
        load_customer(&mut conn, id, false).await
    }

    async fn find_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        self.bump();
        let row = sqlx::query(concat!(item_select!(), " WHERE i.item_id = $1"))
            .bind(id.0.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_item", e))?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn all_customers(&self) -> Result<Vec<Customer>, StoreError> {
        self.bump();
        let rows = sqlx::query(concat!(customer_select!(), " ORDER BY c.created_seq"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("all_customers", e))?;
        rows.iter().map(customer_from_row).collect()
    }

    async fn all_items(&self) -> Result<Vec<Item>, StoreError> {
        self.bump();
        let rows = sqlx::query(concat!(item_select!(), " ORDER BY i.created_seq"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("all_items", e))?;
        rows.iter().map(item_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn order_rows(
        &self,
        filter: &OrderFilter,
        page: Page,
    ) -> Result<Vec<OrderRow>, StoreError> {
        self.bump();
        let query = sqlx::query(concat!(
            "SELECT o.order_id, o.customer_id, o.placed_at, o.status \
             FROM orders o JOIN customers c ON c.customer_id = o.customer_id",
            order_filter!()
        ));
        let rows = bind_filter(query, filter, page)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("order_rows", e))?;

        rows.iter()
            .map(|row| {
                Ok(OrderRow {
                    order_id: OrderId::new(AggregateId::from_uuid(column(row, "order", "order_id")?)),
                    customer_id: CustomerId::new(AggregateId::from_uuid(column(
                        row,
                        "order",
                        "customer_id",
                    )?)),
                    placed_at: column(row, "order", "placed_at")?,
                    status: status_from_row(row)?,
                })
            })
            .collect()
    }

    async fn delivery_address(&self, order_id: OrderId) -> Result<Option<Address>, StoreError> {
        self.bump();
        let row = sqlx::query(
            "SELECT d.city, d.street, d.zipcode FROM deliveries d WHERE d.order_id = $1",
        )
        .bind(order_id.0.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("delivery_address", e))?;
        row.as_ref()
            .map(|row| address_from_row(row, "delivery"))
            .transpose()
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>, StoreError> {
        self.bump();
        let mut conn = self.conn().await?;
        load_lines(&mut conn, order_id).await
    }

    #[instrument(skip(self), err)]
    async fn order_summaries(
        &self,
        filter: &OrderFilter,
        page: Page,
    ) -> Result<Vec<OrderSummary>, StoreError> {
        self.bump();
        let query = sqlx::query(concat!(
            "SELECT o.order_id, c.name AS customer_name, o.placed_at, o.status, \
                    d.city, d.street, d.zipcode \
             FROM orders o \
             JOIN customers c ON c.customer_id = o.customer_id \
             JOIN deliveries d ON d.order_id = o.order_id",
            order_filter!()
        ));
        let rows = bind_filter(query, filter, page)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("order_summaries", e))?;

        rows.iter()
            .map(|row| {
                Ok(OrderSummary {
                    order_id: OrderId::new(AggregateId::from_uuid(column(row, "order", "order_id")?)),
                    customer_name: column(row, "order", "customer_name")?,
                    placed_at: column(row, "order", "placed_at")?,
                    status: status_from_row(row)?,
                    delivery_address: address_from_row(row, "delivery")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self, order_ids), fields(order_count = order_ids.len()), err)]
    async fn lines_for_orders(
        &self,
        order_ids: &[OrderId],
    ) -> Result<Vec<OrderLineProjection>, StoreError> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.bump();
        let ids: Vec<Uuid> = order_ids.iter().map(|id| *id.0.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT ol.order_id, i.name AS item_name, ol.unit_price, ol.quantity
            FROM order_lines ol
            JOIN items i ON i.item_id = ol.item_id
            WHERE ol.order_id = ANY($1)
            ORDER BY ol.order_id ASC, ol.line_no ASC
            "#,
        )
        .bind(ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("lines_for_orders", e))?;

        rows.iter().map(line_projection_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn flat_rows(&self) -> Result<Vec<OrderFlatRow>, StoreError> {
        self.bump();
        let rows = sqlx::query(
            r#"
            SELECT o.order_id, c.name AS customer_name, o.placed_at, o.status,
                   d.city, d.street, d.zipcode,
                   i.name AS item_name, ol.unit_price, ol.quantity
            FROM orders o
            JOIN customers c ON c.customer_id = o.customer_id
            JOIN deliveries d ON d.order_id = o.order_id
            JOIN order_lines ol ON ol.order_id = o.order_id
            JOIN items i ON i.item_id = ol.item_id
            ORDER BY o.placed_at ASC, o.order_id ASC, ol.line_no ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("flat_rows", e))?;

        rows.iter()
            .map(|row| {
                let line = line_projection_from_row(row)?;
                Ok(OrderFlatRow {
                    order_id: line.order_id,
                    customer_name: column(row, "order", "customer_name")?,
                    placed_at: column(row, "order", "placed_at")?,
                    status: status_from_row(row)?,
                    delivery_address: address_from_row(row, "delivery")?,
                    item_name: line.item_name,
                    unit_price: line.unit_price,
                    quantity: line.quantity,
                })
            })
            .collect()
    }

    fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }
}

fn bind_filter<'q>(
    query: Query<'q, Postgres, PgArguments>,
    filter: &'q OrderFilter,
    page: Page,
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(filter.order_id.map(|id| *id.0.as_uuid()))
        .bind(filter.customer_name.as_deref())
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.customer_id.map(|id| *id.0.as_uuid()))
        .bind(i64::from(page.offset))
        .bind(i64::from(page.limit))
}

async fn load_customer(
    conn: &mut PgConnection,
    id: CustomerId,
    for_update: bool,
) -> Result<Option<Customer>, StoreError> {
    let sql = if for_update {
        concat!(customer_select!(), " WHERE c.customer_id = $1 FOR UPDATE")
    } else {
        concat!(customer_select!(), " WHERE c.customer_id = $1")
    };
    let row = sqlx::query(sql)
        .bind(id.0.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("load_customer", e))?;
    row.as_ref().map(customer_from_row).transpose()
}

async fn load_order(
    conn: &mut PgConnection,
    id: OrderId,
    for_update: bool,
) -> Result<Option<Order>, StoreError> {
    const BASE: &str = "SELECT o.order_id, o.customer_id, o.placed_at, o.status, \
                               d.city, d.street, d.zipcode \
                        FROM orders o JOIN deliveries d ON d.order_id = o.order_id \
                        WHERE o.order_id = $1";
    let sql = if for_update {
        format!("{BASE} FOR UPDATE OF o")
    } else {
        BASE.to_string()
    };

    let Some(row) = sqlx::query(&sql)
        .bind(id.0.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("load_order", e))?
    else {
        return Ok(None);
    };

    let lines = load_lines(conn, id).await?;
    let customer_id: Uuid = column(&row, "order", "customer_id")?;
    let placed_at: DateTime<Utc> = column(&row, "order", "placed_at")?;

    Order::restore(
        id,
        CustomerId::new(AggregateId::from_uuid(customer_id)),
        placed_at,
        status_from_row(&row)?,
        address_from_row(&row, "delivery")?,
        lines,
    )
    .map(Some)
    .map_err(|e| StoreError::from_domain("order", e))
}

async fn load_lines(conn: &mut PgConnection, order_id: OrderId) -> Result<Vec<OrderLine>, StoreError> {
    let rows = sqlx::query(
        r#"
        SELECT line_no, item_id, unit_price, quantity
        FROM order_lines
        WHERE order_id = $1
        ORDER BY line_no ASC
        "#,
    )
    .bind(order_id.0.as_uuid())
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("load_lines", e))?;

    rows.iter()
        .map(|row| {
            let line_no: i32 = column(row, "order line", "line_no")?;
            let item_id: Uuid = column(row, "order line", "item_id")?;
            Ok(OrderLine {
                line_no: u32::try_from(line_no).map_err(|e| StoreError::decode("order line", e))?,
                item_id: ItemId::new(AggregateId::from_uuid(item_id)),
                unit_price: money_from_sql(column(row, "order line", "unit_price")?, "order line")?,
                quantity: column(row, "order line", "quantity")?,
            })
        })
        .collect()
}

fn column<'r, T>(row: &'r PgRow, entity: &'static str, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name).map_err(|e| StoreError::decode(entity, e))
}

fn customer_from_row(row: &PgRow) -> Result<Customer, StoreError> {
    let id: Uuid = column(row, "customer", "customer_id")?;
    Ok(Customer::restore(
        CustomerId::new(AggregateId::from_uuid(id)),
        column(row, "customer", "name")?,
        address_from_row(row, "customer")?,
    ))
}

fn address_from_row(row: &PgRow, entity: &'static str) -> Result<Address, StoreError> {
    let city: String = column(row, entity, "city")?;
    let street: String = column(row, entity, "street")?;
    let zipcode: String = column(row, entity, "zipcode")?;
    Ok(Address::new(city, street, zipcode))
}

fn status_from_row(row: &PgRow) -> Result<OrderStatus, StoreError> {
    let status: String = column(row, "order", "status")?;
    OrderStatus::parse(&status).map_err(|e| StoreError::from_domain("order", e))
}

fn item_from_row(row: &PgRow) -> Result<Item, StoreError> {
    let id: Uuid = column(row, "item", "item_id")?;
    Item::restore(
        ItemId::new(AggregateId::from_uuid(id)),
        column(row, "item", "name")?,
        money_from_sql(column(row, "item", "price")?, "item")?,
        column(row, "item", "stock")?,
        kind_from_row(row)?,
    )
    .map_err(|e| StoreError::from_domain("item", e))
}

fn kind_from_row(row: &PgRow) -> Result<ItemKind, StoreError> {
    let text = |name: &str| -> Result<String, StoreError> {
        Ok(column::<Option<String>>(row, "item", name)?.unwrap_or_default())
    };
    let tag: String = column(row, "item", "kind")?;
    match tag.as_str() {
        "book" => Ok(ItemKind::Book {
            author: text("author")?,
            isbn: text("isbn")?,
        }),
        "album" => Ok(ItemKind::Album {
            artist: text("artist")?,
            etc: text("etc")?,
        }),
        "movie" => Ok(ItemKind::Movie {
            director: text("director")?,
            actor: text("actor")?,
        }),
        other => Err(StoreError::decode("item", format!("unknown kind {other:?}"))),
    }
}

/// `[author, isbn, artist, etc, director, actor]` for the single-table item layout.
fn kind_columns(kind: &ItemKind) -> [Option<&str>; 6] {
    match kind {
        ItemKind::Book { author, isbn } => {
            [Some(author.as_str()), Some(isbn.as_str()), None, None, None, None]
        }
        ItemKind::Album { artist, etc } => {
            [None, None, Some(artist.as_str()), Some(etc.as_str()), None, None]
        }
        ItemKind::Movie { director, actor } => {
            [None, None, None, None, Some(director.as_str()), Some(actor.as_str())]
        }
    }
}

fn line_projection_from_row(row: &PgRow) -> Result<OrderLineProjection, StoreError> {
    let order_id: Uuid = column(row, "order line", "order_id")?;
    Ok(OrderLineProjection {
        order_id: OrderId::new(AggregateId::from_uuid(order_id)),
        item_name: column(row, "order line", "item_name")?,
        unit_price: money_from_sql(column(row, "order line", "unit_price")?, "order line")?,
        quantity: column(row, "order line", "quantity")?,
    })
}

fn money_to_sql(amount: u64) -> Result<i64, StoreError> {
    i64::try_from(amount).map_err(|_| StoreError::Database(format!("amount {amount} exceeds BIGINT")))
}

fn money_from_sql(amount: i64, entity: &'static str) -> Result<u64, StoreError> {
    u64::try_from(amount).map_err(|_| StoreError::decode(entity, format!("negative amount {amount}")))
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Unique violation
                Some("23505") => StoreError::Conflict(msg),
                // Serialization failure, deadlock detected
                Some("40001") | Some("40P01") => StoreError::Conflict(msg),
                _ => StoreError::Database(msg),
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool unavailable in {}", operation))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {}: {}", operation, e)),
        e @ (sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_)) => {
            StoreError::decode("row", format!("{operation}: {e}"))
        }
        _ => StoreError::Database(format!("sqlx error in {}: {}", operation, err)),
    }
}
