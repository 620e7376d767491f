//! Client-facing order shapes and regrouping of flat join rows.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_customers::Address;
use storefront_orders::{OrderId, OrderStatus};

/// Order-level fields without lines (customer and delivery joined in).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub customer_name: String,
    pub placed_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub delivery_address: Address,
}

/// One line of an order, with the item name resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineProjection {
    pub order_id: OrderId,
    pub item_name: String,
    /// Unit price at the time of ordering.
    pub unit_price: u64,
    pub quantity: i64,
}

impl OrderLineProjection {
    /// `unit_price × quantity`, saturating at `u64::MAX`.
    pub fn total_price(&self) -> u64 {
        let quantity = u64::try_from(self.quantity).unwrap_or(0);
        self.unit_price.saturating_mul(quantity)
    }
}

/// Nested order shape: order fields once, lines underneath.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderProjection {
    pub order_id: OrderId,
    pub customer_name: String,
    pub placed_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub delivery_address: Address,
    pub lines: Vec<OrderLineProjection>,
}

impl OrderProjection {
    pub fn from_summary(summary: OrderSummary, lines: Vec<OrderLineProjection>) -> Self {
        Self {
            order_id: summary.order_id,
            customer_name: summary.customer_name,
            placed_at: summary.placed_at,
            status: summary.status,
            delivery_address: summary.delivery_address,
            lines,
        }
    }

    pub fn summary(&self) -> OrderSummary {
        OrderSummary {
            order_id: self.order_id,
            customer_name: self.customer_name.clone(),
            placed_at: self.placed_at,
            status: self.status,
            delivery_address: self.delivery_address.clone(),
        }
    }

    /// Sum of the line totals. Orders are rejected at placement when this
    /// would exceed `u64::MAX`, so saturation only shows up on corrupt rows.
    pub fn total_price(&self) -> u64 {
        self.lines
            .iter()
            .map(OrderLineProjection::total_price)
            .fold(0, u64::saturating_add)
    }
}

/// One row of the full order ⋈ customer ⋈ delivery ⋈ line ⋈ item join.
///
/// Order-level fields repeat on every row of the same order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFlatRow {
    pub order_id: OrderId,
    pub customer_name: String,
    pub placed_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub delivery_address: Address,
    pub item_name: String,
    pub unit_price: u64,
    pub quantity: i64,
}

impl OrderFlatRow {
    fn into_parts(self) -> (OrderSummary, OrderLineProjection) {
        let line = OrderLineProjection {
            order_id: self.order_id,
            item_name: self.item_name,
            unit_price: self.unit_price,
            quantity: self.quantity,
        };
        let summary = OrderSummary {
            order_id: self.order_id,
            customer_name: self.customer_name,
            placed_at: self.placed_at,
            status: self.status,
            delivery_address: self.delivery_address,
        };
        (summary, line)
    }
}

/// Collapse flat join rows back into nested orders.
///
/// Rows are partitioned by order id alone. Orders come out in the order they
/// were first seen and each keeps its lines in row order. Orders without
/// lines never reach this function: the flat join is an inner join.
pub fn regroup(rows: impl IntoIterator<Item = OrderFlatRow>) -> Vec<OrderProjection> {
    let mut position: HashMap<OrderId, usize> = HashMap::new();
    let mut orders: Vec<OrderProjection> = Vec::new();

    for row in rows {
        let (summary, line) = row.into_parts();
        match position.get(&summary.order_id) {
            Some(&idx) => orders[idx].lines.push(line),
            None => {
                position.insert(summary.order_id, orders.len());
                orders.push(OrderProjection::from_summary(summary, vec![line]));
            }
        }
    }

    orders
}

/// Group batch-fetched lines by their order id, keeping fetch order per order.
pub fn group_lines_by_order(
    lines: impl IntoIterator<Item = OrderLineProjection>,
) -> HashMap<OrderId, Vec<OrderLineProjection>> {
    let mut grouped: HashMap<OrderId, Vec<OrderLineProjection>> = HashMap::new();
    for line in lines {
        grouped.entry(line.order_id).or_default().push(line);
    }
    grouped
}
