use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_catalog::{Item, ItemId};
use storefront_core::{AggregateRoot, DomainError, DomainResult};
use storefront_customers::{Address, Customer, CustomerId};

storefront_core::typed_id!(
    /// Order identifier.
    OrderId,
    "OrderId"
);

/// Order status lifecycle. `Cancelled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Placed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "placed" => Ok(OrderStatus::Placed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::invariant(format!("unknown order status '{other}'"))),
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One requested line when placing an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    pub item_id: ItemId,
    pub quantity: i64,
}

impl LineRequest {
    pub fn new(item_id: ItemId, quantity: i64) -> Self {
        Self { item_id, quantity }
    }
}

/// Order line: item, quantity, unit price at the time of ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// 1-based position within the order.
    pub line_no: u32,
    pub item_id: ItemId,
    /// Price in smallest currency unit, captured when the order was placed.
    pub unit_price: u64,
    pub quantity: i64,
}

impl OrderLine {
    /// `unit_price × quantity`, or `None` when it does not fit in a `u64`.
    pub fn total_price(&self) -> Option<u64> {
        let quantity = u64::try_from(self.quantity).ok()?;
        self.unit_price.checked_mul(quantity)
    }
}

fn checked_total(lines: &[OrderLine]) -> Option<u64> {
    lines
        .iter()
        .try_fold(0u64, |total, line| total.checked_add(line.total_price()?))
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    customer_id: CustomerId,
    placed_at: DateTime<Utc>,
    status: OrderStatus,
    delivery_address: Address,
    lines: Vec<OrderLine>,
}

impl Order {
    /// Place a new order, drawing stock for every requested line.
    ///
    /// `items` holds the items loaded for update in the caller's unit of work.
    /// On error some of them may already be decremented; the caller discards
    /// them by rolling the unit of work back.
    pub fn place(
        id: OrderId,
        customer: &Customer,
        requests: &[LineRequest],
        items: &mut HashMap<ItemId, Item>,
        placed_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if requests.is_empty() {
            return Err(DomainError::validation("an order needs at least one line"));
        }
        if requests.iter().any(|r| r.quantity <= 0) {
            return Err(DomainError::validation("quantity must be positive"));
        }

        let mut lines = Vec::with_capacity(requests.len());
        for (idx, request) in requests.iter().enumerate() {
            let item = items
                .get_mut(&request.item_id)
                .ok_or_else(|| DomainError::not_found("item", request.item_id))?;
            item.decrement(request.quantity)?;
            lines.push(OrderLine {
                line_no: idx as u32 + 1,
                item_id: request.item_id,
                unit_price: item.price(),
                quantity: request.quantity,
            });
        }
        if checked_total(&lines).is_none() {
            return Err(DomainError::validation("order total is too large"));
        }

        Ok(Self {
            id,
            customer_id: customer.id_typed(),
            placed_at,
            status: OrderStatus::Placed,
            delivery_address: customer.address().clone(),
            lines,
        })
    }

    /// Rebuild an order from persisted parts (stores only).
    pub fn restore(
        id: OrderId,
        customer_id: CustomerId,
        placed_at: DateTime<Utc>,
        status: OrderStatus,
        delivery_address: Address,
        mut lines: Vec<OrderLine>,
    ) -> DomainResult<Self> {
        if lines.is_empty() {
            return Err(DomainError::invariant(format!("order {id} has no lines")));
        }
        if lines.iter().any(|l| l.quantity <= 0) {
            return Err(DomainError::invariant(format!(
                "order {id} has a line with non-positive quantity"
            )));
        }
        if checked_total(&lines).is_none() {
            return Err(DomainError::invariant(format!(
                "order {id} has a total that overflows"
            )));
        }
        lines.sort_by_key(|l| l.line_no);
        Ok(Self {
            id,
            customer_id,
            placed_at,
            status,
            delivery_address,
            lines,
        })
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn placed_at(&self) -> DateTime<Utc> {
        self.placed_at
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn delivery_address(&self) -> &Address {
        &self.delivery_address
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(self.status, OrderStatus::Placed)
    }

    /// Cancel the order and put every line's quantity back into stock.
    ///
    /// Nothing is touched when the order is already cancelled or a line's
    /// item is missing from `items`.
    pub fn cancel(&mut self, items: &mut HashMap<ItemId, Item>) -> DomainResult<()> {
        if !self.is_cancellable() {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.as_str(),
                to: OrderStatus::Cancelled.as_str(),
            });
        }
        if let Some(missing) = self.lines.iter().find(|l| !items.contains_key(&l.item_id)) {
            return Err(DomainError::not_found("item", missing.item_id));
        }

        for line in &self.lines {
            if let Some(item) = items.get_mut(&line.item_id) {
                item.increment(line.quantity)?;
            }
        }

        self.status = OrderStatus::Cancelled;
        Ok(())
    }

    /// Sum of `unit_price × quantity` over all lines.
    ///
    /// `place` and `restore` reject lines whose total overflows, so the
    /// saturating fallback is never taken.
    pub fn total_price(&self) -> u64 {
        checked_total(&self.lines).unwrap_or(u64::MAX)
    }

    /// Distinct item ids referenced by the lines, in first-seen order.
    pub fn item_ids(&self) -> Vec<ItemId> {
        let mut seen = HashSet::with_capacity(self.lines.len());
        self.lines
            .iter()
            .map(|l| l.item_id)
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
