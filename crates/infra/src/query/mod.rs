//! Order listing: filters, pagination and the retrieval strategies.

mod repository;

pub use repository::OrderQueryRepository;

use serde::{Deserialize, Serialize};

use storefront_customers::CustomerId;
use storefront_orders::{OrderId, OrderStatus};

pub const DEFAULT_PAGE_LIMIT: u32 = 100;
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// Offset/limit window applied to the order-level query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Number of orders to skip (0-based).
    pub offset: u32,
    /// Maximum number of orders to return.
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl Page {
    pub fn new(offset: Option<u32>, limit: Option<u32>) -> Self {
        Self::with_limits(offset, limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT)
    }

    /// Like [`Page::new`] with configured default and maximum limits.
    pub fn with_limits(
        offset: Option<u32>,
        limit: Option<u32>,
        default_limit: u32,
        max_limit: u32,
    ) -> Self {
        Self {
            offset: offset.unwrap_or(0),
            limit: limit.unwrap_or(default_limit).min(max_limit),
        }
    }

    /// Clamp the limit to `max_limit`.
    pub fn capped(self, max_limit: u32) -> Self {
        Self {
            offset: self.offset,
            limit: self.limit.min(max_limit),
        }
    }

    /// The slice of `0..len` this page selects.
    pub fn range(&self, len: usize) -> std::ops::Range<usize> {
        let start = (self.offset as usize).min(len);
        let end = start.saturating_add(self.limit as usize).min(len);
        start..end
    }
}

/// Predicate over orders. Every `None` field matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFilter {
    /// Single-order lookup.
    pub order_id: Option<OrderId>,
    /// Matches when the customer's name contains this text.
    pub customer_name: Option<String>,
    pub status: Option<OrderStatus>,
    pub customer_id: Option<CustomerId>,
}

impl OrderFilter {
    pub fn by_id(order_id: OrderId) -> Self {
        Self {
            order_id: Some(order_id),
            ..Self::default()
        }
    }

    pub fn customer_name_contains(mut self, text: impl Into<String>) -> Self {
        self.customer_name = Some(text.into());
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn for_customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn matches(
        &self,
        order_id: OrderId,
        customer_id: CustomerId,
        customer_name: &str,
        status: OrderStatus,
    ) -> bool {
        self.order_id.is_none_or(|id| id == order_id)
            && self.customer_id.is_none_or(|id| id == customer_id)
            && self.status.is_none_or(|s| s == status)
            && self
                .customer_name
                .as_deref()
                .is_none_or(|text| customer_name.contains(text))
    }
}
