//! Orders domain module: the Order aggregate.
//!
//! An order and its lines are created atomically by `Order::place`, which
//! draws stock through the catalog ledger. `Order::cancel` is the only
//! status change after creation and puts the stock back.

pub mod order;

pub use order::{LineRequest, Order, OrderId, OrderLine, OrderStatus};
