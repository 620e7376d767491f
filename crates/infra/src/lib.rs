//! Infrastructure layer: stores, order listings and their projections.

pub mod projection;
pub mod query;
pub mod store;

pub use projection::{OrderFlatRow, OrderLineProjection, OrderProjection, OrderSummary, regroup};
pub use query::{OrderFilter, OrderQueryRepository, Page};
pub use store::{
    InMemoryStore, OrderRow, PostgresStore, ReadStore, Store, StoreError, TransactionalStore,
    UnitOfWork,
};
