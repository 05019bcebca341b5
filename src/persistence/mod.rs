//! The persistence port: an opaque append-only sink for orders and
//! executions (§4.7).
//!
//! Real durable backends are external collaborators (§1 scope) — this
//! module defines the contract and ships one in-process reference
//! implementation, [`InMemoryPersistence`], sufficient for tests and as
//! the simulator binary's default.

mod memory;

use thiserror::Error;

pub use memory::InMemoryPersistence;

use crate::domain::{Execution, Order, OrderId, OrderStatus};

/// Failures from the persistence port (§7 `PersistenceError`).
///
/// Per §4.7/§7, these never fail the matching path — callers log them and
/// increment an observability counter instead of propagating.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum PersistenceError {
    #[error("persistence backend unavailable: {0}")]
    Unavailable(String),
}

/// The append-only order/execution sink contract (§4.7).
///
/// Implementations must be thread-safe and idempotent on
/// `(order_id, status, filled_qty)` — saving the same logical state twice
/// must not create duplicate records.
pub trait PersistencePort: Send + Sync {
    fn save_order(&self, order: &Order) -> Result<(), PersistenceError>;
    fn save_execution(&self, execution: &Execution) -> Result<(), PersistenceError>;
    fn find_order(&self, order_id: OrderId) -> Option<Order>;
    fn orders_by_symbol(&self, symbol: &str) -> Vec<Order>;
    fn orders_by_status(&self, status: OrderStatus) -> Vec<Order>;
    fn recent_executions(&self, limit: usize) -> Vec<Execution>;
    fn count_orders(&self) -> usize;
}
