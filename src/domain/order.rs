//! The `Order` aggregate and its lifecycle (§3).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Server-assigned identifier, unique within a process lifetime.
pub type OrderId = u64;

/// Monotonic generator for [`OrderId`] and execution IDs (§3: "server-assigned
/// monotonically increasing identifier").
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { next: AtomicU64::new(1) }
    }

    /// Returns the next identifier and advances the counter.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side a resting order on the opposite book would need to be on
    /// to cross with an order on `self`.
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Market or Limit (§1 Non-goals: no Stop, IOC, FOK, GTD).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    Limit,
}

/// FIX `OrdStatus` states an order can occupy (§3 invariants: the DAG
/// New → {PartiallyFilled, Filled, Canceled}, PartiallyFilled → {Filled,
/// Canceled}, any → Rejected only at entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
}

impl OrderStatus {
    /// Terminal statuses are removed from the book (§3).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected
        )
    }
}

/// A resting or matched order (§3 data model).
///
/// Once accepted into an [`crate::book::OrderBook`], the book is the sole
/// owner; sessions keep only the [`OrderId`] (§9 "Ownership of Orders").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub client_order_id: String,
    pub symbol: String,
    pub side: Side,
    pub kind: OrderKind,
    pub qty: u64,
    pub filled_qty: u64,
    /// Required for `Limit`, unused for `Market`.
    pub price: Option<Decimal>,
    pub status: OrderStatus,
    /// Local monotonic sequence number assigned at book insertion; the
    /// tiebreaker for time priority within a price level.
    pub timestamp: u64,
}

impl Order {
    /// `qty - filled_qty`, always `>= 0` by construction (§3 invariant).
    pub fn remaining(&self) -> u64 {
        self.qty - self.filled_qty
    }

    /// Applies a fill of `qty`, updating `filled_qty` and `status`.
    ///
    /// Panics if `qty` would over-fill the order; callers (the matching
    /// sweep) must never request more than `remaining()`.
    pub fn apply_fill(&mut self, qty: u64) {
        assert!(qty <= self.remaining(), "fill exceeds remaining quantity");
        self.filled_qty += qty;
        self.status = if self.filled_qty == self.qty {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }

    /// Marks the order canceled. Valid from any non-terminal status.
    pub fn cancel(&mut self) {
        self.status = OrderStatus::Canceled;
    }
}
