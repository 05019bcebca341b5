//! The `Execution` record produced when two orders cross (§3).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::order::OrderId;

/// Server-assigned identifier for an execution, unique within a process
/// lifetime.
pub type ExecId = u64;

/// An immutable record of a single cross between a buy and a sell order
/// (§3: "Executions are immutable once emitted").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub exec_id: ExecId,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub symbol: String,
    /// Always positive (§8 invariant 2).
    pub last_qty: u64,
    /// Always positive (§8 invariant 2).
    pub last_px: Decimal,
    pub timestamp: u64,
}
