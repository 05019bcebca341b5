//! Core trading types shared by the order book, engine and session layers.

mod execution;
mod order;

pub use execution::{ExecId, Execution};
pub use order::{IdGenerator, Order, OrderId, OrderKind, OrderStatus, Side};
