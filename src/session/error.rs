//! Errors raised by session-level state transitions (§7 `StateError`).

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum StateError {
    #[error("Order not found")]
    OrderNotFound,

    #[error("operation attempted before logon")]
    NotLoggedIn,

    #[error("sequence number gap: expected {expected}, got {actual}")]
    SequenceGap { expected: u32, actual: u32 },
}
