//! Prelude module that re-exports the most commonly used types.
//!
//! ```rust
//! use exchange_core::prelude::*;
//! ```

pub use crate::book::{CancelOutcome, Depth, MatchOutcome, OrderBook, OrderBookError};
pub use crate::config::Config;
pub use crate::domain::{Execution, IdGenerator, Order, OrderId, OrderKind, OrderStatus, Side};
pub use crate::engine::{MatchingEngine, NewOrderRequest, SubmitOutcome};
pub use crate::events::{BusEnvelope, BusEvent, EventBus};
pub use crate::fix::{decode, encode, FixMessage, FixMessageBuilder, FrameSplitter, ProtocolError};
pub use crate::persistence::{InMemoryPersistence, PersistenceError, PersistencePort};
pub use crate::session::{Session, SessionState};
pub use crate::validator::ValidationError;
