//! The event bus: a single-writer, multi-reader ordered stream of book and
//! execution events (§4.6).

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

use crate::book::Depth;
use crate::domain::{Execution, Order, OrderId, OrderStatus};

/// The payload carried by one event-bus message (§6 event envelope).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BusEvent {
    Snapshot {
        symbol: String,
        bids: Depth,
        asks: Depth,
        recent_executions: Vec<Execution>,
    },
    NewOrder {
        order: Order,
    },
    CancelOrder {
        order_id: OrderId,
        status: OrderStatus,
    },
    Execution {
        execution: Execution,
        order_states: Vec<Order>,
    },
}

/// An envelope wrapping a [`BusEvent`] with the delivery timestamp (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEnvelope {
    #[serde(flatten)]
    pub event: BusEvent,
    pub timestamp: u64,
}

/// Default channel capacity. Subscribers that fall more than this many
/// events behind are dropped (`tokio::sync::broadcast`'s documented
/// behavior), which is the mechanical expression of §4.6's "subscribers
/// that fall behind are dropped; back-pressure is not propagated to the
/// matching engine."
pub const DEFAULT_CAPACITY: usize = 4096;

/// Ordered, best-effort-to-external-subscribers broadcast of order book and
/// execution events (C6).
///
/// In-process critical paths (persistence, session reply) must not rely on
/// this bus for delivery guarantees — they are driven synchronously by the
/// caller (the matching engine), which publishes to this bus *after* those
/// synchronous steps complete, preserving ordering across all three
/// destinations (§4.6, §5 ordering guarantees).
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusEnvelope>,
}

impl BusEnvelope {
    /// Renders the envelope as the JSON object external subscribers receive
    /// (§6 "Event-bus message envelope": `{type, data, timestamp}`).
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to the bus. The new subscriber only observes events
    /// published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<BusEnvelope> {
        self.sender.subscribe()
    }

    /// Publishes `event` with the given `timestamp`. A publish with no
    /// subscribers is not an error — it is simply a no-op delivery.
    pub fn publish(&self, event: BusEvent, timestamp: u64) {
        let envelope = BusEnvelope { event, timestamp };
        if let Err(err) = self.sender.send(envelope) {
            warn!(error = %err, "event bus publish had no active subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A subscriber's view of the bus: a batch of `Snapshot` envelopes queued at
/// attach time (§4.6/§6 "Snapshot is sent once per subscriber on attach"),
/// drained before the live broadcast stream is forwarded.
///
/// Built by [`crate::engine::MatchingEngine::subscribe`], which is the only
/// place with enough context (the book registry, the persistence port) to
/// construct the snapshots; `EventBus` itself only knows about the
/// broadcast channel.
pub struct Subscription {
    pending: VecDeque<BusEnvelope>,
    receiver: broadcast::Receiver<BusEnvelope>,
}

impl Subscription {
    pub fn new(pending: Vec<BusEnvelope>, receiver: broadcast::Receiver<BusEnvelope>) -> Self {
        Self {
            pending: pending.into(),
            receiver,
        }
    }

    /// Yields queued snapshot envelopes first, then live events in publish
    /// order.
    pub async fn recv(&mut self) -> Result<BusEnvelope, broadcast::error::RecvError> {
        if let Some(envelope) = self.pending.pop_front() {
            return Ok(envelope);
        }
        self.receiver.recv().await
    }
}
