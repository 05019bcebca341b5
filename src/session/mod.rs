//! Per-connection FIX session state machine (§4.5).
//!
//! A [`Session`] consumes decoded [`FixMessage`]s one at a time and returns
//! the outbound replies to write back to the peer. It does not own the
//! socket — [`crate::session::acceptor`] drives the read loop and owns
//! framing; this module only owns protocol state.

mod error;
mod state;

pub mod acceptor;

pub use error::StateError;
pub use state::SessionState;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::book::CancelOutcome;
use crate::domain::{Execution, Order, OrderId, OrderKind, OrderStatus, Side};
use crate::engine::{MatchingEngine, NewOrderRequest};
use crate::fix::tags::{self, FixExecType, FixOrdStatus, FixOrdType, FixSide, MsgType};
use crate::fix::{FixMessage, FixMessageBuilder};
use crate::util::current_time_millis;
use crate::validator::ValidationError;

/// A message this session wants written back to the peer, already sequenced.
pub struct Outbound {
    pub seq: u32,
    pub builder: FixMessageBuilder,
}

/// What processing one inbound message produced.
pub struct SessionOutput {
    pub replies: Vec<Outbound>,
    /// Set once the session has entered [`SessionState::Closing`] or detected
    /// a condition the acceptor should close the socket for.
    pub close: bool,
}

impl SessionOutput {
    fn reply(builder: FixMessageBuilder, seq: u32) -> Self {
        Self {
            replies: vec![Outbound { seq, builder }],
            close: false,
        }
    }

    fn none() -> Self {
        Self { replies: vec![], close: false }
    }
}

/// Per-connection protocol state (§4.5 data model: `peer`, `sender_id`,
/// `target_id`, `is_logged_in`, `incoming_seq`, `outgoing_seq`,
/// `heartbeat_interval`, `last_activity`).
pub struct Session {
    sender_id: String,
    /// The peer's own declared identity (tag 49 off its Logon), trusted and
    /// recorded rather than pre-seeded (no authentication beyond the
    /// session header is in scope). `None` until Logon is processed.
    target_id: Option<String>,
    state: SessionState,
    incoming_seq: u32,
    outgoing_seq: u32,
    heartbeat_interval: Duration,
    last_received: Instant,
    last_sent: Instant,
    /// Per-session `ClOrdID → (symbol, OrderId)` index (§9 "Ownership of
    /// Orders": the session keeps only the id, never the `Order` itself).
    clord_index: HashMap<String, (String, OrderId)>,
    engine: Arc<MatchingEngine>,
}

impl Session {
    /// Creates a session for a freshly accepted connection, already in
    /// `AwaitingLogon` (the `tcp-accept` transition of §4.5's table is
    /// folded into construction since the acceptor only builds a `Session`
    /// once a socket is in hand).
    pub fn new(sender_id: impl Into<String>, engine: Arc<MatchingEngine>) -> Self {
        let now = Instant::now();
        Self {
            sender_id: sender_id.into(),
            target_id: None,
            state: SessionState::AwaitingLogon,
            incoming_seq: 1,
            outgoing_seq: 1,
            heartbeat_interval: Duration::from_secs(30),
            last_received: now,
            last_sent: now,
            clord_index: HashMap::new(),
            engine,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// The peer's declared identity, once Logon has been processed.
    pub fn target_id(&self) -> Option<&str> {
        self.target_id.as_deref()
    }

    /// True once `2 × heartbeat_interval` has elapsed with nothing received
    /// (§4.5 "consider the session dead and close").
    pub fn is_dead(&self, now: Instant) -> bool {
        now.duration_since(self.last_received) > self.heartbeat_interval * 2
    }

    /// True once `heartbeat_interval` has elapsed with nothing sent.
    pub fn needs_heartbeat(&self, now: Instant) -> bool {
        now.duration_since(self.last_sent) > self.heartbeat_interval
    }

    /// Builds an unsolicited Heartbeat reply, for the idle-timer path.
    pub fn heartbeat_reply(&mut self) -> Outbound {
        self.build_reply(FixMessageBuilder::new(MsgType::Heartbeat))
    }

    /// Every (symbol, order_id) this session has submitted that may still be
    /// resting, for the cancel-on-disconnect policy (§5, §9 Open Question
    /// (b)). Harmless to include already-terminal orders — cancel of a
    /// terminal order is just a no-op `NotFound` outcome.
    pub fn resting_order_ids(&self) -> Vec<(String, OrderId)> {
        self.clord_index.values().cloned().collect()
    }

    /// Processes one decoded message, advancing state and producing replies.
    ///
    /// Framing/checksum failures never reach this function — the acceptor
    /// intercepts `ProtocolError` at the decode step and emits a Session
    /// Reject itself (§4.5 "bad checksum / malformed: drop message silently
    /// or emit Session Reject; do not process").
    pub fn handle_message(&mut self, msg: FixMessage) -> SessionOutput {
        self.last_received = Instant::now();

        let seq: u32 = match msg.parse(tags::MSG_SEQ_NUM) {
            Ok(seq) => seq,
            Err(_) => return self.session_reject("invalid MsgSeqNum"),
        };
        if seq != self.incoming_seq {
            let expected = self.incoming_seq;
            warn!(expected, actual = seq, "sequence gap");
            let err = StateError::SequenceGap { expected, actual: seq };
            // §9 Open Question (c): no resend is requested; the gap is
            // reported once and the counter resynchronizes forward.
            self.incoming_seq = seq + 1;
            return self.session_reject(&err.to_string());
        }
        self.incoming_seq += 1;

        let Some(msg_type) = msg.msg_type() else {
            return self.session_reject("unsupported MsgType");
        };

        match (self.state, msg_type) {
            (SessionState::AwaitingLogon, MsgType::Logon) => self.handle_logon(&msg),
            (SessionState::AwaitingLogon, _) => self.session_reject(&StateError::NotLoggedIn.to_string()),
            (SessionState::LoggedIn, MsgType::Heartbeat) => {
                SessionOutput::reply(self.build_reply(FixMessageBuilder::new(MsgType::Heartbeat)).builder, 0)
            }
            (SessionState::LoggedIn, MsgType::NewOrderSingle) => self.handle_new_order(&msg),
            (SessionState::LoggedIn, MsgType::OrderCancelRequest) => self.handle_cancel(&msg),
            (SessionState::LoggedIn, MsgType::Logout) => self.handle_logout(),
            (SessionState::LoggedIn, _) => self.session_reject("unexpected message type"),
            (SessionState::Closing | SessionState::Disconnected, _) => SessionOutput::none(),
        }
    }

    fn handle_logon(&mut self, msg: &FixMessage) -> SessionOutput {
        let Some(declared_sender) = msg.get(tags::SENDER_COMP_ID) else {
            return self.session_reject("missing SenderCompID");
        };
        let target_ok = msg.get(tags::TARGET_COMP_ID) == Some(self.sender_id.as_str());
        if !target_ok {
            return self.session_reject("unrecognized target comp id");
        }
        let heartbeat_secs: u64 = match msg.parse(tags::HEART_BT_INT) {
            Ok(v) => v,
            Err(_) => return self.session_reject("invalid HeartBtInt"),
        };
        self.target_id = Some(declared_sender.to_string());
        self.heartbeat_interval = Duration::from_secs(heartbeat_secs);
        self.state = SessionState::LoggedIn;
        info!(sender = %self.sender_id, target = %declared_sender, heartbeat_secs, "session logged in");

        let builder = FixMessageBuilder::new(MsgType::Logon).field(tags::HEART_BT_INT, heartbeat_secs.to_string());
        let outbound = self.build_reply(builder);
        SessionOutput::reply(outbound.builder, outbound.seq)
    }

    fn handle_logout(&mut self) -> SessionOutput {
        self.state = SessionState::Closing;
        info!(sender = %self.sender_id, "session logging out");
        let outbound = self.build_reply(FixMessageBuilder::new(MsgType::Logout));
        SessionOutput {
            replies: vec![outbound],
            close: true,
        }
    }

    fn handle_new_order(&mut self, msg: &FixMessage) -> SessionOutput {
        // Business-required tags for a New Order Single (55/54/38/40, plus
        // 44 for Limit orders) are validated here rather than at the codec
        // layer: a missing tag must still produce a Rejected Execution
        // Report (§4.2, §7 ValidationError), not a silently dropped frame.
        let Some(client_order_id) = msg.get(tags::CL_ORD_ID) else {
            return self.reject_new_order("", ValidationError::MissingField("cl_ord_id"));
        };
        let client_order_id = client_order_id.to_string();
        if self.clord_index.contains_key(&client_order_id) {
            return self.reject_new_order(&client_order_id, ValidationError::DuplicateClOrdId);
        }

        let Some(symbol) = msg.get(tags::SYMBOL) else {
            return self.reject_new_order(&client_order_id, ValidationError::MissingField("symbol"));
        };
        let symbol = symbol.to_string();
        let side = match msg.get(tags::SIDE).and_then(FixSide::from_code) {
            Some(FixSide::Buy) => Side::Buy,
            Some(FixSide::Sell) => Side::Sell,
            None => return self.reject_new_order(&client_order_id, ValidationError::MissingField("side")),
        };
        let kind = match msg.get(tags::ORD_TYPE).and_then(FixOrdType::from_code) {
            Some(FixOrdType::Market) => OrderKind::Market,
            Some(FixOrdType::Limit) => OrderKind::Limit,
            None => return self.reject_new_order(&client_order_id, ValidationError::MissingField("ord_type")),
        };
        if msg.get(tags::ORDER_QTY).is_none() {
            return self.reject_new_order(&client_order_id, ValidationError::MissingField("order_qty"));
        }
        let qty: u64 = match msg.parse(tags::ORDER_QTY) {
            Ok(qty) => qty,
            Err(_) => return self.reject_new_order(&client_order_id, ValidationError::InvalidQuantity),
        };
        let price: Option<Decimal> = match kind {
            OrderKind::Market => None,
            OrderKind::Limit => {
                if msg.get(tags::PRICE).is_none() {
                    return self.reject_new_order(&client_order_id, ValidationError::MissingField("price"));
                }
                match msg.parse(tags::PRICE) {
                    Ok(price) => Some(price),
                    Err(_) => return self.reject_new_order(&client_order_id, ValidationError::InvalidPrice),
                }
            }
        };

        let outcome = self.engine.submit(NewOrderRequest {
            client_order_id: client_order_id.clone(),
            symbol: symbol.clone(),
            side,
            kind,
            qty,
            price,
        });

        let taker_order_id = outcome.orders.first().map(|o| o.order_id);
        if let Some(order_id) = taker_order_id {
            self.clord_index.insert(client_order_id, (symbol, order_id));
        }

        let mut replies = Vec::new();
        for order in &outcome.orders {
            let executions_for_order: Vec<&Execution> = outcome
                .executions
                .iter()
                .filter(|e| e.buy_order_id == order.order_id || e.sell_order_id == order.order_id)
                .collect();
            let outbound = self.build_reply(execution_report(order, &executions_for_order, None));
            replies.push(outbound);
        }

        SessionOutput { replies, close: false }
    }

    fn reject_new_order(&mut self, client_order_id: &str, reason: ValidationError) -> SessionOutput {
        self.clord_index
            .entry(client_order_id.to_string())
            .or_insert((String::new(), 0));
        crate::metrics::orders_rejected();
        let rejected = Order {
            order_id: 0,
            client_order_id: client_order_id.to_string(),
            symbol: String::new(),
            side: Side::Buy,
            kind: OrderKind::Market,
            qty: 0,
            filled_qty: 0,
            price: None,
            status: OrderStatus::Rejected,
            timestamp: 0,
        };
        let builder = execution_report(&rejected, &[], Some(&reason.to_string()));
        let outbound = self.build_reply(builder);
        SessionOutput::reply(outbound.builder, outbound.seq)
    }

    fn handle_cancel(&mut self, msg: &FixMessage) -> SessionOutput {
        let symbol = msg.get(tags::SYMBOL).unwrap_or_default();
        let order_id: OrderId = match msg.parse(tags::ORDER_ID) {
            Ok(id) => id,
            Err(_) => return self.cancel_reject(msg, &StateError::OrderNotFound.to_string()),
        };

        let (outcome, order) = self.engine.cancel(symbol, order_id);
        match outcome {
            CancelOutcome::Canceled => {
                let order = order.expect("Canceled outcome always carries the order");
                let outbound = self.build_reply(execution_report(&order, &[], None));
                SessionOutput::reply(outbound.builder, outbound.seq)
            }
            CancelOutcome::NotFound => self.cancel_reject(msg, &StateError::OrderNotFound.to_string()),
        }
    }

    fn cancel_reject(&mut self, msg: &FixMessage, text: &str) -> SessionOutput {
        let builder = FixMessageBuilder::new(MsgType::OrderCancelReject)
            .field(tags::ORDER_ID, msg.get(tags::ORDER_ID).unwrap_or("NONE"))
            .field(tags::CL_ORD_ID, msg.get(tags::CL_ORD_ID).unwrap_or("NONE"))
            .field(tags::ORD_STATUS, FixOrdStatus::Rejected.code())
            .field(tags::TEXT, text);
        let outbound = self.build_reply(builder);
        SessionOutput::reply(outbound.builder, outbound.seq)
    }

    fn session_reject(&mut self, text: &str) -> SessionOutput {
        crate::metrics::messages_rejected("session_reject");
        let builder = FixMessageBuilder::new(MsgType::SessionReject).field(tags::TEXT, text);
        let outbound = self.build_reply(builder);
        SessionOutput::reply(outbound.builder, outbound.seq)
    }

    fn build_reply(&mut self, builder: FixMessageBuilder) -> Outbound {
        let seq = self.outgoing_seq;
        self.outgoing_seq += 1;
        self.last_sent = Instant::now();
        Outbound { seq, builder }
    }
}

/// Builds an Execution Report (35=8) for one order's current state,
/// attributing `last_qty`/`last_px`/`avg_px` to the executions produced in
/// the same engine call (§6 field summary).
fn execution_report(order: &Order, executions: &[&Execution], text: Option<&str>) -> FixMessageBuilder {
    let exec_type = match order.status {
        OrderStatus::New => FixExecType::New,
        OrderStatus::PartiallyFilled => FixExecType::PartialFill,
        OrderStatus::Filled => FixExecType::Fill,
        OrderStatus::Canceled => FixExecType::Canceled,
        OrderStatus::Rejected => FixExecType::Rejected,
    };
    let ord_status = match order.status {
        OrderStatus::New => FixOrdStatus::New,
        OrderStatus::PartiallyFilled => FixOrdStatus::PartiallyFilled,
        OrderStatus::Filled => FixOrdStatus::Filled,
        OrderStatus::Canceled => FixOrdStatus::Canceled,
        OrderStatus::Rejected => FixOrdStatus::Rejected,
    };

    let (last_qty, last_px) = executions
        .last()
        .map(|e| (e.last_qty, e.last_px))
        .unwrap_or((0, Decimal::ZERO));

    let total_qty: u64 = executions.iter().map(|e| e.last_qty).sum();
    let notional: Decimal = executions
        .iter()
        .map(|e| Decimal::from(e.last_qty) * e.last_px)
        .sum();
    let avg_px = if total_qty > 0 {
        notional / Decimal::from(total_qty)
    } else {
        Decimal::ZERO
    };

    let mut builder = FixMessageBuilder::new(MsgType::ExecutionReport)
        .field(tags::CL_ORD_ID, order.client_order_id.clone())
        .field(tags::ORDER_ID, order.order_id.to_string())
        .field(tags::EXEC_ID, executions.last().map(|e| e.exec_id).unwrap_or(0).to_string())
        .field(tags::EXEC_TYPE, exec_type.code())
        .field(tags::ORD_STATUS, ord_status.code())
        .field(tags::LAST_QTY, last_qty.to_string())
        .field(tags::LAST_PX, last_px.to_string())
        .field(tags::CUM_QTY, order.filled_qty.to_string())
        .field(tags::AVG_PX, avg_px.to_string());
    if let Some(text) = text {
        builder = builder.field(tags::TEXT, text);
    }
    builder
}

pub(crate) fn sending_time_now() -> String {
    current_time_millis().to_string()
}
