//! The matching engine: a registry of per-symbol order books, the single
//! entry point sessions submit orders through (§4.4).

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use thiserror::Error;
use tracing::{error, info};

use crate::book::{CancelOutcome, Depth, OrderBook};
use crate::domain::{IdGenerator, Order, OrderId, OrderKind, OrderStatus, Side};
use crate::events::{BusEnvelope, BusEvent, EventBus, Subscription};
use crate::persistence::PersistencePort;
use crate::util::current_time_millis;
use crate::validator::{self, NewOrderFields, ValidationError};

/// How many of the most recent executions (across all symbols) are scanned
/// to fill a snapshot's `recent_executions`. `PersistencePort::recent_executions`
/// is not itself symbol-scoped, so a quiet symbol competing with a noisy one
/// could see fewer than it otherwise would; this is an acceptable
/// approximation for an attach-time snapshot, not a durable query.
const SNAPSHOT_EXECUTION_SCAN: usize = 200;

/// A request to place a new order, as decoded from a New Order Single
/// (§6: tags 11, 55, 54, 38, 40, 44).
#[derive(Debug, Clone)]
pub struct NewOrderRequest {
    pub client_order_id: String,
    pub symbol: String,
    pub side: Side,
    pub kind: OrderKind,
    pub qty: u64,
    pub price: Option<rust_decimal::Decimal>,
}

/// The result of [`MatchingEngine::submit`]: every order whose state
/// changed (the new order plus any resting orders it matched against) and
/// every execution produced. A rejection before book insertion carries a
/// single `Rejected` order and no executions.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub orders: Vec<Order>,
    pub executions: Vec<crate::domain::Execution>,
}

/// Errors [`MatchingEngine::submit`] can return. Unlike [`ValidationError`],
/// these represent rejections that still produce a fully-formed
/// `SubmitOutcome` (the engine never panics on client misbehavior, §7) —
/// this type exists for callers that want the typed reason as well.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Registry of order books keyed by symbol, lazily created on first use
/// (§4.4). Each book is guarded by its own mutex; the registry itself uses
/// a concurrent map so lookups for different symbols never contend
/// (§5 "the symbol → OrderBook registry is read-mostly").
pub struct MatchingEngine {
    books: DashMap<String, Arc<Mutex<OrderBook>>>,
    order_ids: IdGenerator,
    exec_ids: IdGenerator,
    persistence: Arc<dyn PersistencePort>,
    events: EventBus,
}

impl MatchingEngine {
    pub fn new(persistence: Arc<dyn PersistencePort>, events: EventBus) -> Self {
        Self {
            books: DashMap::new(),
            order_ids: IdGenerator::new(),
            exec_ids: IdGenerator::new(),
            persistence,
            events,
        }
    }

    fn book_for(&self, symbol: &str) -> Arc<Mutex<OrderBook>> {
        self.books
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(OrderBook::new(symbol))))
            .clone()
    }

    /// Validates, then inserts and matches a new order (§4.4 `submit`).
    ///
    /// A validation failure produces a single `Rejected` order and no
    /// executions — the order is never inserted (§4.2).
    pub fn submit(&self, request: NewOrderRequest) -> SubmitOutcome {
        let fields = NewOrderFields {
            symbol: &request.symbol,
            qty: request.qty,
            kind: request.kind,
            price: request.price,
        };

        if let Err(reason) = validator::validate_new_order(&fields) {
            let rejected = Order {
                order_id: self.order_ids.next(),
                client_order_id: request.client_order_id,
                symbol: request.symbol,
                side: request.side,
                kind: request.kind,
                qty: request.qty,
                filled_qty: 0,
                price: request.price,
                status: OrderStatus::Rejected,
                timestamp: 0,
            };
            info!(order_id = rejected.order_id, reason = %reason, "order rejected");
            crate::metrics::orders_rejected();
            self.persist_order(&rejected);
            self.events.publish(
                BusEvent::CancelOrder {
                    order_id: rejected.order_id,
                    status: OrderStatus::Rejected,
                },
                current_time_millis(),
            );
            return SubmitOutcome {
                orders: vec![rejected],
                executions: vec![],
            };
        }

        let order = Order {
            order_id: self.order_ids.next(),
            client_order_id: request.client_order_id,
            symbol: request.symbol.clone(),
            side: request.side,
            kind: request.kind,
            qty: request.qty,
            filled_qty: 0,
            price: request.price,
            status: OrderStatus::New,
            timestamp: 0,
        };

        let book = self.book_for(&request.symbol);
        let mut guard = book.lock().expect("order book mutex poisoned");
        let outcome = guard
            .add_and_match(order)
            .expect("order_id is fresh from IdGenerator, so duplicates cannot occur");
        drop(guard);

        let mut executions = outcome.executions;
        for execution in &mut executions {
            execution.exec_id = self.exec_ids.next();
            execution.timestamp = current_time_millis();
        }

        let mut orders = Vec::with_capacity(1 + outcome.resting_updates.len());
        orders.push(outcome.taker.clone());
        orders.extend(outcome.resting_updates.iter().cloned());

        for order in &orders {
            self.persist_order(order);
        }
        for execution in &executions {
            self.persist_execution(execution);
            crate::metrics::executions_emitted();
        }

        let now = current_time_millis();
        self.events.publish(BusEvent::NewOrder { order: outcome.taker.clone() }, now);
        for execution in &executions {
            self.events.publish(
                BusEvent::Execution {
                    execution: execution.clone(),
                    order_states: orders.clone(),
                },
                now,
            );
        }
        if outcome.taker.kind == OrderKind::Market && outcome.taker.status == OrderStatus::Canceled {
            self.events.publish(
                BusEvent::CancelOrder {
                    order_id: outcome.taker.order_id,
                    status: OrderStatus::Canceled,
                },
                now,
            );
        }

        SubmitOutcome { orders, executions }
    }

    /// Cancels a resting order (§4.3 `cancel`, §4.4 `cancel`).
    pub fn cancel(&self, symbol: &str, order_id: OrderId) -> (CancelOutcome, Option<Order>) {
        let book = self.book_for(symbol);
        let mut guard = book.lock().expect("order book mutex poisoned");
        let (outcome, order) = guard.cancel(order_id);
        drop(guard);

        if let Some(order) = &order {
            self.persist_order(order);
            self.events.publish(
                BusEvent::CancelOrder {
                    order_id: order.order_id,
                    status: OrderStatus::Canceled,
                },
                current_time_millis(),
            );
        }
        (outcome, order)
    }

    /// Aggregated depth per side for `symbol` (§4.4 `snapshot`).
    pub fn snapshot(&self, symbol: &str) -> (Depth, Depth) {
        let book = self.book_for(symbol);
        let guard = book.lock().expect("order book mutex poisoned");
        guard.depth()
    }

    /// Attaches a new bus subscriber, queuing one `Snapshot` event per
    /// tracked symbol ahead of the live stream (§4.6/§6 "Snapshot is sent
    /// once per subscriber on attach"). The receiver is obtained first, so
    /// no event published concurrently with snapshot construction is lost.
    pub fn subscribe(&self) -> Subscription {
        let receiver = self.events.subscribe();
        let now = current_time_millis();
        let recent = self.persistence.recent_executions(SNAPSHOT_EXECUTION_SCAN);

        let mut pending = Vec::with_capacity(self.books.len());
        for entry in self.books.iter() {
            let symbol = entry.key().clone();
            let (bids, asks) = entry.value().lock().expect("order book mutex poisoned").depth();
            let recent_executions = recent.iter().filter(|e| e.symbol == symbol).cloned().collect();
            pending.push(BusEnvelope {
                event: BusEvent::Snapshot { symbol, bids, asks, recent_executions },
                timestamp: now,
            });
        }
        Subscription::new(pending, receiver)
    }

    fn persist_order(&self, order: &Order) {
        if let Err(err) = self.persistence.save_order(order) {
            error!(order_id = order.order_id, error = %err, "failed to persist order");
            crate::metrics::persistence_error();
        }
    }

    fn persist_execution(&self, execution: &crate::domain::Execution) {
        if let Err(err) = self.persistence.save_execution(execution) {
            error!(exec_id = execution.exec_id, error = %err, "failed to persist execution");
            crate::metrics::persistence_error();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryPersistence;
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal::Decimal;

    fn engine() -> MatchingEngine {
        MatchingEngine::new(Arc::new(InMemoryPersistence::new()), EventBus::new(64))
    }

    #[test]
    fn rejects_and_does_not_create_a_book_entry() {
        let engine = engine();
        let outcome = engine.submit(NewOrderRequest {
            client_order_id: "C1".into(),
            symbol: "INVALID".into(),
            side: Side::Buy,
            kind: OrderKind::Market,
            qty: 100,
            price: None,
        });
        assert_eq!(outcome.orders[0].status, OrderStatus::Rejected);
        assert!(outcome.executions.is_empty());
    }

    #[test]
    fn crossing_orders_produce_matching_executions() {
        let engine = engine();
        engine.submit(NewOrderRequest {
            client_order_id: "S1".into(),
            symbol: "TSLA".into(),
            side: Side::Sell,
            kind: OrderKind::Limit,
            qty: 100,
            price: Some(Decimal::from_f64(250.0).unwrap()),
        });
        let outcome = engine.submit(NewOrderRequest {
            client_order_id: "B1".into(),
            symbol: "TSLA".into(),
            side: Side::Buy,
            kind: OrderKind::Limit,
            qty: 100,
            price: Some(Decimal::from_f64(250.0).unwrap()),
        });
        assert_eq!(outcome.executions.len(), 1);
        assert_eq!(outcome.executions[0].exec_id, 1);
    }

    #[test]
    fn cancel_unknown_order_reports_not_found() {
        let engine = engine();
        let (outcome, order) = engine.cancel("AAPL", 9999);
        assert_eq!(outcome, CancelOutcome::NotFound);
        assert!(order.is_none());
    }

    #[tokio::test]
    async fn subscribe_replays_one_snapshot_per_symbol_before_live_events() {
        let engine = engine();
        engine.submit(NewOrderRequest {
            client_order_id: "S1".into(),
            symbol: "AAPL".into(),
            side: Side::Sell,
            kind: OrderKind::Limit,
            qty: 50,
            price: Some(Decimal::from_f64(100.0).unwrap()),
        });

        let mut sub = engine.subscribe();
        let first = sub.recv().await.unwrap();
        match first.event {
            BusEvent::Snapshot { symbol, asks, .. } => {
                assert_eq!(symbol, "AAPL");
                assert_eq!(asks.len(), 1);
            }
            other => panic!("expected Snapshot, got {other:?}"),
        }

        engine.submit(NewOrderRequest {
            client_order_id: "B1".into(),
            symbol: "AAPL".into(),
            side: Side::Buy,
            kind: OrderKind::Limit,
            qty: 50,
            price: Some(Decimal::from_f64(100.0).unwrap()),
        });
        let next = sub.recv().await.unwrap();
        assert!(matches!(next.event, BusEvent::Execution { .. } | BusEvent::NewOrder { .. }));
    }
}
