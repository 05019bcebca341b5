//! The per-symbol limit order book and its matching algorithm (§4.3).

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;
use tracing::trace;

use crate::domain::{Execution, Order, OrderId, OrderKind, Side};

use super::error::{CancelOutcome, OrderBookError};
use super::level::PriceLevel;

/// Depth snapshot for one side: price to aggregate resting quantity,
/// ordered best-first (§4.4 `snapshot`).
pub type Depth = Vec<(Decimal, u64)>;

/// The result of submitting an order to [`OrderBook::add_and_match`]: the
/// incoming order's final state, every execution produced, and every
/// resting order whose state changed as a side effect (for event-bus
/// publication to the sessions that own them).
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub taker: Order,
    pub executions: Vec<Execution>,
    pub resting_updates: Vec<Order>,
}

/// A two-sided book of resting limit orders for one symbol, matched under
/// price-time priority (§3 `OrderBook`).
///
/// Thread-safety is the caller's responsibility: §5 requires per-symbol
/// matching to be serialized behind a mutex, so this type itself is not
/// `Sync`-safe for concurrent mutation — [`crate::engine::MatchingEngine`]
/// wraps each instance in a `Mutex`.
pub struct OrderBook {
    symbol: String,
    /// Keyed ascending; best bid is the *last* entry (`.iter().next_back()`).
    bids: BTreeMap<Decimal, PriceLevel>,
    /// Keyed ascending; best ask is the *first* entry (`.iter().next()`).
    asks: BTreeMap<Decimal, PriceLevel>,
    order_index: HashMap<OrderId, (Side, Decimal)>,
    seq: AtomicU64,
    order_ids: std::collections::HashSet<OrderId>,
}

impl OrderBook {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            order_index: HashMap::new(),
            seq: AtomicU64::new(1),
            order_ids: std::collections::HashSet::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Best bid price, if the bid side is non-empty.
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.keys().next_back().copied()
    }

    /// Best ask price, if the ask side is non-empty.
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.keys().next().copied()
    }

    /// `best_ask - best_bid`, when both sides are non-empty (§3).
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Aggregated resting depth per side, best price first (§4.4 `snapshot`).
    pub fn depth(&self) -> (Depth, Depth) {
        let bids = self
            .bids
            .iter()
            .rev()
            .map(|(price, level)| (*price, level.resting_qty()))
            .collect();
        let asks = self
            .asks
            .iter()
            .map(|(price, level)| (*price, level.resting_qty()))
            .collect();
        (bids, asks)
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Submits `order` as a taker against the resting book, then rests any
    /// unfilled limit residual (or cancels an unfilled market residual).
    ///
    /// This is the entry point the matching engine calls; it performs both
    /// the `add` and `match` steps of §4.3 in one atomic (single-lock-hold)
    /// operation, since in this design exactly one order is ever "new" at
    /// the moment matching runs — the resting book cannot itself become
    /// crossed between submissions. The sweep therefore always treats the
    /// incoming order as the taker and the book as the maker side, which is
    /// the case the generalized algorithm in §4.3 degenerates to in
    /// practice; the tie-break rule ("match price is the resting side's
    /// price") holds because the resting order, by definition, arrived
    /// first.
    pub fn add_and_match(&mut self, mut order: Order) -> Result<MatchOutcome, OrderBookError> {
        if self.order_ids.contains(&order.order_id) {
            return Err(OrderBookError::DuplicateOrderId(order.order_id));
        }
        order.timestamp = self.next_seq();

        let mut executions = Vec::new();
        let mut resting_updates = Vec::new();

        self.sweep(&mut order, &mut executions, &mut resting_updates);

        if order.remaining() > 0 {
            match order.kind {
                OrderKind::Limit => {
                    self.rest(order.clone());
                }
                OrderKind::Market => {
                    // Residual is canceled, never rested (§4.3 "Market
                    // order residuals").
                    order.cancel();
                }
            }
        }

        trace!(
            symbol = %self.symbol,
            order_id = order.order_id,
            status = ?order.status,
            executions = executions.len(),
            "processed submission"
        );

        Ok(MatchOutcome {
            taker: order,
            executions,
            resting_updates,
        })
    }

    /// Crosses `taker` against the opposite side until no further match is
    /// possible (§4.3 steps 1-10).
    fn sweep(&mut self, taker: &mut Order, executions: &mut Vec<Execution>, resting_updates: &mut Vec<Order>) {
        let opposite = match taker.side {
            Side::Buy => &mut self.asks,
            Side::Sell => &mut self.bids,
        };

        loop {
            if taker.remaining() == 0 {
                break;
            }

            let best_price = match taker.side {
                Side::Buy => opposite.keys().next().copied(),
                Side::Sell => opposite.keys().next_back().copied(),
            };
            let Some(resting_price) = best_price else {
                break;
            };

            let crosses = match taker.kind {
                OrderKind::Market => true,
                OrderKind::Limit => {
                    let taker_price = taker
                        .price
                        .expect("limit order always carries a price");
                    match taker.side {
                        Side::Buy => taker_price >= resting_price,
                        Side::Sell => taker_price <= resting_price,
                    }
                }
            };
            if !crosses {
                break;
            }

            let level = opposite
                .get_mut(&resting_price)
                .expect("price key came from this map");

            let match_qty = {
                let resting = level.front_mut().expect("non-empty level has a front");
                let match_qty = taker.remaining().min(resting.remaining());

                taker.apply_fill(match_qty);
                resting.apply_fill(match_qty);
                level.debit(match_qty);

                let (buy_order_id, sell_order_id) = match taker.side {
                    Side::Buy => (taker.order_id, resting.order_id),
                    Side::Sell => (resting.order_id, taker.order_id),
                };
                executions.push(Execution {
                    exec_id: 0, // assigned by the caller (engine) before publication
                    buy_order_id,
                    sell_order_id,
                    symbol: self.symbol.clone(),
                    last_qty: match_qty,
                    last_px: resting_price,
                    timestamp: 0, // stamped by the caller
                });

                match_qty
            };
            let _ = match_qty;

            let resting_done = level.front_mut().map(|o| o.remaining() == 0).unwrap_or(false);
            if resting_done {
                let filled = level.pop_front().expect("just checked front");
                self.order_index.remove(&filled.order_id);
                self.order_ids.remove(&filled.order_id);
                resting_updates.push(filled);
            } else if let Some(resting) = level.front_mut() {
                resting_updates.push(resting.clone());
            }

            if level.is_empty() {
                opposite.remove(&resting_price);
            }
        }
    }

    fn rest(&mut self, order: Order) {
        let price = order.price.expect("limit order always carries a price");
        let side_map = match order.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        self.order_index.insert(order.order_id, (order.side, price));
        self.order_ids.insert(order.order_id);
        side_map.entry(price).or_insert_with(PriceLevel::new).push_back(order);
    }

    /// Cancels a resting, non-terminal order (§4.3 `cancel`).
    pub fn cancel(&mut self, order_id: OrderId) -> (CancelOutcome, Option<Order>) {
        let Some((side, price)) = self.order_index.remove(&order_id) else {
            return (CancelOutcome::NotFound, None);
        };
        let side_map = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let Some(level) = side_map.get_mut(&price) else {
            return (CancelOutcome::NotFound, None);
        };
        let Some(mut order) = level.remove(order_id) else {
            return (CancelOutcome::NotFound, None);
        };
        self.order_ids.remove(&order_id);
        if level.is_empty() {
            side_map.remove(&price);
        }
        order.cancel();
        (CancelOutcome::Canceled, Some(order))
    }

    /// Number of distinct resting orders across both sides.
    pub fn order_count(&self) -> usize {
        self.order_ids.len()
    }
}

#[cfg(test)]
#[path = "tests/orderbook_tests.rs"]
mod orderbook_tests;
