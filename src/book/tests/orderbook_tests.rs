use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use crate::domain::{Order, OrderKind, OrderStatus, Side};

use super::*;

fn px(v: f64) -> Decimal {
    Decimal::from_f64(v).unwrap()
}

fn limit_order(id: OrderId, side: Side, qty: u64, price: f64) -> Order {
    Order {
        order_id: id,
        client_order_id: format!("C{id}"),
        symbol: "TSLA".into(),
        side,
        kind: OrderKind::Limit,
        qty,
        filled_qty: 0,
        price: Some(px(price)),
        status: OrderStatus::New,
        timestamp: 0,
    }
}

fn market_order(id: OrderId, side: Side, qty: u64) -> Order {
    Order {
        order_id: id,
        client_order_id: format!("C{id}"),
        symbol: "TSLA".into(),
        side,
        kind: OrderKind::Market,
        qty,
        filled_qty: 0,
        price: None,
        status: OrderStatus::New,
        timestamp: 0,
    }
}

#[test]
fn full_fill_at_resting_price() {
    let mut book = OrderBook::new("TSLA");
    let sell = book.add_and_match(limit_order(1, Side::Sell, 100, 250.00)).unwrap();
    assert!(sell.executions.is_empty());

    let buy = book.add_and_match(limit_order(2, Side::Buy, 100, 250.00)).unwrap();
    assert_eq!(buy.executions.len(), 1);
    assert_eq!(buy.executions[0].last_qty, 100);
    assert_eq!(buy.executions[0].last_px, px(250.00));
    assert_eq!(buy.taker.status, OrderStatus::Filled);
    assert_eq!(buy.resting_updates[0].status, OrderStatus::Filled);
    assert_eq!(book.order_count(), 0);
    assert!(book.best_bid().is_none());
    assert!(book.best_ask().is_none());
}

#[test]
fn partial_fill_with_price_improvement() {
    let mut book = OrderBook::new("AAPL");
    book.add_and_match(limit_order(1, Side::Buy, 100, 180.00)).unwrap();
    let sell = book.add_and_match(limit_order(2, Side::Sell, 50, 175.00)).unwrap();

    assert_eq!(sell.taker.status, OrderStatus::Filled);
    assert_eq!(sell.executions[0].last_px, px(180.00));
    assert_eq!(sell.executions[0].last_qty, 50);

    let resting = &sell.resting_updates[0];
    assert_eq!(resting.status, OrderStatus::PartiallyFilled);
    assert_eq!(resting.filled_qty, 50);
    assert_eq!(book.best_bid(), Some(px(180.00)));
}

#[test]
fn market_meets_limit() {
    let mut book = OrderBook::new("GOOGL");
    book.add_and_match(limit_order(1, Side::Sell, 100, 150.00)).unwrap();
    let buy = book.add_and_match(market_order(2, Side::Buy, 100)).unwrap();

    assert_eq!(buy.taker.status, OrderStatus::Filled);
    assert_eq!(buy.executions[0].last_px, px(150.00));
    assert_eq!(buy.resting_updates[0].status, OrderStatus::Filled);
}

#[test]
fn market_residual_is_canceled_not_rested() {
    let mut book = OrderBook::new("MSFT");
    book.add_and_match(limit_order(1, Side::Sell, 40, 350.00)).unwrap();
    let buy = book.add_and_match(market_order(2, Side::Buy, 100)).unwrap();

    assert_eq!(buy.taker.filled_qty, 40);
    assert_eq!(buy.taker.status, OrderStatus::Canceled);
    assert_eq!(book.order_count(), 0);
}

#[test]
fn cancel_removes_resting_order() {
    let mut book = OrderBook::new("MSFT");
    book.add_and_match(limit_order(1, Side::Buy, 100, 350.00)).unwrap();

    let (outcome, order) = book.cancel(1);
    assert_eq!(outcome, CancelOutcome::Canceled);
    assert_eq!(order.unwrap().status, OrderStatus::Canceled);
    assert!(book.best_bid().is_none());

    let (outcome, order) = book.cancel(999);
    assert_eq!(outcome, CancelOutcome::NotFound);
    assert!(order.is_none());
}

#[test]
fn price_time_priority_within_level() {
    let mut book = OrderBook::new("AAPL");
    book.add_and_match(limit_order(1, Side::Buy, 100, 150.00)).unwrap(); // A
    book.add_and_match(limit_order(2, Side::Buy, 100, 150.00)).unwrap(); // B
    let sell = book.add_and_match(limit_order(3, Side::Sell, 100, 150.00)).unwrap();

    assert_eq!(sell.executions.len(), 1);
    assert_eq!(sell.executions[0].buy_order_id, 1);
    assert_eq!(sell.resting_updates[0].order_id, 1);
    assert_eq!(sell.resting_updates[0].status, OrderStatus::Filled);

    assert_eq!(book.order_count(), 1); // B (order 2) still rests
}

#[test]
fn duplicate_order_id_is_rejected() {
    let mut book = OrderBook::new("AAPL");
    book.add_and_match(limit_order(1, Side::Buy, 100, 150.00)).unwrap();
    let err = book.add_and_match(limit_order(1, Side::Sell, 100, 150.00));
    assert!(err.is_err());
}
