//! End-to-end scenario tests spanning the FIX codec, session state machine,
//! and matching engine together (§8 "Scenarios").

use std::sync::Arc;

use proptest::prelude::*;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use exchange_core::book::CancelOutcome;
use exchange_core::domain::{OrderKind, OrderStatus, Side};
use exchange_core::engine::{MatchingEngine, NewOrderRequest};
use exchange_core::events::EventBus;
use exchange_core::fix::tags::{self, MsgType};
use exchange_core::fix::{decode, encode, FixMessageBuilder};
use exchange_core::persistence::InMemoryPersistence;
use exchange_core::session::{Session, SessionState};

fn engine() -> Arc<MatchingEngine> {
    Arc::new(MatchingEngine::new(Arc::new(InMemoryPersistence::new()), EventBus::new(256)))
}

fn px(v: f64) -> Decimal {
    Decimal::from_f64(v).unwrap()
}

fn logon_bytes(seq: u32) -> Vec<u8> {
    encode(
        "CLIENT",
        "EXCHANGE",
        seq,
        "0",
        FixMessageBuilder::new(MsgType::Logon).field(tags::HEART_BT_INT, "30"),
    )
}

/// Scenario 1: Logon with heartbeat 30 acknowledges and moves the session
/// to LoggedIn.
#[test]
fn logon_acknowledges_and_moves_to_logged_in() {
    let mut session = Session::new("EXCHANGE", engine());
    let msg = decode(&logon_bytes(1)).expect("well-formed logon decodes");
    let output = session.handle_message(msg);

    assert_eq!(session.state(), SessionState::LoggedIn);
    assert_eq!(output.replies.len(), 1);
    assert_eq!(output.replies[0].builder.msg_type(), MsgType::Logon);
}

/// Scenario 5: invalid price, invalid symbol, and zero quantity all reject
/// with the literal reasons §8 specifies, without resting an order.
#[test]
fn invalid_orders_are_rejected_with_the_specified_reasons() {
    let eng = engine();

    let bad_price = eng.submit(NewOrderRequest {
        client_order_id: "R1".into(),
        symbol: "AAPL".into(),
        side: Side::Buy,
        kind: OrderKind::Limit,
        qty: 100,
        price: Some(px(-10.0)),
    });
    assert_eq!(bad_price.orders[0].status, OrderStatus::Rejected);

    let bad_symbol = eng.submit(NewOrderRequest {
        client_order_id: "R2".into(),
        symbol: "INVALID".into(),
        side: Side::Buy,
        kind: OrderKind::Market,
        qty: 100,
        price: None,
    });
    assert_eq!(bad_symbol.orders[0].status, OrderStatus::Rejected);

    let bad_qty = eng.submit(NewOrderRequest {
        client_order_id: "R3".into(),
        symbol: "MSFT".into(),
        side: Side::Sell,
        kind: OrderKind::Limit,
        qty: 0,
        price: Some(px(350.0)),
    });
    assert_eq!(bad_qty.orders[0].status, OrderStatus::Rejected);

    let (bids, asks) = eng.snapshot("AAPL");
    assert!(bids.is_empty() && asks.is_empty());
}

/// Scenario 6: cancel removes a resting order; canceling an unknown id
/// reports not-found instead of panicking.
#[test]
fn cancel_removes_resting_order_and_unknown_id_is_not_found() {
    let eng = engine();
    eng.submit(NewOrderRequest {
        client_order_id: "C1".into(),
        symbol: "MSFT".into(),
        side: Side::Buy,
        kind: OrderKind::Limit,
        qty: 100,
        price: Some(px(350.0)),
    });
    let (bids, _) = eng.snapshot("MSFT");
    assert_eq!(bids.len(), 1);

    let (outcome, _) = eng.cancel("MSFT", 1);
    assert_eq!(outcome, CancelOutcome::Canceled);
    let (bids, _) = eng.snapshot("MSFT");
    assert!(bids.is_empty());

    let (missing, order) = eng.cancel("MSFT", 99999);
    assert_eq!(missing, CancelOutcome::NotFound);
    assert!(order.is_none());
}

/// Scenario 8: a New Order whose checksum digit was flipped never reaches
/// the engine; the book is untouched.
#[test]
fn checksum_rejection_leaves_the_book_untouched() {
    let eng = engine();
    let mut bytes = encode(
        "CLIENT",
        "EXCHANGE",
        1,
        "0",
        FixMessageBuilder::new(MsgType::NewOrderSingle)
            .field(tags::CL_ORD_ID, "Z1")
            .field(tags::SYMBOL, "AAPL")
            .field(tags::SIDE, "1")
            .field(tags::ORDER_QTY, "100")
            .field(tags::ORD_TYPE, "2")
            .field(tags::PRICE, "180.00"),
    );
    let soh_positions: Vec<usize> = bytes.iter().enumerate().filter(|(_, &b)| b == 0x01).map(|(i, _)| i).collect();
    let last_soh = *soh_positions.last().unwrap();
    let digit_idx = last_soh - 1;
    bytes[digit_idx] = if bytes[digit_idx] == b'9' { b'8' } else { b'9' };

    assert!(decode(&bytes).is_err());
    let (bids, _) = eng.snapshot("AAPL");
    assert!(bids.is_empty());
}

/// Scenario 9: ten concurrent submissions on distinct client-order-ids all
/// persist, and every execution's quantity is accounted for in the
/// resulting orders' `filled_qty` (invariant 5: conservation).
#[test]
fn concurrent_submissions_conserve_filled_quantity() {
    let eng = engine();
    // Seed one large resting sell so every concurrent buy can cross.
    eng.submit(NewOrderRequest {
        client_order_id: "SEED".into(),
        symbol: "TSLA".into(),
        side: Side::Sell,
        kind: OrderKind::Limit,
        qty: 1000,
        price: Some(px(250.0)),
    });

    let results: Vec<_> = std::thread::scope(|scope| {
        (0..10)
            .map(|i| {
                let eng = Arc::clone(&eng);
                scope.spawn(move || {
                    eng.submit(NewOrderRequest {
                        client_order_id: format!("T{i}"),
                        symbol: "TSLA".into(),
                        side: Side::Buy,
                        kind: OrderKind::Limit,
                        qty: 50,
                        price: Some(px(250.0)),
                    })
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect()
    });

    for outcome in &results {
        let taker = &outcome.orders[0];
        let filled: u64 = outcome
            .executions
            .iter()
            .filter(|e| e.buy_order_id == taker.order_id || e.sell_order_id == taker.order_id)
            .map(|e| e.last_qty)
            .sum();
        assert_eq!(filled, taker.filled_qty);
        assert_eq!(taker.filled_qty, 50);
    }

    let persisted_total: u64 = eng.snapshot("TSLA").1.iter().map(|(_, qty)| qty).sum();
    assert_eq!(persisted_total, 1000 - 10 * 50);
}

proptest! {
    /// Invariant 5 (conservation): for any sequence of limit orders on one
    /// symbol, total quantity submitted always equals total quantity
    /// resting plus total quantity filled — no quantity is created or
    /// destroyed by matching.
    #[test]
    fn limit_order_sequences_conserve_quantity(
        sides in proptest::collection::vec(any::<bool>(), 1..30),
        qtys in proptest::collection::vec(1u64..500, 1..30),
        ticks in proptest::collection::vec(-5i64..5, 1..30),
    ) {
        let eng = engine();
        let base = px(100.0);
        let n = sides.len().min(qtys.len()).min(ticks.len());
        let mut submitted_total: u64 = 0;
        let mut filled_total: u64 = 0;

        for i in 0..n {
            let side = if sides[i] { Side::Buy } else { Side::Sell };
            let qty = qtys[i];
            let price = base + Decimal::new(ticks[i], 2);
            let outcome = eng.submit(NewOrderRequest {
                client_order_id: format!("P{i}"),
                symbol: "AAPL".into(),
                side,
                kind: OrderKind::Limit,
                qty,
                price: Some(price),
            });
            if outcome.orders[0].status != OrderStatus::Rejected {
                submitted_total += qty;
                filled_total += outcome.executions.iter().map(|e| e.last_qty).sum::<u64>();
            }
        }

        let (bids, asks) = eng.snapshot("AAPL");
        let resting_total: u64 = bids.iter().chain(asks.iter()).map(|(_, qty)| qty).sum();

        prop_assert_eq!(resting_total + filled_total, submitted_total);
    }
}
