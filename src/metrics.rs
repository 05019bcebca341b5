//! Observability counters, gated behind the `metrics` feature (C9).
//!
//! Disabled by default; every function is a no-op unless the crate is built
//! with `--features metrics`, so there is no cost or third-party dependency
//! for callers who don't opt in.

#[cfg(feature = "metrics")]
pub fn messages_decoded() {
    metrics::counter!("fix_exchange_messages_decoded_total").increment(1);
}

#[cfg(not(feature = "metrics"))]
pub fn messages_decoded() {}

#[cfg(feature = "metrics")]
pub fn messages_rejected(reason: &'static str) {
    metrics::counter!("fix_exchange_messages_rejected_total", "reason" => reason).increment(1);
}

#[cfg(not(feature = "metrics"))]
pub fn messages_rejected(_reason: &'static str) {}

#[cfg(feature = "metrics")]
pub fn orders_rejected() {
    metrics::counter!("fix_exchange_orders_rejected_total").increment(1);
}

#[cfg(not(feature = "metrics"))]
pub fn orders_rejected() {}

#[cfg(feature = "metrics")]
pub fn executions_emitted() {
    metrics::counter!("fix_exchange_executions_total").increment(1);
}

#[cfg(not(feature = "metrics"))]
pub fn executions_emitted() {}

#[cfg(feature = "metrics")]
pub fn persistence_error() {
    metrics::counter!("fix_exchange_persistence_errors_total").increment(1);
}

#[cfg(not(feature = "metrics"))]
pub fn persistence_error() {}
