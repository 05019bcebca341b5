//! An in-process `DashMap`-backed implementation of [`super::PersistencePort`].

use dashmap::DashMap;
use std::sync::Mutex;

use crate::domain::{Execution, Order, OrderId, OrderStatus};

use super::{PersistenceError, PersistencePort};

/// A reference persistence backend keyed by `order_id`, overwriting the
/// latest state on every save (§4.7: "the port is free to deduplicate or
/// overwrite the latest state per `order_id`").
#[derive(Default)]
pub struct InMemoryPersistence {
    orders: DashMap<OrderId, Order>,
    executions: Mutex<Vec<Execution>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistencePort for InMemoryPersistence {
    fn save_order(&self, order: &Order) -> Result<(), PersistenceError> {
        self.orders.insert(order.order_id, order.clone());
        Ok(())
    }

    fn save_execution(&self, execution: &Execution) -> Result<(), PersistenceError> {
        let mut executions = self.executions.lock().expect("execution log mutex poisoned");
        executions.push(execution.clone());
        Ok(())
    }

    fn find_order(&self, order_id: OrderId) -> Option<Order> {
        self.orders.get(&order_id).map(|entry| entry.clone())
    }

    fn orders_by_symbol(&self, symbol: &str) -> Vec<Order> {
        self.orders
            .iter()
            .filter(|entry| entry.symbol == symbol)
            .map(|entry| entry.clone())
            .collect()
    }

    fn orders_by_status(&self, status: OrderStatus) -> Vec<Order> {
        self.orders
            .iter()
            .filter(|entry| entry.status == status)
            .map(|entry| entry.clone())
            .collect()
    }

    fn recent_executions(&self, limit: usize) -> Vec<Execution> {
        let executions = self.executions.lock().expect("execution log mutex poisoned");
        executions.iter().rev().take(limit).cloned().collect()
    }

    fn count_orders(&self) -> usize {
        self.orders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderKind, Side};

    fn sample_order(id: OrderId, status: OrderStatus) -> Order {
        Order {
            order_id: id,
            client_order_id: format!("C{id}"),
            symbol: "AAPL".into(),
            side: Side::Buy,
            kind: OrderKind::Limit,
            qty: 10,
            filled_qty: 0,
            price: None,
            status,
            timestamp: 0,
        }
    }

    #[test]
    fn save_is_idempotent_overwrite() {
        let store = InMemoryPersistence::new();
        store.save_order(&sample_order(1, OrderStatus::New)).unwrap();
        store.save_order(&sample_order(1, OrderStatus::Filled)).unwrap();
        assert_eq!(store.count_orders(), 1);
        assert_eq!(store.find_order(1).unwrap().status, OrderStatus::Filled);
    }

    #[test]
    fn queries_filter_by_symbol_and_status() {
        let store = InMemoryPersistence::new();
        store.save_order(&sample_order(1, OrderStatus::New)).unwrap();
        store.save_order(&sample_order(2, OrderStatus::Filled)).unwrap();
        assert_eq!(store.orders_by_symbol("AAPL").len(), 2);
        assert_eq!(store.orders_by_status(OrderStatus::Filled).len(), 1);
    }
}
