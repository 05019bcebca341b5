//! Stateless pre-trade checks applied to a New Order Single (§4.2).

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::OrderKind;

/// The whitelist of tradable symbols (§6).
pub const SYMBOL_WHITELIST: &[&str] = &["AAPL", "GOOGL", "MSFT", "AMZN", "TSLA"];

/// A validation failure for a New Order Single (§4.2, §7 `ValidationError`).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("Invalid symbol")]
    InvalidSymbol,
    #[error("Invalid quantity")]
    InvalidQuantity,
    #[error("Invalid price")]
    InvalidPrice,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("duplicate client order id")]
    DuplicateClOrdId,
}

/// The fields a New Order Single must carry for [`validate_new_order`].
pub struct NewOrderFields<'a> {
    pub symbol: &'a str,
    pub qty: u64,
    pub kind: OrderKind,
    pub price: Option<Decimal>,
}

/// Runs the §4.2 predicates against a decoded New Order Single.
///
/// Duplicate `ClOrdID` detection is session-scoped state, not a stateless
/// predicate, so it is checked by the session layer before calling this
/// function (§4.5: "Per-session client-order-id uniqueness is enforced").
pub fn validate_new_order(fields: &NewOrderFields) -> Result<(), ValidationError> {
    if !SYMBOL_WHITELIST.contains(&fields.symbol) {
        return Err(ValidationError::InvalidSymbol);
    }
    if fields.qty == 0 {
        return Err(ValidationError::InvalidQuantity);
    }
    if fields.kind == OrderKind::Limit {
        match fields.price {
            Some(p) if p > Decimal::ZERO => {}
            _ => return Err(ValidationError::InvalidPrice),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromPrimitive;

    #[test]
    fn rejects_invalid_symbol() {
        let fields = NewOrderFields {
            symbol: "INVALID",
            qty: 100,
            kind: OrderKind::Market,
            price: None,
        };
        assert_eq!(validate_new_order(&fields), Err(ValidationError::InvalidSymbol));
    }

    #[test]
    fn rejects_non_positive_price_for_limit() {
        let fields = NewOrderFields {
            symbol: "AAPL",
            qty: 100,
            kind: OrderKind::Limit,
            price: Some(Decimal::from_f64(-10.0).unwrap()),
        };
        assert_eq!(validate_new_order(&fields), Err(ValidationError::InvalidPrice));
    }

    #[test]
    fn rejects_zero_quantity() {
        let fields = NewOrderFields {
            symbol: "MSFT",
            qty: 0,
            kind: OrderKind::Limit,
            price: Some(Decimal::from_f64(350.0).unwrap()),
        };
        assert_eq!(validate_new_order(&fields), Err(ValidationError::InvalidQuantity));
    }

    #[test]
    fn accepts_valid_limit_order() {
        let fields = NewOrderFields {
            symbol: "TSLA",
            qty: 100,
            kind: OrderKind::Limit,
            price: Some(Decimal::from_f64(250.0).unwrap()),
        };
        assert!(validate_new_order(&fields).is_ok());
    }
}
