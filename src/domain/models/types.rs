//! Order/Trade primitives shared by the book, matching engine, and trade
//! service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which side of the book an order rests on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// The side an incoming order matches against.
    pub fn opposite(self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

/// An order's matching semantics. Stop / stop-limit / iceberg / post-only
/// are out of scope for this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    Limit,
}

/// Lifecycle status of an order inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    PartiallyFilledCancelled,
}

/// A trading intent for one instrument. Mutated only by the matching engine
/// (quantity decrements on fills); never aliased outside the owning book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// Owning portfolio, or a reserved synthetic identity for orders not
    /// tied to any portfolio (market-maker/simulator liquidity).
    pub portfolio_id: String,
    pub ticker: String,
    pub side: Side,
    pub kind: OrderKind,
    /// Carried but ignored for market orders, per §4.3.
    pub limit_price: Option<Decimal>,
    pub quantity: Decimal,
    pub status: OrderStatus,
    /// Monotonic arrival order assigned by the book. Used for FIFO
    /// tie-breaks within a price level and for the maker/taker
    /// price-improvement rule in the matching engine.
    pub sequence_id: u64,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        id: Uuid,
        portfolio_id: impl Into<String>,
        ticker: impl Into<String>,
        side: Side,
        kind: OrderKind,
        limit_price: Option<Decimal>,
        quantity: Decimal,
    ) -> Self {
        Self {
            id,
            portfolio_id: portfolio_id.into(),
            ticker: ticker.into(),
            side,
            kind,
            limit_price,
            quantity,
            status: OrderStatus::New,
            sequence_id: 0,
            created_at: Utc::now(),
        }
    }

    pub fn is_filled(&self) -> bool {
        self.quantity.is_zero()
    }
}

/// An immutable record of one execution. Appended once to a book's trades
/// log; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: u64,
    pub buy_order_id: Uuid,
    pub sell_order_id: Uuid,
    pub price: Decimal,
    pub quantity: Decimal,
    pub ticker: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_order(side: Side) -> Order {
        Order::new(
            Uuid::new_v4(),
            "p1",
            "AAPL",
            side,
            OrderKind::Limit,
            Some(dec!(100.0)),
            dec!(1.0),
        )
    }

    #[test]
    fn opposite_side_flips() {
        assert_eq!(Side::Bid.opposite(), Side::Ask);
        assert_eq!(Side::Ask.opposite(), Side::Bid);
    }

    #[test]
    fn new_order_starts_unfilled_and_new() {
        let order = sample_order(Side::Bid);
        assert_eq!(order.status, OrderStatus::New);
        assert!(!order.is_filled());
    }

    #[test]
    fn is_filled_tracks_zero_quantity() {
        let mut order = sample_order(Side::Ask);
        order.quantity = Decimal::ZERO;
        assert!(order.is_filled());
    }
}
