//! `OrderBook`: both sides' price indices, the order_id back-reference map,
//! and the append-only trades log for one instrument.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::types::{Order, Side, Trade};

use super::price_level::{Extreme, PriceLevelIndex};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderbookError {
    #[error("order {0} already exists in the book")]
    DuplicateOrderId(Uuid),
    #[error("order {0} not found in the book")]
    UnknownOrderId(Uuid),
    #[error("cannot add a resting order with no limit price")]
    MissingLimitPrice,
    #[error("invalid order: {0}")]
    InvalidOrder(String),
    #[error("queried side of the book is empty")]
    EmptyBook,
}

/// Per-instrument book: two price indices plus the id → (side, node)
/// back-reference (I1/I2) and an append-only trades log (I4, §5 ordering
/// guarantee: `trade_id` is the append index).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    pub ticker: String,
    bids: PriceLevelIndex,
    asks: PriceLevelIndex,
    locations: HashMap<Uuid, (Side, usize)>,
    pub trades: Vec<Trade>,
    next_sequence: u64,
}

impl OrderBook {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            bids: PriceLevelIndex::new(Extreme::Max),
            asks: PriceLevelIndex::new(Extreme::Min),
            locations: HashMap::new(),
            trades: Vec::new(),
            next_sequence: 0,
        }
    }

    /// Assigns the next monotonic sequence number, used for FIFO tie-break
    /// and the maker/taker price rule.
    pub fn next_sequence(&mut self) -> u64 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }

    /// Inserts `order` into the appropriate side's index. Does not match.
    /// Fails if `order.id` is already present or the order carries no
    /// limit price.
    pub fn add(&mut self, order: Order) -> Result<(), OrderbookError> {
        if self.locations.contains_key(&order.id) {
            return Err(OrderbookError::DuplicateOrderId(order.id));
        }
        if order.quantity <= Decimal::ZERO {
            return Err(OrderbookError::InvalidOrder("quantity must be positive".into()));
        }
        let price = order.limit_price.ok_or(OrderbookError::MissingLimitPrice)?;
        if price <= Decimal::ZERO {
            return Err(OrderbookError::InvalidOrder("limit price must be positive".into()));
        }
        let id = order.id;
        let side = order.side;

        let node = match side {
            Side::Bid => self.bids.insert(price, order),
            Side::Ask => self.asks.insert(price, order),
        };
        self.locations.insert(id, (side, node));
        Ok(())
    }

    /// Removes `order_id` from its owning level's FIFO and the id map.
    /// A no-op target (already removed by matching) is reported as
    /// `UnknownOrderId`, per §4.2.
    pub fn cancel(&mut self, order_id: Uuid) -> Result<Order, OrderbookError> {
        let (side, node) = self
            .locations
            .remove(&order_id)
            .ok_or(OrderbookError::UnknownOrderId(order_id))?;
        let index = match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };
        index
            .remove(node, order_id)
            .ok_or(OrderbookError::UnknownOrderId(order_id))
    }

    /// Removes an order during matching without surfacing "unknown id" as
    /// an error — the caller (matching engine) already knows the order is
    /// present because it just observed it via `best_bid`/`best_ask`.
    pub(crate) fn remove_matched(&mut self, side: Side, order_id: Uuid) {
        if let Some((_, node)) = self.locations.remove(&order_id) {
            let index = match side {
                Side::Bid => &mut self.bids,
                Side::Ask => &mut self.asks,
            };
            index.remove(node, order_id);
        }
    }

    pub fn best_bid(&mut self) -> Option<&Order> {
        self.bids.best()
    }

    pub fn best_ask(&mut self) -> Option<&Order> {
        self.asks.best()
    }

    /// Same as `best_bid`/`best_ask`, but for callers that treat an empty
    /// side as a hard failure rather than a legitimate "no quote" value.
    pub fn best_on_side_or_err(&mut self, side: Side) -> Result<&Order, OrderbookError> {
        match side {
            Side::Bid => self.bids.best(),
            Side::Ask => self.asks.best(),
        }
        .ok_or(OrderbookError::EmptyBook)
    }

    pub(crate) fn best_bid_mut(&mut self) -> Option<&mut Order> {
        self.bids.best_mut()
    }

    pub(crate) fn best_ask_mut(&mut self) -> Option<&mut Order> {
        self.asks.best_mut()
    }

    /// `ask.price - bid.price` when both sides are non-empty. Transiently
    /// negative mid-match is possible; callers outside the matching engine
    /// only ever observe the post-match, invariant-restored value.
    pub fn spread(&mut self) -> Option<Decimal> {
        let bid = self.bids.peek_price()?;
        let ask = self.asks.peek_price()?;
        Some(ask - bid)
    }

    pub fn append_trade(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn next_trade_id(&self) -> u64 {
        self.trades.len() as u64
    }

    /// Count of orders currently resting on either side, for status views.
    pub fn order_count(&self) -> usize {
        self.locations.len()
    }

    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::types::OrderKind;
    use rust_decimal_macros::dec;

    fn limit_order(side: Side, price: Decimal, qty: Decimal) -> Order {
        Order::new(Uuid::new_v4(), "p1", "AAPL", side, OrderKind::Limit, Some(price), qty)
    }

    #[test]
    fn add_then_cancel_round_trips() {
        let mut book = OrderBook::new("AAPL");
        let order = limit_order(Side::Bid, dec!(10), dec!(1));
        let id = order.id;
        book.add(order).unwrap();
        let removed = book.cancel(id).unwrap();
        assert_eq!(removed.id, id);
        assert!(book.best_bid().is_none());
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let mut book = OrderBook::new("AAPL");
        let order = limit_order(Side::Bid, dec!(10), dec!(1));
        let dup = order.clone();
        book.add(order).unwrap();
        assert!(matches!(book.add(dup), Err(OrderbookError::DuplicateOrderId(_))));
    }

    #[test]
    fn cancel_unknown_id_is_rejected() {
        let mut book = OrderBook::new("AAPL");
        assert!(matches!(
            book.cancel(Uuid::new_v4()),
            Err(OrderbookError::UnknownOrderId(_))
        ));
    }

    #[test]
    fn add_rejects_nonpositive_quantity_and_price() {
        let mut book = OrderBook::new("AAPL");
        assert!(matches!(
            book.add(limit_order(Side::Bid, dec!(10), dec!(0))),
            Err(OrderbookError::InvalidOrder(_))
        ));
        assert!(matches!(
            book.add(limit_order(Side::Bid, dec!(0), dec!(1))),
            Err(OrderbookError::InvalidOrder(_))
        ));
    }

    #[test]
    fn best_on_side_or_err_reports_empty_book() {
        let mut book = OrderBook::new("AAPL");
        assert_eq!(book.best_on_side_or_err(Side::Bid), Err(OrderbookError::EmptyBook));
    }

    #[test]
    fn spread_is_ask_minus_bid() {
        let mut book = OrderBook::new("AAPL");
        book.add(limit_order(Side::Bid, dec!(9), dec!(1))).unwrap();
        book.add(limit_order(Side::Ask, dec!(11), dec!(1))).unwrap();
        assert_eq!(book.spread(), Some(dec!(2)));
    }

    #[test]
    fn sequence_counter_is_monotonic() {
        let mut book = OrderBook::new("AAPL");
        assert_eq!(book.next_sequence(), 0);
        assert_eq!(book.next_sequence(), 1);
    }

    /// A repository round-trips a book through JSON; §8's round-trip
    /// property holds at the field level (derived `PartialEq`/`Eq` on the
    /// arena index doesn't extend to `OrderBook` itself, so this checks the
    /// fields a caller actually observes through the public API).
    #[test]
    fn snapshot_round_trips_through_json() {
        let mut book = OrderBook::new("AAPL");
        book.add(limit_order(Side::Bid, dec!(9), dec!(1))).unwrap();
        book.add(limit_order(Side::Ask, dec!(11), dec!(2))).unwrap();

        let json = serde_json::to_string(&book).unwrap();
        let mut restored: OrderBook = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.ticker, book.ticker);
        assert_eq!(restored.order_count(), book.order_count());
        assert_eq!(restored.best_bid().unwrap().quantity, dec!(1));
        assert_eq!(restored.best_ask().unwrap().quantity, dec!(2));
    }
}
