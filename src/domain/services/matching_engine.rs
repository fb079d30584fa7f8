//! Free-function matching engine: `process(order, book)` crosses an
//! incoming order against the resting side of the book, appends trades,
//! and rests any limit residual.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::models::types::{Order, OrderKind, OrderStatus, Side, Trade};

use super::order_book::{OrderBook, OrderbookError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatchingError {
    #[error(transparent)]
    Book(#[from] OrderbookError),
}

fn crosses(order: &Order, opposite_price: Decimal) -> bool {
    match order.kind {
        OrderKind::Market => true,
        OrderKind::Limit => {
            let price = order.limit_price.expect("limit order without limit_price");
            match order.side {
                Side::Bid => price >= opposite_price,
                Side::Ask => price <= opposite_price,
            }
        }
    }
}

/// Maker/taker price rule (§4.3): one market side takes the other's limit
/// price; two limits use the earlier-timestamped order's price, ties
/// broken in the bid's favor.
fn trade_price(bid: &Order, ask: &Order) -> Decimal {
    match (bid.kind, ask.kind) {
        (OrderKind::Market, OrderKind::Limit) => ask.limit_price.expect("ask without limit_price"),
        (OrderKind::Limit, OrderKind::Market) => bid.limit_price.expect("bid without limit_price"),
        (OrderKind::Market, OrderKind::Market) => {
            unreachable!("two market orders cannot both rest to cross each other")
        }
        (OrderKind::Limit, OrderKind::Limit) => {
            if bid.created_at <= ask.created_at {
                bid.limit_price.expect("bid without limit_price")
            } else {
                ask.limit_price.expect("ask without limit_price")
            }
        }
    }
}

/// Crosses `incoming` against `book`'s opposite side until it is either
/// fully filled or can no longer cross, then rests any limit residual.
/// Returns the trades appended by this call.
pub fn process(mut incoming: Order, book: &mut OrderBook) -> Result<Vec<Trade>, MatchingError> {
    let mut trades = Vec::new();
    let opposite_side = incoming.side.opposite();

    while !incoming.quantity.is_zero() {
        let opposite_price = match opposite_side {
            Side::Bid => book.best_bid(),
            Side::Ask => book.best_ask(),
        }
        .and_then(|o| o.limit_price);

        let Some(opposite_price) = opposite_price else {
            break;
        };

        if !crosses(&incoming, opposite_price) {
            break;
        }

        let fill = {
            let resting = match opposite_side {
                Side::Bid => book.best_bid().unwrap(),
                Side::Ask => book.best_ask().unwrap(),
            };
            incoming.quantity.min(resting.quantity)
        };

        let (price, resting_id, resting_exhausted) = {
            let resting_mut = match opposite_side {
                Side::Bid => book.best_bid_mut().unwrap(),
                Side::Ask => book.best_ask_mut().unwrap(),
            };

            let price = match incoming.side {
                Side::Bid => trade_price(&incoming, resting_mut),
                Side::Ask => trade_price(resting_mut, &incoming),
            };

            resting_mut.quantity -= fill;
            resting_mut.status = if resting_mut.quantity.is_zero() {
                OrderStatus::Filled
            } else {
                OrderStatus::PartiallyFilled
            };

            (price, resting_mut.id, resting_mut.quantity.is_zero())
        };

        incoming.quantity -= fill;
        incoming.status = if incoming.quantity.is_zero() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };

        if resting_exhausted {
            book.remove_matched(opposite_side, resting_id);
        }

        let (buy_order_id, sell_order_id) = match incoming.side {
            Side::Bid => (incoming.id, resting_id),
            Side::Ask => (resting_id, incoming.id),
        };

        let trade = Trade {
            trade_id: book.next_trade_id(),
            buy_order_id,
            sell_order_id,
            price,
            quantity: fill,
            ticker: book.ticker.clone(),
            created_at: incoming.created_at,
        };
        book.append_trade(trade.clone());
        trades.push(trade);
    }

    if !incoming.quantity.is_zero() {
        match incoming.kind {
            OrderKind::Limit => {
                book.add(incoming)?;
            }
            OrderKind::Market => {
                // Market residuals do not rest (§4.3 step 2); the unfilled
                // remainder is simply discarded.
            }
        }
    }

    Ok(trades)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::types::Order;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn limit(side: Side, price: Decimal, qty: Decimal) -> Order {
        Order::new(Uuid::new_v4(), "p1", "AAPL", side, OrderKind::Limit, Some(price), qty)
    }

    fn market(side: Side, qty: Decimal) -> Order {
        Order::new(Uuid::new_v4(), "p1", "AAPL", side, OrderKind::Market, None, qty)
    }

    #[test]
    fn noncrossing_limit_rests_without_trading() {
        let mut book = OrderBook::new("AAPL");
        book.add(limit(Side::Bid, dec!(9), dec!(1))).unwrap();
        let trades = process(limit(Side::Ask, dec!(11), dec!(1)), &mut book).unwrap();
        assert!(trades.is_empty());
        assert_eq!(book.best_ask().unwrap().quantity, dec!(1));
    }

    #[test]
    fn crossing_limit_fully_fills_resting_order() {
        let mut book = OrderBook::new("AAPL");
        book.add(limit(Side::Ask, dec!(10), dec!(1))).unwrap();
        let trades = process(limit(Side::Bid, dec!(10), dec!(1)), &mut book).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].price, dec!(10));
        assert_eq!(trades[0].quantity, dec!(1));
        assert!(book.best_ask().is_none());
    }

    #[test]
    fn partial_fill_leaves_residual_resting() {
        let mut book = OrderBook::new("AAPL");
        book.add(limit(Side::Ask, dec!(10), dec!(1))).unwrap();
        let trades = process(limit(Side::Bid, dec!(10), dec!(5)), &mut book).unwrap();
        assert_eq!(trades[0].quantity, dec!(1));
        assert_eq!(book.best_bid().unwrap().quantity, dec!(4));
    }

    #[test]
    fn market_order_takes_resting_limit_price() {
        let mut book = OrderBook::new("AAPL");
        book.add(limit(Side::Ask, dec!(12), dec!(1))).unwrap();
        let trades = process(market(Side::Bid, dec!(1)), &mut book).unwrap();
        assert_eq!(trades[0].price, dec!(12));
    }

    #[test]
    fn unfilled_market_residual_is_discarded_not_rested() {
        let mut book = OrderBook::new("AAPL");
        let trades = process(market(Side::Bid, dec!(5)), &mut book).unwrap();
        assert!(trades.is_empty());
        assert!(book.best_bid().is_none());
    }

    #[test]
    fn two_limit_cross_uses_earlier_timestamp_as_maker_price() {
        let mut book = OrderBook::new("AAPL");
        let mut resting = limit(Side::Ask, dec!(10), dec!(1));
        resting.created_at -= Duration::seconds(10);
        book.add(resting).unwrap();

        let trades = process(limit(Side::Bid, dec!(15), dec!(1)), &mut book).unwrap();
        assert_eq!(trades[0].price, dec!(10));
    }

    #[test]
    fn tied_timestamps_break_ties_to_bid_price() {
        let mut book = OrderBook::new("AAPL");
        let resting = limit(Side::Ask, dec!(10), dec!(1));
        let ts = resting.created_at;
        book.add(resting).unwrap();

        let mut incoming = limit(Side::Bid, dec!(15), dec!(1));
        incoming.created_at = ts;
        let trades = process(incoming, &mut book).unwrap();
        assert_eq!(trades[0].price, dec!(15));
    }
}
