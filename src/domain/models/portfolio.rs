//! Portfolio accounting: cash, net positions, and the FIFO of pending
//! position requests a [`crate::domain::services::trade_service::TradeService`]
//! drains.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::Side;

/// Long or short exposure to one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionType {
    Long,
    Short,
}

/// Whether a request opens new exposure or closes existing exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestAction {
    Open,
    Close,
}

/// Net directional exposure to one instrument. Created on the first
/// opening fill, mutated per fill, destroyed when quantity reaches zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticker: String,
    pub position_type: PositionType,
    /// Volume-weighted average price of opens at the current direction.
    pub entry_price: Decimal,
    pub quantity: Decimal,
}

/// A portfolio's intent to open or close a position, queued until the
/// trade service realizes it against a book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRequest {
    pub trade_id: String,
    pub ticker: String,
    pub position_type: PositionType,
    pub action: RequestAction,
    pub quantity: Decimal,
    pub price: Decimal,
    pub commission: Decimal,
    pub created_at: DateTime<Utc>,
}

impl PositionRequest {
    /// Open-long and close-short map to bid; open-short and close-long map
    /// to ask (§3).
    pub fn side(&self) -> Side {
        use PositionType::*;
        use RequestAction::*;
        match (self.action, self.position_type) {
            (Open, Long) | (Close, Short) => Side::Bid,
            (Open, Short) | (Close, Long) => Side::Ask,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PortfolioError {
    #[error("position request for {0} is not affordable")]
    Unaffordable(String),
    #[error("no position exists for ticker {0}")]
    NoSuchPosition(String),
    #[error("close quantity {close} exceeds position quantity {held} for {ticker}")]
    CloseExceedsPosition {
        ticker: String,
        close: Decimal,
        held: Decimal,
    },
    #[error("quantity and price must be strictly positive")]
    NonPositiveAmount,
}

/// Cash balance, positions keyed by ticker, and the pending request queue
/// for one account. Positions and the queue are exclusively owned here; no
/// aliasing to book orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub portfolio_id: String,
    pub cash: Decimal,
    pub commission_rate: Decimal,
    pub positions: HashMap<String, Position>,
    pub trade_requests: VecDeque<PositionRequest>,
    pub request_history: Vec<PositionRequest>,
    /// Optional cap on a single position's share of total portfolio value.
    /// Disabled (`None`) by default; see §10.3.
    pub max_position_size: Option<Decimal>,
    /// When set, opens are rejected while total portfolio value is zero.
    pub require_nonzero_total_value: bool,
}

impl Portfolio {
    pub fn new(portfolio_id: impl Into<String>, commission_rate: Decimal) -> Self {
        Self {
            portfolio_id: portfolio_id.into(),
            cash: Decimal::ZERO,
            commission_rate,
            positions: HashMap::new(),
            trade_requests: VecDeque::new(),
            request_history: Vec::new(),
            max_position_size: None,
            require_nonzero_total_value: false,
        }
    }

    /// Current mark-to-market value of all held positions, using each
    /// position's entry price (this core has no external price feed).
    pub fn total_market_value(&self) -> Decimal {
        self.positions
            .values()
            .map(|p| p.entry_price * p.quantity)
            .sum()
    }

    pub fn total_portfolio_value(&self) -> Decimal {
        self.cash + self.total_market_value()
    }

    pub fn buying_power(&self) -> Decimal {
        self.cash.max(Decimal::ZERO)
    }

    /// Pre-trade affordability gate for opens (§4.4).
    pub fn can_afford_position(&self, quantity: Decimal, price: Decimal) -> bool {
        if quantity <= Decimal::ZERO || price <= Decimal::ZERO {
            return false;
        }

        let position_value = quantity * price;
        let commission = position_value * self.commission_rate;
        let total_cost = position_value + commission;

        if total_cost > self.buying_power() {
            return false;
        }

        let total_value = self.total_portfolio_value();
        if self.require_nonzero_total_value && total_value.is_zero() {
            return false;
        }

        if let Some(cap) = self.max_position_size {
            if !total_value.is_zero() && position_value / total_value > cap {
                return false;
            }
        }

        true
    }

    /// Opens or augments a position per the §4.4 open rules. Cash is only
    /// touched after the position mutation succeeds.
    pub fn open_position(
        &mut self,
        ticker: &str,
        position_type: PositionType,
        quantity: Decimal,
        price: Decimal,
        commission: Decimal,
    ) -> Result<(), PortfolioError> {
        if !self.can_afford_position(quantity, price) {
            return Err(PortfolioError::Unaffordable(ticker.to_string()));
        }

        let mut delete_position = false;

        match self.positions.get_mut(ticker) {
            None => {
                self.positions.insert(
                    ticker.to_string(),
                    Position {
                        ticker: ticker.to_string(),
                        position_type,
                        entry_price: price,
                        quantity,
                    },
                );
            }
            Some(existing) if existing.position_type == position_type => {
                let total_quantity = existing.quantity + quantity;
                existing.entry_price = (existing.entry_price * existing.quantity + price * quantity)
                    / total_quantity;
                existing.quantity = total_quantity;
            }
            Some(existing) => {
                let net = existing.quantity - quantity;
                if net > Decimal::ZERO {
                    existing.quantity = net;
                } else if net < Decimal::ZERO {
                    existing.quantity = -net;
                    existing.position_type = position_type;
                    existing.entry_price = price;
                } else {
                    delete_position = true;
                }
            }
        }

        if delete_position {
            self.positions.remove(ticker);
        }

        let position_value = quantity * price;
        match position_type {
            PositionType::Long => self.cash -= position_value + commission,
            PositionType::Short => self.cash += position_value - commission,
        }

        Ok(())
    }

    /// Closes all or part of an existing position at `current_price` (the
    /// matched execution price, per §4.4's resolution of the close-price
    /// source).
    pub fn close_position(
        &mut self,
        ticker: &str,
        quantity: Option<Decimal>,
        current_price: Decimal,
        commission: Decimal,
    ) -> Result<(), PortfolioError> {
        let position = self
            .positions
            .get(ticker)
            .ok_or_else(|| PortfolioError::NoSuchPosition(ticker.to_string()))?;

        let close_quantity = quantity.unwrap_or(position.quantity);
        if close_quantity > position.quantity {
            return Err(PortfolioError::CloseExceedsPosition {
                ticker: ticker.to_string(),
                close: close_quantity,
                held: position.quantity,
            });
        }

        let position_type = position.position_type;
        let remaining = position.quantity - close_quantity;

        if remaining.is_zero() {
            self.positions.remove(ticker);
        } else {
            self.positions.get_mut(ticker).unwrap().quantity = remaining;
        }

        let proceeds = close_quantity * current_price;
        match position_type {
            PositionType::Long => self.cash += proceeds - commission,
            PositionType::Short => self.cash -= proceeds + commission,
        }

        Ok(())
    }

    /// Builds a request and appends it to both the pending queue and the
    /// processed-request history is the trade service's job; this only
    /// enqueues.
    pub fn submit_request(&mut self, request: PositionRequest) -> usize {
        self.trade_requests.push_back(request);
        self.trade_requests.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn portfolio_with_cash(cash: Decimal) -> Portfolio {
        let mut p = Portfolio::new("p1", dec!(0.001));
        p.cash = cash;
        p
    }

    #[test]
    fn affordability_rejects_nonpositive_inputs() {
        let p = portfolio_with_cash(dec!(1000));
        assert!(!p.can_afford_position(dec!(0), dec!(10)));
        assert!(!p.can_afford_position(dec!(1), dec!(0)));
    }

    #[test]
    fn affordability_rejects_insufficient_cash() {
        let p = portfolio_with_cash(dec!(100));
        assert!(!p.can_afford_position(dec!(10), dec!(20)));
    }

    #[test]
    fn open_long_debits_cash_and_creates_position() {
        let mut p = portfolio_with_cash(dec!(1000));
        p.open_position("AAPL", PositionType::Long, dec!(5), dec!(10), dec!(0.05))
            .unwrap();
        assert_eq!(p.cash, dec!(1000) - dec!(50) - dec!(0.05));
        let pos = p.positions.get("AAPL").unwrap();
        assert_eq!(pos.quantity, dec!(5));
        assert_eq!(pos.entry_price, dec!(10));
    }

    #[test]
    fn open_short_credits_cash() {
        let mut p = portfolio_with_cash(dec!(1000));
        p.open_position("AAPL", PositionType::Short, dec!(5), dec!(10), dec!(0.05))
            .unwrap();
        assert_eq!(p.cash, dec!(1000) + dec!(50) - dec!(0.05));
    }

    #[test]
    fn same_direction_open_averages_entry_price() {
        let mut p = portfolio_with_cash(dec!(10000));
        p.open_position("AAPL", PositionType::Long, dec!(10), dec!(10), dec!(0))
            .unwrap();
        p.open_position("AAPL", PositionType::Long, dec!(10), dec!(20), dec!(0))
            .unwrap();
        let pos = p.positions.get("AAPL").unwrap();
        assert_eq!(pos.quantity, dec!(20));
        assert_eq!(pos.entry_price, dec!(15));
    }

    #[test]
    fn opposite_direction_nets_down_without_flipping() {
        let mut p = portfolio_with_cash(dec!(10000));
        p.open_position("AAPL", PositionType::Long, dec!(10), dec!(10), dec!(0))
            .unwrap();
        p.open_position("AAPL", PositionType::Short, dec!(4), dec!(12), dec!(0))
            .unwrap();
        let pos = p.positions.get("AAPL").unwrap();
        assert_eq!(pos.position_type, PositionType::Long);
        assert_eq!(pos.quantity, dec!(6));
    }

    #[test]
    fn opposite_direction_flips_when_exceeding() {
        let mut p = portfolio_with_cash(dec!(10000));
        p.open_position("AAPL", PositionType::Long, dec!(4), dec!(10), dec!(0))
            .unwrap();
        p.open_position("AAPL", PositionType::Short, dec!(10), dec!(12), dec!(0))
            .unwrap();
        let pos = p.positions.get("AAPL").unwrap();
        assert_eq!(pos.position_type, PositionType::Short);
        assert_eq!(pos.quantity, dec!(6));
        assert_eq!(pos.entry_price, dec!(12));
    }

    #[test]
    fn opposite_direction_exact_net_removes_position() {
        let mut p = portfolio_with_cash(dec!(10000));
        p.open_position("AAPL", PositionType::Long, dec!(5), dec!(10), dec!(0))
            .unwrap();
        p.open_position("AAPL", PositionType::Short, dec!(5), dec!(12), dec!(0))
            .unwrap();
        assert!(!p.positions.contains_key("AAPL"));
    }

    #[test]
    fn close_exceeding_quantity_is_rejected() {
        let mut p = portfolio_with_cash(dec!(10000));
        p.open_position("AAPL", PositionType::Long, dec!(5), dec!(10), dec!(0))
            .unwrap();
        let err = p.close_position("AAPL", Some(dec!(6)), dec!(10), dec!(0));
        assert!(matches!(err, Err(PortfolioError::CloseExceedsPosition { .. })));
    }

    #[test]
    fn full_close_credits_cash_and_removes_position() {
        let mut p = portfolio_with_cash(dec!(10000));
        p.open_position("AAPL", PositionType::Long, dec!(5), dec!(10), dec!(0))
            .unwrap();
        let cash_after_open = p.cash;
        p.close_position("AAPL", None, dec!(12), dec!(0.1)).unwrap();
        assert_eq!(p.cash, cash_after_open + dec!(60) - dec!(0.1));
        assert!(!p.positions.contains_key("AAPL"));
    }

    #[test]
    fn partial_close_reduces_quantity_only() {
        let mut p = portfolio_with_cash(dec!(10000));
        p.open_position("AAPL", PositionType::Long, dec!(5), dec!(10), dec!(0))
            .unwrap();
        p.close_position("AAPL", Some(dec!(2)), dec!(12), dec!(0))
            .unwrap();
        let pos = p.positions.get("AAPL").unwrap();
        assert_eq!(pos.quantity, dec!(3));
    }

    #[test]
    fn request_side_mapping_follows_open_close_and_direction() {
        let open_long = PositionRequest {
            trade_id: "t1".into(),
            ticker: "AAPL".into(),
            position_type: PositionType::Long,
            action: RequestAction::Open,
            quantity: dec!(1),
            price: dec!(1),
            commission: dec!(0),
            created_at: Utc::now(),
        };
        assert_eq!(open_long.side(), Side::Bid);

        let close_long = PositionRequest {
            action: RequestAction::Close,
            ..open_long.clone()
        };
        assert_eq!(close_long.side(), Side::Ask);
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let mut p = portfolio_with_cash(dec!(1000));
        p.open_position("AAPL", PositionType::Long, dec!(5), dec!(10), dec!(0))
            .unwrap();

        let json = serde_json::to_string(&p).unwrap();
        let restored: Portfolio = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.cash, p.cash);
        assert_eq!(restored.positions.get("AAPL"), p.positions.get("AAPL"));
    }
}
