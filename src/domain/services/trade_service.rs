//! Drains a portfolio's pending `PositionRequest` queue against the
//! matching engine and applies executed fills back to the portfolio.

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::models::portfolio::{Portfolio, PortfolioError, RequestAction};
use crate::domain::models::types::{Order, OrderKind};

use super::managers::{ManagerError, OrderBookManager, PortfolioManager};
use super::matching_engine::{self, MatchingError};

#[derive(Debug, Error)]
pub enum TradeServiceError {
    #[error("position request for {ticker} went unserved (no quantity executed)")]
    Unserved { ticker: String },
    #[error(transparent)]
    Matching(#[from] MatchingError),
    #[error(transparent)]
    Portfolio(#[from] PortfolioError),
    #[error(transparent)]
    Manager(#[from] ManagerError),
}

/// Outcome counters for a batched `process_all` run (§4.5).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub fully_processed: usize,
    pub partially_processed: usize,
    pub total_requests_drained: usize,
}

/// Stateless coordinator between a `PortfolioManager` and an
/// `OrderBookManager`. Holds no data of its own; every call takes the
/// managers it needs, mirroring the trade/portfolio services of the
/// system this core was distilled from.
pub struct TradeService;

impl TradeService {
    /// Drains `portfolio_id`'s request queue in FIFO order, one request at
    /// a time: synthesize an order, match it, then fold the executed
    /// quantity back into the portfolio. Returns the number of requests
    /// drained (served or not).
    pub fn process_portfolio(
        books: &OrderBookManager,
        portfolios: &PortfolioManager,
        portfolio_id: &str,
    ) -> Result<usize, TradeServiceError> {
        let portfolio_lock = portfolios.get_or_create(portfolio_id)?;
        let mut portfolio = portfolio_lock.lock();

        let mut drained = 0;
        while let Some(request) = portfolio.trade_requests.pop_front() {
            drained += 1;
            Self::apply_request(books, &mut portfolio, request)?;
        }
        Ok(drained)
    }

    fn apply_request(
        books: &OrderBookManager,
        portfolio: &mut Portfolio,
        request: crate::domain::models::portfolio::PositionRequest,
    ) -> Result<(), TradeServiceError> {
        let side = request.side();
        let order = Order::new(
            Uuid::new_v4(),
            portfolio.portfolio_id.clone(),
            request.ticker.clone(),
            side,
            OrderKind::Limit,
            Some(request.price),
            request.quantity,
        );
        let order_id = order.id;

        let book_lock = books.get_or_create(&request.ticker)?;
        let (executed_qty, executed_price): (Decimal, Decimal) = {
            let mut book = book_lock.lock();
            let trades = matching_engine::process(order, &mut book)?;
            let matched: Vec<_> = trades
                .iter()
                .filter(|t| t.buy_order_id == order_id || t.sell_order_id == order_id)
                .collect();
            let qty: Decimal = matched.iter().map(|t| t.quantity).sum();
            let notional: Decimal = matched.iter().map(|t| t.price * t.quantity).sum();
            let price = if qty.is_zero() { Decimal::ZERO } else { notional / qty };
            (qty, price)
        };

        portfolio.request_history.push(request.clone());

        if executed_qty.is_zero() {
            warn!(ticker = %request.ticker, "position request went unserved");
            return Err(TradeServiceError::Unserved {
                ticker: request.ticker,
            });
        }

        match request.action {
            RequestAction::Open => {
                portfolio.open_position(
                    &request.ticker,
                    request.position_type,
                    executed_qty,
                    request.price,
                    request.commission,
                )?;
            }
            RequestAction::Close => {
                // §4.4: current_price is the matched execution price, not
                // the requested price — volume-weighted across partial fills.
                portfolio.close_position(
                    &request.ticker,
                    Some(executed_qty),
                    executed_price,
                    request.commission,
                )?;
            }
        }

        info!(ticker = %request.ticker, trade_id = %request.trade_id, "position request completed");
        Ok(())
    }

    /// Applies `process_portfolio` to every portfolio known to `portfolios`,
    /// in arbitrary-but-stable order, returning aggregate counters.
    pub fn process_all(
        books: &OrderBookManager,
        portfolios: &PortfolioManager,
    ) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for portfolio_id in portfolios.known_ids() {
            let before = match portfolios.get_or_create(&portfolio_id) {
                Ok(lock) => lock.lock().trade_requests.len(),
                Err(_) => continue,
            };
            if before == 0 {
                continue;
            }

            match Self::process_portfolio(books, portfolios, &portfolio_id) {
                Ok(drained) => {
                    summary.total_requests_drained += drained;
                    summary.fully_processed += 1;
                }
                Err(_) => {
                    summary.partially_processed += 1;
                }
            }
        }
        summary
    }
}
