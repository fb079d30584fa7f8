//! Transport-agnostic caller-facing operations (§6): the handful of
//! request/response shapes a surrounding HTTP or CLI layer would call
//! into, with every error expressed as a typed [`CoreError`] variant
//! rather than a string.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::models::portfolio::{PositionRequest, PositionType};
use crate::domain::models::types::{Order, OrderKind, Side};
use crate::domain::services::managers::{OrderBookManager, PortfolioManager, Repository};
use crate::domain::services::matching_engine;
use crate::domain::services::order_book::OrderBook;
use crate::domain::services::trade_service::{BatchSummary, TradeService};
use crate::error::CoreError;

/// A caller's request to place a new order against one instrument.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub side: Side,
    pub kind: OrderKind,
    pub limit_price: Option<Decimal>,
    pub quantity: Decimal,
}

/// Result of `submit_order`: how much of the request was filled
/// immediately versus left resting (or discarded, for an unfilled market
/// order).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSubmission {
    pub order_id: Uuid,
    pub original_qty: Decimal,
    pub executed_qty: Decimal,
    pub remaining_qty: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioView {
    pub cash: Decimal,
    pub commission_rate: Decimal,
    pub positions_by_ticker: std::collections::HashMap<String, Decimal>,
    pub total_value: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookView {
    pub best_bid_price: Option<Decimal>,
    pub best_ask_price: Option<Decimal>,
    pub spread: Option<Decimal>,
    pub order_count: usize,
    pub trade_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    pub processed: usize,
    pub remaining: usize,
}

/// The crate's single entry point for callers that don't want to reach
/// into the manager/service layer directly. Owns no state beyond the two
/// managers; every operation is a thin, validated pass-through.
pub struct TradingCore {
    books: OrderBookManager,
    portfolios: PortfolioManager,
}

impl TradingCore {
    pub fn new(
        book_repository: Arc<dyn Repository<OrderBook>>,
        portfolio_repository: Arc<dyn Repository<crate::domain::models::portfolio::Portfolio>>,
        default_commission_rate: Decimal,
    ) -> Self {
        Self {
            books: OrderBookManager::new(book_repository),
            portfolios: PortfolioManager::new(portfolio_repository, default_commission_rate),
        }
    }

    pub fn get_portfolio(&self, portfolio_id: &str) -> Result<PortfolioView, CoreError> {
        let portfolio = self.portfolios.get_or_create(portfolio_id)?;
        let portfolio = portfolio.lock();
        let positions_by_ticker = portfolio
            .positions
            .iter()
            .map(|(ticker, position)| (ticker.clone(), position.quantity))
            .collect();
        Ok(PortfolioView {
            cash: portfolio.cash,
            commission_rate: portfolio.commission_rate,
            positions_by_ticker,
            total_value: portfolio.total_portfolio_value(),
        })
    }

    pub fn get_book(&self, ticker: &str) -> Result<BookView, CoreError> {
        let book = self.books.get_or_create(ticker)?;
        let mut book = book.lock();
        Ok(BookView {
            best_bid_price: book.best_bid().and_then(|o| o.limit_price),
            best_ask_price: book.best_ask().and_then(|o| o.limit_price),
            spread: book.spread(),
            order_count: book.order_count(),
            trade_count: book.trade_count(),
        })
    }

    /// Synthesizes an `Order` from `request`, assigns it a unique id, and
    /// runs it through the matching engine against `ticker`'s book.
    pub fn submit_order(
        &self,
        portfolio_id: &str,
        ticker: &str,
        request: OrderRequest,
    ) -> Result<OrderSubmission, CoreError> {
        let book_lock = self.books.get_or_create(ticker)?;
        let mut book = book_lock.lock();

        let order_id = Uuid::new_v4();
        let original_qty = request.quantity;
        let order = Order::new(
            order_id,
            portfolio_id,
            ticker,
            request.side,
            request.kind,
            request.limit_price,
            request.quantity,
        );

        let trades = matching_engine::process(order, &mut book)?;
        let executed_qty: Decimal = trades
            .iter()
            .filter(|t| t.buy_order_id == order_id || t.sell_order_id == order_id)
            .map(|t| t.quantity)
            .sum();

        Ok(OrderSubmission {
            order_id,
            original_qty,
            executed_qty,
            remaining_qty: original_qty - executed_qty,
        })
    }

    pub fn submit_trade_request(
        &self,
        portfolio_id: &str,
        ticker: &str,
        position_type: PositionType,
        action: crate::domain::models::portfolio::RequestAction,
        quantity: Decimal,
        price: Decimal,
        commission: Decimal,
    ) -> Result<usize, CoreError> {
        let portfolio_lock = self.portfolios.get_or_create(portfolio_id)?;
        let mut portfolio = portfolio_lock.lock();
        let trade_id = format!("{portfolio_id}_{}", portfolio.request_history.len() + portfolio.trade_requests.len() + 1);
        let depth = portfolio.submit_request(PositionRequest {
            trade_id,
            ticker: ticker.to_string(),
            position_type,
            action,
            quantity,
            price,
            commission,
            created_at: chrono::Utc::now(),
        });
        Ok(depth)
    }

    /// Drains `portfolio_id`'s queue, stopping at the first unserved
    /// request or error so the caller sees an accurate `remaining` count
    /// rather than a silent partial drain.
    pub fn process_trades(&self, portfolio_id: &str) -> Result<ProcessSummary, CoreError> {
        let portfolio_lock = self.portfolios.get_or_create(portfolio_id)?;
        let mut processed = 0;
        loop {
            let has_next = { !portfolio_lock.lock().trade_requests.is_empty() };
            if !has_next {
                break;
            }
            match TradeService::process_portfolio(&self.books, &self.portfolios, portfolio_id) {
                Ok(drained) => processed += drained,
                Err(err) => return Err(CoreError::from(err)),
            }
        }
        let remaining = portfolio_lock.lock().trade_requests.len();
        Ok(ProcessSummary { processed, remaining })
    }

    pub fn process_all_trades(&self) -> BatchSummary {
        TradeService::process_all(&self.books, &self.portfolios)
    }
}
