//! Facade error aggregating every per-component error into one type for
//! callers that span components (the trade service, the managers).

use thiserror::Error;

use crate::domain::models::portfolio::PortfolioError;
use crate::domain::services::managers::ManagerError;
use crate::domain::services::matching_engine::MatchingError;
use crate::domain::services::order_book::OrderbookError;
use crate::domain::services::trade_service::TradeServiceError;

/// Umbrella error type for the crate's public surface.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Orderbook(#[from] OrderbookError),
    #[error(transparent)]
    Matching(#[from] MatchingError),
    #[error(transparent)]
    Portfolio(#[from] PortfolioError),
    #[error(transparent)]
    TradeService(#[from] TradeServiceError),
    #[error(transparent)]
    Manager(#[from] ManagerError),
}
