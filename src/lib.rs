pub mod config;
pub mod domain;
pub mod error;
pub mod facade;

pub use config::Config;
pub use domain::models::portfolio::{
    Portfolio, PortfolioError, Position, PositionRequest, PositionType, RequestAction,
};
pub use domain::models::types::{Order, OrderKind, OrderStatus, Side, Trade};
pub use domain::services::managers::{
    ManagerError, NullRepository, OrderBookManager, PortfolioManager, Repository,
};
pub use domain::services::matching_engine::{self, MatchingError};
pub use domain::services::order_book::{OrderBook, OrderbookError};
pub use domain::services::trade_service::{BatchSummary, TradeService, TradeServiceError};
pub use error::CoreError;
pub use facade::{BookView, OrderRequest, OrderSubmission, PortfolioView, ProcessSummary, TradingCore};
