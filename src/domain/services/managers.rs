//! Lazy load-or-create managers for order books and portfolios, each
//! backed by an opaque, synchronous `Repository` collaborator.
//!
//! A manager never holds its entity lock while calling the repository: a
//! cache miss clones/constructs the default entity, drops any lock, then
//! talks to the repository.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use crate::domain::models::portfolio::Portfolio;

use super::order_book::OrderBook;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("repository failed to load key {0}: {1}")]
    RepositoryLoad(String, String),
    #[error("repository failed to save key {0}: {1}")]
    RepositorySave(String, String),
}

/// A snapshot a repository can round-trip. Books and portfolios are
/// serialized independently; the repository itself is opaque to the
/// managers beyond this contract.
pub trait Repository<T>: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<T>, ManagerError>;
    fn save(&self, key: &str, value: &T) -> Result<(), ManagerError>;
}

/// A repository that never persists anything; every `load` misses and
/// every `save` is a no-op. Suitable as a default when no external
/// key-value store is wired in (§1 names the repository as an external
/// collaborator, not part of this core).
pub struct NullRepository;

impl<T> Repository<T> for NullRepository {
    fn load(&self, _key: &str) -> Result<Option<T>, ManagerError> {
        Ok(None)
    }

    fn save(&self, _key: &str, _value: &T) -> Result<(), ManagerError> {
        Ok(())
    }
}

/// Owns an in-memory cache of `OrderBook`s keyed by ticker plus a handle
/// to a `Repository`. `get_or_create` is the only way to obtain a book
/// handle; `save` is explicit write-through.
pub struct OrderBookManager {
    repository: Arc<dyn Repository<OrderBook>>,
    books: RwLock<HashMap<String, Arc<Mutex<OrderBook>>>>,
}

impl OrderBookManager {
    pub fn new(repository: Arc<dyn Repository<OrderBook>>) -> Self {
        Self {
            repository,
            books: RwLock::new(HashMap::new()),
        }
    }

    fn repo_key(ticker: &str) -> String {
        format!("orderbook:{ticker}")
    }

    /// Returns the book for `ticker`, loading from the repository (or
    /// constructing a fresh empty book on a miss) if not already cached.
    pub fn get_or_create(&self, ticker: &str) -> Result<Arc<Mutex<OrderBook>>, ManagerError> {
        if let Some(book) = self.books.read().get(ticker) {
            return Ok(Arc::clone(book));
        }

        let loaded = self.repository.load(&Self::repo_key(ticker))?;
        let book = match loaded {
            Some(book) => {
                info!(ticker, "loaded order book from repository");
                book
            }
            None => {
                info!(ticker, "created new order book");
                OrderBook::new(ticker)
            }
        };

        let entry = Arc::new(Mutex::new(book));
        self.books
            .write()
            .insert(ticker.to_string(), Arc::clone(&entry));
        Ok(entry)
    }

    /// Write-through: persists the current in-memory state of `ticker`'s
    /// book. A no-op (with a warning) if the book is not cached.
    pub fn save(&self, ticker: &str) -> Result<(), ManagerError> {
        let Some(book) = self.books.read().get(ticker).cloned() else {
            tracing::warn!(ticker, "order book does not exist, nothing to save");
            return Ok(());
        };
        let snapshot = book.lock().clone();
        self.repository.save(&Self::repo_key(ticker), &snapshot)
    }

    pub fn known_tickers(&self) -> Vec<String> {
        self.books.read().keys().cloned().collect()
    }
}

/// Owns an in-memory cache of `Portfolio`s keyed by portfolio id plus a
/// handle to a `Repository`.
pub struct PortfolioManager {
    repository: Arc<dyn Repository<Portfolio>>,
    portfolios: RwLock<HashMap<String, Arc<Mutex<Portfolio>>>>,
    default_commission_rate: Decimal,
}

impl PortfolioManager {
    pub fn new(repository: Arc<dyn Repository<Portfolio>>, default_commission_rate: Decimal) -> Self {
        Self {
            repository,
            portfolios: RwLock::new(HashMap::new()),
            default_commission_rate,
        }
    }

    fn repo_key(portfolio_id: &str) -> String {
        format!("portfolio:{portfolio_id}")
    }

    pub fn get_or_create(&self, portfolio_id: &str) -> Result<Arc<Mutex<Portfolio>>, ManagerError> {
        if let Some(portfolio) = self.portfolios.read().get(portfolio_id) {
            return Ok(Arc::clone(portfolio));
        }

        let loaded = self.repository.load(&Self::repo_key(portfolio_id))?;
        let portfolio = match loaded {
            Some(portfolio) => {
                info!(portfolio_id, "loaded portfolio from repository");
                portfolio
            }
            None => {
                info!(portfolio_id, "created new portfolio");
                Portfolio::new(portfolio_id, self.default_commission_rate)
            }
        };

        let entry = Arc::new(Mutex::new(portfolio));
        self.portfolios
            .write()
            .insert(portfolio_id.to_string(), Arc::clone(&entry));
        Ok(entry)
    }

    pub fn save(&self, portfolio_id: &str) -> Result<(), ManagerError> {
        let Some(portfolio) = self.portfolios.read().get(portfolio_id).cloned() else {
            tracing::warn!(portfolio_id, "portfolio does not exist, nothing to save");
            return Ok(());
        };
        let snapshot = portfolio.lock().clone();
        self.repository.save(&Self::repo_key(portfolio_id), &snapshot)
    }

    /// Ids of portfolios currently cached in memory, in arbitrary-but-
    /// stable order, for `TradeService::process_all` (§4.5).
    pub fn known_ids(&self) -> Vec<String> {
        self.portfolios.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn get_or_create_constructs_default_on_miss() {
        let manager = OrderBookManager::new(Arc::new(NullRepository));
        let book = manager.get_or_create("AAPL").unwrap();
        assert_eq!(book.lock().ticker, "AAPL");
    }

    #[test]
    fn get_or_create_reuses_cached_entity() {
        let manager = OrderBookManager::new(Arc::new(NullRepository));
        let first = manager.get_or_create("AAPL").unwrap();
        let second = manager.get_or_create("AAPL").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn portfolio_manager_seeds_default_commission_rate() {
        let manager = PortfolioManager::new(Arc::new(NullRepository), dec!(0.001));
        let portfolio = manager.get_or_create("p1").unwrap();
        assert_eq!(portfolio.lock().commission_rate, dec!(0.001));
    }

    #[test]
    fn save_on_uncached_portfolio_is_a_harmless_noop() {
        let manager = PortfolioManager::new(Arc::new(NullRepository), dec!(0.001));
        assert!(manager.save("ghost").is_ok());
    }
}
