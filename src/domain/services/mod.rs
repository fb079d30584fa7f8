pub mod managers;
pub mod matching_engine;
pub mod order_book;
pub mod price_level;
pub mod trade_service;
