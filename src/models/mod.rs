pub mod market;

pub use market::{create_trading_pairs, QuoteItem, TradingPair};
