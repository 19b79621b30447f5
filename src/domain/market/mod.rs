//! Market data domain - quotes, data types and upstream sources

mod quote;
mod source;

pub use quote::{
    DataSource, DataType, ExchangeRate, JpStockQuote, MutualFundQuote, Quote, QuoteDetails,
    UsStockQuote,
};
pub use source::MarketDataSource;

#[cfg(test)]
pub use source::MockMarketDataSource;
