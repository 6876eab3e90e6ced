//! Source adapters: one per public market-data provider, all implementing
//! [`SourceAdapter`] so the collector can treat them uniformly.

mod binance;
mod coinbase;
mod coingecko;
mod coinmarketcap;
mod kraken;
mod okex;

pub use binance::BinanceAdapter;
pub use coinbase::CoinbaseAdapter;
pub use coingecko::CoinGeckoAdapter;
pub use coinmarketcap::CoinMarketCapAdapter;
pub use kraken::KrakenAdapter;
pub use okex::OkexAdapter;

use async_trait::async_trait;

use crate::errors::OracleResult;
use crate::symbols::CanonicalSymbol;
use crate::types::RawPriceQuote;

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_name(&self) -> &str;

    fn is_enabled(&self) -> bool;

    fn supported_symbols(&self) -> Vec<CanonicalSymbol>;

    /// Fetches quotes for all requested symbols this adapter supports,
    /// silently skipping ones it doesn't carry a mapping for. Returns
    /// `UnsupportedSymbol` only if none of the requested symbols are mapped.
    async fn fetch_batch(&self, symbols: &[CanonicalSymbol]) -> OracleResult<Vec<RawPriceQuote>>;

    /// Fetches a single symbol; the default plumbs through `fetch_batch`.
    async fn fetch(&self, symbol: &CanonicalSymbol) -> OracleResult<RawPriceQuote> {
        let quotes = self.fetch_batch(std::slice::from_ref(symbol)).await?;
        quotes
            .into_iter()
            .find(|q| &q.symbol == symbol)
            .ok_or_else(|| crate::errors::OracleError::NoDataCollected(symbol.to_string()))
    }
}

/// Dispatches across the six concrete source adapters without going through
/// dynamic trait objects for the enum's own bookkeeping, while still exposing
/// a uniform `&dyn SourceAdapter` view to the collector.
pub enum AnySourceAdapter {
    Binance(BinanceAdapter),
    Coinbase(CoinbaseAdapter),
    Okex(OkexAdapter),
    CoinMarketCap(CoinMarketCapAdapter),
    CoinGecko(CoinGeckoAdapter),
    Kraken(KrakenAdapter),
}

impl AnySourceAdapter {
    pub fn as_adapter(&self) -> &dyn SourceAdapter {
        match self {
            AnySourceAdapter::Binance(a) => a,
            AnySourceAdapter::Coinbase(a) => a,
            AnySourceAdapter::Okex(a) => a,
            AnySourceAdapter::CoinMarketCap(a) => a,
            AnySourceAdapter::CoinGecko(a) => a,
            AnySourceAdapter::Kraken(a) => a,
        }
    }
}
