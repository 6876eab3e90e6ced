//! Fans a symbol set out to every enabled source adapter concurrently and
//! gathers whatever quotes come back, tolerating individual source failures.

use std::time::Duration;

use futures::future::join_all;
use tracing::warn;

use crate::adapters::{AnySourceAdapter, SourceAdapter};
use crate::errors::{OracleError, OracleResult};
use crate::symbols::CanonicalSymbol;
use crate::types::RawPriceQuote;

pub struct Collector {
    adapters: Vec<AnySourceAdapter>,
    per_adapter_timeout: Duration,
}

impl Collector {
    pub fn new(adapters: Vec<AnySourceAdapter>, per_adapter_timeout: Duration) -> Self {
        Self {
            adapters,
            per_adapter_timeout,
        }
    }

    /// Queries every enabled adapter for the given symbols concurrently, each
    /// under its own deadline. A source that errors or times out is logged
    /// and excluded; the run only fails if every enabled source fails,
    /// producing `NoDataCollected`.
    pub async fn collect(&self, symbols: &[CanonicalSymbol]) -> OracleResult<Vec<RawPriceQuote>> {
        let enabled: Vec<&dyn SourceAdapter> = self
            .adapters
            .iter()
            .map(AnySourceAdapter::as_adapter)
            .filter(|a| a.is_enabled())
            .collect();

        if enabled.is_empty() {
            return Err(OracleError::Configuration(
                "no source adapters are enabled".to_string(),
            ));
        }

        let futures = enabled
            .iter()
            .map(|adapter| tokio::time::timeout(self.per_adapter_timeout, adapter.fetch_batch(symbols)));
        let results = join_all(futures).await;

        let mut quotes = Vec::new();
        let mut failures = 0;
        for (adapter, result) in enabled.iter().zip(results) {
            match result {
                Ok(Ok(mut source_quotes)) => quotes.append(&mut source_quotes),
                Ok(Err(e)) => {
                    failures += 1;
                    warn!(source = adapter.source_name(), error = %e, "source fetch failed");
                }
                Err(_elapsed) => {
                    failures += 1;
                    warn!(
                        source = adapter.source_name(),
                        timeout = ?self.per_adapter_timeout,
                        "source fetch timed out"
                    );
                }
            }
        }

        if quotes.is_empty() {
            return Err(OracleError::NoDataCollected(
                symbols
                    .iter()
                    .map(CanonicalSymbol::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
            ));
        }

        if failures > 0 {
            warn!(failed_sources = failures, succeeded = enabled.len() - failures, "partial collection");
        }

        Ok(quotes)
    }

    /// Groups the flat quote list collected above by symbol, as the
    /// aggregator expects one batch of quotes per symbol.
    pub fn group_by_symbol(
        quotes: Vec<RawPriceQuote>,
    ) -> std::collections::HashMap<CanonicalSymbol, Vec<RawPriceQuote>> {
        let mut grouped: std::collections::HashMap<CanonicalSymbol, Vec<RawPriceQuote>> =
            std::collections::HashMap::new();
        for quote in quotes {
            grouped.entry(quote.symbol.clone()).or_default().push(quote);
        }
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawPriceQuote;
    use bigdecimal::BigDecimal;
    use chrono::Utc;
    use std::str::FromStr;

    fn quote(symbol: &str, source: &str, price: &str) -> RawPriceQuote {
        RawPriceQuote {
            source: source.to_string(),
            symbol: CanonicalSymbol::new(symbol, "USDT"),
            price: BigDecimal::from_str(price).unwrap(),
            volume_24h: None,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn group_by_symbol_partitions_correctly() {
        let quotes = vec![
            quote("BTC", "binance", "50000"),
            quote("ETH", "binance", "3000"),
            quote("BTC", "coinbase", "50010"),
        ];

        let grouped = Collector::group_by_symbol(quotes);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&CanonicalSymbol::new("BTC", "USDT")].len(), 2);
        assert_eq!(grouped[&CanonicalSymbol::new("ETH", "USDT")].len(), 1);
    }
}
