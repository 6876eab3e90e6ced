//! Binance spot market adapter.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::errors::{OracleError, OracleResult};
use crate::http_client::ResilientHttpClient;
use crate::rate_limiter::{RateLimitPolicy, RateLimiter};
use crate::symbols::{CanonicalSymbol, SymbolMapping};
use crate::types::RawPriceQuote;

use super::SourceAdapter;

pub struct BinanceAdapter {
    http: ResilientHttpClient,
    rate_limiter: RateLimiter,
    policy: RateLimitPolicy,
    mapping: SymbolMapping,
    base_url: String,
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct Ticker24h {
    symbol: String,
    #[serde(rename = "lastPrice")]
    last_price: String,
    volume: String,
}

impl BinanceAdapter {
    pub fn new(rate_limiter: RateLimiter, config: SourceConfig, enabled: bool) -> OracleResult<Self> {
        let http = ResilientHttpClient::new("binance", config.timeout)?;

        let mut mapping = SymbolMapping::new();
        for symbol in crate::symbols::default_canonical_symbols() {
            let native = format!("{}{}", symbol.base(), symbol.quote());
            mapping.insert(symbol, native);
        }

        let policy = RateLimitPolicy {
            tokens_per_interval: config.tokens_per_second,
            interval: crate::constants::DEFAULT_RATE_LIMIT_INTERVAL,
        };

        Ok(Self {
            http,
            rate_limiter,
            policy,
            mapping,
            base_url: config.base_url,
            enabled,
        })
    }
}

#[async_trait]
impl SourceAdapter for BinanceAdapter {
    fn source_name(&self) -> &str {
        "binance"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn supported_symbols(&self) -> Vec<CanonicalSymbol> {
        self.mapping.supported_symbols()
    }

    async fn fetch_batch(&self, symbols: &[CanonicalSymbol]) -> OracleResult<Vec<RawPriceQuote>> {
        let natives: Vec<&str> = symbols
            .iter()
            .filter_map(|s| self.mapping.native_symbol(s))
            .collect();

        if natives.is_empty() {
            return Err(OracleError::UnsupportedSymbol(format!(
                "none of the requested symbols are mapped for binance: {:?}",
                symbols
            )));
        }

        self.rate_limiter.acquire(self.source_name(), self.policy).await?;

        let symbols_param = serde_json::to_string(&natives).unwrap_or_default();
        let url = format!("{}?symbols={symbols_param}", self.base_url);

        let response = self.http.get_with_retry(&url).await?;
        let tickers: Vec<Ticker24h> = response.json().await.map_err(|e| OracleError::Upstream {
            source_name: self.source_name().to_string(),
            message: format!("failed to parse binance response: {e}"),
            transient: true,
        })?;

        let now = Utc::now();
        let mut quotes = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            let Some(canonical) = self.mapping.canonical_symbol(&ticker.symbol) else {
                continue;
            };
            let price = BigDecimal::from_str(&ticker.last_price).map_err(|e| OracleError::Upstream {
                source_name: self.source_name().to_string(),
                message: format!("invalid price for {}: {e}", ticker.symbol),
                transient: false,
            })?;
            let volume = BigDecimal::from_str(&ticker.volume).ok();

            quotes.push(RawPriceQuote {
                source: self.source_name().to_string(),
                symbol: canonical.clone(),
                price,
                volume_24h: volume,
                observed_at: now,
            });
        }

        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SourceConfig {
        SourceConfig::new("https://api.binance.com/api/v3/ticker/24hr")
    }

    #[tokio::test]
    async fn fetch_batch_rejects_entirely_unmapped_symbols() {
        let adapter = BinanceAdapter::new(RateLimiter::new(Duration::from_secs(1)), config(), true).unwrap();
        let unknown = CanonicalSymbol::new("ZZZ", "ZZZ");
        let result = adapter.fetch_batch(&[unknown]).await;
        assert!(result.is_err());
    }

    #[test]
    fn supported_symbols_include_btc_usdt() {
        let adapter = BinanceAdapter::new(RateLimiter::new(Duration::from_secs(1)), config(), true).unwrap();
        let symbols = adapter.supported_symbols();
        assert!(symbols.iter().any(|s| s.as_str() == "BTC/USDT"));
    }
}
