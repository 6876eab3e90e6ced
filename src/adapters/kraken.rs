//! Kraken adapter. Kraken uses `XBT` rather than `BTC` and returns ticker
//! fields as string arrays (`c` = last trade close, `v` = volume).

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::errors::{OracleError, OracleResult};
use crate::http_client::ResilientHttpClient;
use crate::rate_limiter::{RateLimitPolicy, RateLimiter};
use crate::symbols::{CanonicalSymbol, SymbolMapping};
use crate::types::RawPriceQuote;

use super::SourceAdapter;

pub struct KrakenAdapter {
    http: ResilientHttpClient,
    rate_limiter: RateLimiter,
    policy: RateLimitPolicy,
    mapping: SymbolMapping,
    base_url: String,
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    error: Vec<String>,
    #[serde(default)]
    result: HashMap<String, TickerInfo>,
}

#[derive(Debug, Deserialize)]
struct TickerInfo {
    c: Vec<String>,
    v: Vec<String>,
}

impl KrakenAdapter {
    pub fn new(rate_limiter: RateLimiter, config: SourceConfig, enabled: bool) -> OracleResult<Self> {
        let http = ResilientHttpClient::new("kraken", config.timeout)?;

        let mut mapping = SymbolMapping::new();
        for symbol in crate::symbols::default_canonical_symbols() {
            let kraken_base = if symbol.base() == "BTC" { "XBT" } else { symbol.base() };
            let native = format!("{kraken_base}{}", symbol.quote());
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
impl SourceAdapter for KrakenAdapter {
    fn source_name(&self) -> &str {
        "kraken"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn supported_symbols(&self) -> Vec<CanonicalSymbol> {
        self.mapping.supported_symbols()
    }

    async fn fetch_batch(&self, symbols: &[CanonicalSymbol]) -> OracleResult<Vec<RawPriceQuote>> {
        let pairs: Vec<&str> = symbols
            .iter()
            .filter_map(|s| self.mapping.native_symbol(s))
            .collect();

        if pairs.is_empty() {
            return Err(OracleError::UnsupportedSymbol(format!(
                "none of the requested symbols are mapped for kraken: {:?}",
                symbols
            )));
        }

        self.rate_limiter.acquire(self.source_name(), self.policy).await?;

        let url = format!("{}?pair={}", self.base_url, pairs.join(","));
        let response = self.http.get_with_retry(&url).await?;
        let parsed: TickerResponse = response.json().await.map_err(|e| OracleError::Upstream {
            source_name: self.source_name().to_string(),
            message: format!("failed to parse kraken response: {e}"),
            transient: true,
        })?;

        if !parsed.error.is_empty() {
            return Err(OracleError::Upstream {
                source_name: self.source_name().to_string(),
                message: parsed.error.join("; "),
                transient: true,
            });
        }

        let now = Utc::now();
        let mut quotes = Vec::new();
        for symbol in symbols {
            let Some(native) = self.mapping.native_symbol(symbol) else {
                continue;
            };
            let Some(info) = parsed.result.get(native) else {
                continue;
            };
            let Some(last_close) = info.c.first() else {
                continue;
            };

            let price = BigDecimal::from_str(last_close).map_err(|e| OracleError::Upstream {
                source_name: self.source_name().to_string(),
                message: format!("invalid price for {native}: {e}"),
                transient: false,
            })?;
            let volume = info.v.get(1).and_then(|v| BigDecimal::from_str(v).ok());

            quotes.push(RawPriceQuote {
                source: self.source_name().to_string(),
                symbol: symbol.clone(),
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

    #[test]
    fn btc_maps_to_kraken_xbt_prefix() {
        let config = SourceConfig::new("https://api.kraken.com/0/public/Ticker");
        let adapter = KrakenAdapter::new(RateLimiter::new(Duration::from_secs(1)), config, true).unwrap();
        let btc = CanonicalSymbol::new("BTC", "USDT");
        assert_eq!(adapter.mapping.native_symbol(&btc), Some("XBTUSDT"));
    }
}
