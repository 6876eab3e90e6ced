//! OKX (formerly OKEx) adapter, using the v5 market tickers endpoint.

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

pub struct OkexAdapter {
    http: ResilientHttpClient,
    rate_limiter: RateLimiter,
    policy: RateLimitPolicy,
    mapping: SymbolMapping,
    tickers_url: String,
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct TickersResponse {
    code: String,
    data: Vec<TickerEntry>,
}

#[derive(Debug, Deserialize)]
struct TickerEntry {
    #[serde(rename = "instId")]
    inst_id: String,
    last: String,
    #[serde(rename = "vol24h")]
    vol_24h: String,
}

impl OkexAdapter {
    pub fn new(rate_limiter: RateLimiter, config: SourceConfig, enabled: bool) -> OracleResult<Self> {
        let http = ResilientHttpClient::new("okex", config.timeout)?;

        let mut mapping = SymbolMapping::new();
        for symbol in crate::symbols::default_canonical_symbols() {
            let native = format!("{}-{}", symbol.base(), symbol.quote());
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
            tickers_url: config.base_url,
            enabled,
        })
    }
}

#[async_trait]
impl SourceAdapter for OkexAdapter {
    fn source_name(&self) -> &str {
        "okex"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn supported_symbols(&self) -> Vec<CanonicalSymbol> {
        self.mapping.supported_symbols()
    }

    async fn fetch_batch(&self, symbols: &[CanonicalSymbol]) -> OracleResult<Vec<RawPriceQuote>> {
        let requested: Vec<&str> = symbols
            .iter()
            .filter_map(|s| self.mapping.native_symbol(s))
            .collect();

        if requested.is_empty() {
            return Err(OracleError::UnsupportedSymbol(format!(
                "none of the requested symbols are mapped for okex: {:?}",
                symbols
            )));
        }

        self.rate_limiter.acquire(self.source_name(), self.policy).await?;

        let response = self.http.get_with_retry(&self.tickers_url).await?;
        let parsed: TickersResponse = response.json().await.map_err(|e| OracleError::Upstream {
            source_name: self.source_name().to_string(),
            message: format!("failed to parse okex response: {e}"),
            transient: true,
        })?;

        if parsed.code != "0" {
            return Err(OracleError::Upstream {
                source_name: self.source_name().to_string(),
                message: format!("okex returned error code {}", parsed.code),
                transient: true,
            });
        }

        let now = Utc::now();
        let mut quotes = Vec::new();
        for entry in parsed.data {
            if !requested.contains(&entry.inst_id.as_str()) {
                continue;
            }
            let Some(canonical) = self.mapping.canonical_symbol(&entry.inst_id) else {
                continue;
            };

            let price = BigDecimal::from_str(&entry.last).map_err(|e| OracleError::Upstream {
                source_name: self.source_name().to_string(),
                message: format!("invalid price for {}: {e}", entry.inst_id),
                transient: false,
            })?;
            let volume = BigDecimal::from_str(&entry.vol_24h).ok();

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

    #[test]
    fn mapping_uses_dash_separated_instrument_id() {
        let config = SourceConfig::new("https://www.okx.com/api/v5/market/tickers?instType=SPOT");
        let adapter = OkexAdapter::new(RateLimiter::new(Duration::from_secs(1)), config, true).unwrap();
        let eth = CanonicalSymbol::new("ETH", "USDT");
        assert_eq!(adapter.mapping.native_symbol(&eth), Some("ETH-USDT"));
    }
}
