//! CoinMarketCap adapter. Requires a Pro API key, sent as a request header
//! rather than a query parameter per CMC's documented convention.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::errors::{OracleError, OracleResult};
use crate::http_client::ResilientHttpClient;
use crate::rate_limiter::{RateLimitPolicy, RateLimiter};
use crate::symbols::{CanonicalSymbol, SymbolMapping};
use crate::types::RawPriceQuote;

use super::SourceAdapter;

pub struct CoinMarketCapAdapter {
    http: ResilientHttpClient,
    rate_limiter: RateLimiter,
    policy: RateLimitPolicy,
    mapping: SymbolMapping,
    quotes_url: String,
    api_key: String,
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    data: HashMap<String, CoinEntry>,
}

#[derive(Debug, Deserialize)]
struct CoinEntry {
    quote: HashMap<String, QuoteEntry>,
}

#[derive(Debug, Deserialize)]
struct QuoteEntry {
    price: f64,
    volume_24h: Option<f64>,
}

impl CoinMarketCapAdapter {
    pub fn new(rate_limiter: RateLimiter, config: SourceConfig, enabled: bool) -> OracleResult<Self> {
        let http = ResilientHttpClient::new("coinmarketcap", config.timeout)?;

        let mut mapping = SymbolMapping::new();
        for symbol in crate::symbols::default_canonical_symbols() {
            let native = symbol.base().to_string();
            mapping.insert(symbol, native);
        }

        let api_key = config.api_key.unwrap_or_default();
        let enabled = enabled && !api_key.is_empty();
        let policy = RateLimitPolicy {
            tokens_per_interval: config.tokens_per_second,
            interval: crate::constants::DEFAULT_RATE_LIMIT_INTERVAL,
        };

        Ok(Self {
            http,
            rate_limiter,
            policy,
            mapping,
            quotes_url: config.base_url,
            api_key,
            enabled,
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.api_key) {
            headers.insert("X-CMC_PRO_API_KEY", value);
        }
        headers
    }
}

#[async_trait]
impl SourceAdapter for CoinMarketCapAdapter {
    fn source_name(&self) -> &str {
        "coinmarketcap"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn supported_symbols(&self) -> Vec<CanonicalSymbol> {
        self.mapping.supported_symbols()
    }

    async fn fetch_batch(&self, symbols: &[CanonicalSymbol]) -> OracleResult<Vec<RawPriceQuote>> {
        if !self.enabled {
            return Err(OracleError::Upstream {
                source_name: self.source_name().to_string(),
                message: "adapter disabled (missing API key)".to_string(),
                transient: false,
            });
        }

        let bases: Vec<&str> = symbols
            .iter()
            .filter_map(|s| self.mapping.native_symbol(s))
            .collect();

        if bases.is_empty() {
            return Err(OracleError::UnsupportedSymbol(format!(
                "none of the requested symbols are mapped for coinmarketcap: {:?}",
                symbols
            )));
        }

        self.rate_limiter.acquire(self.source_name(), self.policy).await?;

        // CMC's convert parameter only accepts one target at a time across all
        // our canonical symbols' quote currencies; we assume a single shared
        // quote currency (USDT) for the default mapping set.
        let convert = symbols
            .first()
            .map(|s| s.quote().to_string())
            .unwrap_or_else(|| "USDT".to_string());

        let url = format!(
            "{}?symbol={}&convert={convert}",
            self.quotes_url,
            bases.join(",")
        );

        let response = self
            .http
            .get_with_retry_headers(&url, self.headers())
            .await?;
        let parsed: QuotesResponse = response.json().await.map_err(|e| OracleError::Upstream {
            source_name: self.source_name().to_string(),
            message: format!("failed to parse coinmarketcap response: {e}"),
            transient: true,
        })?;

        let now = Utc::now();
        let mut quotes = Vec::new();
        for symbol in symbols {
            let Some(base) = self.mapping.native_symbol(symbol) else {
                continue;
            };
            let Some(entry) = parsed.data.get(base) else {
                continue;
            };
            let Some(quote_entry) = entry.quote.get(&convert) else {
                continue;
            };

            let price = BigDecimal::try_from(quote_entry.price).map_err(|e| OracleError::Upstream {
                source_name: self.source_name().to_string(),
                message: format!("invalid price for {base}: {e}"),
                transient: false,
            })?;
            let volume = quote_entry.volume_24h.and_then(|v| BigDecimal::try_from(v).ok());

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
    fn adapter_disables_itself_without_api_key() {
        let config = SourceConfig::new("https://pro-api.coinmarketcap.com/v1/cryptocurrency/quotes/latest");
        let adapter =
            CoinMarketCapAdapter::new(RateLimiter::new(Duration::from_secs(1)), config, true).unwrap();
        assert!(!adapter.is_enabled());
    }
}
