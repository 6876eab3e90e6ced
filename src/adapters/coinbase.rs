//! Coinbase adapter, built on the exchange-rates endpoint which has no
//! multi-symbol batch form — one request per base currency.

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

pub struct CoinbaseAdapter {
    http: ResilientHttpClient,
    rate_limiter: RateLimiter,
    policy: RateLimitPolicy,
    mapping: SymbolMapping,
    base_url: String,
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct ExchangeRatesResponse {
    data: ExchangeRatesData,
}

#[derive(Debug, Deserialize)]
struct ExchangeRatesData {
    currency: String,
    rates: HashMap<String, String>,
}

impl CoinbaseAdapter {
    pub fn new(rate_limiter: RateLimiter, config: SourceConfig, enabled: bool) -> OracleResult<Self> {
        let http = ResilientHttpClient::new("coinbase", config.timeout)?;

        let mut mapping = SymbolMapping::new();
        for symbol in crate::symbols::default_canonical_symbols() {
            let native = symbol.base().to_string();
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

    async fn fetch_one(&self, symbol: &CanonicalSymbol) -> OracleResult<Option<RawPriceQuote>> {
        let Some(base) = self.mapping.native_symbol(symbol) else {
            return Ok(None);
        };

        self.rate_limiter.acquire(self.source_name(), self.policy).await?;

        let url = format!("{}?currency={base}", self.base_url);
        let response = self.http.get_with_retry(&url).await?;
        let parsed: ExchangeRatesResponse = response.json().await.map_err(|e| OracleError::Upstream {
            source_name: self.source_name().to_string(),
            message: format!("failed to parse coinbase response: {e}"),
            transient: true,
        })?;

        if parsed.data.currency != base {
            return Ok(None);
        }

        let Some(rate) = parsed.data.rates.get(symbol.quote()) else {
            return Ok(None);
        };

        // Coinbase's exchange-rates endpoint returns how many units of the
        // quote currency one unit of `currency` buys, which is exactly the
        // price we want, inverted from the usual "quote per base" fiat quoting.
        let price = BigDecimal::from_str(rate).map_err(|e| OracleError::Upstream {
            source_name: self.source_name().to_string(),
            message: format!("invalid rate for {symbol}: {e}"),
            transient: false,
        })?;

        Ok(Some(RawPriceQuote {
            source: self.source_name().to_string(),
            symbol: symbol.clone(),
            price,
            volume_24h: None,
            observed_at: Utc::now(),
        }))
    }
}

#[async_trait]
impl SourceAdapter for CoinbaseAdapter {
    fn source_name(&self) -> &str {
        "coinbase"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn supported_symbols(&self) -> Vec<CanonicalSymbol> {
        self.mapping.supported_symbols()
    }

    async fn fetch_batch(&self, symbols: &[CanonicalSymbol]) -> OracleResult<Vec<RawPriceQuote>> {
        let mut quotes = Vec::new();
        let mut any_mapped = false;

        for symbol in symbols {
            if self.mapping.native_symbol(symbol).is_some() {
                any_mapped = true;
            }
            if let Some(quote) = self.fetch_one(symbol).await? {
                quotes.push(quote);
            }
        }

        if !any_mapped {
            return Err(OracleError::UnsupportedSymbol(format!(
                "none of the requested symbols are mapped for coinbase: {:?}",
                symbols
            )));
        }

        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_uses_bare_base_currency() {
        let config = SourceConfig::new("https://api.coinbase.com/v2/exchange-rates");
        let adapter = CoinbaseAdapter::new(RateLimiter::new(Duration::from_secs(1)), config, true).unwrap();
        let btc = CanonicalSymbol::new("BTC", "USDT");
        assert_eq!(adapter.mapping.native_symbol(&btc), Some("BTC"));
    }
}
