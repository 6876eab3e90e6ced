//! CoinGecko adapter, using the free `simple/price` endpoint keyed by
//! CoinGecko coin IDs rather than ticker symbols.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
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

pub struct CoinGeckoAdapter {
    http: ResilientHttpClient,
    rate_limiter: RateLimiter,
    policy: RateLimitPolicy,
    mapping: SymbolMapping,
    base_url: String,
    enabled: bool,
}

type SimplePriceResponse = HashMap<String, HashMap<String, PriceEntry>>;

#[derive(Debug, Deserialize)]
struct PriceEntry {
    #[serde(flatten)]
    values: HashMap<String, f64>,
}

impl CoinGeckoAdapter {
    pub fn new(rate_limiter: RateLimiter, config: SourceConfig, enabled: bool) -> OracleResult<Self> {
        let http = ResilientHttpClient::new("coingecko", config.timeout)?;

        let mut mapping = SymbolMapping::new();
        let coin_ids = [
            ("BTC", "bitcoin"),
            ("ETH", "ethereum"),
            ("NEO", "neo"),
            ("GAS", "gas"),
            ("BNB", "binancecoin"),
            ("SOL", "solana"),
        ];
        for (base, coin_id) in coin_ids {
            mapping.insert(CanonicalSymbol::new(base, "USDT"), coin_id);
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
impl SourceAdapter for CoinGeckoAdapter {
    fn source_name(&self) -> &str {
        "coingecko"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn supported_symbols(&self) -> Vec<CanonicalSymbol> {
        self.mapping.supported_symbols()
    }

    async fn fetch_batch(&self, symbols: &[CanonicalSymbol]) -> OracleResult<Vec<RawPriceQuote>> {
        let coin_ids: Vec<&str> = symbols
            .iter()
            .filter_map(|s| self.mapping.native_symbol(s))
            .collect();

        if coin_ids.is_empty() {
            return Err(OracleError::UnsupportedSymbol(format!(
                "none of the requested symbols are mapped for coingecko: {:?}",
                symbols
            )));
        }

        self.rate_limiter.acquire(self.source_name(), self.policy).await?;

        // CoinGecko quotes against fiat-style currency codes; our quote
        // currencies are all USDT-pegged stablecoins, so we ask for USD and
        // treat the result as the USDT price — the spread is outside this
        // adapter's scope to correct for.
        let url = format!("{}?ids={}&vs_currencies=usd", self.base_url, coin_ids.join(","));

        let response = self.http.get_with_retry(&url).await?;
        let parsed: SimplePriceResponse = response.json().await.map_err(|e| OracleError::Upstream {
            source_name: self.source_name().to_string(),
            message: format!("failed to parse coingecko response: {e}"),
            transient: true,
        })?;

        let now = Utc::now();
        let mut quotes = Vec::new();
        for symbol in symbols {
            let Some(coin_id) = self.mapping.native_symbol(symbol) else {
                continue;
            };
            let Some(entry) = parsed.get(coin_id) else {
                continue;
            };
            let Some(usd_price) = entry.values.get("usd") else {
                continue;
            };

            let price = BigDecimal::try_from(*usd_price).map_err(|e| OracleError::Upstream {
                source_name: self.source_name().to_string(),
                message: format!("invalid price for {coin_id}: {e}"),
                transient: false,
            })?;

            quotes.push(RawPriceQuote {
                source: self.source_name().to_string(),
                symbol: symbol.clone(),
                price,
                volume_24h: None,
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
    fn mapping_uses_coingecko_coin_ids() {
        let config = SourceConfig::new("https://api.coingecko.com/api/v3/simple/price");
        let adapter = CoinGeckoAdapter::new(RateLimiter::new(Duration::from_secs(1)), config, true).unwrap();
        let btc = CanonicalSymbol::new("BTC", "USDT");
        assert_eq!(adapter.mapping.native_symbol(&btc), Some("bitcoin"));
    }
}
