//! Runtime configuration, loaded from environment variables with
//! `dotenvy` providing local-development overrides.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::constants::*;
use crate::symbols::CanonicalSymbol;

/// Per-source adapter configuration: base URL, optional credentials, and the
/// rate-limit policy that source should be queried under.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub passphrase: Option<String>,
    pub tokens_per_second: u32,
}

impl SourceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_HTTP_TIMEOUT,
            api_key: None,
            api_secret: None,
            passphrase: None,
            tokens_per_second: DEFAULT_RATE_LIMIT_TOKENS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,

    pub tee_private_key_hex: String,
    pub master_private_key_hex: String,
    pub oracle_contract_hash: String,
    pub neo_rpc_endpoint: String,
    pub network_magic: u32,

    pub symbols: Vec<CanonicalSymbol>,
    pub source_configs: HashMap<String, SourceConfig>,

    pub rate_limit_tokens: u32,
    pub rate_limit_interval: Duration,
    pub http_timeout: Duration,
    pub max_retries: u32,

    pub max_batch_size: usize,
    pub max_fee_per_batch: i64,
    pub check_and_transfer_tee_assets: bool,
    pub confirmation_timeout: Duration,
    pub confirmation_poll_interval: Duration,

    pub attestation_base_dir: String,
    pub attestation_retention_days: i64,
    pub run_commit_sha: String,
    pub run_actor: String,

    pub cycle_interval: Duration,
    pub cycle_deadline: Duration,
    pub adapter_fetch_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    fn from_str(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" => Environment::Staging,
            _ => Environment::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// The base URL each source adapter falls back to when no per-source
/// override is set in the environment.
fn default_source_base_urls() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("binance", "https://api.binance.com/api/v3/ticker/24hr"),
        ("coinbase", "https://api.coinbase.com/v2/exchange-rates"),
        ("okex", "https://www.okx.com/api/v5/market/tickers?instType=SPOT"),
        ("coinmarketcap", "https://pro-api.coinmarketcap.com/v1/cryptocurrency/quotes/latest"),
        ("coingecko", "https://api.coingecko.com/api/v3/simple/price"),
        ("kraken", "https://api.kraken.com/0/public/Ticker"),
    ])
}

fn default_source_configs() -> HashMap<String, SourceConfig> {
    default_source_base_urls()
        .into_iter()
        .map(|(name, url)| (name.to_string(), SourceConfig::new(url)))
        .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            tee_private_key_hex: String::new(),
            master_private_key_hex: String::new(),
            oracle_contract_hash: String::new(),
            neo_rpc_endpoint: "http://localhost:10332".to_string(),
            network_magic: 860_833_102, // Neo N3 mainnet
            symbols: crate::symbols::default_canonical_symbols(),
            source_configs: default_source_configs(),
            rate_limit_tokens: DEFAULT_RATE_LIMIT_TOKENS,
            rate_limit_interval: DEFAULT_RATE_LIMIT_INTERVAL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_fee_per_batch: DEFAULT_MAX_FEE_PER_BATCH,
            check_and_transfer_tee_assets: false,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            confirmation_poll_interval: DEFAULT_CONFIRMATION_POLL_INTERVAL,
            attestation_base_dir: "./attestations".to_string(),
            attestation_retention_days: DEFAULT_ATTESTATION_RETENTION_DAYS,
            run_commit_sha: "unknown".to_string(),
            run_actor: "local".to_string(),
            cycle_interval: DEFAULT_CYCLE_INTERVAL,
            cycle_deadline: DEFAULT_CYCLE_DEADLINE,
            adapter_fetch_timeout: DEFAULT_ADAPTER_FETCH_TIMEOUT,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let environment = std::env::var("ENVIRONMENT")
            .map(|v| Environment::from_str(&v))
            .unwrap_or(defaults.environment);

        let config = Self {
            environment,
            tee_private_key_hex: std::env::var("TEE_PRIVATE_KEY")
                .context("TEE_PRIVATE_KEY must be set")?,
            master_private_key_hex: std::env::var("MASTER_PRIVATE_KEY")
                .context("MASTER_PRIVATE_KEY must be set")?,
            oracle_contract_hash: std::env::var("ORACLE_CONTRACT_HASH")
                .context("ORACLE_CONTRACT_HASH must be set")?,
            neo_rpc_endpoint: std::env::var("NEO_RPC_ENDPOINT")
                .unwrap_or(defaults.neo_rpc_endpoint),
            network_magic: parse_env_or("NETWORK_MAGIC", defaults.network_magic)?,
            symbols: match std::env::var("SYMBOLS") {
                Ok(value) => parse_symbols(&value)?,
                Err(_) => defaults.symbols,
            },
            source_configs: load_source_configs(defaults.source_configs),
            rate_limit_tokens: parse_env_or("RATE_LIMIT_TOKENS", defaults.rate_limit_tokens)?,
            rate_limit_interval: defaults.rate_limit_interval,
            http_timeout: Duration::from_secs(parse_env_or(
                "HTTP_TIMEOUT_SECONDS",
                defaults.http_timeout.as_secs(),
            )?),
            max_retries: parse_env_or("MAX_RETRIES", defaults.max_retries)?,
            max_batch_size: parse_env_or("MAX_BATCH_SIZE", defaults.max_batch_size)?,
            max_fee_per_batch: parse_env_or("MAX_FEE_PER_BATCH", defaults.max_fee_per_batch)?,
            check_and_transfer_tee_assets: parse_env_or(
                "CHECK_AND_TRANSFER_TEE_ASSETS",
                defaults.check_and_transfer_tee_assets,
            )?,
            confirmation_timeout: Duration::from_secs(parse_env_or(
                "CONFIRMATION_TIMEOUT_SECONDS",
                defaults.confirmation_timeout.as_secs(),
            )?),
            confirmation_poll_interval: defaults.confirmation_poll_interval,
            attestation_base_dir: std::env::var("ATTESTATION_BASE_DIR")
                .unwrap_or(defaults.attestation_base_dir),
            attestation_retention_days: parse_env_or(
                "ATTESTATION_RETENTION_DAYS",
                defaults.attestation_retention_days,
            )?,
            run_commit_sha: std::env::var("RUN_COMMIT_SHA").unwrap_or(defaults.run_commit_sha),
            run_actor: std::env::var("RUN_ACTOR").unwrap_or(defaults.run_actor),
            cycle_interval: Duration::from_secs(parse_env_or(
                "CYCLE_INTERVAL_SECONDS",
                defaults.cycle_interval.as_secs(),
            )?),
            cycle_deadline: Duration::from_secs(parse_env_or(
                "CYCLE_DEADLINE_SECONDS",
                defaults.cycle_deadline.as_secs(),
            )?),
            adapter_fetch_timeout: Duration::from_secs(parse_env_or(
                "ADAPTER_FETCH_TIMEOUT_SECONDS",
                defaults.adapter_fetch_timeout.as_secs(),
            )?),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tee_private_key_hex.is_empty() {
            anyhow::bail!("TEE_PRIVATE_KEY must not be empty");
        }
        if self.master_private_key_hex.is_empty() {
            anyhow::bail!("MASTER_PRIVATE_KEY must not be empty");
        }
        if self.oracle_contract_hash.is_empty() {
            anyhow::bail!("ORACLE_CONTRACT_HASH must not be empty");
        }
        if self.max_batch_size == 0 {
            anyhow::bail!("MAX_BATCH_SIZE must be greater than zero");
        }
        if self.rate_limit_tokens == 0 {
            anyhow::bail!("RATE_LIMIT_TOKENS must be greater than zero");
        }
        if self.max_fee_per_batch <= 0 {
            anyhow::bail!("MAX_FEE_PER_BATCH must be greater than zero");
        }
        Ok(())
    }
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}")),
        Err(_) => Ok(default),
    }
}

/// Parses a `SYMBOLS` value like `BTC/USDT,ETH/USDT` into canonical symbols.
fn parse_symbols(value: &str) -> Result<Vec<CanonicalSymbol>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (base, quote) = pair
                .split_once('/')
                .ok_or_else(|| anyhow::anyhow!("invalid SYMBOLS entry {pair}, expected BASE/QUOTE"))?;
            Ok(CanonicalSymbol::new(base, quote))
        })
        .collect()
}

/// Overlays per-source `{PREFIX}_BASE_URL` / `_API_KEY` / `_API_SECRET` /
/// `_PASSPHRASE` / `_TOKENS_PER_SECOND` environment variables onto the
/// default base URLs, one source at a time.
fn load_source_configs(defaults: HashMap<String, SourceConfig>) -> HashMap<String, SourceConfig> {
    defaults
        .into_iter()
        .map(|(name, default_config)| {
            let prefix = name.to_uppercase();
            let config = SourceConfig {
                base_url: std::env::var(format!("{prefix}_BASE_URL")).unwrap_or(default_config.base_url),
                timeout: std::env::var(format!("{prefix}_TIMEOUT_SECONDS"))
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(default_config.timeout),
                api_key: std::env::var(format!("{prefix}_API_KEY"))
                    .ok()
                    .or(default_config.api_key),
                api_secret: std::env::var(format!("{prefix}_API_SECRET"))
                    .ok()
                    .or(default_config.api_secret),
                passphrase: std::env::var(format!("{prefix}_PASSPHRASE"))
                    .ok()
                    .or(default_config.passphrase),
                tokens_per_second: std::env::var(format!("{prefix}_TOKENS_PER_SECOND"))
                    .ok()
                    .and_then(|v| v.parse::<u32>().ok())
                    .unwrap_or(default_config.tokens_per_second),
            };
            (name, config)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_policy_values() {
        let config = AppConfig::default();
        assert_eq!(config.max_batch_size, DEFAULT_MAX_BATCH_SIZE);
        assert!(config.rate_limit_tokens > 0);
    }

    #[test]
    fn validate_rejects_missing_keys() {
        let mut config = AppConfig::default();
        config.tee_private_key_hex.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_batch_size() {
        let mut config = AppConfig::default();
        config.tee_private_key_hex = "a".repeat(64);
        config.master_private_key_hex = "b".repeat(64);
        config.oracle_contract_hash = "0x".to_string() + &"c".repeat(40);
        config.max_batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_config_covers_every_source() {
        let config = AppConfig::default();
        for source in ["binance", "coinbase", "okex", "coinmarketcap", "coingecko", "kraken"] {
            assert!(config.source_configs.contains_key(source), "missing {source}");
        }
        assert!(!config.symbols.is_empty());
    }

    #[test]
    fn parse_symbols_accepts_base_quote_pairs() {
        let symbols = parse_symbols("BTC/USDT, eth/usdt").unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].as_str(), "BTC/USDT");
        assert_eq!(symbols[1].as_str(), "ETH/USDT");
    }

    #[test]
    fn parse_symbols_rejects_missing_separator() {
        assert!(parse_symbols("BTCUSDT").is_err());
    }

    #[test]
    fn environment_parses_common_aliases() {
        assert_eq!(Environment::from_str("prod"), Environment::Production);
        assert_eq!(Environment::from_str("PRODUCTION"), Environment::Production);
        assert_eq!(Environment::from_str("staging"), Environment::Staging);
        assert_eq!(Environment::from_str("anything-else"), Environment::Development);
    }
}
