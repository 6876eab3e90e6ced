//! Cycle orchestration: one pass from symbol list through to on-chain
//! submission and attestation, plus the continuous-mode scheduler.

use std::time::Duration;

use oracle_chain::{RpcClient, RpcClientConfig};
use oracle_crypto::KeyPair;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::adapters::{
    AnySourceAdapter, BinanceAdapter, CoinGeckoAdapter, CoinMarketCapAdapter, CoinbaseAdapter,
    KrakenAdapter, OkexAdapter,
};
use crate::aggregator::aggregate_all;
use crate::attestation::{AttestationRecord, AttestationStore, RunMetadata};
use crate::collector::Collector;
use crate::config::{AppConfig, SourceConfig};
use crate::errors::{OracleError, OracleResult};
use crate::rate_limiter::RateLimiter;
use crate::submitter::{partition, BatchState, BatchSubmitter};

pub struct Oracle {
    config: AppConfig,
    collector: Collector,
    submitter: BatchSubmitter,
    attestation_store: AttestationStore,
}

impl Oracle {
    pub fn new(config: AppConfig) -> OracleResult<Self> {
        let tee_key = load_key(&config.tee_private_key_hex)?;
        let master_key = load_key(&config.master_private_key_hex)?;
        let contract_hash = parse_contract_hash(&config.oracle_contract_hash)?;

        let rate_limiter = RateLimiter::new(crate::constants::DEFAULT_RATE_LIMIT_WAIT_TIMEOUT);
        let source_config = |name: &str| -> SourceConfig {
            config
                .source_configs
                .get(name)
                .cloned()
                .unwrap_or_else(|| SourceConfig::new(""))
        };
        let adapters = vec![
            AnySourceAdapter::Binance(BinanceAdapter::new(rate_limiter.clone(), source_config("binance"), true)?),
            AnySourceAdapter::Coinbase(CoinbaseAdapter::new(rate_limiter.clone(), source_config("coinbase"), true)?),
            AnySourceAdapter::Okex(OkexAdapter::new(rate_limiter.clone(), source_config("okex"), true)?),
            AnySourceAdapter::CoinMarketCap(CoinMarketCapAdapter::new(
                rate_limiter.clone(),
                source_config("coinmarketcap"),
                true,
            )?),
            AnySourceAdapter::CoinGecko(CoinGeckoAdapter::new(rate_limiter.clone(), source_config("coingecko"), true)?),
            AnySourceAdapter::Kraken(KrakenAdapter::new(rate_limiter, source_config("kraken"), true)?),
        ];

        let rpc = RpcClient::new(RpcClientConfig {
            endpoint: config.neo_rpc_endpoint.clone(),
            request_timeout: config.http_timeout,
        })
        .map_err(OracleError::Submission)?;

        let submitter = BatchSubmitter::new(
            rpc,
            tee_key,
            master_key,
            contract_hash,
            config.network_magic,
            config.confirmation_timeout,
            config.confirmation_poll_interval,
            config.max_fee_per_batch,
        );

        let attestation_store =
            AttestationStore::new(config.attestation_base_dir.clone(), config.attestation_retention_days);

        Ok(Self {
            collector: Collector::new(adapters, config.adapter_fetch_timeout),
            submitter,
            attestation_store,
            config,
        })
    }

    /// Runs exactly one collect -> aggregate -> submit -> attest cycle. The
    /// whole cycle (collection only; submission has its own retry/poll
    /// timeouts) is bounded by `config.cycle_deadline`.
    pub async fn run_cycle(&self) -> OracleResult<()> {
        let quotes = match tokio::time::timeout(
            self.config.cycle_deadline,
            self.collector.collect(&self.config.symbols),
        )
        .await
        {
            Ok(result) => result?,
            Err(_elapsed) => {
                return Err(OracleError::NoDataCollected(format!(
                    "cycle deadline ({:?}) exceeded during collection",
                    self.config.cycle_deadline
                )))
            }
        };

        let grouped = Collector::group_by_symbol(quotes);
        let aggregated = aggregate_all(grouped);

        if aggregated.is_empty() {
            return Err(OracleError::AggregationEmpty("all symbols".to_string()));
        }

        info!(symbol_count = aggregated.len(), "aggregation complete");

        let sub_batches = partition(aggregated, self.config.max_batch_size);
        let mut any_confirmed = false;

        for batch in sub_batches {
            let batch_id = batch.batch_id;
            match self.submitter.submit(batch).await {
                Ok(status) => {
                    if status.status == BatchState::Confirmed {
                        any_confirmed = true;
                    }
                    self.attest_batch(batch_id, &status).await;
                }
                Err(e) => {
                    error!(batch_id = %batch_id, error = %e, "sub-batch submission failed");
                }
            }
        }

        if self.config.check_and_transfer_tee_assets {
            match self.submitter.sweep_tee_assets().await {
                Ok(swept) if !swept.is_empty() => {
                    info!(assets = swept.len(), "swept TEE account balances to master account")
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "TEE asset sweep failed"),
            }
        }

        let removed = self.attestation_store.cleanup().unwrap_or_else(|e| {
            warn!(error = %e, "attestation cleanup failed");
            0
        });
        if removed > 0 {
            info!(removed, "cleaned up expired attestations");
        }

        if !any_confirmed {
            warn!("no sub-batch reached Confirmed status this cycle");
        }

        Ok(())
    }

    async fn attest_batch(&self, batch_id: Uuid, status: &crate::submitter::BatchStatus) {
        let run = RunMetadata {
            run_id: Uuid::new_v4().to_string(),
            run_number: 0,
            repo_owner: "neo-price-feed".to_string(),
            repo_name: "core".to_string(),
            workflow: "price-feed".to_string(),
        };

        let summary = format!("{:?} ({} prices)", status.status, status.total_count);
        let record = AttestationRecord::new_price_feed(
            batch_id.to_string(),
            status.tx_hash.clone().unwrap_or_default(),
            summary,
            run,
        );

        let signed = match record.sign(&self.config.run_commit_sha, &self.config.run_actor) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "failed to sign price feed attestation");
                return;
            }
        };

        if let Err(e) = self.attestation_store.write_price_feed_attestation(&batch_id.to_string(), &signed) {
            warn!(error = %e, "failed to write price feed attestation");
        }
    }

    /// Runs cycles on a fixed interval for `duration`, using a monotonic
    /// interval timer rather than wall-clock deltas so drift doesn't
    /// accumulate across a long-running process.
    pub async fn run_continuous(&self, duration: Duration, interval: Duration) -> OracleResult<()> {
        let deadline = tokio::time::Instant::now() + duration;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if tokio::time::Instant::now() >= deadline {
                break;
            }

            if let Err(e) = self.run_cycle().await {
                error!(error = %e, "cycle failed; continuing to next cycle");
            }
        }

        Ok(())
    }

    pub fn attestation_store(&self) -> &AttestationStore {
        &self.attestation_store
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

fn load_key(hex_private_key: &str) -> OracleResult<KeyPair> {
    let bytes = hex::decode(hex_private_key)
        .map_err(|e| OracleError::Configuration(format!("invalid private key hex: {e}")))?;
    KeyPair::from_private_key_bytes(&bytes).map_err(OracleError::Signing)
}

pub(crate) fn parse_contract_hash(hash: &str) -> OracleResult<[u8; 20]> {
    let stripped = hash.strip_prefix("0x").unwrap_or(hash);
    let bytes = hex::decode(stripped)
        .map_err(|e| OracleError::Configuration(format!("invalid contract hash: {e}")))?;

    if bytes.len() != 20 {
        return Err(OracleError::Configuration(format!(
            "contract hash must be 20 bytes, got {}",
            bytes.len()
        )));
    }

    let mut out = [0u8; 20];
    out.copy_from_slice(&bytes);
    Ok(out)
}
