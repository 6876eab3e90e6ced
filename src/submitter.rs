//! Batch partitioning, dual-signed transaction construction, submission, and
//! confirmation polling against the Neo N3 oracle contract.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use oracle_chain::{
    build_transfer_script, build_update_price_batch_script, signers_json, RpcClient, TransactionSigner,
    UnsignedTransaction, SCOPE_CALLED_BY_ENTRY,
};
use oracle_crypto::KeyPair;
use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::constants::{
    NETWORK_FEE_PER_SIGNATURE, SUBMISSION_BACKOFF_BASE, SUBMISSION_BACKOFF_JITTER_MAX_MS,
    SUBMISSION_BACKOFF_MULTIPLIER, SUBMISSION_MAX_ATTEMPTS, TRANSACTION_VALID_BLOCK_WINDOW,
};
use crate::errors::{OracleError, OracleResult};
use crate::run::parse_contract_hash;
use crate::scaling::scale_price;
use crate::types::AggregatedPrice;

/// Number of signers on every transaction this submitter builds: the TEE
/// account and the Master account, both `CalledByEntry`.
const SIGNER_COUNT: i64 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchState {
    Pending,
    Submitted,
    Confirmed,
    Failed,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct BatchStatus {
    pub batch_id: Uuid,
    pub status: BatchState,
    pub tx_hash: Option<String>,
    pub processed_count: usize,
    pub total_count: usize,
    pub timestamp: DateTime<Utc>,
}

impl BatchStatus {
    fn pending(batch_id: Uuid, total_count: usize) -> Self {
        Self {
            batch_id,
            status: BatchState::Pending,
            tx_hash: None,
            processed_count: 0,
            total_count,
            timestamp: Utc::now(),
        }
    }

    /// Terminal states are immutable once reached.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, BatchState::Confirmed | BatchState::Failed)
    }
}

#[derive(Debug, Clone)]
pub struct PriceSubBatch {
    pub batch_id: Uuid,
    pub prices: Vec<AggregatedPrice>,
}

/// Splits a full set of aggregated prices into sub-batches no larger than
/// `max_batch_size`, each carrying its own batch id.
pub fn partition(prices: Vec<AggregatedPrice>, max_batch_size: usize) -> Vec<PriceSubBatch> {
    prices
        .chunks(max_batch_size.max(1))
        .map(|chunk| PriceSubBatch {
            batch_id: Uuid::new_v4(),
            prices: chunk.to_vec(),
        })
        .collect()
}

pub struct BatchSubmitter {
    rpc: RpcClient,
    tee_key: KeyPair,
    master_key: KeyPair,
    contract_hash: [u8; 20],
    network_magic: u32,
    confirmation_timeout: Duration,
    confirmation_poll_interval: Duration,
    max_fee_per_batch: i64,
    statuses: Arc<Mutex<HashMap<Uuid, BatchStatus>>>,
}

impl BatchSubmitter {
    pub fn new(
        rpc: RpcClient,
        tee_key: KeyPair,
        master_key: KeyPair,
        contract_hash: [u8; 20],
        network_magic: u32,
        confirmation_timeout: Duration,
        confirmation_poll_interval: Duration,
        max_fee_per_batch: i64,
    ) -> Self {
        Self {
            rpc,
            tee_key,
            master_key,
            contract_hash,
            network_magic,
            confirmation_timeout,
            confirmation_poll_interval,
            max_fee_per_batch,
            statuses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn status_of(&self, batch_id: Uuid) -> Option<BatchStatus> {
        self.statuses.lock().await.get(&batch_id).cloned()
    }

    async fn set_status(&self, status: BatchStatus) {
        self.statuses.lock().await.insert(status.batch_id, status);
    }

    /// Submits one sub-batch end to end: scale, construct, sign, broadcast,
    /// and poll for confirmation. Retries transient submission failures up to
    /// `SUBMISSION_MAX_ATTEMPTS` times; construction/signing failures are not
    /// retried since a retry cannot change their outcome.
    pub async fn submit(&self, batch: PriceSubBatch) -> OracleResult<BatchStatus> {
        self.set_status(BatchStatus::pending(batch.batch_id, batch.prices.len()))
            .await;

        let mut symbols = Vec::with_capacity(batch.prices.len());
        let mut scaled_prices = Vec::with_capacity(batch.prices.len());
        let mut timestamps = Vec::with_capacity(batch.prices.len());
        let mut confidences = Vec::with_capacity(batch.prices.len());
        for p in &batch.prices {
            let Some(scaled) = scale_price(&p.symbol, &p.price) else {
                continue;
            };
            symbols.push(p.symbol.to_string());
            scaled_prices.push(scaled);
            timestamps.push(p.computed_at.timestamp_millis());
            confidences.push(p.confidence);
        }

        if symbols.is_empty() {
            return Err(OracleError::Configuration(
                "sub-batch had no prices left after scaling".to_string(),
            ));
        }

        let mut last_error = None;
        for attempt in 0..SUBMISSION_MAX_ATTEMPTS {
            match self
                .try_submit_once(batch.batch_id, &symbols, &scaled_prices, &timestamps, &confidences)
                .await
            {
                Ok(status) => return Ok(status),
                Err(e) if e.is_transient() => {
                    warn!(batch_id = %batch.batch_id, attempt, error = %e, "submission attempt failed, retrying");
                    last_error = Some(e);
                    let delay = backoff_delay(attempt);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    self.mark_failed(batch.batch_id, batch.prices.len()).await;
                    return Err(e);
                }
            }
        }

        self.mark_failed(batch.batch_id, batch.prices.len()).await;
        Err(last_error.unwrap_or_else(|| OracleError::Configuration("submission retries exhausted".to_string())))
    }

    async fn mark_failed(&self, batch_id: Uuid, total_count: usize) {
        self.set_status(BatchStatus {
            batch_id,
            status: BatchState::Failed,
            tx_hash: None,
            processed_count: 0,
            total_count,
            timestamp: Utc::now(),
        })
        .await;
    }

    async fn try_submit_once(
        &self,
        batch_id: Uuid,
        symbols: &[String],
        scaled_prices: &[i64],
        timestamps: &[i64],
        confidences: &[u8],
    ) -> OracleResult<BatchStatus> {
        let height = self.rpc.get_block_count().await?;

        let script = build_update_price_batch_script(
            &self.contract_hash,
            symbols,
            scaled_prices,
            timestamps,
            confidences,
        )?;

        let (system_fee, network_fee) = self.estimate_fees(&script).await?;

        let unsigned = UnsignedTransaction {
            version: 0,
            nonce: rand::thread_rng().gen(),
            system_fee,
            network_fee,
            valid_until_block: height as u32 + TRANSACTION_VALID_BLOCK_WINDOW,
            signers: vec![
                TransactionSigner {
                    account_script_hash: self.tee_key.script_hash(),
                    scopes: SCOPE_CALLED_BY_ENTRY,
                },
                TransactionSigner {
                    account_script_hash: self.master_key.script_hash(),
                    scopes: SCOPE_CALLED_BY_ENTRY,
                },
            ],
            script,
        };

        let signed = unsigned.sign_dual(&self.tee_key, &self.master_key, self.network_magic)?;
        let tx_base64 = signed.to_base64();

        let response = self.rpc.send_raw_transaction(&tx_base64).await?;
        let tx_hash = response
            .get("hash")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                OracleError::Submission(oracle_chain::ChainError::MalformedResponse {
                    method: "sendrawtransaction".to_string(),
                    detail: "missing hash field".to_string(),
                })
            })?;

        let submitted = BatchStatus {
            batch_id,
            status: BatchState::Submitted,
            tx_hash: Some(tx_hash.clone()),
            processed_count: symbols.len(),
            total_count: symbols.len(),
            timestamp: Utc::now(),
        };
        self.set_status(submitted.clone()).await;
        info!(batch_id = %batch_id, tx_hash = %tx_hash, "batch submitted");

        self.poll_for_confirmation(batch_id, tx_hash).await
    }

    /// Estimates `(system_fee, network_fee)` for a script by simulating it via
    /// `invokescript` and reading back `gasconsumed`; the network fee is a
    /// fixed per-signature cost. The combined total is clamped to
    /// `max_fee_per_batch`, shrinking the system fee first since that's the
    /// estimate with slack (the network fee is a hard per-signature cost).
    async fn estimate_fees(&self, script: &[u8]) -> OracleResult<(i64, i64)> {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;

        let script_base64 = STANDARD.encode(script);
        let invoke = self.rpc.invoke_script(&script_base64, self.signers_json()).await?;

        if invoke.state != "HALT" {
            return Err(OracleError::Configuration(format!(
                "fee estimation simulation did not halt: state={} exception={:?}",
                invoke.state, invoke.exception
            )));
        }

        let system_fee: i64 = invoke.gasconsumed.parse().map_err(|_| {
            OracleError::Configuration(format!("invalid gasconsumed from invokescript: {}", invoke.gasconsumed))
        })?;
        let network_fee = NETWORK_FEE_PER_SIGNATURE * SIGNER_COUNT;

        let total = system_fee + network_fee;
        if total > self.max_fee_per_batch {
            warn!(
                total,
                max_fee_per_batch = self.max_fee_per_batch,
                "estimated fee exceeds configured maximum, clamping system fee"
            );
            let clamped_system_fee = (self.max_fee_per_batch - network_fee).max(0);
            return Ok((clamped_system_fee, network_fee));
        }

        Ok((system_fee, network_fee))
    }

    async fn poll_for_confirmation(&self, batch_id: Uuid, tx_hash: String) -> OracleResult<BatchStatus> {
        let deadline = Instant::now() + self.confirmation_timeout;

        loop {
            if Instant::now() >= deadline {
                let unknown = BatchStatus {
                    batch_id,
                    status: BatchState::Unknown,
                    tx_hash: Some(tx_hash),
                    processed_count: 0,
                    total_count: 0,
                    timestamp: Utc::now(),
                };
                self.set_status(unknown.clone()).await;
                return Ok(unknown);
            }

            if let Some(tx) = self.rpc.get_raw_transaction(&tx_hash).await? {
                let confirmations = tx.get("confirmations").and_then(|v| v.as_u64()).unwrap_or(0);
                if confirmations >= 1 {
                    let confirmed = BatchStatus {
                        batch_id,
                        status: BatchState::Confirmed,
                        tx_hash: Some(tx_hash),
                        processed_count: 0,
                        total_count: 0,
                        timestamp: Utc::now(),
                    };
                    self.set_status(confirmed.clone()).await;
                    return Ok(confirmed);
                }
            }

            tokio::time::sleep(self.confirmation_poll_interval).await;
        }
    }

    /// Checks the TEE account's NEP-17 balances and, for any non-zero asset,
    /// builds and submits a transfer to the Master account. Used so the TEE
    /// identity never needs to hold funds between runs. Returns the asset
    /// hashes that were successfully swept.
    pub async fn sweep_tee_assets(&self) -> OracleResult<Vec<String>> {
        let address = oracle_crypto::encode_address(&self.tee_key.script_hash());
        let balances = self.rpc.get_nep17_balances(&address).await?;

        let mut swept = Vec::new();
        for balance in balances.balance {
            if balance.amount == "0" {
                continue;
            }

            let amount: i64 = match balance.amount.parse() {
                Ok(v) => v,
                Err(e) => {
                    warn!(asset = %balance.asset_hash, amount = %balance.amount, error = %e, "unparseable NEP-17 balance, skipping sweep");
                    continue;
                }
            };

            let asset_hash = match parse_contract_hash(&balance.asset_hash) {
                Ok(h) => h,
                Err(e) => {
                    warn!(asset = %balance.asset_hash, error = %e, "unparseable asset hash, skipping sweep");
                    continue;
                }
            };

            let script = build_transfer_script(
                &asset_hash,
                &self.tee_key.script_hash(),
                &self.master_key.script_hash(),
                amount,
            );

            match self.submit_raw_script(script).await {
                Ok(tx_hash) => {
                    info!(asset = %balance.asset_hash, amount, tx_hash, "swept TEE asset to master account");
                    swept.push(balance.asset_hash);
                }
                Err(e) => {
                    warn!(asset = %balance.asset_hash, error = %e, "failed to sweep TEE asset");
                }
            }
        }

        Ok(swept)
    }

    /// Builds, signs, and broadcasts a one-off transaction around a raw
    /// script, using the same dual-signing and fee-estimation path as batch
    /// submission. Used by the asset sweep, which doesn't go through
    /// `PriceSubBatch`.
    async fn submit_raw_script(&self, script: Vec<u8>) -> OracleResult<String> {
        let height = self.rpc.get_block_count().await?;
        let (system_fee, network_fee) = self.estimate_fees(&script).await?;

        let unsigned = UnsignedTransaction {
            version: 0,
            nonce: rand::thread_rng().gen(),
            system_fee,
            network_fee,
            valid_until_block: height as u32 + TRANSACTION_VALID_BLOCK_WINDOW,
            signers: vec![
                TransactionSigner {
                    account_script_hash: self.tee_key.script_hash(),
                    scopes: SCOPE_CALLED_BY_ENTRY,
                },
                TransactionSigner {
                    account_script_hash: self.master_key.script_hash(),
                    scopes: SCOPE_CALLED_BY_ENTRY,
                },
            ],
            script,
        };

        let signed = unsigned.sign_dual(&self.tee_key, &self.master_key, self.network_magic)?;
        let response = self.rpc.send_raw_transaction(&signed.to_base64()).await?;

        response
            .get("hash")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                OracleError::Submission(oracle_chain::ChainError::MalformedResponse {
                    method: "sendrawtransaction".to_string(),
                    detail: "missing hash field".to_string(),
                })
            })
    }

    /// `signers_json` is re-exported for callers (e.g. the health checker)
    /// that need to simulate a call before a real submission is attempted.
    pub fn signers_json(&self) -> serde_json::Value {
        signers_json(
            &oracle_crypto::encode_address(&self.tee_key.script_hash()),
            &oracle_crypto::encode_address(&self.master_key.script_hash()),
        )
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let base = SUBMISSION_BACKOFF_BASE.as_millis() as u64;
    let exp = base.saturating_mul((SUBMISSION_BACKOFF_MULTIPLIER as u64).pow(attempt));
    let jitter = rand::thread_rng().gen_range(0..SUBMISSION_BACKOFF_JITTER_MAX_MS);
    Duration::from_millis(exp + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    fn price(symbol: &str, value: &str) -> AggregatedPrice {
        use crate::types::RawPriceQuote;

        AggregatedPrice {
            symbol: crate::symbols::CanonicalSymbol::new(symbol, "USDT"),
            price: BigDecimal::from_str(value).unwrap(),
            confidence: 90,
            source_data: vec![RawPriceQuote {
                source: "binance".to_string(),
                symbol: crate::symbols::CanonicalSymbol::new(symbol, "USDT"),
                price: BigDecimal::from_str(value).unwrap(),
                volume_24h: None,
                observed_at: Utc::now(),
            }],
            sources_rejected: vec![],
            computed_at: Utc::now(),
        }
    }

    // Testable property 7: every price appears in exactly one sub-batch, none
    // exceeds MaxBatchSize.
    #[test]
    fn partition_respects_max_batch_size_and_covers_every_price() {
        let prices: Vec<_> = (0..125).map(|i| price(&format!("SYM{i}"), "100")).collect();
        let batches = partition(prices.clone(), 50);

        assert_eq!(batches.iter().map(|b| b.prices.len()).sum::<usize>(), 125);
        assert!(batches.iter().all(|b| b.prices.len() <= 50));
        assert_eq!(batches.len(), 3);
    }

    #[test]
    fn backoff_delay_grows_with_attempt() {
        let first = backoff_delay(0);
        let third = backoff_delay(2);
        assert!(third >= first);
    }
}
