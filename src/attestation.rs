//! File-based attestation ledger: signed JSON records proving a run occurred,
//! written under `<base>/account/` and `<base>/price_feed/`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use oracle_crypto::attestation_signature;
use serde::{Deserialize, Serialize};

use crate::errors::{OracleError, OracleResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttestationKind {
    AccountGeneration,
    PriceFeed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub run_number: u64,
    pub repo_owner: String,
    pub repo_name: String,
    pub workflow: String,
}

/// A single attestation record. Field order here is deliberate: it is the
/// order serde emits them in, which is what gets hashed as the canonical form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationRecord {
    #[serde(rename = "type")]
    pub kind: AttestationKind,
    pub account_address: Option<String>,
    pub batch_id: Option<String>,
    pub tx_hash: Option<String>,
    pub summary: Option<String>,
    pub run_id: String,
    pub run_number: u64,
    pub repo_owner: String,
    pub repo_name: String,
    pub workflow: String,
    pub timestamp: DateTime<Utc>,
    pub signature: String,
}

impl AttestationRecord {
    pub fn new_account_generation(account_address: String, run: RunMetadata) -> Self {
        Self {
            kind: AttestationKind::AccountGeneration,
            account_address: Some(account_address),
            batch_id: None,
            tx_hash: None,
            summary: None,
            run_id: run.run_id,
            run_number: run.run_number,
            repo_owner: run.repo_owner,
            repo_name: run.repo_name,
            workflow: run.workflow,
            timestamp: Utc::now(),
            signature: String::new(),
        }
    }

    pub fn new_price_feed(batch_id: String, tx_hash: String, summary: String, run: RunMetadata) -> Self {
        Self {
            kind: AttestationKind::PriceFeed,
            account_address: None,
            batch_id: Some(batch_id),
            tx_hash: Some(tx_hash),
            summary: Some(summary),
            run_id: run.run_id,
            run_number: run.run_number,
            repo_owner: run.repo_owner,
            repo_name: run.repo_name,
            workflow: run.workflow,
            timestamp: Utc::now(),
            signature: String::new(),
        }
    }

    fn canonical_json(&self) -> OracleResult<String> {
        let mut unsigned = self.clone();
        unsigned.signature = String::new();
        serde_json::to_string(&unsigned)
            .map_err(|e| OracleError::Attestation(format!("failed to canonicalize record: {e}")))
    }

    pub fn sign(mut self, run_commit_sha: &str, run_actor: &str) -> OracleResult<Self> {
        let canonical = self.canonical_json()?;
        self.signature = attestation_signature(&canonical, run_commit_sha, run_actor);
        Ok(self)
    }

    pub fn verify(&self, run_commit_sha: &str, run_actor: &str) -> OracleResult<bool> {
        let canonical = self.canonical_json()?;
        let expected = attestation_signature(&canonical, run_commit_sha, run_actor);
        Ok(expected.eq_ignore_ascii_case(&self.signature))
    }
}

pub struct AttestationStore {
    base_dir: PathBuf,
    retention_days: i64,
}

impl AttestationStore {
    pub fn new(base_dir: impl Into<PathBuf>, retention_days: i64) -> Self {
        Self {
            base_dir: base_dir.into(),
            retention_days,
        }
    }

    fn account_dir(&self) -> PathBuf {
        self.base_dir.join("account")
    }

    fn price_feed_dir(&self) -> PathBuf {
        self.base_dir.join("price_feed")
    }

    pub fn write_account_attestation(&self, run_id: &str, record: &AttestationRecord) -> OracleResult<PathBuf> {
        self.write_record(&self.account_dir(), run_id, record)
    }

    pub fn write_price_feed_attestation(&self, batch_id: &str, record: &AttestationRecord) -> OracleResult<PathBuf> {
        self.write_record(&self.price_feed_dir(), batch_id, record)
    }

    fn write_record(&self, dir: &Path, file_stem: &str, record: &AttestationRecord) -> OracleResult<PathBuf> {
        fs::create_dir_all(dir)
            .map_err(|e| OracleError::Attestation(format!("failed to create {}: {e}", dir.display())))?;

        let path = dir.join(format!("{file_stem}.json"));
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| OracleError::Attestation(format!("failed to serialize record: {e}")))?;

        fs::write(&path, json)
            .map_err(|e| OracleError::Attestation(format!("failed to write {}: {e}", path.display())))?;

        Ok(path)
    }

    pub fn read_account_attestation(&self, run_id: &str) -> OracleResult<AttestationRecord> {
        self.read_record(&self.account_dir().join(format!("{run_id}.json")))
    }

    pub fn read_price_feed_attestation(&self, batch_id: &str) -> OracleResult<AttestationRecord> {
        self.read_record(&self.price_feed_dir().join(format!("{batch_id}.json")))
    }

    fn read_record(&self, path: &Path) -> OracleResult<AttestationRecord> {
        let contents = fs::read_to_string(path)
            .map_err(|e| OracleError::Attestation(format!("failed to read {}: {e}", path.display())))?;
        serde_json::from_str(&contents)
            .map_err(|e| OracleError::Attestation(format!("failed to parse {}: {e}", path.display())))
    }

    /// Removes attestation files older than `retention_days` from both
    /// sub-directories. Returns the number of files removed.
    pub fn cleanup(&self) -> OracleResult<usize> {
        let cutoff = Duration::from_secs((self.retention_days.max(0) as u64) * 86_400);
        let now = SystemTime::now();

        let mut removed = 0;
        for dir in [self.account_dir(), self.price_feed_dir()] {
            if !dir.exists() {
                continue;
            }
            let entries = fs::read_dir(&dir)
                .map_err(|e| OracleError::Attestation(format!("failed to list {}: {e}", dir.display())))?;

            for entry in entries.flatten() {
                let path = entry.path();
                let Ok(metadata) = entry.metadata() else { continue };
                let Ok(modified) = metadata.modified() else { continue };
                let Ok(age) = now.duration_since(modified) else { continue };

                if age > cutoff {
                    if fs::remove_file(&path).is_ok() {
                        removed += 1;
                    }
                }
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_run() -> RunMetadata {
        RunMetadata {
            run_id: "run-1".to_string(),
            run_number: 42,
            repo_owner: "acme".to_string(),
            repo_name: "oracle".to_string(),
            workflow: "price-feed".to_string(),
        }
    }

    // Testable property 6: sign/verify round-trips, and tampering breaks it.
    #[test]
    fn sign_then_verify_round_trips() {
        let record = AttestationRecord::new_account_generation("NAbc123".to_string(), sample_run())
            .sign("deadbeef", "scheduler")
            .unwrap();

        assert!(record.verify("deadbeef", "scheduler").unwrap());
    }

    #[test]
    fn tampering_with_any_field_breaks_verification() {
        let mut record = AttestationRecord::new_account_generation("NAbc123".to_string(), sample_run())
            .sign("deadbeef", "scheduler")
            .unwrap();

        record.account_address = Some("NDifferentAddress".to_string());
        assert!(!record.verify("deadbeef", "scheduler").unwrap());
    }

    #[test]
    fn write_and_read_account_attestation_round_trips() {
        let dir = tempdir().unwrap();
        let store = AttestationStore::new(dir.path(), 7);

        let record = AttestationRecord::new_account_generation("NAbc123".to_string(), sample_run())
            .sign("deadbeef", "scheduler")
            .unwrap();

        store.write_account_attestation("run-1", &record).unwrap();
        let loaded = store.read_account_attestation("run-1").unwrap();

        assert_eq!(loaded.account_address, record.account_address);
        assert!(loaded.verify("deadbeef", "scheduler").unwrap());
    }

    #[test]
    fn cleanup_reports_zero_when_nothing_is_old() {
        let dir = tempdir().unwrap();
        let store = AttestationStore::new(dir.path(), 7);

        let record = AttestationRecord::new_account_generation("NAbc123".to_string(), sample_run())
            .sign("deadbeef", "scheduler")
            .unwrap();
        store.write_account_attestation("run-1", &record).unwrap();

        let removed = store.cleanup().unwrap();
        assert_eq!(removed, 0);
    }
}
