//! Flat defaults for the ambient policy constants referenced throughout the
//! oracle. Kept in one place so operators and reviewers can see the numeric
//! policy at a glance, the way the rest of the codebase groups its defaults.

use std::time::Duration;

// Rate limiter
pub const DEFAULT_RATE_LIMIT_TOKENS: u32 = 10;
pub const DEFAULT_RATE_LIMIT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_RATE_LIMIT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

// HTTP resilience
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(250);
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(8);
pub const CIRCUIT_BREAKER_FAILURE_THRESHOLD: u32 = 5;
pub const CIRCUIT_BREAKER_COOLDOWN: Duration = Duration::from_secs(30);

// Aggregator
pub const MIN_SOURCES_FOR_AGGREGATION: usize = 1;
pub const HIGH_CONFIDENCE_SOURCE_COUNT: usize = 3;
pub const HIGH_CONFIDENCE_CV_THRESHOLD: f64 = 0.01;

// Price scaling
pub const PRICE_SCALE_FACTOR: i64 = 100_000_000; // 10^8
pub const MAX_SAFE_SCALED_PRICE: i64 = (i64::MAX) / PRICE_SCALE_FACTOR;

// Batch submitter
pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;
pub const SUBMISSION_MAX_ATTEMPTS: u32 = 3;
pub const SUBMISSION_BACKOFF_BASE: Duration = Duration::from_millis(1000);
pub const SUBMISSION_BACKOFF_MULTIPLIER: u32 = 2;
pub const SUBMISSION_BACKOFF_JITTER_MAX_MS: u64 = 500;
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(90);
pub const DEFAULT_CONFIRMATION_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const TRANSACTION_VALID_BLOCK_WINDOW: u32 = 1_200;

// Fee estimation: network fee is approximated as a fixed per-signature
// verification cost (the real cost of a secp256r1 CheckSig witness on Neo
// N3), since this core has no local fee-per-byte policy to read.
pub const NETWORK_FEE_PER_SIGNATURE: i64 = 1_230_890;
pub const DEFAULT_MAX_FEE_PER_BATCH: i64 = 100_000_000; // 1 GAS

// Attestation store
pub const DEFAULT_ATTESTATION_RETENTION_DAYS: i64 = 7;

// Continuous mode
pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_secs(60);

// Cycle / adapter deadlines
pub const DEFAULT_ADAPTER_FETCH_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_CYCLE_DEADLINE: Duration = Duration::from_secs(45);
