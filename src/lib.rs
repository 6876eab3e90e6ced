//! TEE price-feed oracle core: multi-source collection, statistical
//! aggregation, and dual-signed submission to a Neo N3 smart contract.

pub mod adapters;
pub mod aggregator;
pub mod attestation;
pub mod cli;
pub mod collector;
pub mod config;
pub mod constants;
pub mod errors;
pub mod health;
pub mod http_client;
pub mod rate_limiter;
pub mod run;
pub mod scaling;
pub mod submitter;
pub mod symbols;
pub mod types;

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .json()
        .init();
}
