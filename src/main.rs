use std::io::Write as _;
use std::os::unix::fs::PermissionsExt;

use clap::Parser;
use neo_price_feed_core::attestation::{AttestationRecord, AttestationStore, RunMetadata};
use neo_price_feed_core::cli::Cli;
use neo_price_feed_core::config::AppConfig;
use neo_price_feed_core::init_tracing;
use neo_price_feed_core::run::Oracle;
use oracle_crypto::KeyPair;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    init_tracing();

    match run().await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            error!(error = %e, "exiting with error");
            std::process::exit(e.exit_code());
        }
    }
}

async fn run() -> Result<(), neo_price_feed_core::errors::OracleError> {
    let cli = Cli::parse();

    if cli.generate_account {
        return generate_account(cli.secure_output.as_deref());
    }

    let config = AppConfig::from_env().map_err(neo_price_feed_core::errors::OracleError::Other)?;

    if cli.test_symbol_mappings {
        return test_symbol_mappings();
    }

    if cli.create_account_attestation {
        let address = cli.account_address.clone().ok_or_else(|| {
            neo_price_feed_core::errors::OracleError::Configuration(
                "--create-account-attestation requires --account-address".to_string(),
            )
        })?;
        return create_account_attestation(&config, &address);
    }

    if cli.verify_account_attestation {
        return verify_account_attestation(&config);
    }

    let oracle = Oracle::new(config.clone())?;

    if !cli.skip_health_checks {
        // Health checks need a client bound to the same endpoint; constructed
        // fresh here since Oracle doesn't expose its internal RPC client.
        let rpc = oracle_chain::RpcClient::new(oracle_chain::RpcClientConfig {
            endpoint: config.neo_rpc_endpoint.clone(),
            request_timeout: config.http_timeout,
        })
        .map_err(neo_price_feed_core::errors::OracleError::Submission)?;
        neo_price_feed_core::health::run_health_checks(&config, &rpc).await;
    }

    if cli.continuous {
        let duration = std::time::Duration::from_secs(cli.duration.unwrap_or(60) * 60);
        let interval = std::time::Duration::from_secs(cli.interval.unwrap_or(60));

        tokio::select! {
            result = oracle.run_continuous(duration, interval) => result,
            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal, stopping continuous run");
                Ok(())
            }
        }
    } else {
        oracle.run_cycle().await
    }
}

fn generate_account(secure_output: Option<&str>) -> Result<(), neo_price_feed_core::errors::OracleError> {
    let key = KeyPair::generate().map_err(neo_price_feed_core::errors::OracleError::Signing)?;
    let private_key_hex = hex::encode(&*key.private_key_bytes());

    let payload = serde_json::json!({
        "address": key.address(),
        "privateKey": private_key_hex,
        "publicKey": hex::encode(key.public_key_bytes()),
    });

    match secure_output {
        Some(path) => {
            let mut file = std::fs::File::create(path)
                .map_err(|e| neo_price_feed_core::errors::OracleError::Configuration(e.to_string()))?;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .map_err(|e| neo_price_feed_core::errors::OracleError::Configuration(e.to_string()))?;
            file.write_all(serde_json::to_string_pretty(&payload).unwrap().as_bytes())
                .map_err(|e| neo_price_feed_core::errors::OracleError::Configuration(e.to_string()))?;
            info!(path, "wrote new TEE account to secure output");
        }
        None => {
            println!("{}", serde_json::to_string_pretty(&payload).unwrap());
        }
    }

    Ok(())
}

fn test_symbol_mappings() -> Result<(), neo_price_feed_core::errors::OracleError> {
    let symbols = neo_price_feed_core::symbols::default_canonical_symbols();
    for symbol in &symbols {
        println!("{symbol}");
    }
    info!(count = symbols.len(), "symbol mapping table is valid");
    Ok(())
}

fn create_account_attestation(
    config: &AppConfig,
    address: &str,
) -> Result<(), neo_price_feed_core::errors::OracleError> {
    let run = RunMetadata {
        run_id: uuid::Uuid::new_v4().to_string(),
        run_number: 0,
        repo_owner: "neo-price-feed".to_string(),
        repo_name: "core".to_string(),
        workflow: "generate-account".to_string(),
    };

    let record = AttestationRecord::new_account_generation(address.to_string(), run.clone())
        .sign(&config.run_commit_sha, &config.run_actor)?;

    let store = AttestationStore::new(&config.attestation_base_dir, config.attestation_retention_days);
    store.write_account_attestation(&run.run_id, &record)?;

    info!(address, "wrote account attestation");
    Ok(())
}

fn verify_account_attestation(config: &AppConfig) -> Result<(), neo_price_feed_core::errors::OracleError> {
    let store = AttestationStore::new(&config.attestation_base_dir, config.attestation_retention_days);
    let run_id = std::env::var("RUN_ID").map_err(|_| {
        neo_price_feed_core::errors::OracleError::Configuration(
            "RUN_ID must be set to locate the attestation to verify".to_string(),
        )
    })?;

    let record = store.read_account_attestation(&run_id)?;
    let valid = record.verify(&config.run_commit_sha, &config.run_actor)?;

    if valid {
        info!(run_id, "account attestation verified");
        Ok(())
    } else {
        Err(neo_price_feed_core::errors::OracleError::Attestation(format!(
            "attestation for run {run_id} failed verification"
        )))
    }
}
