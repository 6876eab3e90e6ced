//! Command-line surface, parsed with `clap`'s derive API.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "neo-price-feed-core", about = "TEE price-feed oracle core")]
pub struct Cli {
    /// Run continuously instead of a single cycle.
    #[arg(long)]
    pub continuous: bool,

    /// Total duration to run in continuous mode, in minutes.
    #[arg(long, requires = "continuous")]
    pub duration: Option<u64>,

    /// Seconds to sleep between cycles in continuous mode.
    #[arg(long, requires = "continuous")]
    pub interval: Option<u64>,

    /// Generate a new TEE identity and print (or write) it, then exit.
    #[arg(long)]
    pub generate_account: bool,

    /// With `--generate-account`, write the key to this path with 0600
    /// permissions instead of printing it to stdout.
    #[arg(long)]
    pub secure_output: Option<String>,

    /// Write an account-generation attestation for the given address.
    #[arg(long)]
    pub create_account_attestation: bool,

    /// Address to attest, used with `--create-account-attestation`.
    #[arg(long)]
    pub account_address: Option<String>,

    /// Re-read and verify the current run's account attestation, then exit.
    #[arg(long)]
    pub verify_account_attestation: bool,

    /// Validate the configured symbol-mapping table and exit without
    /// contacting any upstream or the chain.
    #[arg(long)]
    pub test_symbol_mappings: bool,

    /// Skip start-up health checks (RPC reachability, contract hash format).
    #[arg(long)]
    pub skip_health_checks: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_invocation_runs_a_single_cycle() {
        let cli = Cli::parse_from(["neo-price-feed-core"]);
        assert!(!cli.continuous);
        assert!(!cli.generate_account);
    }

    #[test]
    fn continuous_mode_accepts_duration_and_interval() {
        let cli = Cli::parse_from([
            "neo-price-feed-core",
            "--continuous",
            "--duration",
            "60",
            "--interval",
            "30",
        ]);
        assert!(cli.continuous);
        assert_eq!(cli.duration, Some(60));
        assert_eq!(cli.interval, Some(30));
    }

    #[test]
    fn generate_account_with_secure_output() {
        let cli = Cli::parse_from([
            "neo-price-feed-core",
            "--generate-account",
            "--secure-output",
            "/tmp/key.json",
        ]);
        assert!(cli.generate_account);
        assert_eq!(cli.secure_output.as_deref(), Some("/tmp/key.json"));
    }
}
