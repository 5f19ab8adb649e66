//! Command-line entry point for the challenge client.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;

use powgate::bench;
use powgate::client::Client;
use powgate::config::ClientConfig;
use powgate::solver::default_workers;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Client for TLS challenge servers gated by a SHA-1 proof-of-work"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a challenge server and run the dialogue
    Run {
        /// Path to a TOML config file
        #[arg(long, conflicts_with_all = ["address", "port", "ca_cert"])]
        config: Option<PathBuf>,
        /// Server address (direct mode)
        address: Option<String>,
        /// Server port (direct mode)
        port: Option<u16>,
        /// CA certificate path (direct mode)
        ca_cert: Option<String>,
    },

    /// Benchmark the proof-of-work solver offline
    Bench {
        /// Difficulty in leading zero hex digits
        #[arg(long, default_value_t = 5)]
        difficulty: u32,
        /// Worker threads; defaults to available parallelism
        #[arg(long)]
        threads: Option<usize>,
        /// Authdata prefix to hash against
        #[arg(
            long,
            default_value = "jkjGGJLLMsyCwEvGXxFXaOnorfQiEaSpjkFprqBAXNuiRdUpKJSsSEQMbiWGXtAk"
        )]
        authdata: String,
        /// Also run the single-threaded full-rehash baseline
        #[arg(long)]
        baseline: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("powgate=info")),
        )
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "client failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Run {
            config,
            address,
            port,
            ca_cert,
        } => {
            let config = match (config, address, port, ca_cert) {
                (Some(path), ..) => ClientConfig::from_file(&path)?,
                (None, Some(address), Some(port), Some(ca_cert)) => {
                    ClientConfig::from_args(address, port, ca_cert)?
                }
                _ => return Err("provide --config FILE or ADDRESS PORT CA_CERT".into()),
            };
            Client::new(config).run()?;
            Ok(())
        }

        Commands::Bench {
            difficulty,
            threads,
            authdata,
            baseline,
        } => {
            let workers = threads.unwrap_or_else(default_workers);
            let report = bench::run_parallel(authdata.as_bytes(), difficulty, workers)?;
            println!(
                "parallel: difficulty={} workers={} time_ms={} attempts={} rate={:.0}/s nonce={}",
                report.difficulty,
                report.workers,
                report.elapsed_ms,
                report.attempts,
                report.rate(),
                report.nonce
            );

            if baseline {
                let naive = bench::run_naive(authdata.as_bytes(), difficulty)?;
                println!(
                    "baseline: difficulty={} workers={} time_ms={} attempts={} rate={:.0}/s nonce={}",
                    naive.difficulty,
                    naive.workers,
                    naive.elapsed_ms,
                    naive.attempts,
                    naive.rate(),
                    naive.nonce
                );
            }
            Ok(())
        }
    }
}
