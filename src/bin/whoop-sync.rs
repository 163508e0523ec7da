// ABOUTME: CLI entrypoint for whoop-sync: auth, sync, and stats subcommands
// ABOUTME: Thin glue over the library; exits non-zero with guidance on auth/config errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # whoop-sync CLI
//!
//! ```bash
//! # Interactive (re-)authentication; clears any stored tokens first
//! whoop-sync auth
//!
//! # Incremental sync of everything
//! whoop-sync sync
//!
//! # Full re-sync of selected types within a date range
//! whoop-sync sync --full --start 2024-01-01 --types cycles,sleeps
//!
//! # Per-table row counts
//! whoop-sync stats
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::error;
use tracing_subscriber::EnvFilter;

use whoop_sync::api::ApiClient;
use whoop_sync::config::Config;
use whoop_sync::database::Database;
use whoop_sync::errors::{AppError, AppResult};
use whoop_sync::oauth::{AuthFlow, TokenStore};
use whoop_sync::sync::{SyncEngine, SyncOptions, AUTHORIZE_TIMEOUT};

#[derive(Parser)]
#[command(
    name = "whoop-sync",
    about = "Sync WHOOP data to a local SQLite database",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Clear stored tokens and run the interactive authorization flow
    Auth,
    /// Sync data from the WHOOP API into the local store
    Sync {
        /// Full sync instead of incremental
        #[arg(long)]
        full: bool,
        /// Start date (YYYY-MM-DD), used as-is instead of the watermark
        #[arg(long)]
        start: Option<NaiveDate>,
        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Data types to sync (default: everything, including profile)
        #[arg(long, value_delimiter = ',')]
        types: Vec<SyncType>,
    },
    /// Print per-table row counts
    Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SyncType {
    Cycles,
    Recoveries,
    Sleeps,
    Workouts,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            match err {
                AppError::Config(_) => print_setup_guidance(),
                AppError::Auth(_) => {
                    eprintln!("Run `whoop-sync auth` to re-authenticate.");
                }
                _ => {}
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    let config = Config::from_env()?;
    let store = TokenStore::new(&config.tokens_file);
    let auth = Arc::new(AuthFlow::new(&config, store)?);

    match cli.command {
        Command::Auth => {
            // Unconditionally drop the old grant so a stale refresh token
            // can never shadow the new one.
            auth.clear_tokens().await?;
            auth.authorize(AUTHORIZE_TIMEOUT).await?;
            println!("Authentication successful!");
            Ok(())
        }
        Command::Sync {
            full,
            start,
            end,
            types,
        } => {
            let engine = build_engine(&config, auth).await?;
            engine.authenticate().await?;

            let options = SyncOptions {
                full,
                start: start.map(day_start),
                end: end.map(day_start),
            };

            if types.is_empty() {
                engine.sync_all(options).await?;
            } else {
                for sync_type in types {
                    match sync_type {
                        SyncType::Cycles => engine.sync_cycles(options).await?,
                        SyncType::Recoveries => engine.sync_recoveries(options).await?,
                        SyncType::Sleeps => engine.sync_sleeps(options).await?,
                        SyncType::Workouts => engine.sync_workouts(options).await?,
                    };
                }
            }
            println!("\nSync complete!");
            Ok(())
        }
        Command::Stats => {
            let engine = build_engine(&config, auth).await?;
            let stats = engine.database().stats().await?;
            println!("Database statistics:");
            for (table, count) in stats.as_pairs() {
                println!("  {table}: {count} records");
            }
            Ok(())
        }
    }
}

async fn build_engine(config: &Config, auth: Arc<AuthFlow>) -> AppResult<SyncEngine> {
    let api = ApiClient::new(config, Arc::clone(&auth));
    let db = Database::connect(&config.database_url()).await?;
    Ok(SyncEngine::new(config, auth, api, db))
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn print_setup_guidance() {
    eprintln!("\n1. Go to https://developer-dashboard.whoop.com/");
    eprintln!("2. Create a new application");
    eprintln!("3. Set the redirect URI to: http://localhost:8080/callback");
    eprintln!("4. Copy the Client ID and Secret to your .env file");
}
