//! # Vendor Sync CLI (`vsync`)
//!
//! The `vsync` binary runs the three vendor sync jobs against the entity
//! store configured in a TOML file.
//!
//! ## Usage
//!
//! ```bash
//! vsync --config ./config/vsync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vsync backfill` | Seed accounts, invoices, and attachments from the local data |
//! | `vsync cleanup` | Delete every account named in the source CSV |
//! | `vsync extract` | Rebuild the output CSV and documents from the store |
//! | `vsync check` | Verify local paths and remote credentials |
//!
//! ## Examples
//!
//! ```bash
//! # Preview a backfill without touching the remote store
//! vsync backfill --dry-run --config ./config/vsync.toml
//!
//! # Start from a clean slate, then seed
//! vsync cleanup && vsync backfill
//!
//! # Extract, stopping at the first failure
//! vsync extract --policy strict --progress json
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::fmt::Debug;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use vendor_sync::auth::TokenProvider;
use vendor_sync::backfill::{self, BackfillInput};
use vendor_sync::check;
use vendor_sync::cleanup;
use vendor_sync::config::{self, Config};
use vendor_sync::dataverse::DataverseClient;
use vendor_sync::error::{ErrorPolicy, RunResult};
use vendor_sync::extract;
use vendor_sync::progress::ProgressMode;
use vendor_sync::store::memory::InMemoryEntityStore;
use vendor_sync::tabular;

/// Vendor Sync CLI: move vendor spend data between local files and a
/// remote entity store.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/vsync.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "vsync",
    about = "Sync vendor spend records and contract documents with a remote entity store",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/vsync.toml")]
    config: PathBuf,

    /// Per-item progress on stderr. Defaults to `human` on a TTY, else `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    /// Override the command's error policy.
    ///
    /// `best-effort` logs a failed item and moves on; `strict` stops at the
    /// first failure. Backfill defaults to best-effort, cleanup and extract
    /// to strict.
    #[arg(long, global = true, value_enum)]
    policy: Option<ErrorPolicy>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Seed the entity store from the source CSV and document directory.
    ///
    /// Not idempotent: running it twice duplicates every entity. Run
    /// `vsync cleanup` first.
    Backfill {
        /// Run against an in-memory store instead of the remote one.
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete every account whose name appears in the source CSV,
    /// invoices first.
    Cleanup,

    /// Rebuild the output CSV and document directory from the store.
    Extract,

    /// Check configuration, local paths, and remote credentials.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let reporter = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    match cli.command {
        Commands::Backfill { dry_run } => {
            let policy = cli.policy.unwrap_or(ErrorPolicy::BestEffort);
            let input = BackfillInput::load(&cfg)?;

            let result = if dry_run {
                let store = InMemoryEntityStore::new();
                let result =
                    backfill::run_backfill(&cfg, &input, &store, reporter.as_ref(), policy).await;
                println!("(dry run: nothing was written to the remote store)");
                result
            } else {
                let client = connect(&cfg).await?;
                backfill::run_backfill(&cfg, &input, &client, reporter.as_ref(), policy).await
            };

            let report = summarize(result, |r| r.print_summary())?;
            fail_on_absorbed(report.failures)?;
        }
        Commands::Cleanup => {
            let policy = cli.policy.unwrap_or(ErrorPolicy::Strict);
            let rows = tabular::read_vendor_rows(&cfg.paths.source_csv)?;
            let names = tabular::distinct_vendor_names(&rows);

            let client = connect(&cfg).await?;
            let result = cleanup::run_cleanup(&names, &client, reporter.as_ref(), policy).await;

            let report = summarize(result, |r| r.print_summary())?;
            fail_on_absorbed(report.failures)?;
        }
        Commands::Extract => {
            let policy = cli.policy.unwrap_or(ErrorPolicy::Strict);
            extract::prepare_output(&cfg.paths)?;

            let client = connect(&cfg).await?;
            let result = extract::run_extract(&cfg, &client, reporter.as_ref(), policy).await;

            let report = summarize(result, |r| r.print_summary(&cfg.paths))?;
            fail_on_absorbed(report.failures)?;
        }
        Commands::Check => {
            if !check::run_check(&cfg).await? {
                bail!("one or more checks failed");
            }
        }
    }

    Ok(())
}

/// Acquire a token and build the remote client. Called only after the
/// local inputs have been loaded.
async fn connect(cfg: &Config) -> anyhow::Result<DataverseClient> {
    let token = TokenProvider::new(&cfg.remote)
        .acquire()
        .await
        .context("Failed to acquire access token")?;
    Ok(DataverseClient::new(&cfg.remote, &token)?)
}

/// Print a run's summary, including the partial one of an aborted run.
fn summarize<R: Debug>(result: RunResult<R>, print: impl Fn(&R)) -> anyhow::Result<R> {
    match result {
        Ok(report) => {
            print(&report);
            Ok(report)
        }
        Err(aborted) => {
            print(&aborted.report);
            Err(aborted.error.into())
        }
    }
}

fn fail_on_absorbed(failures: u64) -> anyhow::Result<()> {
    if failures > 0 {
        bail!("{} item(s) failed, see the log above", failures);
    }
    Ok(())
}
