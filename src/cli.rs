//! Command-line interface argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ledger-sync - push a CSV ledger and its summary to a Google Sheet
///
/// Each run appends the CSV rows to the raw tab, then rewrites the summary tab
/// with totals, per-status and per-type counts and average balances.
///
/// Examples:
///   ledger-sync --csv data.csv --sheet-id 1AbC...
///   ledger-sync watch
///   ledger-sync --dry-run
///   ledger-sync --check-config
///   ledger-sync --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub mode: Option<Mode>,

    /// CSV file to sync (default: data.csv)
    #[arg(long, value_name = "FILE", global = true)]
    pub csv: Option<PathBuf>,

    /// Target spreadsheet identifier
    #[arg(long, value_name = "ID", env = "GOOGLE_SHEET_ID", global = true)]
    pub sheet_id: Option<String>,

    /// Service-account address the spreadsheet is shared with
    #[arg(
        long,
        value_name = "EMAIL",
        env = "GOOGLE_SERVICE_ACCOUNT_EMAIL",
        global = true
    )]
    pub service_account_email: Option<String>,

    /// Service-account JSON key (default: credentials.json)
    #[arg(
        long,
        value_name = "FILE",
        env = "GOOGLE_CREDENTIALS_FILE",
        global = true
    )]
    pub credentials: Option<PathBuf>,

    /// Tab the raw rows are appended to (default: Sheet1)
    #[arg(long, value_name = "TAB", global = true)]
    pub raw_tab: Option<String>,

    /// Tab holding the summary (default: Summary)
    #[arg(long, value_name = "TAB", global = true)]
    pub summary_tab: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .ledger-sync.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Run against an in-memory spreadsheet and print the resulting tabs
    ///
    /// No credentials are needed and nothing is sent to Google.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Validate the configuration and credentials, print them and exit
    #[arg(long, conflicts_with = "dry_run")]
    pub check_config: bool,

    /// Generate a default .ledger-sync.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Run one sync cycle and exit (default)
    Sync,
    /// Re-run the sync every time the CSV file changes, until Ctrl+C
    Watch {
        /// Run one cycle right away instead of waiting for the first change
        #[arg(long)]
        once_on_start: bool,
    },
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn mode(&self) -> Mode {
        self.mode.unwrap_or(Mode::Sync)
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
