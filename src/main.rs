//! ledger-sync: append a CSV ledger to a Google Sheet and keep a summary tab
//! up to date, once or every time the file changes.
//!
//! Exit codes:
//!   0 - the cycle succeeded, or watch mode was stopped with Ctrl+C
//!   1 - configuration, source file or Sheets API failure

use anyhow::Context;
use cli::{Args, Mode};
use config::Config;
use data::Error;
use gateway::{MemorySheets, SheetGateway};
use google::GoogleSheets;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod cli;
mod compute;
mod config;
mod data;
mod gateway;
mod google;
mod read;
mod sync;
mod watch;
mod write;

fn main() -> Result<(), anyhow::Error> {
    // settings may live in a .env file next to the ledger
    dotenvy::dotenv().ok();
    let args = Args::parse_args();

    if args.init_config {
        return init_config();
    }

    init_logging(&args);
    debug!("Arguments: {:?}", args);

    let result = load_config(&args).and_then(|config| {
        if args.check_config {
            check_config(&config)
        } else {
            run(&args, &config)
        }
    });
    if let Err(e) = &result {
        error!("{e:#}");
    }
    result
}

/// `--init-config`: write a default `.ledger-sync.toml`.
fn init_config() -> Result<(), anyhow::Error> {
    let path = std::path::Path::new(config::DEFAULT_CONFIG_FILE);
    if path.exists() {
        anyhow::bail!("{} already exists, edit or remove it first", path.display());
    }
    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Created {}", path.display());
    Ok(())
}

/// `--check-config`: everything a run checks before its first cycle, credentials
/// included, then the resolved settings on stdout.
fn check_config(config: &Config) -> Result<(), anyhow::Error> {
    let key = config.service_account().context("Invalid configuration")?;
    println!("{}", config.describe(&key)?);
    println!("Configuration OK");
    Ok(())
}

/// Log to stderr so a dry run's CSV output on stdout stays clean. `RUST_LOG` wins
/// over the verbosity flags.
fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level().as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Defaults, then the config file, then the command line.
fn load_config(args: &Args) -> Result<Config, anyhow::Error> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from: {}", path.display());
            Config::load(path)?
        }
        None => match Config::load_default() {
            Ok(Some(config)) => {
                info!("Loaded config from {}", config::DEFAULT_CONFIG_FILE);
                config
            }
            Ok(None) => Config::default(),
            Err(e) => {
                warn!("Ignoring {}: {e:#}", config::DEFAULT_CONFIG_FILE);
                Config::default()
            }
        },
    };
    config.merge_with_args(args);
    info!("Validating configuration...");
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn run(args: &Args, config: &Config) -> Result<(), anyhow::Error> {
    if args.dry_run {
        let sheet_id = config.sheet_id()?;
        info!("Dry run: nothing will be sent to Google");
        let mut sheets = MemorySheets::new(sheet_id);
        dispatch(args.mode(), config, &mut sheets)?;
        debug!("Dry run created {} tabs", sheets.creates());
        print_tabs(&mut sheets, sheet_id)?;
        return Ok(());
    }

    let key = config.service_account().context("Invalid configuration")?;
    info!("Building Sheets client for {}", key.client_email);
    let mut sheets = GoogleSheets::new(key)?;
    dispatch(args.mode(), config, &mut sheets)?;
    Ok(())
}

fn dispatch<G: SheetGateway + ?Sized>(
    mode: Mode,
    config: &Config,
    sheets: &mut G,
) -> Result<(), Error> {
    match mode {
        Mode::Sync => watch::run_once(config, sheets).map(drop),
        Mode::Watch { once_on_start } => {
            let stop = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&stop);
            ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
                .map_err(|e| Error::Config(format!("cannot install Ctrl+C handler: {e}")))?;
            watch::watch(config, sheets, &stop, once_on_start).map(drop)
        }
    }
}

fn print_tabs(sheets: &mut MemorySheets, sheet_id: &str) -> Result<(), anyhow::Error> {
    let titles: Vec<String> = sheets.titles().map(str::to_owned).collect();
    for title in titles {
        let grid = sheets.read_range(sheet_id, &data::RangeRef::whole(&title))?;
        println!("== {title}");
        write::write_grid(std::io::stdout(), &grid)?;
    }
    Ok(())
}
