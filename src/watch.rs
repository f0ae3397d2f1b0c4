//! What makes a cycle run: once per invocation, or once per change of the CSV file.

use crate::{
    config::Config,
    data::Error,
    gateway::SheetGateway,
    sync::{run_cycle, Cycle},
};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{channel, RecvTimeoutError},
    },
    time::Duration,
};
use tracing::{debug, error, info, warn};

/// How long the loop blocks waiting for an event before looking at the stop flag.
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(250);

/// Run exactly one cycle.
pub(crate) fn run_once<G: SheetGateway + ?Sized>(
    config: &Config,
    sheets: &mut G,
) -> Result<Cycle, Error> {
    let cycle = run_cycle(config, sheets)?;
    log_cycle(&cycle);
    Ok(cycle)
}

/// Block on change notifications for the CSV file, running one cycle per
/// notification, until `stop` is raised.
///
/// Notifications are handled strictly one after the other: events arriving while a
/// cycle runs queue up and each triggers its own full cycle afterwards. A failed
/// cycle is logged and the loop keeps going. `stop` is looked at between
/// notifications, never in the middle of a cycle.
pub(crate) fn watch<G: SheetGateway + ?Sized>(
    config: &Config,
    sheets: &mut G,
    stop: &AtomicBool,
    once_on_start: bool,
) -> Result<usize, Error> {
    let sheet_id = config.sheet_id()?;
    sheets.ensure_tab_exists(sheet_id, &config.sheet.raw_tab)?;
    sheets.ensure_tab_exists(sheet_id, &config.sheet.summary_tab)?;

    let target = resolve(&config.source.path)?;
    let dir = target
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let (tx, rx) = channel::<notify::Result<Event>>();
    let mut watcher = notify::recommended_watcher(tx).map_err(|e| watch_error(&dir, e))?;
    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .map_err(|e| watch_error(&dir, e))?;
    info!(
        "Watching {} for changes. Press Ctrl+C to stop.",
        target.display()
    );

    let mut cycles = 0;
    if once_on_start {
        cycles += 1;
        report(run_cycle(config, sheets));
    }
    while !stop.load(Ordering::SeqCst) {
        match rx.recv_timeout(STOP_CHECK_INTERVAL) {
            Ok(Ok(event)) => {
                if !is_change_of(&event, &target) {
                    continue;
                }
                info!("Detected change in {}; syncing...", target.display());
                cycles += 1;
                report(run_cycle(config, sheets));
            }
            Ok(Err(e)) => warn!("Watch error: {e}"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(Error::Config(format!(
                    "watcher for {} stopped unexpectedly",
                    dir.display()
                )))
            }
        }
    }
    watcher
        .unwatch(&dir)
        .map_err(|e| watch_error(&dir, e))?;
    info!("Stopped watching after {cycles} sync cycles");
    Ok(cycles)
}

fn report(result: Result<Cycle, Error>) {
    match result {
        Ok(cycle) => log_cycle(&cycle),
        Err(e) => error!("Sync failed, still watching: {e}"),
    }
}

fn log_cycle(cycle: &Cycle) {
    debug!(append = %cycle.append_ack, summary = %cycle.summary_ack, "Sheets acknowledged");
    info!(
        "Synced {} rows and a {}-row summary",
        cycle.rows, cycle.summary_rows
    );
}

/// Absolute path of the watched file, so it can be compared with event paths.
fn resolve(path: &Path) -> Result<PathBuf, Error> {
    std::fs::canonicalize(path).map_err(|e| {
        Error::Config(format!("cannot watch {}: {e}", path.display()))
    })
}

/// Writes to the file, and files being created in its place (editors that save by
/// replacing), both count as a change.
fn is_change_of(event: &Event, target: &Path) -> bool {
    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
        return false;
    }
    let hit = event.paths.iter().any(|path| {
        path == target || std::fs::canonicalize(path).is_ok_and(|p| p == target)
    });
    if !hit {
        debug!("Ignoring {:?} on {:?}", event.kind, event.paths);
    }
    hit
}

fn watch_error(dir: &Path, e: notify::Error) -> Error {
    Error::Config(format!("cannot watch {}: {e}", dir.display()))
}
