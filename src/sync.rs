use crate::{
    compute::summary_report,
    config::Config,
    data::{Error, RangeRef},
    gateway::SheetGateway,
    read::load_table,
    write::normalize,
};
use serde_json::Value;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Steps of one cycle, in order. Only used to label log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Load,
    Normalize,
    AppendRaw,
    Aggregate,
    EnsureSummaryTab,
    ClearSummary,
    WriteSummary,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Load => "load",
            Stage::Normalize => "normalize",
            Stage::AppendRaw => "append-raw",
            Stage::Aggregate => "aggregate",
            Stage::EnsureSummaryTab => "ensure-summary-tab",
            Stage::ClearSummary => "clear-summary",
            Stage::WriteSummary => "write-summary",
        })
    }
}

/// What a successful cycle did, mostly for logging.
#[derive(Debug)]
pub(crate) struct Cycle {
    pub rows: usize,
    pub summary_rows: usize,
    pub append_ack: Value,
    pub summary_ack: Value,
}

/// Run one full cycle: load the CSV, append it to the raw tab, then rebuild the
/// summary tab. Nothing is kept between cycles.
///
/// There is no rollback: if the summary write fails the raw rows stay appended.
/// Failing to create or clear the summary tab is logged and ignored, and the write
/// is attempted anyway; a failed clear may therefore leave stale rows below the
/// new summary.
pub(crate) fn run_cycle<G: SheetGateway + ?Sized>(
    config: &Config,
    sheets: &mut G,
) -> Result<Cycle, Error> {
    let sheet_id = config.sheet_id()?;
    let raw_tab = &config.sheet.raw_tab;
    let summary_tab = &config.sheet.summary_tab;

    debug!(stage = %Stage::Load, "Reading {}", config.source.path.display());
    let table = load_table(&config.source.path).map_err(|e| failed(Stage::Load, e))?;

    let raw = normalize(&table);
    debug!(stage = %Stage::Normalize, "{} rows under {:?}", table.len(), raw.header());

    info!(stage = %Stage::AppendRaw, "Appending {} rows to {raw_tab}", table.len());
    let append_ack = sheets
        .append_rows(sheet_id, raw_tab, &raw)
        .map_err(|e| failed(Stage::AppendRaw, e))?;

    debug!(stage = %Stage::Aggregate, "Computing summary");
    let summary = summary_report(&table);

    if let Err(e) = sheets.ensure_tab_exists(sheet_id, summary_tab) {
        warn!(stage = %Stage::EnsureSummaryTab, "Could not create {summary_tab}, writing anyway: {e}");
    }
    if let Err(e) = sheets.clear_range(sheet_id, &RangeRef::whole(summary_tab)) {
        warn!(stage = %Stage::ClearSummary, "Could not clear {summary_tab}, writing anyway: {e}");
    }

    info!(stage = %Stage::WriteSummary, "Writing summary to {summary_tab}");
    let summary_ack = sheets
        .overwrite_range(sheet_id, &RangeRef::at(summary_tab, "A1"), &summary)
        .map_err(|e| failed(Stage::WriteSummary, e))?;

    Ok(Cycle {
        rows: table.len(),
        summary_rows: summary.len(),
        append_ack,
        summary_ack,
    })
}

fn failed(stage: Stage, e: Error) -> Error {
    error!(%stage, "Sync cycle aborted: {e}");
    e
}

#[cfg(test)]
mod tests {
    use super::run_cycle;
    use crate::{
        config::Config,
        data::{Error, Grid, RangeRef},
        gateway::{MemorySheets, SheetGateway},
    };
    use serde_json::Value;
    use std::path::Path;

    const ID: &str = "sheet-id";
    const LEDGER: &str = "\
name,  balance, payment_status, account_type
alice, 100,     paid,           checking
bob,   -50.5,   late,           savings
carol, x,       paid,           checking
";

    fn config(dir: &Path, csv: &str) -> Config {
        let path = dir.join("data.csv");
        std::fs::write(&path, csv).unwrap();
        let mut config = Config::default();
        config.source.path = path;
        config.sheet.id = Some(ID.into());
        config
    }

    fn grid(rows: &[&[&str]]) -> Grid {
        Grid::from_ragged(
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    fn expected_summary() -> Grid {
        grid(&[
            &["Metric", "Value"],
            &["Total balance", "49.50"],
            &["", ""],
            &["Payment status", "Count"],
            &["paid", "2"],
            &["late", "1"],
            &["", ""],
            &["Account type", "Count"],
            &["checking", "2"],
            &["savings", "1"],
            &["", ""],
            &["Account type", "Average balance"],
            &["checking", "50.00"],
            &["savings", "-50.50"],
        ])
    }

    #[test]
    fn test_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), LEDGER);
        let mut sheets = MemorySheets::new(ID);
        sheets
            .append_rows(ID, "Sheet1", &grid(&[&["previous", "content"]]))
            .unwrap();
        sheets.ensure_tab_exists(ID, "Summary").unwrap();
        let stale_row: &[&str] = &["stale", "row"];
        let stale = vec![stale_row; 20];
        sheets
            .overwrite_range(ID, &RangeRef::at("Summary", "A1"), &grid(&stale))
            .unwrap();

        let cycle = run_cycle(&config, &mut sheets).unwrap();
        assert_eq!(cycle.rows, 3);
        assert_eq!(cycle.summary_rows, 14);

        assert_eq!(
            sheets.tab("Sheet1").unwrap(),
            grid(&[
                &["previous", "content", "", ""],
                &["name", "balance", "payment_status", "account_type"],
                &["alice", "100", "paid", "checking"],
                &["bob", "-50.5", "late", "savings"],
                &["carol", "x", "paid", "checking"],
            ])
        );
        assert_eq!(sheets.tab("Summary").unwrap(), expected_summary());
    }

    #[test]
    fn test_second_cycle_appends_again_and_rewrites_summary() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), LEDGER);
        let mut sheets = MemorySheets::new(ID);
        run_cycle(&config, &mut sheets).unwrap();
        run_cycle(&config, &mut sheets).unwrap();
        assert_eq!(sheets.tab("Sheet1").unwrap().len(), 8);
        assert_eq!(sheets.tab("Summary").unwrap(), expected_summary());
        assert_eq!(sheets.creates(), 1);
    }

    #[test]
    fn test_missing_source_aborts_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), LEDGER);
        config.source.path = dir.path().join("gone.csv");
        let mut sheets = MemorySheets::new(ID);
        let res = run_cycle(&config, &mut sheets);
        assert_eq!(res.unwrap_err(), Error::NotFound(config.source.path.clone()));
        assert!(sheets.tab("Sheet1").unwrap().is_empty());
        assert!(sheets.tab("Summary").is_none());
    }

    #[test]
    fn test_malformed_source_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), "balance,account_type\n1\n");
        let mut sheets = MemorySheets::new(ID);
        assert!(matches!(
            run_cycle(&config, &mut sheets),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_missing_raw_tab_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), LEDGER);
        config.sheet.raw_tab = "Raw".into();
        let mut sheets = MemorySheets::new(ID);
        assert!(matches!(
            run_cycle(&config, &mut sheets),
            Err(Error::Gateway(_))
        ));
        assert!(sheets.tab("Summary").is_none());
    }

    /// Delegates to `MemorySheets` but refuses to create or clear tabs.
    struct Stubborn(MemorySheets);

    impl SheetGateway for Stubborn {
        fn tab_titles(&mut self, sheet_id: &str) -> Result<Vec<String>, Error> {
            self.0.tab_titles(sheet_id)
        }
        fn append_rows(&mut self, sheet_id: &str, tab: &str, grid: &Grid) -> Result<Value, Error> {
            self.0.append_rows(sheet_id, tab, grid)
        }
        fn overwrite_range(
            &mut self,
            sheet_id: &str,
            range: &RangeRef,
            grid: &Grid,
        ) -> Result<Value, Error> {
            self.0.overwrite_range(sheet_id, range, grid)
        }
        fn clear_range(&mut self, _: &str, _: &RangeRef) -> Result<Value, Error> {
            Err(Error::Gateway("The caller does not have permission".into()))
        }
        fn read_range(&mut self, sheet_id: &str, range: &RangeRef) -> Result<Grid, Error> {
            self.0.read_range(sheet_id, range)
        }
        fn batch_update(&mut self, _: &str, _: Vec<Value>) -> Result<Value, Error> {
            Err(Error::Gateway("The caller does not have permission".into()))
        }
    }

    #[test]
    fn test_failed_clear_still_writes_summary() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), LEDGER);
        let mut sheets = MemorySheets::new(ID);
        sheets.ensure_tab_exists(ID, "Summary").unwrap();
        let stale_row: &[&str] = &["stale", "row"];
        let stale = vec![stale_row; 16];
        sheets
            .overwrite_range(ID, &RangeRef::at("Summary", "A1"), &grid(&stale))
            .unwrap();
        let mut sheets = Stubborn(sheets);

        run_cycle(&config, &mut sheets).unwrap();

        // the clear failed, so what was below the new summary is still there
        let summary = sheets.0.tab("Summary").unwrap();
        assert_eq!(summary.len(), 16);
        assert_eq!(summary.rows()[..14], expected_summary().rows()[..]);
        assert_eq!(summary.rows()[15], ["stale", "row"]);
    }

    #[test]
    fn test_failed_tab_creation_still_attempts_write() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), LEDGER);
        let mut sheets = Stubborn(MemorySheets::new(ID));
        // the write then fails on the missing tab, which does abort the cycle
        assert!(matches!(
            run_cycle(&config, &mut sheets),
            Err(Error::Gateway(_))
        ));
        assert_eq!(sheets.0.tab("Sheet1").unwrap().len(), 4);
    }
}
