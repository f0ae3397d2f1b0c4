use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};
use thiserror::Error;

/// Column holding the amount we sum and average.
pub const BALANCE: &str = "balance";
/// Column whose distinct values are counted in the "Payment status" section.
pub const PAYMENT_STATUS: &str = "payment_status";
/// Column used both for counting and for grouping the averages.
pub const ACCOUNT_TYPE: &str = "account_type";

/// Cell texts that mean "no value", the same set pandas' CSV reader turns into NaN.
/// They are read as empty cells, so they upload as `""` and are left out of every
/// count and group.
pub const MISSING_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub fn is_missing(cell: &str) -> bool {
    cell.is_empty() || MISSING_MARKERS.contains(&cell)
}

/// This is the ledger as loaded from the CSV file. Every cell is kept as text; the only
/// column we ever interpret is `balance`, and that happens in `compute`, not here.
/// Rows are stored positionally, aligned with `columns`, so a row can't be missing a
/// value for a declared column: `Table::new` refuses any row of the wrong width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, Error> {
        if columns.is_empty() {
            return Err(Error::Parse("missing header row".into()));
        }
        if let Some((n, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(Error::Parse(format!(
                "record {} has {} fields, header has {}",
                n + 1,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Values of the named column, top to bottom, or `None` if there is no such column.
    /// With duplicated header names the first one wins.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &str> + '_> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(move |row| row[idx].as_str()))
    }
}

/// Rectangular block of strings, the unit of transfer to and from the Sheets API.
/// Row 0 is the header when the grid comes from a `Table`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid {
    rows: Vec<Vec<String>>,
}

impl Grid {
    /// Wrap rows that are already rectangular, such as a `Table`'s.
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Square up `rows` by padding every row with empty cells to the widest one.
    /// The Sheets API drops trailing empty cells from what it returns, so grids read
    /// back from it come through here too.
    pub fn from_ragged(mut rows: Vec<Vec<String>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, String::new());
        }
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn header(&self) -> Option<&[String]> {
        self.rows.first().map(Vec::as_slice)
    }

    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A tab plus an optional A1 cell region inside it; `None` addresses the whole tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRef {
    pub tab: String,
    pub cells: Option<String>,
}

impl RangeRef {
    pub fn whole(tab: &str) -> Self {
        Self {
            tab: tab.to_owned(),
            cells: None,
        }
    }

    pub fn at(tab: &str, cells: &str) -> Self {
        Self {
            tab: tab.to_owned(),
            cells: Some(cells.to_owned()),
        }
    }
}

/// A1 notation, quoting the tab title when it isn't a plain identifier.
impl fmt::Display for RangeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plain = !self.tab.is_empty()
            && self
                .tab
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if plain {
            f.write_str(&self.tab)?;
        } else {
            write!(f, "'{}'", self.tab.replace('\'', "''"))?;
        }
        match &self.cells {
            Some(cells) => write!(f, "!{cells}"),
            None => Ok(()),
        }
    }
}

/// One variant per failure class. `Config` is fatal at startup; `NotFound` and `Parse`
/// abort the cycle that hit them; `Gateway` aborts too, except on the summary tab's
/// ensure/clear steps where the orchestrator logs it and carries on.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Source file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Malformed source: {0}")]
    Parse(String),
    #[error("Sheets request failed: {0}")]
    Gateway(String),
}
