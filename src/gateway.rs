use crate::data::{Error, Grid, RangeRef};
use serde_json::{json, Value};

/// The handful of spreadsheet operations the sync needs. Implemented by the real
/// Sheets client (`google::GoogleSheets`) and by `MemorySheets`, which backs the tests
/// and `--dry-run`.
///
/// None of these create tabs implicitly: writing to a tab that may not exist must be
/// preceded by `ensure_tab_exists`.
pub(crate) trait SheetGateway {
    /// Titles of every tab in the spreadsheet, in display order.
    fn tab_titles(&mut self, sheet_id: &str) -> Result<Vec<String>, Error>;

    /// Append `grid` below the last populated row of `tab`. Never overwrites.
    fn append_rows(&mut self, sheet_id: &str, tab: &str, grid: &Grid) -> Result<Value, Error>;

    /// Write `grid` from the top-left corner of `range`, leaving cells outside the
    /// written extent alone.
    fn overwrite_range(
        &mut self,
        sheet_id: &str,
        range: &RangeRef,
        grid: &Grid,
    ) -> Result<Value, Error>;

    /// Blank every cell inside `range`; the tab itself stays.
    fn clear_range(&mut self, sheet_id: &str, range: &RangeRef) -> Result<Value, Error>;

    /// Current contents of `range`, empty if nothing is populated.
    fn read_range(&mut self, sheet_id: &str, range: &RangeRef) -> Result<Grid, Error>;

    /// Raw `batchUpdate` requests (`addSheet`, ...), passed through untouched.
    fn batch_update(&mut self, sheet_id: &str, requests: Vec<Value>) -> Result<Value, Error>;

    /// Create `title` unless a tab by that name already exists. Safe to call every cycle.
    fn ensure_tab_exists(&mut self, sheet_id: &str, title: &str) -> Result<(), Error> {
        if self.tab_titles(sheet_id)?.iter().any(|t| t == title) {
            return Ok(());
        }
        self.batch_update(sheet_id, vec![add_sheet_request(title)])?;
        Ok(())
    }
}

pub(crate) fn add_sheet_request(title: &str) -> Value {
    json!({ "addSheet": { "properties": { "title": title } } })
}

/// Spreadsheet held in memory, following the same rules as the hosted one: tabs
/// must exist before use, appends land after the last non-empty row, clears blank
/// cells without removing anything.
#[derive(Debug)]
pub(crate) struct MemorySheets {
    sheet_id: String,
    tabs: Vec<(String, Vec<Vec<String>>)>,
    creates: usize,
}

impl MemorySheets {
    /// A spreadsheet with a single empty `Sheet1`, like a freshly created one.
    pub fn new(sheet_id: &str) -> Self {
        Self {
            sheet_id: sheet_id.to_owned(),
            tabs: vec![("Sheet1".to_owned(), Vec::new())],
            creates: 0,
        }
    }

    /// How many `addSheet` requests were honoured so far.
    pub fn creates(&self) -> usize {
        self.creates
    }

    /// Populated contents of a tab, trailing blanks trimmed.
    #[cfg(test)]
    pub fn tab(&self, title: &str) -> Option<Grid> {
        self.tabs
            .iter()
            .find(|(t, _)| t == title)
            .map(|(_, cells)| populated(cells))
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.tabs.iter().map(|(t, _)| t.as_str())
    }

    fn check_id(&self, sheet_id: &str) -> Result<(), Error> {
        if sheet_id != self.sheet_id {
            return Err(Error::Gateway(format!(
                "Requested entity was not found: spreadsheet {sheet_id}"
            )));
        }
        Ok(())
    }

    fn cells_mut(&mut self, sheet_id: &str, tab: &str) -> Result<&mut Vec<Vec<String>>, Error> {
        self.check_id(sheet_id)?;
        self.tabs
            .iter_mut()
            .find(|(t, _)| t == tab)
            .map(|(_, cells)| cells)
            .ok_or_else(|| Error::Gateway(format!("Unable to parse range: {tab}")))
    }
}

impl SheetGateway for MemorySheets {
    fn tab_titles(&mut self, sheet_id: &str) -> Result<Vec<String>, Error> {
        self.check_id(sheet_id)?;
        Ok(self.titles().map(str::to_owned).collect())
    }

    fn append_rows(&mut self, sheet_id: &str, tab: &str, grid: &Grid) -> Result<Value, Error> {
        let cells = self.cells_mut(sheet_id, tab)?;
        let start = populated(cells).len();
        cells.truncate(start);
        cells.extend(grid.rows().iter().cloned());
        Ok(json!({
            "tableRange": tab,
            "updates": ack(tab, start, 0, grid),
        }))
    }

    fn overwrite_range(
        &mut self,
        sheet_id: &str,
        range: &RangeRef,
        grid: &Grid,
    ) -> Result<Value, Error> {
        let area = Area::parse(range)?;
        let cells = self.cells_mut(sheet_id, &range.tab)?;
        for (r, row) in grid.rows().iter().enumerate() {
            let r = area.row + r;
            if cells.len() <= r {
                cells.resize(r + 1, Vec::new());
            }
            for (c, value) in row.iter().enumerate() {
                let c = area.col + c;
                if cells[r].len() <= c {
                    cells[r].resize(c + 1, String::new());
                }
                cells[r][c] = value.clone();
            }
        }
        Ok(ack(&range.tab, area.row, area.col, grid))
    }

    fn clear_range(&mut self, sheet_id: &str, range: &RangeRef) -> Result<Value, Error> {
        let area = Area::parse(range)?;
        let cells = self.cells_mut(sheet_id, &range.tab)?;
        for (r, row) in cells.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                if area.contains(r, c) {
                    value.clear();
                }
            }
        }
        Ok(json!({ "clearedRange": range.to_string() }))
    }

    fn read_range(&mut self, sheet_id: &str, range: &RangeRef) -> Result<Grid, Error> {
        let area = Area::parse(range)?;
        let cells = self.cells_mut(sheet_id, &range.tab)?;
        let window: Vec<Vec<String>> = cells
            .iter()
            .enumerate()
            .filter(|(r, _)| *r >= area.row && area.rows.map_or(true, |n| *r < area.row + n))
            .map(|(r, row)| {
                row.iter()
                    .enumerate()
                    .filter(|(c, _)| area.contains(r, *c))
                    .map(|(_, v)| v.clone())
                    .collect()
            })
            .collect();
        Ok(populated(&window))
    }

    fn batch_update(&mut self, sheet_id: &str, requests: Vec<Value>) -> Result<Value, Error> {
        self.check_id(sheet_id)?;
        let mut replies = Vec::with_capacity(requests.len());
        for request in requests {
            match request.pointer("/addSheet/properties/title").and_then(Value::as_str) {
                Some(title) => {
                    if self.tabs.iter().any(|(t, _)| t == title) {
                        return Err(Error::Gateway(format!(
                            "A sheet with the name \"{title}\" already exists"
                        )));
                    }
                    self.tabs.push((title.to_owned(), Vec::new()));
                    self.creates += 1;
                    replies.push(json!({ "addSheet": { "properties": { "title": title } } }));
                }
                // formatting and friends have no visible effect on cell values
                None => replies.push(json!({})),
            }
        }
        Ok(json!({ "spreadsheetId": sheet_id, "replies": replies }))
    }
}

/// Rectangle addressed by a `RangeRef`, zero-based. `rows`/`cols` of `None` run to the
/// edge of the tab.
#[derive(Debug, PartialEq, Eq)]
struct Area {
    row: usize,
    col: usize,
    rows: Option<usize>,
    cols: Option<usize>,
}

impl Area {
    fn parse(range: &RangeRef) -> Result<Self, Error> {
        let Some(cells) = range.cells.as_deref() else {
            return Ok(Self {
                row: 0,
                col: 0,
                rows: None,
                cols: None,
            });
        };
        let bad = || Error::Gateway(format!("Unable to parse range: {range}"));
        let (start, end) = match cells.split_once(':') {
            Some((start, end)) => (start, Some(end)),
            None => (cells, None),
        };
        let (row, col) = parse_cell(start).ok_or_else(bad)?;
        match end {
            // a lone anchor addresses everything from there on
            None => Ok(Self {
                row,
                col,
                rows: None,
                cols: None,
            }),
            Some(end) => {
                let (last_row, last_col) = parse_cell(end).ok_or_else(bad)?;
                if last_row < row || last_col < col {
                    return Err(bad());
                }
                Ok(Self {
                    row,
                    col,
                    rows: Some(last_row - row + 1),
                    cols: Some(last_col - col + 1),
                })
            }
        }
    }

    fn contains(&self, r: usize, c: usize) -> bool {
        r >= self.row
            && c >= self.col
            && self.rows.map_or(true, |n| r < self.row + n)
            && self.cols.map_or(true, |n| c < self.col + n)
    }
}

/// `"C12"` -> `(11, 2)`.
fn parse_cell(cell: &str) -> Option<(usize, usize)> {
    let split = cell.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let col = letters
        .chars()
        .try_fold(0usize, |acc, c| {
            let n = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
            acc.checked_mul(26)?.checked_add(n)
        })?
        - 1;
    let row: usize = digits.parse().ok()?;
    Some((row.checked_sub(1)?, col))
}

/// `2` -> `"C"`, `26` -> `"AA"`.
fn column_name(mut col: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (col % 26) as u8);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

fn ack(tab: &str, row: usize, col: usize, grid: &Grid) -> Value {
    let updated_range = if grid.is_empty() || grid.width() == 0 {
        RangeRef::at(tab, &format!("{}{}", column_name(col), row + 1))
    } else {
        RangeRef::at(
            tab,
            &format!(
                "{}{}:{}{}",
                column_name(col),
                row + 1,
                column_name(col + grid.width() - 1),
                row + grid.len()
            ),
        )
    };
    json!({
        "updatedRange": updated_range.to_string(),
        "updatedRows": grid.len(),
        "updatedColumns": grid.width(),
        "updatedCells": grid.len() * grid.width(),
    })
}

/// Drop trailing empty cells and rows, then square the result up.
fn populated(cells: &[Vec<String>]) -> Grid {
    let mut rows: Vec<Vec<String>> = cells
        .iter()
        .map(|row| {
            let len = row.iter().rposition(|v| !v.is_empty()).map_or(0, |i| i + 1);
            row[..len].to_vec()
        })
        .collect();
    while rows.last().is_some_and(Vec::is_empty) {
        rows.pop();
    }
    Grid::from_ragged(rows)
}
