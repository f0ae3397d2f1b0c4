use crate::data::{Grid, Table};

/// Turn a `Table` into the grid we upload: the header first, then every row as-is.
/// Cells are already text and missing markers were blanked on load, so an empty field
/// stays an empty string and no "null" or "nan" marker reaches the sheet.
pub(crate) fn normalize(table: &Table) -> Grid {
    let mut rows = Vec::with_capacity(table.len() + 1);
    rows.push(table.columns().to_vec());
    rows.extend(table.rows().iter().cloned());
    Grid::new(rows)
}

/// Basic CSV exporter for a `Grid`, used to show what a dry run would have written.
pub(crate) fn write_grid<W: std::io::Write>(writer: W, grid: &Grid) -> Result<(), anyhow::Error> {
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(writer);
    for row in grid.rows() {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}
