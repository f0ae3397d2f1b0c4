use crate::data::{is_missing, Error, Table};
use std::path::Path;

/// Load the ledger file. A missing file is `NotFound`; everything the CSV reader
/// complains about (no header, a record whose field count differs from the header,
/// invalid UTF-8) is `Parse` and rejects the whole file.
pub(crate) fn load_table(path: &Path) -> Result<Table, Error> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(Error::Parse(format!("{}: {e}", path.display()))),
    };
    read_table(file)
}

/// Simple CSV importer for a `Table`. Whitespace around every field (header names
/// included) is dropped, so `a, b` and `a,b` read the same. Data cells holding one of
/// the `MISSING_MARKERS` come out empty.
pub(crate) fn read_table<R: std::io::Read>(reader: R) -> Result<Table, Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let columns: Vec<String> = rdr
        .headers()
        .map_err(parse_error)?
        .iter()
        .map(|name| name.trim().to_owned())
        .collect();
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(parse_error)?;
        rows.push(
            record
                .iter()
                .map(|cell| if is_missing(cell) { "" } else { cell })
                .map(str::to_owned)
                .collect(),
        );
    }
    Table::new(columns, rows)
}

fn parse_error(e: csv::Error) -> Error {
    Error::Parse(e.to_string())
}
