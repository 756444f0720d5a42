//! Delimited-text reader: turns raw CSV text into header-keyed records.
//!
//! The reader is a two-state machine (inside quotes / normal). A quote toggles
//! quoting unless it is immediately followed by another quote while quoting, in
//! which case a single literal quote is emitted. Inside quotes, commas and line
//! breaks are literal text. Outside quotes a comma ends a cell, `\n` ends a row
//! and `\r` is dropped.
//!
//! Headers are folded with [`normalize_header`] so that `Published Date`,
//! `published_date` and `publishedDate` all address the same column.

use std::collections::HashMap;

use tracing::debug;

const BOM: char = '\u{feff}';

/// One input row keyed by normalized header name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    cells: HashMap<String, String>,
}

impl RawRecord {
    /// Returns the cell for a normalized header, or `None` when the column is
    /// not part of the header set.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }

    /// Resolves a logical column through its aliases: the first alias present
    /// in the header set wins, even if its cell is blank.
    pub fn first_of(&self, aliases: &[&str]) -> Option<&str> {
        aliases.iter().find_map(|alias| self.get(alias))
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut cells = HashMap::new();
        for (k, v) in iter {
            cells.entry(normalize_header(&k.into())).or_insert_with(|| v.into());
        }
        RawRecord { cells }
    }
}

/// Parsed input: normalized headers in file order plus the data records.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub records: Vec<RawRecord>,
}

/// Case-folds a header and strips whitespace, `_` and `-`.
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Splits raw text into rows of cells. A final row whose cells are all blank
/// is dropped; blank rows elsewhere are kept so row numbers stay stable.
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let text = text.strip_prefix(BOM).unwrap_or(text);

    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            _ if in_quotes => cell.push(c),
            ',' => row.push(std::mem::take(&mut cell)),
            '\n' => {
                row.push(std::mem::take(&mut cell));
                rows.push(std::mem::take(&mut row));
            }
            '\r' => {}
            _ => cell.push(c),
        }
    }

    if !cell.is_empty() || !row.is_empty() {
        row.push(cell);
        rows.push(row);
    }
    if rows
        .last()
        .is_some_and(|last| last.iter().all(|c| c.trim().is_empty()))
    {
        rows.pop();
    }
    rows
}

/// Parses text into a [`Table`]. Row 0 is the header row. A header-only input
/// yields headers and no records; empty input yields an empty table.
pub fn parse(text: &str) -> Table {
    let mut rows = parse_rows(text).into_iter();
    let Some(header_row) = rows.next() else {
        return Table::default();
    };

    let headers: Vec<String> = header_row.iter().map(|h| normalize_header(h)).collect();

    let records: Vec<RawRecord> = rows
        .map(|row| {
            let mut cells = HashMap::with_capacity(headers.len());
            for (idx, header) in headers.iter().enumerate() {
                if header.is_empty() {
                    continue;
                }
                // First definition of a duplicated header wins.
                cells
                    .entry(header.clone())
                    .or_insert_with(|| row.get(idx).cloned().unwrap_or_default());
            }
            RawRecord { cells }
        })
        .collect();

    debug!(
        headers = headers.len(),
        records = records.len(),
        "Parsed delimited input"
    );
    Table { headers, records }
}

/// Serializes rows with the reader's quoting convention: a cell is quoted when
/// it contains a comma, quote or line break, and embedded quotes are doubled.
pub fn to_delimited<R, C>(rows: R) -> String
where
    R: IntoIterator<Item = C>,
    C: IntoIterator,
    C::Item: AsRef<str>,
{
    let mut out = String::new();
    for row in rows {
        let line: Vec<String> = row.into_iter().map(|c| quote_cell(c.as_ref())).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

fn quote_cell(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
