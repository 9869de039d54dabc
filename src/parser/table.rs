use std::fmt::Write;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A `---+---` rule between a psql header and its data.
static SEPARATOR_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*-+\s*(\+-+\s*)*$").expect("separator pattern is a valid regex")
});

/// Column names and rows recovered from engine output.
///
/// After parsing, every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTable {
    /// Header cells, in order. Names may repeat.
    pub columns: Vec<String>,
    /// Data rows, one cell per column.
    pub rows: Vec<Vec<String>>,
}

impl ParsedTable {
    /// True when nothing was recovered: no columns and no rows.
    ///
    /// An empty table is a valid outcome; callers show the raw text instead.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }

    /// True when the table has both a header and at least one row.
    pub fn has_data(&self) -> bool {
        !self.columns.is_empty() && !self.rows.is_empty()
    }
}

/// True when `line` is a psql separator such as `----+-----`.
pub fn is_separator_line(line: &str) -> bool {
    SEPARATOR_LINE.is_match(line)
}

/// Parse psql-style aligned output into a table.
///
/// The header is the line right before the first separator line, and the
/// rows are the later `|`-bearing lines. Without a separator, the first
/// `|`-bearing line is the header. A trailing column that is empty in every
/// row is a delimiter artifact and is dropped. Returns an empty table when
/// nothing tabular is found.
pub fn parse_table(raw: &str) -> ParsedTable {
    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect();

    let mut columns = Vec::new();
    let mut rows = Vec::new();

    match lines.iter().position(|line| is_separator_line(line)) {
        Some(separator) if separator > 0 => {
            columns = split_cells(lines[separator - 1]);
            for line in &lines[separator + 1..] {
                if !line.contains('|') || is_separator_line(line) {
                    continue;
                }
                let row = split_cells(line);
                if row.iter().any(|cell| !cell.is_empty()) {
                    rows.push(row);
                }
            }
        }
        _ => {
            let mut candidates = lines.iter().filter(|line| line.contains('|'));
            if let Some(header) = candidates.next() {
                columns = split_cells(header);
                rows.extend(candidates.map(|line| split_cells(line)));
            }
        }
    }

    let trailing_artifact = !rows.is_empty()
        && rows
            .iter()
            .all(|row| row.len() == columns.len() && row.last().is_some_and(String::is_empty));
    if trailing_artifact {
        columns.pop();
        for row in &mut rows {
            row.pop();
        }
    }

    let mut table = ParsedTable { columns, rows };
    align_rows(&mut table);
    debug!(
        columns = table.columns.len(),
        rows = table.rows.len(),
        "parsed aligned table"
    );
    table
}

/// Parse comma-separated output: the first record is the header.
///
/// Standard CSV quoting applies and records may have differing lengths.
pub fn parse_csv_like(raw: &str) -> ParsedTable {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(raw.as_bytes());

    let mut records = Vec::new();
    for record in reader.records() {
        match record {
            Ok(record) => records.push(record.iter().map(str::to_string).collect::<Vec<_>>()),
            Err(e) => {
                warn!(error = %e, "stopping CSV parse at malformed record");
                break;
            }
        }
    }

    let mut records = records.into_iter();
    let Some(columns) = records.next() else {
        return ParsedTable::default();
    };
    let mut table = ParsedTable {
        columns,
        rows: records.collect(),
    };
    align_rows(&mut table);
    table
}

/// Parse engine output, falling back to CSV when the aligned parser finds nothing.
pub fn parse_output(raw: &str) -> ParsedTable {
    let table = parse_table(raw);
    if !table.is_empty() {
        return table;
    }
    debug!("no aligned table found, trying CSV");
    parse_csv_like(raw)
}

/// Render a table in psql's aligned format, followed by a row-count footer.
///
/// [`parse_table`] reads the result back unchanged when no cell contains `|`,
/// a line break, or surrounding spaces, and no row is entirely empty. When the
/// rows would otherwise lose their last column on re-parse (a single column,
/// or a last column empty in every row) each line gets a trailing `|` column
/// that the parser drops as a delimiter artifact.
pub fn render_table(table: &ParsedTable) -> String {
    let mut widths: Vec<usize> = table.columns.iter().map(|c| c.chars().count()).collect();
    for row in &table.rows {
        for (idx, cell) in row.iter().enumerate() {
            let width = cell.chars().count();
            match widths.get_mut(idx) {
                Some(current) => *current = (*current).max(width),
                None => widths.push(width),
            }
        }
    }

    let trailer = !table.rows.is_empty()
        && match widths.len() {
            0 => false,
            1 => true,
            n => table
                .rows
                .iter()
                .all(|row| row.get(n - 1).map_or(true, String::is_empty)),
        };
    let end = if trailer { " |" } else { "" };

    let mut out = String::new();
    writeln!(out, "{}{end}", render_line(&table.columns, &widths)).unwrap();
    let mut rule: Vec<String> = widths.iter().map(|w| "-".repeat(w + 2)).collect();
    if trailer {
        rule.push("--".to_string());
    }
    writeln!(out, "{}", rule.join("+")).unwrap();
    for row in &table.rows {
        writeln!(out, "{}{end}", render_line(row, &widths)).unwrap();
    }
    match table.rows.len() {
        1 => writeln!(out, "(1 row)").unwrap(),
        n => writeln!(out, "({n} rows)").unwrap(),
    }
    out
}

fn render_line(cells: &[String], widths: &[usize]) -> String {
    let padded: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(idx, width)| {
            let cell = cells.get(idx).map(String::as_str).unwrap_or("");
            format!(" {cell:<width$} ")
        })
        .collect();
    padded.join("|").trim_end().to_string()
}

fn split_cells(line: &str) -> Vec<String> {
    line.split('|').map(|cell| cell.trim().to_string()).collect()
}

/// Pad short rows with empty cells; widen the header with unnamed columns for long rows.
fn align_rows(table: &mut ParsedTable) {
    let width = table
        .rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(table.columns.len()))
        .max()
        .unwrap_or(0);
    if table.columns.is_empty() && table.rows.is_empty() {
        return;
    }
    table.columns.resize(width, String::new());
    for row in &mut table.rows {
        row.resize(width, String::new());
    }
}
