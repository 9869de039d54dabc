use std::borrow::Cow;
use std::io::Read;

use serde::Serialize;
use tracing::debug;

/// The semiring "plus" operator `ProvSQL` uses between alternative derivations.
pub const COMBINE_GLYPH: &str = "⊕";

/// Known mis-encodings of [`COMBINE_GLYPH`] and their repair.
///
/// `âŠ•` is the UTF-8 bytes of `⊕` decoded as Windows-1252, as produced when an
/// exported CSV passes through a spreadsheet. Other corruptions are not
/// detected and leave the formula unsplit.
pub const KNOWN_CORRUPTIONS: &[(&str, &str)] = &[("\u{e2}\u{160}\u{2022}", COMBINE_GLYPH)];

/// Column of the exported CSV holding the derived tuple's position.
pub const POSITION_COLUMN: &str = "position";
/// Column of the exported CSV holding the semiring formula.
pub const FORMULA_COLUMN: &str = "sr_formula";

/// Errors reading an exported formula CSV.
#[derive(Debug, thiserror::Error)]
pub enum FormulaCsvError {
    /// The CSV could not be read or decoded.
    #[error("failed to read formula CSV: {0}")]
    Csv(#[from] csv::Error),
    /// A required header is absent.
    #[error("formula CSV has no '{0}' column")]
    MissingColumn(&'static str),
}

/// One derived tuple and the tuples combined to produce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvenanceRecord {
    /// Position identifier of the derived tuple.
    pub position: String,
    /// Contributor identifiers, in formula order.
    pub contributors: Vec<String>,
}

/// Position → contributors mapping that keeps first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProvenanceRecords {
    records: Vec<ProvenanceRecord>,
}

impl ProvenanceRecords {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record; a repeated position replaces the earlier contributors in place.
    pub fn insert(&mut self, position: impl Into<String>, contributors: Vec<String>) {
        let position = position.into();
        match self.records.iter_mut().find(|r| r.position == position) {
            Some(existing) => existing.contributors = contributors,
            None => self.records.push(ProvenanceRecord {
                position,
                contributors,
            }),
        }
    }

    /// Contributors recorded for `position`.
    pub fn get(&self, position: &str) -> Option<&[String]> {
        self.records
            .iter()
            .find(|r| r.position == position)
            .map(|r| r.contributors.as_slice())
    }

    /// Records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ProvenanceRecord> {
        self.records.iter()
    }

    /// Number of distinct positions.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no record was inserted.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<P: Into<String>> FromIterator<(P, Vec<String>)> for ProvenanceRecords {
    fn from_iter<I: IntoIterator<Item = (P, Vec<String>)>>(iter: I) -> Self {
        let mut records = Self::new();
        for (position, contributors) in iter {
            records.insert(position, contributors);
        }
        records
    }
}

/// Replace every known corruption of the combine glyph with the glyph itself.
pub fn repair_glyphs(text: &str) -> Cow<'_, str> {
    let mut repaired = Cow::Borrowed(text);
    for (corrupted, canonical) in KNOWN_CORRUPTIONS {
        if repaired.contains(corrupted) {
            repaired = Cow::Owned(repaired.replace(corrupted, canonical));
        }
    }
    repaired
}

/// Split a semiring formula such as `(t1 ⊕ t2)` into its contributors.
///
/// Parentheses are dropped, so nested formulas flatten into one list.
pub fn parse_formula(text: &str) -> Vec<String> {
    let repaired = repair_glyphs(text);
    let flat: String = repaired.chars().filter(|c| !matches!(c, '(' | ')')).collect();
    flat.split(COMBINE_GLYPH)
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read an exported `position,sr_formula` CSV into provenance records.
///
/// A leading byte-order mark and extra columns are tolerated.
pub fn read_formula_csv<R: Read>(reader: R) -> Result<ProvenanceRecords, FormulaCsvError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = reader.headers()?.clone();
    let column = |name: &'static str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
            .ok_or(FormulaCsvError::MissingColumn(name))
    };
    let position_idx = column(POSITION_COLUMN)?;
    let formula_idx = column(FORMULA_COLUMN)?;

    let mut records = ProvenanceRecords::new();
    for record in reader.records() {
        let record = record?;
        let Some(position) = record.get(position_idx) else {
            continue;
        };
        let formula = record.get(formula_idx).unwrap_or("");
        records.insert(position.trim(), parse_formula(formula));
    }
    debug!(records = records.len(), "read provenance formulas");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_combine_glyph_and_strips_parentheses() {
        assert_eq!(parse_formula("(t1 ⊕ t2)"), vec!["t1", "t2"]);
        assert_eq!(parse_formula("((a ⊕ b) ⊕ c)"), vec!["a", "b", "c"]);
        assert_eq!(parse_formula("t7"), vec!["t7"]);
    }

    #[test]
    fn known_corruption_is_repaired() {
        assert_eq!(parse_formula("(t1 âŠ• t2)"), vec!["t1", "t2"]);
        assert_eq!(repair_glyphs("x âŠ• y"), "x ⊕ y");
    }

    #[test]
    fn unknown_corruption_under_parses() {
        // cp437 rendering of the same bytes is not in the table.
        assert_eq!(parse_formula("(t1 Γèò t2)"), vec!["t1 Γèò t2"]);
    }

    #[test]
    fn empty_pieces_are_dropped() {
        assert!(parse_formula("()").is_empty());
        assert_eq!(parse_formula("⊕ a ⊕⊕ b ⊕"), vec!["a", "b"]);
    }

    #[test]
    fn repeated_positions_replace_in_place() {
        let mut records = ProvenanceRecords::new();
        records.insert("o1", vec!["a".to_string()]);
        records.insert("o2", vec!["b".to_string()]);
        records.insert("o1", vec!["c".to_string()]);
        let order: Vec<&str> = records.iter().map(|r| r.position.as_str()).collect();
        assert_eq!(order, vec!["o1", "o2"]);
        assert_eq!(records.get("o1"), Some(&["c".to_string()][..]));
    }

    #[test]
    fn reads_formula_csv_with_bom_and_quotes() {
        let csv = "\u{feff}city,position,sr_formula\nParis,1,\"(t1 ⊕ t2)\"\nLyon,2,t3\n";
        let records = read_formula_csv(csv.as_bytes()).expect("CSV should parse");
        assert_eq!(records.len(), 2);
        assert_eq!(
            records.get("1"),
            Some(&["t1".to_string(), "t2".to_string()][..])
        );
        assert_eq!(records.get("2"), Some(&["t3".to_string()][..]));
    }

    #[test]
    fn missing_formula_column_is_reported() {
        let err = read_formula_csv("position,other\n1,x\n".as_bytes())
            .expect_err("missing column should fail");
        assert!(matches!(err, FormulaCsvError::MissingColumn("sr_formula")));
    }
}
