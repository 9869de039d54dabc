use proptest::prelude::*;

use provscope::generator::chart::summarize;
use provscope::parser::table::{parse_csv_like, parse_output, parse_table, render_table, ParsedTable};

mod support;

use support::{cells, read_fixture};

#[test]
fn psql_output_with_footer_and_trailing_spaces() {
    let table = parse_table(&read_fixture("provsql_probability.txt"));
    assert_eq!(table.columns, cells(&["id", "name", "probability_evaluate"]));
    assert_eq!(
        table.rows,
        vec![
            cells(&["1", "Alice", "0.5"]),
            cells(&["2", "Bob", "0.25"]),
            cells(&["3", "Alice", "1"]),
        ]
    );
}

#[test]
fn gprom_trailing_delimiter_column_is_dropped() {
    let table = parse_table(&read_fixture("gprom_provenance.txt"));
    assert_eq!(table.columns, cells(&["NAME", "PROV_R_NAME", "PROV_R_AGE"]));
    assert_eq!(table.rows.len(), 3);
    assert!(table.rows.iter().all(|row| row.len() == 3));
    assert_eq!(table.rows[2], cells(&["Alice", "Alice", "41"]));

    let histogram = summarize(&table.rows);
    assert_eq!(histogram.labels(), vec!["Alice", "Bob"]);
    assert_eq!(histogram.counts(), vec![2, 1]);
}

#[test]
fn csv_output_is_read_through_the_fallback() {
    let raw = read_fixture("provsql_csv_output.txt");
    assert!(parse_table(&raw).is_empty());

    let table = parse_output(&raw);
    assert_eq!(table, parse_csv_like(&raw));
    assert_eq!(table.columns, cells(&["id", "name", "note"]));
    assert_eq!(table.rows[0], cells(&["1", "Alice", "likes tea, coffee"]));
}

#[test]
fn error_text_yields_no_table_rows() {
    let table = parse_table(&read_fixture("provsql_error.txt"));
    assert!(table.is_empty());
    assert!(!table.has_data());
}

#[test]
fn single_column_and_blank_last_column_render_back() {
    let single = ParsedTable {
        columns: cells(&["name"]),
        rows: vec![cells(&["Alice"]), cells(&["Bob"])],
    };
    assert_eq!(parse_table(&render_table(&single)), single);

    let blank_last = ParsedTable {
        columns: cells(&["a", "b"]),
        rows: vec![cells(&["1", ""]), cells(&["2", ""])],
    };
    assert_eq!(parse_table(&render_table(&blank_last)), blank_last);
}

#[test]
fn every_row_matches_header_width() {
    let raw = " a | b | c\n---+---+---\n 1 | 2\n 3 | 4 | 5 | 6\n";
    let table = parse_table(raw);
    let width = table.columns.len();
    assert_eq!(width, 4);
    assert!(table.rows.iter().all(|row| row.len() == width));
    assert_eq!(table.rows[0], cells(&["1", "2", "", ""]));
}

fn cell() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9]{0,8}").unwrap()
}

fn table_strategy() -> impl Strategy<Value = ParsedTable> {
    (1usize..=5).prop_flat_map(|width| {
        let row = prop::collection::vec(cell(), width)
            .prop_filter("psql output never has an all-blank row", |row| {
                row.iter().any(|cell| !cell.is_empty())
            });
        (
            prop::collection::vec(cell(), width),
            prop::collection::vec(row, 1..6),
        )
            .prop_map(|(columns, rows)| ParsedTable { columns, rows })
    })
}

proptest! {
    #[test]
    fn rendered_tables_parse_back_unchanged(table in table_strategy()) {
        let rendered = render_table(&table);
        prop_assert_eq!(parse_table(&rendered), table);
    }

    #[test]
    fn histogram_counts_add_up_to_row_count(table in table_strategy()) {
        let histogram = summarize(&table.rows);
        prop_assert_eq!(histogram.counts().iter().sum::<usize>(), table.rows.len());
    }
}
