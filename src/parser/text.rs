/// True when the text is empty or only whitespace.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Collapse multi-line SQL into one line.
///
/// Each line is trimmed and the non-empty lines are joined by single spaces;
/// whitespace inside a line is left as typed.
pub fn normalize_sql(sql: &str) -> String {
    sql.trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Byte offset of the first ASCII case-insensitive occurrence of `keyword`.
///
/// This is a substring search: `FROM` also matches inside `fromage`.
pub fn find_keyword(text: &str, keyword: &str) -> Option<usize> {
    text.to_ascii_uppercase()
        .find(&keyword.to_ascii_uppercase())
}

/// True when `text` contains `needle`, ignoring case.
pub fn contains_ignore_case(text: &str, needle: &str) -> bool {
    text.to_lowercase().contains(&needle.to_lowercase())
}
