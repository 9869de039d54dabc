use serde::Serialize;
use std::fmt::Write;
use tracing::{debug, warn};

use crate::intent::mode::{Backend, Mode, QueryIntent};
use crate::parser::text::{find_keyword, is_blank};

/// Prefix of every placeholder emitted instead of a query.
pub const PLACEHOLDER_MARKER: &str = "-- Missing";

/// Why an intent could not be turned into its intended query.
///
/// Neither case is fatal: the composer still returns text the caller can show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompositionError {
    /// Required parameters were absent or blank.
    #[error("missing {} for {}", .parameters.join(" and "), .mode.label())]
    MissingParameter {
        /// Mode whose template could not be filled.
        mode: Mode,
        /// Names of the blank parameters, in template order.
        parameters: Vec<&'static str>,
    },
    /// The backend has no template for the mode; the raw query was passed through.
    #[error("mode '{mode}' is not supported by {backend}; query passed through unchanged")]
    UnsupportedMode {
        /// Requested mode.
        mode: Mode,
        /// Backend that lacks it.
        backend: Backend,
    },
}

/// Query text produced for an intent, plus the diagnostic when it is not the intended query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposedQuery {
    /// Text to execute, or a `-- Missing ...` placeholder.
    pub text: String,
    /// Set when the text is a placeholder or a pass-through.
    pub diagnostic: Option<CompositionError>,
}

impl ComposedQuery {
    fn ready(text: String) -> Self {
        Self {
            text,
            diagnostic: None,
        }
    }

    fn missing(mode: Mode, parameters: Vec<&'static str>) -> Self {
        let text = format!(
            "{PLACEHOLDER_MARKER} {} for {}",
            parameters.join(" and "),
            mode.label()
        );
        debug!(%mode, ?parameters, "placeholder emitted for incomplete intent");
        Self {
            text,
            diagnostic: Some(CompositionError::MissingParameter { mode, parameters }),
        }
    }

    /// True when the text is a placeholder and must not be sent to an engine.
    pub fn is_placeholder(&self) -> bool {
        matches!(
            self.diagnostic,
            Some(CompositionError::MissingParameter { .. })
        )
    }
}

/// Compose the query text for `intent` in `backend`'s dialect.
///
/// A mode the backend lacks passes its raw query through; a blank raw query
/// still yields a placeholder so nothing empty reaches an engine.
pub fn compose(backend: Backend, intent: &QueryIntent) -> ComposedQuery {
    let mode = intent.mode();
    if !mode.supported_by(backend) {
        if is_blank(intent.raw_query()) {
            return ComposedQuery::missing(mode, vec![raw_parameter(intent)]);
        }
        warn!(%mode, %backend, "mode not supported by backend, passing query through");
        return ComposedQuery {
            text: terminate(intent.raw_query()),
            diagnostic: Some(CompositionError::UnsupportedMode { mode, backend }),
        };
    }

    let missing = missing_parameters(intent);
    if !missing.is_empty() {
        return ComposedQuery::missing(mode, missing);
    }

    let text = match intent {
        QueryIntent::Default { query } => terminate(query),
        QueryIntent::Provenance { query } => format!("PROVENANCE OF ({query});"),
        QueryIntent::TimestampProvenance { query, timestamp } => {
            format!("PROVENANCE AS OF TIMESTAMP '{timestamp}' OF ({query});")
        }
        QueryIntent::BaseRelationProvenance {
            main_select,
            subquery,
            base_relation,
        } => format!("PROVENANCE OF ({main_select} ( {subquery} ) BASERELATION AS {base_relation});"),
        QueryIntent::HasProvenance {
            query,
            attributes,
            group_by,
        } => provenance_clause(query, "HAS PROVENANCE", attributes, group_by.as_deref()),
        QueryIntent::UseProvenance {
            query,
            attributes,
            group_by,
        } => provenance_clause(query, "USE PROVENANCE", attributes, group_by.as_deref()),
        QueryIntent::Reenact { query } => format!("REENACT ({query});"),
        QueryIntent::ReenactProvenance { query } => format!("REENACT WITH PROVENANCE ({query});"),
        QueryIntent::ReenactAnnotations { query } => format!(
            "REENACT WITH PROVENANCE ONLY UPDATED SHOW INTERMEDIATE STATEMENT ANNOTATIONS ({query});"
        ),
        QueryIntent::AddProvenance { query } => format!("SELECT add_provenance({query});"),
        QueryIntent::CreateProvenanceMapping { query } => {
            format!("SELECT create_provenance_mapping({query});")
        }
        QueryIntent::Semirings { table, subquery } => {
            format!("SELECT *, SR_FORMULA(PROVENANCE(), {table}) FROM ({subquery}) t;")
        }
        QueryIntent::WhereProvenance { subquery } => {
            format!("SELECT *, where_provenance(provenance()) FROM ({subquery}) t;")
        }
        QueryIntent::Probability { method, subquery } => {
            format!("SELECT *, probability_evaluate(provenance(), {method}) FROM ({subquery}) t;")
        }
    };

    ComposedQuery::ready(text)
}

/// Append `VIEW_CIRCUIT(uuid, table)` to a composed semirings query.
///
/// A placeholder is returned only when both the UUID and the table are blank.
pub fn compose_view_circuit(semirings: &ComposedQuery, uuid: &str, table: &str) -> ComposedQuery {
    if semirings.is_placeholder() {
        return semirings.clone();
    }
    if is_blank(uuid) && is_blank(table) {
        return ComposedQuery {
            text: format!("{PLACEHOLDER_MARKER} UUID or table for VIEW_CIRCUIT"),
            diagnostic: Some(CompositionError::MissingParameter {
                mode: Mode::Semirings,
                parameters: vec!["view uuid", "view table"],
            }),
        };
    }
    ComposedQuery::ready(format!(
        "{} SELECT VIEW_CIRCUIT({uuid}, {table});",
        semirings.text
    ))
}

fn missing_parameters(intent: &QueryIntent) -> Vec<&'static str> {
    let required: Vec<(&'static str, &str)> = match intent {
        QueryIntent::Default { .. } => Vec::new(),
        QueryIntent::Provenance { query }
        | QueryIntent::Reenact { query }
        | QueryIntent::ReenactProvenance { query }
        | QueryIntent::ReenactAnnotations { query }
        | QueryIntent::AddProvenance { query }
        | QueryIntent::CreateProvenanceMapping { query } => vec![("query", query)],
        QueryIntent::TimestampProvenance { query, timestamp } => {
            vec![("query", query), ("timestamp", timestamp)]
        }
        QueryIntent::BaseRelationProvenance {
            main_select,
            subquery,
            base_relation,
        } => vec![
            ("main select", main_select),
            ("subquery", subquery),
            ("base relation", base_relation),
        ],
        QueryIntent::HasProvenance {
            query, attributes, ..
        }
        | QueryIntent::UseProvenance {
            query, attributes, ..
        } => vec![("query", query), ("attributes", attributes)],
        QueryIntent::Semirings { table, subquery } => {
            vec![("table", table), ("subquery", subquery)]
        }
        QueryIntent::WhereProvenance { subquery } => vec![("subquery", subquery)],
        QueryIntent::Probability { method, subquery } => {
            vec![("method", method), ("subquery", subquery)]
        }
    };

    required
        .into_iter()
        .filter(|(_, value)| is_blank(value))
        .map(|(name, _)| name)
        .collect()
}

/// Name of the field [`QueryIntent::raw_query`] reads.
fn raw_parameter(intent: &QueryIntent) -> &'static str {
    match intent {
        QueryIntent::BaseRelationProvenance { .. }
        | QueryIntent::Semirings { .. }
        | QueryIntent::WhereProvenance { .. }
        | QueryIntent::Probability { .. } => "subquery",
        _ => "query",
    }
}

/// Pass a query through, making sure it ends with exactly one `;`.
fn terminate(query: &str) -> String {
    let body = query.trim_end().trim_end_matches(';').trim_end();
    format!("{body};")
}

fn provenance_clause(
    query: &str,
    keyword: &str,
    attributes: &str,
    group_by: Option<&str>,
) -> String {
    let mut text = match find_keyword(query, "FROM") {
        Some(idx) => {
            let (before, after) = query.split_at(idx + "FROM".len());
            format!(
                "PROVENANCE OF ({before} {} {keyword} ({attributes})",
                after.trim()
            )
        }
        None => format!("PROVENANCE OF ({query} {keyword} ({attributes})"),
    };
    if let Some(group_by) = group_by.filter(|g| !is_blank(g)) {
        write!(text, " GROUP BY {group_by}").unwrap();
    }
    text.push_str(");");
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has(query: &str, attributes: &str, group_by: Option<&str>) -> QueryIntent {
        QueryIntent::HasProvenance {
            query: query.to_string(),
            attributes: attributes.to_string(),
            group_by: group_by.map(str::to_string),
        }
    }

    #[test]
    fn default_appends_a_single_terminator() {
        let q = |s: &str| QueryIntent::Default {
            query: s.to_string(),
        };
        assert_eq!(compose(Backend::Gprom, &q("SELECT 1")).text, "SELECT 1;");
        assert_eq!(compose(Backend::Gprom, &q("SELECT 1;;  ")).text, "SELECT 1;");
        assert_eq!(compose(Backend::ProvSql, &q("")).text, ";");
    }

    #[test]
    fn has_provenance_splits_after_from_case_insensitively() {
        let composed = compose(Backend::Gprom, &has("select a from   r", "p", None));
        assert_eq!(
            composed.text,
            "PROVENANCE OF (select a from r HAS PROVENANCE (p));"
        );
    }

    #[test]
    fn has_provenance_wraps_whole_query_without_from() {
        let composed = compose(Backend::Gprom, &has("VALUES (1)", "p", Some("a")));
        assert_eq!(
            composed.text,
            "PROVENANCE OF (VALUES (1) HAS PROVENANCE (p) GROUP BY a);"
        );
    }

    #[test]
    fn blank_group_by_is_ignored() {
        let composed = compose(Backend::Gprom, &has("SELECT a FROM r", "p", Some("  ")));
        assert!(!composed.text.contains("GROUP BY"));
    }

    #[test]
    fn use_provenance_keeps_group_by_after_split() {
        let intent = QueryIntent::UseProvenance {
            query: "SELECT a, count(*) FROM r".to_string(),
            attributes: "prov_r".to_string(),
            group_by: Some("a".to_string()),
        };
        assert_eq!(
            compose(Backend::Gprom, &intent).text,
            "PROVENANCE OF (SELECT a, count(*) FROM r USE PROVENANCE (prov_r) GROUP BY a);"
        );
    }

    #[test]
    fn missing_parameters_are_named_in_placeholder() {
        let intent = QueryIntent::Probability {
            method: String::new(),
            subquery: "  ".to_string(),
        };
        let composed = compose(Backend::ProvSql, &intent);
        assert_eq!(
            composed.text,
            "-- Missing method and subquery for PROBABILITY"
        );
        assert!(composed.is_placeholder());
        assert_eq!(
            composed.diagnostic,
            Some(CompositionError::MissingParameter {
                mode: Mode::Probability,
                parameters: vec!["method", "subquery"],
            })
        );
    }

    #[test]
    fn unsupported_mode_passes_query_through_with_diagnostic() {
        let intent = QueryIntent::WhereProvenance {
            subquery: "SELECT * FROM r".to_string(),
        };
        let composed = compose(Backend::Gprom, &intent);
        assert_eq!(composed.text, "SELECT * FROM r;");
        assert!(!composed.is_placeholder());
        assert!(matches!(
            composed.diagnostic,
            Some(CompositionError::UnsupportedMode { .. })
        ));
    }

    #[test]
    fn blank_pass_through_is_a_placeholder() {
        let intent = QueryIntent::WhereProvenance {
            subquery: "  ".to_string(),
        };
        let composed = compose(Backend::Gprom, &intent);
        assert_eq!(composed.text, "-- Missing subquery for WHERE_PROVENANCE");
        assert!(composed.is_placeholder());

        let intent = QueryIntent::Reenact {
            query: String::new(),
        };
        let composed = compose(Backend::ProvSql, &intent);
        assert!(composed.text.starts_with(PLACEHOLDER_MARKER));
        assert!(composed.text.contains("query"));
    }

    #[test]
    fn view_circuit_appends_to_semirings_query() {
        let semirings = compose(
            Backend::ProvSql,
            &QueryIntent::Semirings {
                table: "personnel_name".to_string(),
                subquery: "SELECT city FROM personnel".to_string(),
            },
        );
        let circuit = compose_view_circuit(&semirings, "'abc'", "'personnel_name'");
        assert_eq!(
            circuit.text,
            "SELECT *, SR_FORMULA(PROVENANCE(), personnel_name) FROM (SELECT city FROM personnel) t; SELECT VIEW_CIRCUIT('abc', 'personnel_name');"
        );

        let missing = compose_view_circuit(&semirings, "", " ");
        assert!(missing.is_placeholder());
        assert!(missing.text.starts_with(PLACEHOLDER_MARKER));
    }
}
