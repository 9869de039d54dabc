use serde::{Deserialize, Serialize};
use std::fmt;

/// Provenance engine a query is composed for and executed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// GProM, driven through its command-line client.
    Gprom,
    /// `ProvSQL`, a `PostgreSQL` extension reached through `psql` inside a container.
    ProvSql,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Gprom => write!(f, "gprom"),
            Backend::ProvSql => write!(f, "provsql"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gprom" => Ok(Backend::Gprom),
            "provsql" => Ok(Backend::ProvSql),
            _ => Err(format!("Invalid engine: {s}")),
        }
    }
}

/// Provenance question kinds, without their parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Run the query as written.
    Default,
    /// `PROVENANCE OF (...)`.
    Provenance,
    /// `PROVENANCE AS OF TIMESTAMP ...`.
    #[serde(rename = "timestamp")]
    TimestampProvenance,
    /// Provenance with a subquery treated as a base relation.
    #[serde(rename = "base-relation")]
    BaseRelationProvenance,
    /// `HAS PROVENANCE (...)` on the FROM clause.
    HasProvenance,
    /// `USE PROVENANCE (...)` on the FROM clause.
    UseProvenance,
    /// Reenact a transaction history.
    Reenact,
    /// Reenact with provenance capture.
    ReenactProvenance,
    /// Reenact with provenance and per-statement annotations.
    ReenactAnnotations,
    /// `ProvSQL` `add_provenance` on a table.
    AddProvenance,
    /// `ProvSQL` `create_provenance_mapping`.
    CreateProvenanceMapping,
    /// `ProvSQL` semiring formula evaluation.
    Semirings,
    /// `ProvSQL` where-provenance.
    WhereProvenance,
    /// `ProvSQL` probability evaluation.
    Probability,
}

impl Mode {
    /// Every mode, in presentation order.
    pub const ALL: [Mode; 14] = [
        Mode::Default,
        Mode::Provenance,
        Mode::TimestampProvenance,
        Mode::BaseRelationProvenance,
        Mode::HasProvenance,
        Mode::UseProvenance,
        Mode::Reenact,
        Mode::ReenactProvenance,
        Mode::ReenactAnnotations,
        Mode::AddProvenance,
        Mode::CreateProvenanceMapping,
        Mode::Semirings,
        Mode::WhereProvenance,
        Mode::Probability,
    ];

    /// Stable kebab-case name used on the command line and in JSON.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Default => "default",
            Mode::Provenance => "provenance",
            Mode::TimestampProvenance => "timestamp",
            Mode::BaseRelationProvenance => "base-relation",
            Mode::HasProvenance => "has-provenance",
            Mode::UseProvenance => "use-provenance",
            Mode::Reenact => "reenact",
            Mode::ReenactProvenance => "reenact-provenance",
            Mode::ReenactAnnotations => "reenact-annotations",
            Mode::AddProvenance => "add-provenance",
            Mode::CreateProvenanceMapping => "create-provenance-mapping",
            Mode::Semirings => "semirings",
            Mode::WhereProvenance => "where-provenance",
            Mode::Probability => "probability",
        }
    }

    /// Upper-case label used in placeholder diagnostics.
    pub fn label(self) -> &'static str {
        match self {
            Mode::Default => "DEFAULT",
            Mode::Provenance => "PROVENANCE",
            Mode::TimestampProvenance => "TIMESTAMP PROVENANCE",
            Mode::BaseRelationProvenance => "BASERELATION",
            Mode::HasProvenance => "HAS PROVENANCE",
            Mode::UseProvenance => "USE PROVENANCE",
            Mode::Reenact => "REENACT",
            Mode::ReenactProvenance => "REENACT WITH PROVENANCE",
            Mode::ReenactAnnotations => "REENACT ANNOTATIONS",
            Mode::AddProvenance => "ADD_PROVENANCE",
            Mode::CreateProvenanceMapping => "CREATE_PROVENANCE_MAPPING",
            Mode::Semirings => "SEMIRINGS",
            Mode::WhereProvenance => "WHERE_PROVENANCE",
            Mode::Probability => "PROBABILITY",
        }
    }

    /// True when `backend` has a template for this mode.
    pub fn supported_by(self, backend: Backend) -> bool {
        match self {
            Mode::Default => true,
            Mode::Provenance
            | Mode::TimestampProvenance
            | Mode::BaseRelationProvenance
            | Mode::HasProvenance
            | Mode::UseProvenance
            | Mode::Reenact
            | Mode::ReenactProvenance
            | Mode::ReenactAnnotations => backend == Backend::Gprom,
            Mode::AddProvenance
            | Mode::CreateProvenanceMapping
            | Mode::Semirings
            | Mode::WhereProvenance
            | Mode::Probability => backend == Backend::ProvSql,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Mode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == wanted)
            .ok_or_else(|| format!("Invalid mode: {s}"))
    }
}

/// A provenance question together with the parameters its template needs.
///
/// Parameters are opaque text; nothing here parses SQL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum QueryIntent {
    /// Pass the query through unchanged.
    Default {
        /// Raw query text.
        query: String,
    },
    /// Provenance of a query.
    Provenance {
        /// Raw query text.
        query: String,
    },
    /// Provenance of a query as of a past timestamp.
    #[serde(rename = "timestamp")]
    TimestampProvenance {
        /// Raw query text.
        query: String,
        /// Timestamp literal, substituted inside single quotes.
        timestamp: String,
    },
    /// Provenance where a subquery is treated as a base relation.
    #[serde(rename = "base-relation")]
    BaseRelationProvenance {
        /// Outer SELECT preceding the subquery.
        main_select: String,
        /// Subquery wrapped as a base relation.
        subquery: String,
        /// Alias of the base relation.
        base_relation: String,
    },
    /// Provenance restricted to inputs that carry provenance attributes.
    HasProvenance {
        /// Raw query text.
        query: String,
        /// Provenance attribute list.
        attributes: String,
        /// Optional GROUP BY attribute list.
        #[serde(default)]
        group_by: Option<String>,
    },
    /// Provenance reusing stored provenance attributes.
    UseProvenance {
        /// Raw query text.
        query: String,
        /// Provenance attribute list.
        attributes: String,
        /// Optional GROUP BY attribute list.
        #[serde(default)]
        group_by: Option<String>,
    },
    /// Reenact a transaction.
    Reenact {
        /// Statements to reenact.
        query: String,
    },
    /// Reenact a transaction with provenance.
    ReenactProvenance {
        /// Statements to reenact.
        query: String,
    },
    /// Reenact with provenance, showing per-statement annotations.
    ReenactAnnotations {
        /// Statements to reenact.
        query: String,
    },
    /// Enable provenance tracking on a table.
    AddProvenance {
        /// Argument list for `add_provenance`, usually a quoted table name.
        query: String,
    },
    /// Create a provenance mapping.
    CreateProvenanceMapping {
        /// Argument list for `create_provenance_mapping`.
        query: String,
    },
    /// Evaluate a semiring formula over a subquery's provenance.
    Semirings {
        /// Mapping table used by `SR_FORMULA`.
        table: String,
        /// Subquery whose provenance is evaluated.
        subquery: String,
    },
    /// Where-provenance over a subquery.
    WhereProvenance {
        /// Subquery whose provenance is evaluated.
        subquery: String,
    },
    /// Probability of each result tuple of a subquery.
    Probability {
        /// Evaluation method passed to `probability_evaluate`.
        method: String,
        /// Subquery whose provenance is evaluated.
        subquery: String,
    },
}

impl QueryIntent {
    /// The mode of this intent.
    pub fn mode(&self) -> Mode {
        match self {
            QueryIntent::Default { .. } => Mode::Default,
            QueryIntent::Provenance { .. } => Mode::Provenance,
            QueryIntent::TimestampProvenance { .. } => Mode::TimestampProvenance,
            QueryIntent::BaseRelationProvenance { .. } => Mode::BaseRelationProvenance,
            QueryIntent::HasProvenance { .. } => Mode::HasProvenance,
            QueryIntent::UseProvenance { .. } => Mode::UseProvenance,
            QueryIntent::Reenact { .. } => Mode::Reenact,
            QueryIntent::ReenactProvenance { .. } => Mode::ReenactProvenance,
            QueryIntent::ReenactAnnotations { .. } => Mode::ReenactAnnotations,
            QueryIntent::AddProvenance { .. } => Mode::AddProvenance,
            QueryIntent::CreateProvenanceMapping { .. } => Mode::CreateProvenanceMapping,
            QueryIntent::Semirings { .. } => Mode::Semirings,
            QueryIntent::WhereProvenance { .. } => Mode::WhereProvenance,
            QueryIntent::Probability { .. } => Mode::Probability,
        }
    }

    /// The text passed through when the mode cannot be applied.
    ///
    /// Modes without a plain query (semirings, where-provenance, probability,
    /// base-relation) fall back to their subquery.
    pub fn raw_query(&self) -> &str {
        match self {
            QueryIntent::Default { query }
            | QueryIntent::Provenance { query }
            | QueryIntent::TimestampProvenance { query, .. }
            | QueryIntent::HasProvenance { query, .. }
            | QueryIntent::UseProvenance { query, .. }
            | QueryIntent::Reenact { query }
            | QueryIntent::ReenactProvenance { query }
            | QueryIntent::ReenactAnnotations { query }
            | QueryIntent::AddProvenance { query }
            | QueryIntent::CreateProvenanceMapping { query } => query,
            QueryIntent::BaseRelationProvenance { subquery, .. }
            | QueryIntent::Semirings { subquery, .. }
            | QueryIntent::WhereProvenance { subquery }
            | QueryIntent::Probability { subquery, .. } => subquery,
        }
    }
}

/// A backend paired with the intent to run on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRequest {
    /// Engine the intent targets.
    pub backend: Backend,
    /// The question and its parameters.
    pub intent: QueryIntent,
}
