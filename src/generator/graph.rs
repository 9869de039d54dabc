use std::collections::HashSet;

use serde::Serialize;

use crate::parser::formula::ProvenanceRecords;

/// Prefix of synthesized combinator node ids; the derived tuple id follows.
pub const COMBINATOR_PREFIX: &str = "plus_";

/// Role of a node in a provenance graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// An input tuple named in some formula.
    SourceTuple,
    /// A result tuple whose formula was parsed.
    DerivedTuple,
    /// Synthesized ⊕ node joining several contributors.
    Combinator,
}

/// A graph node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    /// Unique node id.
    pub id: String,
    /// Node role.
    pub kind: NodeKind,
}

/// A directed edge from a contributor towards what it derives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    /// Source node id.
    pub from: String,
    /// Target node id.
    pub to: String,
}

/// Provenance DAG: sources feed derived tuples, directly or through a combinator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvenanceGraph {
    /// Nodes: sources first (first-seen order), then derived tuples, then combinators.
    pub nodes: Vec<Node>,
    /// Edges in construction order.
    pub edges: Vec<Edge>,
}

impl ProvenanceGraph {
    /// Nodes with the given role.
    pub fn nodes_of(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |node| node.kind == kind)
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// True when the graph has an edge `from -> to`.
    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edges.iter().any(|e| e.from == from && e.to == to)
    }

    /// Edges ending at `id`.
    pub fn inbound(&self, id: &str) -> impl Iterator<Item = &Edge> + '_ {
        let id = id.to_string();
        self.edges.iter().filter(move |edge| edge.to == id)
    }
}

/// Id of the combinator node for a derived tuple.
pub fn combinator_id(derived: &str) -> String {
    format!("{COMBINATOR_PREFIX}{derived}")
}

/// Build the provenance graph for parsed records.
///
/// A record with one contributor gets a direct edge; with several, every
/// contributor feeds one combinator that feeds the derived tuple; with none,
/// the derived tuple has no inbound edge. An id that is both a contributor and
/// a derived tuple appears once, as a derived tuple. A combinator id already
/// taken by a tuple gets `_` appended until it is unique.
pub fn build(records: &ProvenanceRecords) -> ProvenanceGraph {
    let derived: HashSet<&str> = records.iter().map(|r| r.position.as_str()).collect();
    let mut graph = ProvenanceGraph::default();
    let mut taken: HashSet<String> = records
        .iter()
        .flat_map(|r| std::iter::once(&r.position).chain(&r.contributors))
        .cloned()
        .collect();

    let mut seen_sources = HashSet::new();
    for record in records.iter() {
        for contributor in &record.contributors {
            if derived.contains(contributor.as_str()) || !seen_sources.insert(contributor.as_str())
            {
                continue;
            }
            graph.nodes.push(Node {
                id: contributor.clone(),
                kind: NodeKind::SourceTuple,
            });
        }
    }

    for record in records.iter() {
        graph.nodes.push(Node {
            id: record.position.clone(),
            kind: NodeKind::DerivedTuple,
        });
    }

    for record in records.iter() {
        match record.contributors.as_slice() {
            [] => {}
            [single] => graph.edges.push(Edge {
                from: single.clone(),
                to: record.position.clone(),
            }),
            many => {
                let mut combinator = combinator_id(&record.position);
                while taken.contains(&combinator) {
                    combinator.push('_');
                }
                taken.insert(combinator.clone());
                graph.nodes.push(Node {
                    id: combinator.clone(),
                    kind: NodeKind::Combinator,
                });
                for contributor in many {
                    graph.edges.push(Edge {
                        from: contributor.clone(),
                        to: combinator.clone(),
                    });
                }
                graph.edges.push(Edge {
                    from: combinator,
                    to: record.position.clone(),
                });
            }
        }
    }

    graph
}
