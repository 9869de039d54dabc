use std::fmt::Write;

use crate::generator::graph::{NodeKind, ProvenanceGraph};
use crate::parser::formula::COMBINE_GLYPH;

/// Render a provenance graph as a Graphviz `digraph`.
///
/// Sources are grey boxes, derived tuples blue ellipses, and combinators white
/// circles labelled with the combine glyph. Edges follow node declarations.
pub fn to_dot(graph: &ProvenanceGraph) -> String {
    let mut out = String::new();
    writeln!(out, "digraph provenance {{").unwrap();
    writeln!(
        out,
        "  graph [rankdir=TB, splines=spline, nodesep=0.6, ranksep=0.8];"
    )
    .unwrap();

    for node in &graph.nodes {
        let id = quote(&node.id);
        let attrs = match node.kind {
            NodeKind::SourceTuple => {
                format!("label={id}, shape=box, style=filled, fillcolor=lightgray")
            }
            NodeKind::DerivedTuple => {
                format!("label={id}, shape=ellipse, style=filled, fillcolor=lightblue")
            }
            NodeKind::Combinator => format!(
                "label={}, shape=circle, style=filled, fillcolor=white, fontsize=18, fixedsize=false",
                quote(COMBINE_GLYPH)
            ),
        };
        writeln!(out, "  {id} [{attrs}];").unwrap();
    }

    for edge in &graph.edges {
        writeln!(out, "  {} -> {};", quote(&edge.from), quote(&edge.to)).unwrap();
    }

    out.push_str("}\n");
    out
}

/// Quote an identifier as a DOT string.
fn quote(id: &str) -> String {
    let mut quoted = String::with_capacity(id.len() + 2);
    quoted.push('"');
    for ch in id.chars() {
        match ch {
            '"' | '\\' => {
                quoted.push('\\');
                quoted.push(ch);
            }
            '\n' => quoted.push_str("\\n"),
            _ => quoted.push(ch),
        }
    }
    quoted.push('"');
    quoted
}
