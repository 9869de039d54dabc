/// Label/count histograms over result rows.
pub mod chart;
/// Graphviz DOT rendering of provenance graphs.
pub mod dot;
/// Provenance DAG construction from parsed formulas.
pub mod graph;
