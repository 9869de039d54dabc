//! Compose provenance queries for GProM and ProvSQL, run them, and turn the
//! engines' text output into tables, histograms, and derivation graphs.
#![warn(missing_docs)]

/// Engine connection settings and timeouts loaded from JSON.
pub mod config;
/// External provenance engines: the `Engine` trait, GProM and ProvSQL runners, and Graphviz.
pub mod engine;
/// Histogram summaries, provenance graphs, and their DOT rendering.
pub mod generator;
/// Provenance intents, backends, and per-dialect query composition.
pub mod intent;
/// Per-request artifact workspaces, JSON outcome files, and text reports.
pub mod output;
/// Text parsing of engine output: psql tables, CSV, and semiring formulas.
pub mod parser;
/// End-to-end request pipeline: compose, execute, parse, summarize.
pub mod pipeline;
