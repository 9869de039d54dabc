//! CLI entry point for `provscope`.

use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use provscope::config::EngineConfig;
use provscope::engine::{self, graphviz::Graphviz};
use provscope::intent::mode::{Backend, Mode, ProvenanceRequest, QueryIntent};
use provscope::output::{formatter, report, workspace::RequestWorkspace};
use provscope::parser::text::normalize_sql;
use provscope::pipeline::{self, Action};

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ActionArg {
    Run,
    Image,
    Circuit,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "provscope",
    about = "Compose provenance queries for GProM and ProvSQL and inspect their results"
)]
struct Cli {
    /// Provenance engine (gprom or provsql)
    #[arg(long, default_value = "gprom")]
    engine: Backend,

    /// Provenance mode, e.g. provenance, timestamp, semirings
    #[arg(long, default_value = "default")]
    mode: Mode,

    /// What to produce
    #[arg(long, value_enum, default_value = "run")]
    action: ActionArg,

    /// Query text
    #[arg(long)]
    query: Option<String>,

    /// Timestamp for timestamp provenance
    #[arg(long)]
    timestamp: Option<String>,

    /// Outer SELECT for base-relation provenance
    #[arg(long)]
    main_select: Option<String>,

    /// Subquery treated as a base relation
    #[arg(long)]
    subquery: Option<String>,

    /// Alias of the base relation
    #[arg(long)]
    base_relation: Option<String>,

    /// Attributes for HAS PROVENANCE
    #[arg(long)]
    has_attrs: Option<String>,

    /// Attributes for USE PROVENANCE
    #[arg(long)]
    use_attrs: Option<String>,

    /// Optional GROUP BY list for has/use provenance
    #[arg(long)]
    group_by: Option<String>,

    /// Mapping table for semiring formulas
    #[arg(long)]
    semirings_table: Option<String>,

    /// Subquery for semiring formulas
    #[arg(long)]
    semirings_subquery: Option<String>,

    /// Subquery for where-provenance
    #[arg(long)]
    wp_subquery: Option<String>,

    /// Probability evaluation method
    #[arg(long)]
    prob_method: Option<String>,

    /// Subquery for probability evaluation
    #[arg(long)]
    prob_subquery: Option<String>,

    /// Circuit token for VIEW_CIRCUIT
    #[arg(long)]
    view_uuid: Option<String>,

    /// Mapping table for VIEW_CIRCUIT
    #[arg(long)]
    view_table: Option<String>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory receiving one artifact directory per request
    #[arg(long)]
    artifact_root: Option<PathBuf>,

    /// Upper bound on any external process, in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Print the composed query without executing it
    #[arg(long)]
    dry_run: bool,

    /// Print verbose diagnostics
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let request = ProvenanceRequest {
        backend: cli.engine,
        intent: build_intent(&cli),
    };
    let action = build_action(&cli);

    if cli.dry_run {
        let composed = pipeline::compose_request(&request, &action);
        if let Some(diagnostic) = &composed.diagnostic {
            eprintln!("Warning: {diagnostic}");
        }
        println!("{}", composed.text);
        return;
    }

    let mut config = match &cli.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading configuration: {e}");
                process::exit(2);
            }
        },
        None => EngineConfig::default(),
    };
    if let Some(secs) = cli.timeout_secs {
        config.timeout_secs = secs;
    }
    if let Some(root) = &cli.artifact_root {
        config.artifact_root.clone_from(root);
    }

    let workspace = match RequestWorkspace::create(&config.artifact_root) {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("Error preparing artifacts: {e}");
            process::exit(2);
        }
    };

    let engine = engine::for_backend(request.backend, &config);
    let renderer = Graphviz::new(config.graphviz.clone(), config.timeout());
    let outcome = pipeline::run(&request, &action, engine.as_ref(), &renderer, &workspace);

    if let Err(e) = formatter::write_outcome(&workspace, &outcome) {
        eprintln!("Error writing output: {e}");
        process::exit(2);
    }

    match cli.format {
        OutputFormat::Text => print!("{}", report::build_report(&outcome)),
        OutputFormat::Json => match formatter::outcome_json(&outcome) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error writing output: {e}");
                process::exit(2);
            }
        },
    }

    if outcome.is_failure() {
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "warn,provscope=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn build_action(cli: &Cli) -> Action {
    match cli.action {
        ActionArg::Run => Action::Run,
        ActionArg::Image => Action::Image,
        ActionArg::Circuit => Action::Circuit {
            view_uuid: param(&cli.view_uuid),
            view_table: param(&cli.view_table),
        },
    }
}

/// Query-like flags are collapsed to one line; other parameters are kept as given.
fn build_intent(cli: &Cli) -> QueryIntent {
    let query = sql(&cli.query);
    match cli.mode {
        Mode::Default => QueryIntent::Default { query },
        Mode::Provenance => QueryIntent::Provenance { query },
        Mode::TimestampProvenance => QueryIntent::TimestampProvenance {
            query,
            timestamp: param(&cli.timestamp),
        },
        Mode::BaseRelationProvenance => QueryIntent::BaseRelationProvenance {
            main_select: sql(&cli.main_select),
            subquery: sql(&cli.subquery),
            base_relation: param(&cli.base_relation),
        },
        Mode::HasProvenance => QueryIntent::HasProvenance {
            query,
            attributes: param(&cli.has_attrs),
            group_by: cli.group_by.clone(),
        },
        Mode::UseProvenance => QueryIntent::UseProvenance {
            query,
            attributes: param(&cli.use_attrs),
            group_by: cli.group_by.clone(),
        },
        Mode::Reenact => QueryIntent::Reenact { query },
        Mode::ReenactProvenance => QueryIntent::ReenactProvenance { query },
        Mode::ReenactAnnotations => QueryIntent::ReenactAnnotations { query },
        Mode::AddProvenance => QueryIntent::AddProvenance { query },
        Mode::CreateProvenanceMapping => QueryIntent::CreateProvenanceMapping { query },
        Mode::Semirings => QueryIntent::Semirings {
            table: param(&cli.semirings_table),
            subquery: sql(&cli.semirings_subquery),
        },
        Mode::WhereProvenance => QueryIntent::WhereProvenance {
            subquery: sql(&cli.wp_subquery),
        },
        Mode::Probability => QueryIntent::Probability {
            method: param(&cli.prob_method),
            subquery: sql(&cli.prob_subquery),
        },
    }
}

fn sql(value: &Option<String>) -> String {
    value.as_deref().map(normalize_sql).unwrap_or_default()
}

fn param(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}
