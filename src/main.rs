//! Command-line interface for benchctl.
//!
//! # Usage Examples
//!
//! ```bash
//! # Assemble a scenario and run it to completion
//! benchctl --config benchmarks.yaml --scenario pipeline --output out.json
//!
//! # Override a templated variable and run three iterations
//! benchctl --config benchmarks.yaml --scenario pipeline \
//!   --variable port=9090 --iterations 3
//!
//! # Keep a server alive across a five-minute span while the load
//! # generator restarts each pass
//! benchctl --config benchmarks.yaml --scenario pipeline \
//!   --span 00:05:00 --repeat loadgen
//!
//! # Stream measurements, flushing a result document at every delimiter
//! benchctl --config benchmarks.yaml --job loadgen --auto-flush --span 00:10:00
//! ```
//!
//! Any `--X Y` pair that doesn't match a flag declared below becomes a
//! dotted-path configuration override `(X, Y)` (spec.md §6).

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "benchctl")]
#[command(about = "Assembles benchmark configurations and drives remote agents through their lifecycle")]
#[command(long_about = None)]
struct Cli {
    /// Configuration document (file path or URL); repeatable, later
    /// sources win on scalar conflicts.
    #[arg(long = "config", required = true)]
    configs: Vec<String>,

    /// Scenario to instantiate from the assembled configuration.
    #[arg(long)]
    scenario: Option<String>,

    /// Ad-hoc job name to run without a scenario; repeatable.
    #[arg(long = "job")]
    jobs: Vec<String>,

    /// Named overlay to apply after scenario instantiation; repeatable.
    #[arg(long = "profile")]
    profiles: Vec<String>,

    /// Destination for the result document.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Command-line variable `K=V`; integer-looking values are parsed as
    /// integers. Repeatable.
    #[arg(long = "variable")]
    variables: Vec<String>,

    /// Property `K=V` attached to `jobResults.properties`. Repeatable.
    #[arg(long = "property")]
    properties: Vec<String>,

    /// Session identifier; defaults to a fresh random identifier.
    #[arg(long, env = "BENCHCTL_SESSION")]
    session: Option<String>,

    /// Free-text description recorded alongside the result document.
    #[arg(long)]
    description: Option<String>,

    /// Number of passes per span iteration (mutually exclusive with `--span`).
    #[arg(long)]
    iterations: Option<u32>,

    /// Wall-clock duration (`HH:mm:ss`) the benchmark loop repeats for.
    #[arg(long)]
    span: Option<String>,

    /// Dependency name before which jobs stay alive across span passes.
    #[arg(long)]
    repeat: Option<String>,

    /// Stream a single job, flushing a result document at each delimiter.
    #[arg(long)]
    auto_flush: bool,

    /// Omit raw measurement streams from the result document.
    #[arg(long)]
    no_measurements: bool,

    /// Omit measurement metadata from the result document.
    #[arg(long)]
    no_metadata: bool,

    /// Relational connection string; substituted from an environment
    /// variable of the same name if one is defined.
    #[arg(long)]
    sql: Option<String>,

    /// Table name for the relational sink; same environment substitution
    /// as `--sql`.
    #[arg(long, default_value = "Benchmarks")]
    table: String,

    /// Prior result document to diff against; repeatable.
    #[arg(long = "compare")]
    compare: Vec<PathBuf>,
}

/// Long-flag names declared above. Anything else encountered as a
/// `--X Y` pair on the command line becomes a dotted-path override
/// instead of a clap parse error.
const BOOLEAN_FLAGS: &[&str] = &["auto-flush", "no-measurements", "no-metadata", "help", "version"];
const VALUE_FLAGS: &[&str] = &[
    "config",
    "scenario",
    "job",
    "profile",
    "output",
    "variable",
    "property",
    "session",
    "description",
    "iterations",
    "span",
    "repeat",
    "sql",
    "table",
    "compare",
];

/// Splits raw process arguments into the subset clap understands and the
/// `--X Y` pairs that fall through to become configuration overrides.
fn split_overrides(raw_args: Vec<String>) -> (Vec<String>, Vec<(String, String)>) {
    let mut known = vec![raw_args.first().cloned().unwrap_or_default()];
    let mut overrides = Vec::new();
    let mut i = 1;
    while i < raw_args.len() {
        let arg = &raw_args[i];
        match arg.strip_prefix("--") {
            Some(name) if BOOLEAN_FLAGS.contains(&name) => {
                known.push(arg.clone());
                i += 1;
            }
            Some(name) if VALUE_FLAGS.contains(&name) => {
                known.push(arg.clone());
                if let Some(value) = raw_args.get(i + 1) {
                    known.push(value.clone());
                }
                i += 2;
            }
            Some(name) => {
                if let Some(value) = raw_args.get(i + 1) {
                    overrides.push((name.to_string(), value.clone()));
                }
                i += 2;
            }
            None => {
                known.push(arg.clone());
                i += 1;
            }
        }
    }
    (known, overrides)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(-1);
        }
    }
}

async fn run() -> anyhow::Result<i32> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (known_args, overrides) = split_overrides(std::env::args().collect());
    let cli = Cli::parse_from(known_args);

    if cli.iterations.is_some() && cli.span.is_some() {
        anyhow::bail!("--iterations and --span are mutually exclusive");
    }

    let session = cli.session.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
    let run_id = Uuid::new_v4().to_string();

    let variables = benchctl::parse_variables(&cli.variables);
    let properties = benchctl::parse_key_values(&cli.properties)?;
    let span = cli.span.as_deref().map(benchctl::parse_span).transpose()?;
    let sql = cli.sql.as_deref().map(benchctl::resolve_env_alias);
    let table = benchctl::resolve_env_alias(&cli.table);

    let outcome = benchctl::run(benchctl::RunRequest {
        configs: cli.configs,
        scenario: cli.scenario,
        jobs: cli.jobs,
        profiles: cli.profiles,
        output: cli.output,
        variables,
        properties,
        overrides,
        session,
        description: cli.description,
        run_id,
        iterations: cli.iterations,
        span,
        repeat: cli.repeat,
        auto_flush: cli.auto_flush,
        no_measurements: cli.no_measurements,
        no_metadata: cli.no_metadata,
        sql,
        table,
        compare: cli.compare,
    })
    .await
    .context("benchmark run failed")?;

    Ok(outcome.return_code)
}
