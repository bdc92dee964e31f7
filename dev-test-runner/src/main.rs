//! Replays a recorded-call file against a schema catalog.
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use event_schema::catalog::Catalog;
use event_schema::replay::replay_calls;

/// replay recorded checker calls (JSON lines) against a catalog
#[derive(Parser, Debug)]
struct Cli {
    /// catalog JSON file
    #[arg(long)]
    catalog: PathBuf,

    /// recorded calls, one JSON object per line
    #[arg(long)]
    calls: PathBuf,

    /// print a JSON summary instead of colored lines
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn run(cli: &Cli) -> Result<bool> {
    let catalog = Catalog::load(&cli.catalog).with_context(|| format!("loading catalog {}", cli.catalog.display()))?;
    let src = std::fs::read_to_string(&cli.calls).with_context(|| format!("reading {}", cli.calls.display()))?;
    let report = replay_calls(&catalog, &src)?;

    if cli.json {
        let failures: Vec<serde_json::Value> = report
            .failed()
            .map(|o| {
                serde_json::json!({
                    "line": o.line,
                    "checker": o.checker,
                    "schema": o.schema,
                    "error": o.result.as_ref().err().map(ToString::to_string),
                })
            })
            .collect();
        let summary = serde_json::json!({
            "passed": report.passed().count(),
            "failed": failures.len(),
            "failures": failures,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for outcome in &report.outcomes {
            match &outcome.result {
                Ok(()) => println!("{} line {} {} -> {}", "PASS".green(), outcome.line, outcome.checker, outcome.schema),
                Err(error) => println!(
                    "{} line {} {} -> {}: {error}",
                    "FAIL".red().bold(),
                    outcome.line,
                    outcome.checker,
                    outcome.schema
                ),
            }
        }
        eprintln!("{} passed, {} failed", report.passed().count(), report.failed().count());
    }
    Ok(report.is_success())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            tracing::error!("{error:#}");
            ExitCode::from(2)
        }
    }
}
