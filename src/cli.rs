//! Batch CLI over a schema catalog: declarations, samples, schema text, and
//! validation of captured payloads.
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::{Map, Value};

use event_schema::catalog::Catalog;
use event_schema::codegen::{Codegen, Target};
use event_schema::sample::{SampleConfig, Sampler, DEFAULT_BOUND};
use event_schema::schema_text::schema_text;
use event_schema::validate::{validate, ConformanceError};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate declarations, fixtures and schema text from an event schema catalog,
/// and check captured payloads against it
#[derive(Parser, Debug)]
#[command(name = "event-schema", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// emit typed declarations for every schema in the catalog
    Declarations(DeclarationsOut),
    /// emit a JSON object of sample payloads per schema
    Samples(SamplesOut),
    /// print the indented schema text of every schema
    Text(TextOut),
    /// validate captured payloads against one schema
    Check(CheckIn),
    /// re-validate a samples file against the catalog
    Fixtures(FixturesIn),
}

#[derive(Args, Debug, Clone)]
struct CatalogSettings {
    /// catalog JSON file
    #[arg(long, short)]
    catalog: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JQ pre-process filter for each document (e.g. `.events[]`)
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct DeclarationsOut {
    #[command(flatten)]
    catalog_settings: CatalogSettings,

    /// declaration language
    #[arg(long, value_enum, default_value_t = Target::Pydantic)]
    target: Target,

    /// declaration names provided by imports, in addition to the catalog's `external` list
    #[arg(long)]
    external: Vec<String>,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct SamplesOut {
    #[command(flatten)]
    catalog_settings: CatalogSettings,

    /// seed for the subsampling random source
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// maximum number of samples kept at any step
    #[arg(long, default_value_t = DEFAULT_BOUND, value_parser = parse_bound)]
    bound: usize,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct TextOut {
    #[command(flatten)]
    catalog_settings: CatalogSettings,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct CheckIn {
    #[command(flatten)]
    catalog_settings: CatalogSettings,

    /// catalog schema to validate against
    #[arg(long, short)]
    schema: String,

    /// variable name used at the root of error paths
    #[arg(long, default_value = "event")]
    var_name: String,

    #[command(flatten)]
    input_settings: InputSettings,
}

#[derive(clap::Parser, Debug)]
struct FixturesIn {
    #[command(flatten)]
    catalog_settings: CatalogSettings,

    /// samples file produced by the `samples` command
    #[arg(long, short)]
    input: PathBuf,
}

/// One payload pulled out of an input file.
struct Document {
    label: String,
    value: Value,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CatalogSettings {
    fn load(&self) -> Result<Catalog> {
        Catalog::load(&self.catalog).with_context(|| format!("loading catalog {}", self.catalog.display()))
    }
}

impl InputSettings {
    fn load_documents(&self) -> Result<Vec<Document>> {
        let source_paths = resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;
        let mut documents = Vec::new();
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file {source_path_str}"))?;

            let mut raw = Vec::new();
            if self.ndjson {
                for (idx, line) in source.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let value = serde_json::from_str::<Value>(line)
                        .with_context(|| format!("failed to parse JSON ({source_path_str}:{})", idx + 1))?;
                    raw.push((format!("{source_path_str}:{}", idx + 1), value));
                }
            } else {
                let value = serde_json::from_str::<Value>(&source)
                    .with_context(|| format!("failed to parse JSON source file ({source_path_str})"))?;
                raw.push((source_path_str.clone(), value));
            }

            for (label, value) in raw {
                match self.jq_expr.as_ref() {
                    None => documents.push(Document { label, value }),
                    Some(jq_expr) => {
                        let outputs = event_schema::jq_exec::run_jaq(jq_expr, &value)
                            .with_context(|| format!("failed to apply jq expression to {label}"))?;
                        for (i, value) in outputs.into_iter().enumerate() {
                            documents.push(Document { label: format!("{label}#{i}"), value });
                        }
                    }
                }
            }
        }
        tracing::debug!(documents = documents.len(), "loaded input documents");
        Ok(documents)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Declarations(target) => {
                let catalog = target.catalog_settings.load()?;
                let external = catalog.externals().map(str::to_string).chain(target.external.iter().cloned());
                let mut cg = Codegen::with_external(target.target, external);
                for entry in catalog.schemas() {
                    cg.emit(&entry.ty, &entry.name)
                        .with_context(|| format!("emitting declarations for `{}`", entry.name))?;
                }
                write_output(target.out.as_deref(), &cg.into_string())
            }
            Command::Samples(target) => {
                let catalog = target.catalog_settings.load()?;
                let mut sampler = Sampler::new(SampleConfig { seed: target.seed, bound: target.bound });
                let mut corpus = Map::new();
                for entry in catalog.schemas() {
                    let samples = sampler.sample(&entry.ty);
                    tracing::debug!(schema = %entry.name, count = samples.len(), "generated samples");
                    corpus.insert(entry.name.clone(), Value::Array(samples));
                }
                let src = serde_json::to_string_pretty(&Value::Object(corpus))?;
                write_output(target.out.as_deref(), &src)
            }
            Command::Text(target) => {
                let catalog = target.catalog_settings.load()?;
                let blocks: Vec<String> = catalog.schemas().map(|e| schema_text(&e.ty, &e.name)).collect();
                write_output(target.out.as_deref(), &blocks.join("\n\n"))
            }
            Command::Check(target) => {
                let catalog = target.catalog_settings.load()?;
                let Some(entry) = catalog.get(&target.schema) else {
                    bail!("catalog has no schema named `{}`", target.schema);
                };
                let documents = target.input_settings.load_documents()?;
                let results: Vec<(&str, Result<(), ConformanceError>)> = documents
                    .par_iter()
                    .map(|doc| (doc.label.as_str(), validate(&entry.ty, &target.var_name, &doc.value)))
                    .collect();
                report(&results)
            }
            Command::Fixtures(target) => {
                let catalog = target.catalog_settings.load()?;
                let source = std::fs::read_to_string(&target.input)
                    .with_context(|| format!("failed to read samples file {}", target.input.display()))?;
                let corpus: Map<String, Value> = event_schema::path_de::from_str_with_path(&source)
                    .with_context(|| format!("failed to parse samples file {}", target.input.display()))?;

                let mut labelled = Vec::new();
                for (name, samples) in &corpus {
                    let Some(entry) = catalog.get(name) else {
                        bail!("samples file names unknown schema `{name}`");
                    };
                    let Some(samples) = samples.as_array() else {
                        bail!("samples for `{name}` must be an array");
                    };
                    for (i, sample) in samples.iter().enumerate() {
                        labelled.push((format!("{name}[{i}]"), entry, sample));
                    }
                }
                let results: Vec<(&str, Result<(), ConformanceError>)> = labelled
                    .par_iter()
                    .map(|(label, entry, sample)| (label.as_str(), validate(&entry.ty, "event", sample)))
                    .collect();
                report(&results)
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn report(results: &[(&str, Result<(), ConformanceError>)]) -> Result<()> {
    let mut failures = 0usize;
    for (label, result) in results {
        match result {
            Ok(()) => println!("{} {label}", "PASS".green()),
            Err(error) => {
                failures += 1;
                println!("{} {label}: {error}", "FAIL".red().bold());
            }
        }
    }
    let passed = results.len() - failures;
    eprintln!("{} passed, {} failed", passed.to_string().green(), failures.to_string().red());
    if failures > 0 {
        bail!("{failures} of {} payloads failed validation", results.len());
    }
    Ok(())
}

fn parse_bound(raw: &str) -> std::result::Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("bound must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(error) => Err(error.to_string()),
    }
}

fn write_output(out: Option<&Path>, src: &str) -> Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
            }
            std::fs::write(out, src).with_context(|| format!("writing {}", out.display()))?;
        }
        None => println!("{src}"),
    }
    Ok(())
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
