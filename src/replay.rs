//! Replay of recorded checker calls.
//!
//! A recording is a JSON-lines file, one call per line:
//!
//! ```text
//! {"name": "check_heartbeat", "args": ["events[0]", {"type": "heartbeat", "id": 5}]}
//! {"name": "check_realm_update", "args": ["events[1]"], "kwargs": {"event": {"type": "realm"}}}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. The first argument is
//! the variable name used in error paths, the second (or `kwargs.event`) is the
//! payload. Any further arguments belong to business-rule checkers outside this
//! crate and are ignored.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::catalog::Catalog;
use crate::path_de::{from_str_with_path, PathError};
use crate::validate::{validate, ConformanceError};

const DEFAULT_VAR_NAME: &str = "event";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordedCall {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: IndexMap<String, Value>,
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("line {line}: malformed call record: {source}")]
    Parse {
        line: usize,
        #[source]
        source: PathError,
    },
    #[error("line {line}: no schema for checker `{name}`")]
    UnknownChecker { line: usize, name: String },
    #[error("line {line}: call to `{name}` carries no event payload")]
    MissingEvent { line: usize, name: String },
}

#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    /// 1-based line in the recording.
    pub line: usize,
    pub checker: String,
    pub schema: String,
    pub result: Result<(), ConformanceError>,
}

impl ReplayOutcome {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReplayReport {
    pub outcomes: Vec<ReplayOutcome>,
}

impl ReplayReport {
    pub fn passed(&self) -> impl Iterator<Item = &ReplayOutcome> {
        self.outcomes.iter().filter(|o| o.passed())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ReplayOutcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(ReplayOutcome::passed)
    }
}

impl RecordedCall {
    pub fn var_name(&self) -> &str {
        self.args
            .first()
            .and_then(Value::as_str)
            .or_else(|| self.kwargs.get("var_name").and_then(Value::as_str))
            .unwrap_or(DEFAULT_VAR_NAME)
    }

    pub fn event(&self) -> Option<&Value> {
        self.args.get(1).or_else(|| self.kwargs.get("event"))
    }
}

/// Parse a recording into `(line number, call)` pairs.
pub fn parse_calls(src: &str) -> Result<Vec<(usize, RecordedCall)>, ReplayError> {
    let mut calls = Vec::new();
    for (idx, raw) in src.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let call = from_str_with_path::<RecordedCall>(trimmed)
            .map_err(|source| ReplayError::Parse { line, source })?;
        calls.push((line, call));
    }
    Ok(calls)
}

/// Validate every recorded call against its catalog schema.
///
/// Malformed records and unresolvable checkers abort the replay; conformance
/// failures are collected in the report.
pub fn replay_calls(catalog: &Catalog, src: &str) -> Result<ReplayReport, ReplayError> {
    let mut report = ReplayReport::default();
    for (line, call) in parse_calls(src)? {
        let entry = catalog
            .resolve_checker(&call.name)
            .ok_or_else(|| ReplayError::UnknownChecker { line, name: call.name.clone() })?;
        let event = call
            .event()
            .ok_or_else(|| ReplayError::MissingEvent { line, name: call.name.clone() })?;

        let extra = call.args.len().saturating_sub(2)
            + call.kwargs.keys().filter(|k| !matches!(k.as_str(), "event" | "var_name")).count();
        if extra > 0 {
            tracing::debug!(line, checker = %call.name, extra, "ignoring business-rule arguments");
        }

        let result = validate(&entry.ty, call.var_name(), event);
        if let Err(err) = &result {
            tracing::warn!(line, checker = %call.name, "{err}");
        }
        report.outcomes.push(ReplayOutcome {
            line,
            checker: call.name.clone(),
            schema: entry.name.clone(),
            result,
        });
    }
    Ok(report)
}
