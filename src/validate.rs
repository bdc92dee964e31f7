//! Fail-fast conformance checking of a JSON value against a [`Ty`].
//!
//! The first violation aborts the whole check. The error carries the path of
//! the offending field and an expected-vs-actual description.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::ir::{DictTy, Ty};

pub const URL_PREFIXES: [&str; 2] = ["http://", "https://"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Location of a value inside the payload, rooted at the caller's variable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    root: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{path}: expected {expected}, got {actual}")]
pub struct ConformanceError {
    pub path: FieldPath,
    pub expected: String,
    pub actual: String,
}

impl FieldPath {
    pub fn new(root: impl Into<String>, segments: Vec<Segment>) -> Self {
        Self { root: root.into(), segments }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The innermost dict key on the path, skipping list indices.
    pub fn last_key(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(|s| match s {
            Segment::Key(k) => Some(k.as_str()),
            Segment::Index(_) => None,
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for seg in &self.segments {
            match seg {
                Segment::Key(k) => write!(f, ".{k}")?,
                Segment::Index(i) => write!(f, "[{i}]")?,
            }
        }
        Ok(())
    }
}

// ------------------------------ Front API -------------------------------- //

pub fn validate(ty: &Ty, var_name: &str, value: &Value) -> Result<(), ConformanceError> {
    let mut cx = Checker { root: var_name, path: Vec::new() };
    cx.check(ty, value)
}

pub fn is_valid(ty: &Ty, value: &Value) -> bool {
    validate(ty, "value", value).is_ok()
}

// ------------------------------ Recursion -------------------------------- //

struct Checker<'a> {
    root: &'a str,
    path: Vec<Segment>,
}

impl Checker<'_> {
    fn fail(&self, expected: String, value: Option<&Value>) -> ConformanceError {
        ConformanceError {
            path: FieldPath::new(self.root, self.path.clone()),
            expected,
            actual: match value {
                Some(v) => describe_value(v),
                None => "nothing (key missing)".to_string(),
            },
        }
    }

    fn leaf(&self, ok: bool, ty: &Ty, value: &Value) -> Result<(), ConformanceError> {
        if ok { Ok(()) } else { Err(self.fail(describe(ty), Some(value))) }
    }

    fn check(&mut self, ty: &Ty, value: &Value) -> Result<(), ConformanceError> {
        match ty {
            Ty::Int => self.leaf(matches!(value, Value::Number(n) if n.is_i64() || n.is_u64()), ty, value),
            Ty::Str => self.leaf(value.is_string(), ty, value),
            Ty::Bool => self.leaf(value.is_boolean(), ty, value),
            Ty::AnyDict => self.leaf(value.is_object(), ty, value),
            Ty::Number => self.leaf(value.is_number(), ty, value),
            Ty::Url => {
                let ok = value
                    .as_str()
                    .is_some_and(|s| URL_PREFIXES.iter().any(|p| s.starts_with(p)));
                self.leaf(ok, ty, value)
            }
            Ty::Enum(lits) => self.leaf(lits.contains(value), ty, value),
            Ty::Equals(lit) => self.leaf(lit == value, ty, value),
            Ty::List { item, .. } => {
                let Some(xs) = value.as_array() else {
                    return Err(self.fail(describe(ty), Some(value)));
                };
                for (i, x) in xs.iter().enumerate() {
                    self.path.push(Segment::Index(i));
                    self.check(item, x)?;
                    self.path.pop();
                }
                Ok(())
            }
            Ty::StringDict(inner) => {
                let Some(map) = value.as_object() else {
                    return Err(self.fail(describe(ty), Some(value)));
                };
                for (k, v) in map {
                    self.path.push(Segment::Key(k.clone()));
                    self.check(inner, v)?;
                    self.path.pop();
                }
                Ok(())
            }
            Ty::Optional(inner) => {
                if value.is_null() { Ok(()) } else { self.check(inner, value) }
            }
            Ty::Tuple(elems) => {
                match value.as_array() {
                    Some(xs) if xs.len() == elems.len() => {
                        for (i, (elem, x)) in elems.iter().zip(xs).enumerate() {
                            self.path.push(Segment::Index(i));
                            self.check(elem, x)?;
                            self.path.pop();
                        }
                        Ok(())
                    }
                    _ => Err(self.fail(describe(ty), Some(value))),
                }
            }
            Ty::Union(alts) => {
                let depth = self.path.len();
                for alt in alts {
                    if self.check(alt, value).is_ok() {
                        return Ok(());
                    }
                    // a failed attempt may leave segments behind
                    self.path.truncate(depth);
                }
                Err(self.fail(describe(ty), Some(value)))
            }
            Ty::Dict(d) => self.check_dict(d, ty, value),
        }
    }

    fn check_dict(&mut self, d: &DictTy, ty: &Ty, value: &Value) -> Result<(), ConformanceError> {
        let Some(map) = value.as_object() else {
            return Err(self.fail(describe(ty), Some(value)));
        };
        for field in d.fields() {
            self.path.push(Segment::Key(field.name.clone()));
            match map.get(&field.name) {
                Some(v) => self.check(&field.ty, v)?,
                None if field.required => return Err(self.fail(describe(&field.ty), None)),
                None => {}
            }
            self.path.pop();
        }
        for (k, v) in map {
            if d.field(k).is_none() {
                self.path.push(Segment::Key(k.clone()));
                return Err(self.fail("no such key".to_string(), Some(v)));
            }
        }
        Ok(())
    }
}

// ---------------------------- Descriptions ------------------------------- //

/// Human-readable description of what a node accepts.
pub fn describe(ty: &Ty) -> String {
    match ty {
        Ty::Int | Ty::Str | Ty::Bool | Ty::Number => ty.kind().to_string(),
        Ty::AnyDict | Ty::Dict(_) => "dict".to_string(),
        Ty::Url => format!("url ({})", URL_PREFIXES.join(" or ")),
        Ty::Enum(lits) => format!("one of {}", literal_list(lits)),
        Ty::Equals(lit) => lit.to_string(),
        Ty::List { item, .. } => format!("list of {}", describe(item)),
        Ty::StringDict(inner) => format!("string-keyed dict of {}", describe(inner)),
        Ty::Optional(inner) => format!("null or {}", describe(inner)),
        Ty::Tuple(elems) => format!("tuple of {} items", elems.len()),
        Ty::Union(alts) => {
            let arms: Vec<String> = alts.iter().map(describe).collect();
            format!("any of [{}]", arms.join(", "))
        }
    }
}

fn literal_list(lits: &[Value]) -> String {
    let xs: Vec<String> = lits.iter().map(Value::to_string).collect();
    format!("[{}]", xs.join(", "))
}

const MAX_ACTUAL_LEN: usize = 60;

fn describe_value(v: &Value) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("bool {b}"),
        Value::Number(n) if n.is_f64() => format!("float {n}"),
        Value::Number(n) => format!("integer {n}"),
        Value::String(s) => {
            let mut shown: String = s.chars().take(MAX_ACTUAL_LEN).collect();
            if shown.len() < s.len() {
                shown.push('…');
            }
            format!("string {shown:?}")
        }
        Value::Array(xs) => format!("list of {} items", xs.len()),
        Value::Object(m) => format!("dict with {} keys", m.len()),
    }
}

// ------------------------------- Tests ------------------------------------ //
