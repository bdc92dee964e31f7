//! Declaration emission for a static target type system.
//!
//! `Codegen` is the emission context: it owns the registry of names already
//! written and the names assigned to anonymous dict nodes. Requesting the flat
//! name of a dict emits its declaration on first use, so dependencies are always
//! written before the declarations that reference them.
//!
//! ```text
//! let mut cg = Codegen::new(Target::Pydantic);
//! cg.emit(&schema, "heartbeat_event")?;
//! println!("{}", cg.into_string());
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::ir::{DictTy, Ty};

// ------------------------------- Types ----------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Target {
    /// pydantic `BaseModel` classes
    Pydantic,
    /// serde-derived Rust structs and enums
    Rust,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmitError {
    #[error("declaration name `{name}` is already used by a structurally different {kind}")]
    NameCollision { name: String, kind: &'static str },
}

pub struct Codegen {
    target: Target,
    out: String,
    /// name → node emitted under it
    emitted: IndexMap<String, Ty>,
    /// dict identity → name assigned in this context
    assigned: HashMap<usize, (Arc<DictTy>, String)>,
    /// declared elsewhere; referenced by name, never written
    external: HashSet<String>,
}

// ------------------------------ Front API -------------------------------- //

impl Codegen {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            out: String::new(),
            emitted: IndexMap::new(),
            assigned: HashMap::new(),
            external: HashSet::new(),
        }
    }

    pub fn with_external<S: Into<String>>(target: Target, names: impl IntoIterator<Item = S>) -> Self {
        let mut cg = Self::new(target);
        for name in names {
            cg.declare_external(name);
        }
        cg
    }

    /// Mark `name` as provided by an import. Nodes under it are referenced by
    /// name and no declaration body is written.
    pub fn declare_external(&mut self, name: impl Into<String>) {
        self.external.insert(name.into());
    }

    pub fn is_external(&self, name: &str) -> bool {
        self.external.contains(name)
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// Emit `ty` under `name`. A name is written at most once per context;
    /// re-emitting the same shape is a no-op.
    pub fn emit(&mut self, ty: &Ty, name: &str) -> Result<(), EmitError> {
        match ty {
            Ty::Dict(d) => {
                let key = Arc::as_ptr(d) as usize;
                self.assigned
                    .entry(key)
                    .or_insert_with(|| (Arc::clone(d), name.to_string()));
                self.emit_dict(d, name)
            }
            _ if self.target == Target::Rust && rust_needs_decl(ty) => {
                self.flat_name(ty, name)?;
                Ok(())
            }
            _ => {
                if !self.reserve(name, ty)? {
                    return Ok(());
                }
                // `name` now belongs to the alias; anonymous children need their own slot
                let flat = self.flat_name(ty, &format!("{name}__inner"))?;
                match self.target {
                    Target::Pydantic => self.out.push_str(&format!("{name} = {flat}\n\n\n")),
                    Target::Rust => self.out.push_str(&format!("pub type {name} = {flat};\n\n")),
                }
                Ok(())
            }
        }
    }

    pub fn emitted_names(&self) -> impl Iterator<Item = &str> {
        self.emitted.keys().map(String::as_str)
    }

    pub fn is_emitted(&self, name: &str) -> bool {
        self.emitted.contains_key(name)
    }

    /// Declarations written so far, without the target prelude.
    pub fn source(&self) -> &str {
        &self.out
    }

    pub fn into_string(self) -> String {
        let prelude = match self.target {
            Target::Pydantic => {
                "from typing import Any, Dict, List, Literal, Optional, Tuple, Union\n\nfrom pydantic import BaseModel\n\n\n"
            }
            Target::Rust => "use serde::{Deserialize, Serialize};\n\n",
        };
        format!("{prelude}{}", self.out)
    }

    // ---------------------------- Naming --------------------------------- //

    /// The target-language type expression for `ty`. `slot` is the name an
    /// anonymous declaration reached from here would get.
    pub fn flat_name(&mut self, ty: &Ty, slot: &str) -> Result<String, EmitError> {
        let pydantic = self.target == Target::Pydantic;
        let pick = |py: &str, rs: &str| if pydantic { py.to_string() } else { rs.to_string() };
        Ok(match ty {
            Ty::Int => pick("int", "i64"),
            Ty::Str | Ty::Url => pick("str", "String"),
            Ty::Bool => "bool".to_string(),
            Ty::Number => pick("Union[float, int]", "f64"),
            Ty::AnyDict => pick("Dict[str, Any]", "serde_json::Map<String, serde_json::Value>"),
            Ty::Enum(lits) => self.literal_type(ty, lits, slot)?,
            Ty::Equals(lit) => self.literal_type(ty, std::slice::from_ref(lit), slot)?,
            Ty::List { item, .. } => {
                let inner = self.flat_name(item, slot)?;
                if pydantic { format!("List[{inner}]") } else { format!("Vec<{inner}>") }
            }
            Ty::StringDict(inner) => {
                let inner = self.flat_name(inner, slot)?;
                if pydantic {
                    format!("Dict[str, {inner}]")
                } else {
                    format!("indexmap::IndexMap<String, {inner}>")
                }
            }
            Ty::Optional(inner) => {
                let inner = self.flat_name(inner, slot)?;
                if pydantic { format!("Optional[{inner}]") } else { format!("Option<{inner}>") }
            }
            Ty::Tuple(elems) => {
                let parts = self.positional(elems, slot)?;
                match (pydantic, parts.len()) {
                    (true, _) => format!("Tuple[{}]", parts.join(", ")),
                    (false, 1) => format!("({},)", parts[0]),
                    (false, _) => format!("({})", parts.join(", ")),
                }
            }
            Ty::Union(alts) => {
                if pydantic {
                    let parts = self.positional(alts, slot)?;
                    format!("Union[{}]", parts.join(", "))
                } else {
                    self.emit_rust_union(ty, alts, slot)?
                }
            }
            Ty::Dict(d) => {
                let name = self.resolve_name(d, slot);
                self.emit_dict(d, &name)?;
                name
            }
        })
    }

    fn positional(&mut self, elems: &[Ty], slot: &str) -> Result<Vec<String>, EmitError> {
        elems
            .iter()
            .enumerate()
            .map(|(i, t)| self.flat_name(t, &format!("{slot}__{i}")))
            .collect()
    }

    fn resolve_name(&mut self, d: &Arc<DictTy>, slot: &str) -> String {
        if let Some(name) = d.name() {
            return name.to_string();
        }
        let key = Arc::as_ptr(d) as usize;
        if let Some((_, name)) = self.assigned.get(&key) {
            return name.clone();
        }
        tracing::debug!(name = slot, "assigned synthesized declaration name");
        self.assigned.insert(key, (Arc::clone(d), slot.to_string()));
        slot.to_string()
    }

    /// Claim `name` for `ty`. `Ok(false)` means an equal shape already owns it.
    fn reserve(&mut self, name: &str, ty: &Ty) -> Result<bool, EmitError> {
        if self.external.contains(name) {
            tracing::debug!(name, "external declaration, not emitted");
            return Ok(false);
        }
        if let Some(prev) = self.emitted.get(name) {
            let same = match (prev, ty) {
                (Ty::Dict(a), Ty::Dict(b)) => Arc::ptr_eq(a, b) || a.fields() == b.fields(),
                (a, b) => a == b,
            };
            if same {
                tracing::debug!(name, "declaration already emitted");
                return Ok(false);
            }
            return Err(EmitError::NameCollision { name: name.to_string(), kind: ty.kind() });
        }
        self.emitted.insert(name.to_string(), ty.clone());
        Ok(true)
    }

    // ---------------------------- Dicts ---------------------------------- //

    fn emit_dict(&mut self, d: &Arc<DictTy>, name: &str) -> Result<(), EmitError> {
        if !self.reserve(name, &Ty::Dict(Arc::clone(d)))? {
            return Ok(());
        }

        // children first: resolving a field's type emits any declaration it needs
        let mut required = Vec::new();
        let mut optional = Vec::new();
        for field in d.fields() {
            let slot = format!("{name}__{}", field.name);
            let ty = match (&field.ty, field.required) {
                (Ty::Optional(inner), false) => inner.as_ref(),
                (ty, _) => ty,
            };
            let flat = self.flat_name(ty, &slot)?;
            if field.required {
                required.push((field.name.as_str(), flat));
            } else {
                optional.push((field.name.as_str(), flat));
            }
        }

        match self.target {
            Target::Pydantic => self.write_pydantic_class(name, &required, &optional),
            Target::Rust => self.write_rust_struct(name, &required, &optional),
        }
        Ok(())
    }

    fn write_pydantic_class(&mut self, name: &str, required: &[(&str, String)], optional: &[(&str, String)]) {
        let core = if optional.is_empty() { name.to_string() } else { format!("{name}_core") };

        let mut s = format!("class {core}(BaseModel):\n");
        if required.is_empty() {
            s.push_str("    pass\n");
        }
        for (key, ty) in required {
            s.push_str(&format!("    {key}: {ty}\n"));
        }
        s.push_str("\n\n");

        if !optional.is_empty() {
            s.push_str(&format!("class {name}({core}):\n"));
            for (key, ty) in optional {
                s.push_str(&format!("    {key}: Optional[{ty}] = None\n"));
            }
            s.push_str("\n\n");
        }
        self.out.push_str(&s);
    }

    fn write_rust_struct(&mut self, name: &str, required: &[(&str, String)], optional: &[(&str, String)]) {
        let core = if optional.is_empty() { name.to_string() } else { format!("{name}_core") };

        let mut s = String::new();
        s.push_str(RUST_STRUCT_HEADER);
        s.push_str(&format!("pub struct {core} {{\n"));
        let mut used = Vec::new();
        for (key, ty) in required {
            push_rust_field(&mut s, &mut used, key, &format!("pub {{}}: {ty},"), None);
        }
        s.push_str("}\n\n");

        if !optional.is_empty() {
            let mut base = "core".to_string();
            while optional.iter().any(|(k, _)| rust_field_ident(k).0 == base) {
                base.push('_');
            }
            s.push_str(RUST_STRUCT_HEADER);
            s.push_str(&format!("pub struct {name} {{\n"));
            s.push_str("    #[serde(flatten)]\n");
            s.push_str(&format!("    pub {base}: {core},\n"));
            let mut used = vec![base];
            for (key, ty) in optional {
                push_rust_field(
                    &mut s,
                    &mut used,
                    key,
                    &format!("pub {{}}: Option<{ty}>,"),
                    Some("default, skip_serializing_if = \"Option::is_none\""),
                );
            }
            s.push_str("}\n\n");
        }
        self.out.push_str(&s);
    }

    // --------------------------- Literals -------------------------------- //

    fn literal_type(&mut self, ty: &Ty, lits: &[Value], slot: &str) -> Result<String, EmitError> {
        if self.target == Target::Pydantic {
            let xs: Vec<String> = lits.iter().map(python_literal).collect();
            return Ok(format!("Literal[{}]", xs.join(", ")));
        }
        if lits.iter().all(Value::is_string) {
            return self.emit_rust_enum(ty, lits, slot);
        }
        Ok(rust_scalar_for(lits).to_string())
    }

    fn emit_rust_enum(&mut self, ty: &Ty, lits: &[Value], name: &str) -> Result<String, EmitError> {
        if !self.reserve(name, ty)? {
            return Ok(name.to_string());
        }
        let mut s = String::new();
        s.push_str("#[allow(non_camel_case_types)]\n");
        s.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]\n");
        s.push_str(&format!("pub enum {name} {{\n"));
        let mut used: Vec<String> = Vec::new();
        for lit in lits.iter().filter_map(Value::as_str) {
            let mut variant = variant_ident(lit);
            if used.contains(&variant) {
                let mut n = 2;
                while used.contains(&format!("{variant}{n}")) {
                    n += 1;
                }
                variant = format!("{variant}{n}");
            }
            s.push_str(&format!("    #[serde(rename = {lit:?})]\n    {variant},\n"));
            used.push(variant);
        }
        s.push_str("}\n\n");
        self.out.push_str(&s);
        Ok(name.to_string())
    }

    fn emit_rust_union(&mut self, ty: &Ty, alts: &[Ty], name: &str) -> Result<String, EmitError> {
        if !self.reserve(name, ty)? {
            return Ok(name.to_string());
        }
        let arms = self.positional(alts, name)?;
        let mut s = String::new();
        s.push_str(RUST_STRUCT_HEADER);
        s.push_str("#[serde(untagged)]\n");
        s.push_str(&format!("pub enum {name} {{\n"));
        for (i, arm) in arms.iter().enumerate() {
            s.push_str(&format!("    V{i}({arm}),\n"));
        }
        s.push_str("}\n\n");
        self.out.push_str(&s);
        Ok(name.to_string())
    }
}

// ------------------------------ Helpers ---------------------------------- //

const RUST_STRUCT_HEADER: &str =
    "#[allow(non_camel_case_types)]\n#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]\n";

/// Nodes that become their own named declaration in Rust output.
fn rust_needs_decl(ty: &Ty) -> bool {
    match ty {
        Ty::Union(_) => true,
        Ty::Enum(lits) => lits.iter().all(Value::is_string),
        Ty::Equals(lit) => lit.is_string(),
        _ => false,
    }
}

fn rust_scalar_for(lits: &[Value]) -> &'static str {
    if lits.iter().all(Value::is_null) {
        "()"
    } else if lits.iter().all(Value::is_boolean) {
        "bool"
    } else if lits.iter().all(|v| v.is_i64() || v.is_u64()) {
        "i64"
    } else if lits.iter().all(Value::is_number) {
        "f64"
    } else {
        "serde_json::Value"
    }
}

fn python_literal(v: &Value) -> String {
    match v {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        other => other.to_string(),
    }
}

static RUST_IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"));

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern", "false",
    "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref",
    "return", "static", "struct", "trait", "true", "type", "unsafe", "use", "where", "while",
    "abstract", "become", "box", "do", "final", "gen", "macro", "override", "priv", "try",
    "typeof", "unsized", "virtual", "yield",
];

// keywords that cannot be raw identifiers
const RUST_NON_RAW: &[&str] = &["self", "Self", "super", "crate", "_"];

/// Field identifier for a JSON key, plus the key itself when a serde rename is needed.
fn rust_field_ident(key: &str) -> (String, Option<&str>) {
    if RUST_NON_RAW.contains(&key) {
        return (format!("{key}_"), Some(key));
    }
    if RUST_IDENT.is_match(key) {
        if RUST_KEYWORDS.contains(&key) {
            return (format!("r#{key}"), None);
        }
        return (key.to_string(), None);
    }
    let mut ident: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if !ident.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        ident.insert(0, '_');
    }
    (ident, Some(key))
}

/// `decl` holds a `{}` placeholder for the identifier. `used` collects the
/// identifiers already taken in the struct being written.
fn push_rust_field(s: &mut String, used: &mut Vec<String>, key: &str, decl: &str, serde_args: Option<&str>) {
    let (mut ident, mut rename) = rust_field_ident(key);
    if used.contains(&ident) {
        let mut n = 2;
        while used.contains(&format!("{ident}_{n}")) {
            n += 1;
        }
        ident = format!("{ident}_{n}");
        rename = Some(key);
    }
    used.push(ident.clone());
    let mut args: Vec<String> = Vec::new();
    if let Some(original) = rename {
        args.push(format!("rename = {original:?}"));
    }
    if let Some(extra) = serde_args {
        args.push(extra.to_string());
    }
    if !args.is_empty() {
        s.push_str(&format!("    #[serde({})]\n", args.join(", ")));
    }
    s.push_str("    ");
    s.push_str(&decl.replacen("{}", &ident, 1));
    s.push('\n');
}

fn variant_ident(lit: &str) -> String {
    let mut out = String::new();
    for part in lit.split(|c: char| !c.is_ascii_alphanumeric()).filter(|p| !p.is_empty()) {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars);
        }
    }
    if !out.starts_with(|c: char| c.is_ascii_alphabetic()) {
        out.insert(0, 'V');
    }
    out
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{event_dict, fields};

    fn eq(s: &str) -> Ty {
        Ty::equals(s).unwrap()
    }

    #[test]
    fn pydantic_simple_event() {
        let ty = event_dict(fields([("type", eq("alert_words")), ("alert_words", Ty::list(Ty::Str))]), vec![]).unwrap();
        let mut cg = Codegen::new(Target::Pydantic);
        cg.emit(&ty, "alert_words_event").unwrap();
        assert_eq!(
            cg.source(),
            "class alert_words_event(BaseModel):\n    type: Literal[\"alert_words\"]\n    alert_words: List[str]\n    id: int\n\n\n"
        );
    }

    #[test]
    fn nested_dict_is_named_and_emitted_first() {
        let attachment = Ty::dict(fields([("id", Ty::Int)]), vec![]).unwrap();
        let ty = event_dict(
            fields([("type", eq("attachment")), ("op", eq("remove")), ("attachment", attachment)]),
            vec![],
        )
        .unwrap();
        let mut cg = Codegen::new(Target::Pydantic);
        cg.emit(&ty, "attachment_remove_event").unwrap();
        let src = cg.source();
        let child = src.find("class attachment_remove_event__attachment(BaseModel):").unwrap();
        let parent = src.find("class attachment_remove_event(BaseModel):").unwrap();
        assert!(child < parent);
        assert!(src.contains("    attachment: attachment_remove_event__attachment\n"));
    }

    #[test]
    fn explicit_name_wins_and_shared_node_emits_once() {
        let attachment = Ty::named_dict("Attachment", fields([("id", Ty::Int), ("name", Ty::Str)]), vec![]).unwrap();
        let add = event_dict(fields([("type", eq("attachment")), ("attachment", attachment.clone())]), vec![]).unwrap();
        let update = event_dict(fields([("type", eq("attachment")), ("attachment", attachment)]), vec![]).unwrap();
        let mut cg = Codegen::new(Target::Pydantic);
        cg.emit(&add, "attachment_add_event").unwrap();
        cg.emit(&update, "attachment_update_event").unwrap();
        let src = cg.into_string();
        assert_eq!(src.matches("class Attachment(BaseModel):").count(), 1);
        assert_eq!(src.matches("    attachment: Attachment\n").count(), 2);
    }

    #[test]
    fn emit_is_idempotent() {
        let ty = event_dict(fields([("type", eq("heartbeat"))]), vec![]).unwrap();
        let mut cg = Codegen::new(Target::Pydantic);
        cg.emit(&ty, "heartbeat_event").unwrap();
        let first = cg.source().to_string();
        cg.emit(&ty, "heartbeat_event").unwrap();
        cg.emit(&ty, "heartbeat_event").unwrap();
        assert_eq!(cg.source(), first);
        assert_eq!(cg.emitted_names().filter(|n| *n == "heartbeat_event").count(), 1);
    }

    #[test]
    fn optional_fields_split_into_core_and_full() {
        let ty = event_dict(
            fields([("type", eq("delete_message")), ("message_type", Ty::enumeration(["private", "stream"]).unwrap())]),
            fields([("message_ids", Ty::list(Ty::Int)), ("topic", Ty::optional(Ty::Str))]),
        )
        .unwrap();
        let mut cg = Codegen::new(Target::Pydantic);
        cg.emit(&ty, "delete_message_event").unwrap();
        assert_eq!(
            cg.source(),
            concat!(
                "class delete_message_event_core(BaseModel):\n",
                "    type: Literal[\"delete_message\"]\n",
                "    message_type: Literal[\"private\", \"stream\"]\n",
                "    id: int\n",
                "\n\n",
                "class delete_message_event(delete_message_event_core):\n",
                "    message_ids: Optional[List[int]] = None\n",
                "    topic: Optional[str] = None\n",
                "\n\n",
            )
        );
    }

    #[test]
    fn empty_required_core_gets_pass() {
        let ty = Ty::dict(vec![], fields([("away", Ty::Bool)])).unwrap();
        let mut cg = Codegen::new(Target::Pydantic);
        cg.emit(&ty, "status").unwrap();
        assert!(cg.source().starts_with("class status_core(BaseModel):\n    pass\n"));
    }

    #[test]
    fn structurally_different_node_under_taken_name_is_rejected() {
        let a = Ty::dict(fields([("x", Ty::Int)]), vec![]).unwrap();
        let b = Ty::dict(fields([("x", Ty::Str)]), vec![]).unwrap();
        let same_as_a = Ty::dict(fields([("x", Ty::Int)]), vec![]).unwrap();
        let mut cg = Codegen::new(Target::Pydantic);
        cg.emit(&a, "thing").unwrap();
        cg.emit(&same_as_a, "thing").unwrap();
        let err = cg.emit(&b, "thing").unwrap_err();
        assert_eq!(err, EmitError::NameCollision { name: "thing".into(), kind: "dict" });
    }

    #[test]
    fn synthesized_name_collision_is_detected() {
        let inner_a = Ty::dict(fields([("x", Ty::Int)]), vec![]).unwrap();
        let inner_b = Ty::dict(fields([("y", Ty::Int)]), vec![]).unwrap();
        let p = Ty::dict(fields([("b__c", inner_a)]), vec![]).unwrap();
        let q = Ty::dict(fields([("c", inner_b)]), vec![]).unwrap();
        let mut cg = Codegen::new(Target::Pydantic);
        cg.emit(&p, "a").unwrap();
        assert!(cg.is_emitted("a__b__c"));
        assert!(matches!(cg.emit(&q, "a__b"), Err(EmitError::NameCollision { .. })));
    }

    #[test]
    fn dicts_behind_wrappers_get_positional_names() {
        let one = Ty::dict(fields([("a", Ty::Int)]), vec![]).unwrap();
        let two = Ty::dict(fields([("b", Ty::Int)]), vec![]).unwrap();
        let ty = Ty::dict(
            fields([
                ("data", Ty::union(vec![one.clone(), two]).unwrap()),
                ("rows", Ty::list(one)),
            ]),
            vec![],
        )
        .unwrap();
        let mut cg = Codegen::new(Target::Pydantic);
        cg.emit(&ty, "ev").unwrap();
        let src = cg.source();
        assert!(src.contains("    data: Union[ev__data__0, ev__data__1]\n"));
        // same node, so the name assigned first is reused
        assert!(src.contains("    rows: List[ev__data__0]\n"));
    }

    #[test]
    fn pydantic_leaf_names() {
        let mut cg = Codegen::new(Target::Pydantic);
        let t = Ty::tuple(vec![Ty::Str, Ty::Str, Ty::Int]);
        assert_eq!(cg.flat_name(&Ty::list(t), "x").unwrap(), "List[Tuple[str, str, int]]");
        assert_eq!(cg.flat_name(&Ty::Number, "x").unwrap(), "Union[float, int]");
        assert_eq!(cg.flat_name(&Ty::none(), "x").unwrap(), "Literal[None]");
        assert_eq!(cg.flat_name(&Ty::string_dict(Ty::AnyDict), "x").unwrap(), "Dict[str, Dict[str, Any]]");
        assert_eq!(cg.flat_name(&Ty::Url, "x").unwrap(), "str");
        assert!(cg.source().is_empty());
    }

    #[test]
    fn rust_struct_with_core_and_keyword_fields() {
        let ty = event_dict(
            fields([("type", eq("typing")), ("message-type", Ty::Str)]),
            fields([("stream_id", Ty::Int)]),
        )
        .unwrap();
        let mut cg = Codegen::new(Target::Rust);
        cg.emit(&ty, "typing_event").unwrap();
        let src = cg.source();
        assert_eq!(
            src,
            concat!(
                "#[allow(non_camel_case_types)]\n",
                "#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]\n",
                "pub enum typing_event__type {\n",
                "    #[serde(rename = \"typing\")]\n",
                "    Typing,\n",
                "}\n\n",
                "#[allow(non_camel_case_types)]\n",
                "#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]\n",
                "pub struct typing_event_core {\n",
                "    pub r#type: typing_event__type,\n",
                "    #[serde(rename = \"message-type\")]\n",
                "    pub message_type: String,\n",
                "    pub id: i64,\n",
                "}\n\n",
                "#[allow(non_camel_case_types)]\n",
                "#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]\n",
                "pub struct typing_event {\n",
                "    #[serde(flatten)]\n",
                "    pub core: typing_event_core,\n",
                "    #[serde(default, skip_serializing_if = \"Option::is_none\")]\n",
                "    pub stream_id: Option<i64>,\n",
                "}\n\n",
            )
        );
    }

    #[test]
    fn rust_unions_and_scalars() {
        let value = Ty::union(vec![Ty::Bool, Ty::Int, Ty::Str, Ty::none()]).unwrap();
        let mut cg = Codegen::new(Target::Rust);
        assert_eq!(cg.flat_name(&value, "ev__value").unwrap(), "ev__value");
        assert!(cg.source().contains("#[serde(untagged)]\npub enum ev__value {\n    V0(bool),\n    V1(i64),\n    V2(String),\n    V3(()),\n}\n"));
        assert_eq!(cg.flat_name(&Ty::enumeration([1, 2, 3]).unwrap(), "x").unwrap(), "i64");
        assert_eq!(cg.flat_name(&Ty::tuple(vec![Ty::Number]), "x").unwrap(), "(f64,)");
        assert_eq!(
            cg.flat_name(&Ty::string_dict(Ty::optional(Ty::Url)), "x").unwrap(),
            "indexmap::IndexMap<String, Option<String>>"
        );
    }

    #[test]
    fn rust_top_level_enum_is_declared_directly() {
        let ty = Ty::enumeration(["unicode_emoji", "realm_emoji", "text/html"]).unwrap();
        let mut cg = Codegen::new(Target::Rust);
        cg.emit(&ty, "ReactionType").unwrap();
        let src = cg.into_string();
        assert!(src.starts_with("use serde::{Deserialize, Serialize};\n"));
        assert!(src.contains("pub enum ReactionType {\n"));
        assert!(src.contains("    #[serde(rename = \"text/html\")]\n    TextHtml,\n"));
        assert!(!src.contains("pub type"));
    }

    #[test]
    fn top_level_alias_for_non_dict() {
        let mut cg = Codegen::new(Target::Pydantic);
        cg.emit(&Ty::list(Ty::Int), "UserIds").unwrap();
        assert_eq!(cg.source(), "UserIds = List[int]\n\n\n");
        let mut cg = Codegen::new(Target::Rust);
        cg.emit(&Ty::list(Ty::Int), "UserIds").unwrap();
        assert_eq!(cg.source(), "pub type UserIds = Vec<i64>;\n\n");
    }

    #[test]
    fn identifiers() {
        assert_eq!(rust_field_ident("type"), ("r#type".to_string(), None));
        assert_eq!(rust_field_ident("self"), ("self_".to_string(), Some("self")));
        assert_eq!(rust_field_ident("2fa"), ("_2fa".to_string(), Some("2fa")));
        assert_eq!(variant_ident("zulip_extra_emoji"), "ZulipExtraEmoji");
        assert_eq!(variant_ident("1st"), "V1st");
        assert_eq!(variant_ident(""), "V");
    }

    #[test]
    fn top_level_wrapper_around_anonymous_dict() {
        let row = Ty::dict(fields([("id", Ty::Int)]), vec![]).unwrap();

        let mut cg = Codegen::new(Target::Pydantic);
        cg.emit(&Ty::list(row.clone()), "Rows").unwrap();
        assert_eq!(
            cg.source(),
            "class Rows__inner(BaseModel):\n    id: int\n\n\nRows = List[Rows__inner]\n\n\n"
        );

        let mut cg = Codegen::new(Target::Rust);
        cg.emit(&Ty::optional(row.clone()), "MaybeRow").unwrap();
        let src = cg.source();
        let decl = src.find("pub struct MaybeRow__inner {\n    pub id: i64,\n}\n").unwrap();
        let alias = src.find("pub type MaybeRow = Option<MaybeRow__inner>;\n").unwrap();
        assert!(decl < alias);

        let mut cg = Codegen::new(Target::Rust);
        cg.emit(&Ty::string_dict(Ty::tuple(vec![Ty::Str, row])), "Pairs").unwrap();
        assert!(cg.source().contains("pub struct Pairs__inner__1 {\n"));
        assert!(cg.source().contains("pub type Pairs = indexmap::IndexMap<String, (String, Pairs__inner__1)>;\n"));
    }

    #[test]
    fn external_names_are_referenced_but_not_written() {
        let group = Ty::named_dict("AnonymousSettingGroupDict", fields([("direct_members", Ty::list(Ty::Int))]), vec![])
            .unwrap();
        let ty = event_dict(fields([("type", eq("realm")), ("value", group)]), vec![]).unwrap();
        let mut cg = Codegen::with_external(Target::Pydantic, ["AnonymousSettingGroupDict"]);
        cg.emit(&ty, "realm_update_event").unwrap();
        let src = cg.source();
        assert!(src.contains("    value: AnonymousSettingGroupDict\n"));
        assert!(!src.contains("class AnonymousSettingGroupDict"));
        assert!(cg.is_external("AnonymousSettingGroupDict"));
        assert!(!cg.is_emitted("AnonymousSettingGroupDict"));
    }

    #[test]
    fn rust_fields_that_sanitize_alike_stay_distinct() {
        let ty = Ty::dict(fields([("a-b", Ty::Int), ("a_b", Ty::Str)]), fields([("c d", Ty::Bool), ("c_d", Ty::Bool)]))
            .unwrap();
        let mut cg = Codegen::new(Target::Rust);
        cg.emit(&ty, "pair").unwrap();
        let src = cg.source();
        assert!(src.contains("    #[serde(rename = \"a-b\")]\n    pub a_b: i64,\n"));
        assert!(src.contains("    #[serde(rename = \"a_b\")]\n    pub a_b_2: String,\n"));
        assert!(src.contains("    pub c_d: Option<bool>,\n"));
        assert!(src.contains("    #[serde(rename = \"c_d\", default, skip_serializing_if = \"Option::is_none\")]\n    pub c_d_2: Option<bool>,\n"));
    }
}
