//! Declarative schema catalog.
//!
//! A catalog is a JSON document naming reusable definitions and the top-level
//! schemas built from them:
//!
//! ```json
//! {
//!   "definitions": [
//!     {"name": "Attachment", "type": {"kind": "dict", "required": [{"key": "id", "type": {"kind": "int"}}]}}
//!   ],
//!   "schemas": [
//!     {"name": "attachment_add_event", "event": true, "type": {"kind": "dict", "required": [
//!       {"key": "type", "type": {"kind": "equals", "value": "attachment"}},
//!       {"key": "attachment", "type": {"kind": "ref", "name": "Attachment"}}
//!     ]}}
//!   ]
//! }
//! ```
//!
//! A `ref` resolves to the very node built for the definition, so shared
//! sub-schemas keep one identity. Only earlier definitions can be referenced.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::ir::{event_dict, DictTy, SchemaError, Ty};
use crate::path_de::{from_str_with_path, PathError};

// ---------------------------- Document form ------------------------------ //

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogDoc {
    /// Declaration names provided by imports in generated code.
    #[serde(default)]
    pub external: Vec<String>,
    #[serde(default)]
    pub definitions: Vec<DefinitionDoc>,
    pub schemas: Vec<SchemaDoc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefinitionDoc {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TyDoc,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDoc {
    pub name: String,
    /// Route through the event wrapper (`type` required, `id` injected).
    #[serde(default)]
    pub event: bool,
    /// Recorded-call checker name, when it does not follow `check_<name>`.
    #[serde(default)]
    pub checker: Option<String>,
    #[serde(rename = "type")]
    pub ty: TyDoc,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDoc {
    pub key: String,
    #[serde(rename = "type")]
    pub ty: TyDoc,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TyDoc {
    Int,
    Str,
    Bool,
    AnyDict,
    Number,
    Url,
    Enum { values: Vec<Value> },
    Equals { value: Value },
    List {
        item: Box<TyDoc>,
        #[serde(default)]
        length: Option<usize>,
    },
    StringDict { value: Box<TyDoc> },
    Optional { inner: Box<TyDoc> },
    Tuple { elems: Vec<TyDoc> },
    Union { alternatives: Vec<TyDoc> },
    Dict {
        #[serde(default)]
        required: Vec<FieldDoc>,
        #[serde(default)]
        optional: Vec<FieldDoc>,
    },
    Ref { name: String },
}

// ------------------------------- Errors ---------------------------------- //

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog document: {0}")]
    Parse(#[from] PathError),
    #[error("`{at}` references unknown definition `{name}`")]
    UnknownRef { name: String, at: String },
    #[error("duplicate catalog name `{name}`")]
    DuplicateName { name: String },
    #[error("event schema `{name}` must be a dict")]
    EventNotDict { name: String },
    #[error("`{at}`: {source}")]
    Schema {
        at: String,
        #[source]
        source: SchemaError,
    },
}

// ------------------------------- Catalog --------------------------------- //

#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub event: bool,
    pub checker: Option<String>,
    pub ty: Ty,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    external: Vec<String>,
    definitions: IndexMap<String, Ty>,
    schemas: IndexMap<String, Entry>,
}

impl Catalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_json_str(&src)?;
        tracing::debug!(
            path = %path.display(),
            definitions = catalog.definitions.len(),
            schemas = catalog.schemas.len(),
            "loaded schema catalog"
        );
        Ok(catalog)
    }

    pub fn from_json_str(src: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDoc = from_str_with_path(src)?;
        Self::from_doc(doc)
    }

    pub fn from_doc(doc: CatalogDoc) -> Result<Self, CatalogError> {
        let mut catalog = Self { external: doc.external, ..Self::default() };
        for def in doc.definitions {
            let ty = catalog.build(&def.ty, &def.name, Some(&def.name))?;
            catalog.define(def.name, ty)?;
        }
        for schema in doc.schemas {
            let ty = if schema.event {
                let TyDoc::Dict { required, optional } = &schema.ty else {
                    return Err(CatalogError::EventNotDict { name: schema.name });
                };
                let required = catalog.build_fields(required, &schema.name)?;
                let optional = catalog.build_fields(optional, &schema.name)?;
                event_dict(required, optional).map_err(|source| CatalogError::Schema {
                    at: schema.name.clone(),
                    source,
                })?
            } else {
                catalog.build(&schema.ty, &schema.name, None)?
            };
            catalog.insert(Entry {
                name: schema.name,
                event: schema.event,
                checker: schema.checker,
                ty,
            })?;
        }
        Ok(catalog)
    }

    /// Register a reusable definition.
    pub fn define(&mut self, name: impl Into<String>, ty: Ty) -> Result<(), CatalogError> {
        let name = name.into();
        if self.definitions.contains_key(&name) {
            return Err(CatalogError::DuplicateName { name });
        }
        self.definitions.insert(name, ty);
        Ok(())
    }

    /// Register a top-level schema.
    pub fn insert(&mut self, entry: Entry) -> Result<(), CatalogError> {
        if self.schemas.contains_key(&entry.name) {
            return Err(CatalogError::DuplicateName { name: entry.name });
        }
        self.schemas.insert(entry.name.clone(), entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.schemas.get(name)
    }

    pub fn externals(&self) -> impl Iterator<Item = &str> {
        self.external.iter().map(String::as_str)
    }

    pub fn definition(&self, name: &str) -> Option<&Ty> {
        self.definitions.get(name)
    }

    /// Top-level schemas in declaration order.
    pub fn schemas(&self) -> impl Iterator<Item = &Entry> {
        self.schemas.values()
    }

    pub fn events(&self) -> impl Iterator<Item = &Entry> {
        self.schemas.values().filter(|e| e.event)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Schema validated by a recorded checker call: an explicit `checker`
    /// entry first, then `check_<x>` as `<x>` or `<x>_event`.
    pub fn resolve_checker(&self, checker: &str) -> Option<&Entry> {
        if let Some(entry) = self.schemas.values().find(|e| e.checker.as_deref() == Some(checker)) {
            return Some(entry);
        }
        let base = checker.strip_prefix("check_").unwrap_or(checker);
        self.schemas
            .get(base)
            .or_else(|| self.schemas.get(&format!("{base}_event")))
    }

    // ---------------------------- Building ------------------------------- //

    fn build(&self, doc: &TyDoc, at: &str, decl_name: Option<&str>) -> Result<Ty, CatalogError> {
        let schema_err = |source| CatalogError::Schema { at: at.to_string(), source };
        Ok(match doc {
            TyDoc::Int => Ty::Int,
            TyDoc::Str => Ty::Str,
            TyDoc::Bool => Ty::Bool,
            TyDoc::AnyDict => Ty::AnyDict,
            TyDoc::Number => Ty::Number,
            TyDoc::Url => Ty::Url,
            TyDoc::Enum { values } => Ty::enumeration(values.iter().cloned()).map_err(schema_err)?,
            TyDoc::Equals { value } => Ty::equals(value.clone()).map_err(schema_err)?,
            TyDoc::List { item, length } => {
                let item = self.build(item, at, None)?;
                match length {
                    Some(n) => Ty::list_of_len(item, *n),
                    None => Ty::list(item),
                }
            }
            TyDoc::StringDict { value } => Ty::string_dict(self.build(value, at, None)?),
            TyDoc::Optional { inner } => Ty::optional(self.build(inner, at, None)?),
            TyDoc::Tuple { elems } => Ty::tuple(self.build_all(elems, at)?),
            TyDoc::Union { alternatives } => Ty::union(self.build_all(alternatives, at)?).map_err(schema_err)?,
            TyDoc::Dict { required, optional } => {
                let required = self.build_fields(required, at)?;
                let optional = self.build_fields(optional, at)?;
                let dict = DictTy::new(decl_name.map(str::to_string), required, optional).map_err(schema_err)?;
                Ty::Dict(Arc::new(dict))
            }
            TyDoc::Ref { name } => match self.definitions.get(name) {
                Some(ty) => ty.clone(),
                None => {
                    return Err(CatalogError::UnknownRef { name: name.clone(), at: at.to_string() });
                }
            },
        })
    }

    fn build_all(&self, docs: &[TyDoc], at: &str) -> Result<Vec<Ty>, CatalogError> {
        docs.iter().map(|d| self.build(d, at, None)).collect()
    }

    fn build_fields(&self, docs: &[FieldDoc], at: &str) -> Result<Vec<(String, Ty)>, CatalogError> {
        docs.iter()
            .map(|f| Ok((f.key.clone(), self.build(&f.ty, &format!("{at}.{}", f.key), None)?)))
            .collect()
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{Codegen, Target};
    use crate::sample::{Sampler, DEFAULT_BOUND};
    use crate::schema_text::schema_text;
    use crate::validate::validate;
    use serde_json::json;

    const CATALOG: &str = r#"{
        "definitions": [
            {"name": "Attachment", "type": {"kind": "dict", "required": [
                {"key": "id", "type": {"kind": "int"}},
                {"key": "name", "type": {"kind": "str"}}
            ]}}
        ],
        "schemas": [
            {"name": "heartbeat_event", "event": true, "type": {"kind": "dict", "required": [
                {"key": "type", "type": {"kind": "equals", "value": "heartbeat"}}
            ]}},
            {"name": "attachment_add_event", "event": true, "type": {"kind": "dict", "required": [
                {"key": "type", "type": {"kind": "equals", "value": "attachment"}},
                {"key": "op", "type": {"kind": "equals", "value": "add"}},
                {"key": "attachment", "type": {"kind": "ref", "name": "Attachment"}}
            ]}},
            {"name": "drafts_add_event", "event": true, "checker": "check_draft_add", "type": {"kind": "dict",
                "required": [
                    {"key": "type", "type": {"kind": "equals", "value": "drafts"}},
                    {"key": "drafts", "type": {"kind": "list", "item": {"kind": "ref", "name": "Attachment"}}}
                ],
                "optional": [
                    {"key": "value", "type": {"kind": "union", "alternatives": [{"kind": "equals", "value": null}, {"kind": "str"}]}}
                ]
            }},
            {"name": "UserIds", "type": {"kind": "list", "item": {"kind": "int"}, "length": 2}}
        ]
    }"#;

    #[test]
    fn loads_schemas_in_order_with_shared_refs() {
        let catalog = Catalog::from_json_str(CATALOG).unwrap();
        let names: Vec<_> = catalog.schemas().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["heartbeat_event", "attachment_add_event", "drafts_add_event", "UserIds"]);
        assert_eq!(catalog.events().count(), 3);

        let def = catalog.definition("Attachment").unwrap().as_dict().unwrap();
        assert_eq!(def.name(), Some("Attachment"));
        let add = catalog.get("attachment_add_event").unwrap().ty.as_dict().unwrap();
        let field = add.field("attachment").unwrap();
        assert!(Arc::ptr_eq(field.ty.as_dict().unwrap(), def));
        // event wrapper injected the id
        assert_eq!(add.fields().last().unwrap().name, "id");

        let ids = &catalog.get("UserIds").unwrap().ty;
        assert_eq!(ids, &Ty::list_of_len(Ty::Int, 2));
    }

    #[test]
    fn resolves_checker_names() {
        let catalog = Catalog::from_json_str(CATALOG).unwrap();
        assert_eq!(catalog.resolve_checker("check_heartbeat").unwrap().name, "heartbeat_event");
        assert_eq!(catalog.resolve_checker("check_draft_add").unwrap().name, "drafts_add_event");
        assert_eq!(catalog.resolve_checker("heartbeat_event").unwrap().name, "heartbeat_event");
        assert!(catalog.resolve_checker("check_nothing").is_none());
    }

    #[test]
    fn construction_errors_are_fatal() {
        let doc = json!({"schemas": [{"name": "x", "event": true, "type": {"kind": "dict", "required": [
            {"key": "op", "type": {"kind": "str"}}
        ]}}]});
        let err = Catalog::from_json_str(&doc.to_string()).unwrap_err();
        assert!(matches!(err, CatalogError::Schema { source: SchemaError::MissingTypeField, .. }));

        let doc = json!({"schemas": [{"name": "x", "type": {"kind": "ref", "name": "Nope"}}]});
        let err = Catalog::from_json_str(&doc.to_string()).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownRef { ref name, .. } if name == "Nope"));

        let doc = json!({"schemas": [{"name": "x", "event": true, "type": {"kind": "int"}}]});
        let err = Catalog::from_json_str(&doc.to_string()).unwrap_err();
        assert!(matches!(err, CatalogError::EventNotDict { .. }));

        let doc = json!({"schemas": [
            {"name": "x", "type": {"kind": "int"}},
            {"name": "x", "type": {"kind": "str"}}
        ]});
        let err = Catalog::from_json_str(&doc.to_string()).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateName { .. }));

        let doc = json!({"schemas": [{"name": "x", "type": {"kind": "dict", "required": [
            {"key": "a", "type": {"kind": "int"}},
            {"key": "a", "type": {"kind": "int"}}
        ]}}]});
        let err = Catalog::from_json_str(&doc.to_string()).unwrap_err();
        assert!(matches!(err, CatalogError::Schema { source: SchemaError::DuplicateField { .. }, .. }));
    }

    #[test]
    fn parse_errors_carry_json_path() {
        let doc = json!({"schemas": [{"name": "x", "type": {"kind": "list"}}]});
        let err = Catalog::from_json_str(&doc.to_string()).unwrap_err();
        let CatalogError::Parse(err) = err else { panic!("expected parse error, got {err}") };
        assert!(err.path.starts_with("schemas[0]"), "{}", err.path);
    }

    const EVENTS: &str = include_str!("../schemas/events.json");

    #[test]
    fn event_catalog_loads() {
        let catalog = Catalog::from_json_str(EVENTS).unwrap();
        assert_eq!(catalog.len(), 23);
        assert_eq!(catalog.events().count(), 21);
        assert_eq!(catalog.externals().collect::<Vec<_>>(), vec!["AnonymousSettingGroupDict"]);
        assert_eq!(catalog.resolve_checker("check_presence").unwrap().name, "presence_event");
    }

    #[test]
    fn event_catalog_emits_for_every_target() {
        let catalog = Catalog::from_json_str(EVENTS).unwrap();
        for target in [Target::Pydantic, Target::Rust] {
            let mut cg = Codegen::with_external(target, catalog.externals());
            for entry in catalog.schemas() {
                cg.emit(&entry.ty, &entry.name).unwrap_or_else(|e| panic!("{}: {e}", entry.name));
            }
            for entry in catalog.schemas() {
                assert!(cg.is_emitted(&entry.name), "{} missing", entry.name);
            }
            assert!(!cg.is_emitted("AnonymousSettingGroupDict"));
            let src = cg.into_string();
            match target {
                Target::Pydantic => {
                    assert_eq!(src.matches("class Attachment(BaseModel):").count(), 1);
                    assert!(src.contains("TopicLinks = List[TopicLinks__inner]\n"));
                    assert!(src.contains("class presence_event(presence_event_core):\n    email: Optional[str] = None\n"));
                    assert!(!src.contains("class AnonymousSettingGroupDict"));
                }
                Target::Rust => {
                    assert!(src.contains("pub type TopicLinks = Vec<TopicLinks__inner>;\n"));
                    assert!(src.contains("    V1(AnonymousSettingGroupDict),\n"));
                    assert!(!src.contains("pub struct AnonymousSettingGroupDict"));
                }
            }
        }
    }

    #[test]
    fn event_catalog_samples_pass_validation() {
        let catalog = Catalog::from_json_str(EVENTS).unwrap();
        let mut sampler = Sampler::seeded(17);
        for entry in catalog.schemas() {
            let samples = sampler.sample(&entry.ty);
            assert!(!samples.is_empty(), "{} has no samples", entry.name);
            assert!(samples.len() <= DEFAULT_BOUND);
            for sample in &samples {
                if let Err(err) = validate(&entry.ty, "event", sample) {
                    panic!("{}: {err} in {sample}", entry.name);
                }
            }
            assert!(!schema_text(&entry.ty, &entry.name).is_empty());
        }
        let heartbeat = sampler.sample(&catalog.get("heartbeat_event").unwrap().ty);
        assert_eq!(heartbeat, vec![json!({"type": "heartbeat", "id": 42}), json!({"type": "heartbeat", "id": 99})]);
    }
}
