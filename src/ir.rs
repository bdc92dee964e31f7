//! Schema node algebra. A closed set of variants describing the shape of an
//! event payload; everything else in the crate (validation, sampling, codegen,
//! schema text) is a recursive match over [`Ty`].
//!
//! Nodes are immutable once built. Dict nodes live behind an `Arc` so that a
//! sub-schema shared by many events is one node with one identity.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

// ------------------------------- Types ----------------------------------- //

#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    Int,
    Str,
    Bool,
    /// Any string-keyed map; contents unchecked.
    AnyDict,
    /// Integer or float.
    Number,
    /// String starting with `http://` or `https://`.
    Url,
    /// Membership in a non-empty set of primitive literals.
    Enum(Vec<Value>),
    /// Exactly one literal (degenerate enum).
    Equals(Value),
    List {
        item: Box<Ty>,
        /// Declared length. Documentation only; never enforced.
        length: Option<usize>,
    },
    StringDict(Box<Ty>),
    Optional(Box<Ty>),
    Tuple(Vec<Ty>),
    Union(Vec<Ty>),
    Dict(Arc<DictTy>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DictTy {
    name: Option<String>,
    fields: Vec<Field>, // required first, then optional; declaration order kept
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: Ty,
    pub required: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("duplicate field `{field}`")]
    DuplicateField { field: String },
    #[error("event schema must declare a required `type` field")]
    MissingTypeField,
    #[error("event schema must not declare `id`; it is added automatically")]
    ReservedIdField,
    #[error("enum must have at least one value")]
    EmptyEnum,
    #[error("union must have at least one alternative")]
    EmptyUnion,
    #[error("literal {value} is not a primitive value")]
    NonPrimitiveLiteral { value: String },
}

// ---------------------------- Constructors -------------------------------- //

/// Turn `(key, ty)` pairs into the owned field list the dict constructors take.
pub fn fields<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Ty)>) -> Vec<(String, Ty)> {
    pairs.into_iter().map(|(k, ty)| (k.into(), ty)).collect()
}

impl Ty {
    pub fn dict(required: Vec<(String, Ty)>, optional: Vec<(String, Ty)>) -> Result<Ty, SchemaError> {
        Ok(Ty::Dict(Arc::new(DictTy::new(None, required, optional)?)))
    }

    /// A dict with a declaration name chosen by the schema author. Codegen uses
    /// this name instead of synthesizing one from the referencing field.
    pub fn named_dict(
        name: impl Into<String>,
        required: Vec<(String, Ty)>,
        optional: Vec<(String, Ty)>,
    ) -> Result<Ty, SchemaError> {
        Ok(Ty::Dict(Arc::new(DictTy::new(Some(name.into()), required, optional)?)))
    }

    pub fn enumeration<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Result<Ty, SchemaError> {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(SchemaError::EmptyEnum);
        }
        for v in &values {
            check_primitive(v)?;
        }
        Ok(Ty::Enum(values))
    }

    pub fn equals(value: impl Into<Value>) -> Result<Ty, SchemaError> {
        let value = value.into();
        check_primitive(&value)?;
        Ok(Ty::Equals(value))
    }

    /// `Equals(null)`, the null marker.
    pub fn none() -> Ty {
        Ty::Equals(Value::Null)
    }

    pub fn list(item: Ty) -> Ty {
        Ty::List { item: Box::new(item), length: None }
    }

    pub fn list_of_len(item: Ty, length: usize) -> Ty {
        Ty::List { item: Box::new(item), length: Some(length) }
    }

    pub fn string_dict(value: Ty) -> Ty {
        Ty::StringDict(Box::new(value))
    }

    pub fn optional(inner: Ty) -> Ty {
        Ty::Optional(Box::new(inner))
    }

    pub fn tuple(elems: Vec<Ty>) -> Ty {
        Ty::Tuple(elems)
    }

    pub fn union(alternatives: Vec<Ty>) -> Result<Ty, SchemaError> {
        if alternatives.is_empty() {
            return Err(SchemaError::EmptyUnion);
        }
        Ok(Ty::Union(alternatives))
    }

    pub fn is_null_marker(&self) -> bool {
        matches!(self, Ty::Equals(Value::Null))
    }

    pub fn as_dict(&self) -> Option<&Arc<DictTy>> {
        match self {
            Ty::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Short variant label used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Ty::Int => "int",
            Ty::Str => "str",
            Ty::Bool => "bool",
            Ty::AnyDict => "dict",
            Ty::Number => "number",
            Ty::Url => "url",
            Ty::Enum(_) => "enum",
            Ty::Equals(_) => "equals",
            Ty::List { .. } => "list",
            Ty::StringDict(_) => "string_dict",
            Ty::Optional(_) => "optional",
            Ty::Tuple(_) => "tuple",
            Ty::Union(_) => "union",
            Ty::Dict(_) => "dict",
        }
    }
}

/// Event schemas are dicts with a required `type` discriminator. The `id` field
/// is reserved and appended here as a required integer.
pub fn event_dict(required: Vec<(String, Ty)>, optional: Vec<(String, Ty)>) -> Result<Ty, SchemaError> {
    check_unique(&required, &optional)?;
    if !required.iter().any(|(k, _)| k == "type") {
        return Err(SchemaError::MissingTypeField);
    }
    if required.iter().chain(optional.iter()).any(|(k, _)| k == "id") {
        return Err(SchemaError::ReservedIdField);
    }
    let mut required = required;
    required.push(("id".to_string(), Ty::Int));
    Ty::dict(required, optional)
}

impl DictTy {
    pub fn new(
        name: Option<String>,
        required: Vec<(String, Ty)>,
        optional: Vec<(String, Ty)>,
    ) -> Result<Self, SchemaError> {
        check_unique(&required, &optional)?;
        let mut fields = Vec::with_capacity(required.len() + optional.len());
        fields.extend(required.into_iter().map(|(name, ty)| Field { name, ty, required: true }));
        fields.extend(optional.into_iter().map(|(name, ty)| Field { name, ty, required: false }));
        Ok(Self { name, fields })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn required(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.required)
    }

    pub fn optional(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| !f.required)
    }

    pub fn has_optional(&self) -> bool {
        self.fields.iter().any(|f| !f.required)
    }

    pub fn field(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == key)
    }
}

// ------------------------------ Helpers ----------------------------------- //

fn check_unique(required: &[(String, Ty)], optional: &[(String, Ty)]) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for (k, _) in required.iter().chain(optional.iter()) {
        if !seen.insert(k.as_str()) {
            return Err(SchemaError::DuplicateField { field: k.clone() });
        }
    }
    Ok(())
}

fn check_primitive(v: &Value) -> Result<(), SchemaError> {
    match v {
        Value::Array(_) | Value::Object(_) => Err(SchemaError::NonPrimitiveLiteral { value: v.to_string() }),
        _ => Ok(()),
    }
}

// ------------------------------- Tests ------------------------------------ //
