//! Indented, human-readable shape descriptions for drift comparison against an
//! independently maintained reference schema.
//!
//! Nullability is not rendered: optional nodes render as their inner type and
//! null alternatives are dropped from unions.

use std::cmp::Ordering;

use serde_json::Value;

use crate::ir::Ty;

const INDENT: &str = "    ";

pub fn schema_text(ty: &Ty, var_name: &str) -> String {
    match ty {
        Ty::Int => format!("{var_name}: int"),
        Ty::Str | Ty::Url => format!("{var_name}: str"),
        Ty::Bool => format!("{var_name}: bool"),
        Ty::AnyDict => format!("{var_name}: dict"),
        Ty::Number => format!("{var_name}: number"),
        Ty::Enum(lits) => {
            let mut lits: Vec<&Value> = lits.iter().collect();
            lits.sort_by(|a, b| literal_order(a, b));
            let xs: Vec<String> = lits.iter().map(|v| v.to_string()).collect();
            format!("{var_name} in [{}]", xs.join(", "))
        }
        // the degenerate enum
        Ty::Equals(lit) => format!("{var_name} in [{lit}]"),
        Ty::List { item, .. } => block(var_name, "list", vec![schema_text(item, "type")]),
        Ty::StringDict(inner) => block(var_name, "string_dict", vec![schema_text(inner, "value")]),
        Ty::Optional(inner) => schema_text(inner, var_name),
        Ty::Tuple(elems) => {
            let mut parts: Vec<String> = elems
                .iter()
                .enumerate()
                .map(|(i, t)| schema_text(t, &i.to_string()))
                .collect();
            parts.sort();
            block(var_name, "tuple", parts)
        }
        Ty::Union(alts) => {
            let mut parts: Vec<String> = alts
                .iter()
                .filter(|t| !t.is_null_marker())
                .map(|t| schema_text(t, "type"))
                .collect();
            parts.sort();
            block(var_name, "union", parts)
        }
        Ty::Dict(d) => {
            let mut fields: Vec<_> = d.fields().iter().collect();
            fields.sort_by(|a, b| a.name.cmp(&b.name));
            let parts = fields.iter().map(|f| schema_text(&f.ty, &f.name)).collect();
            block(var_name, "dict", parts)
        }
    }
}

/// Null, then booleans, then numbers by value, then strings.
fn literal_order(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) | Value::Object(_) => 4,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)).then_with(|| a.to_string().cmp(&b.to_string())),
    }
}

fn block(var_name: &str, label: &str, children: Vec<String>) -> String {
    let mut out = format!("{var_name} ({label}):");
    for child in children {
        for line in child.lines() {
            out.push('\n');
            out.push_str(INDENT);
            out.push_str(line);
        }
    }
    out
}
