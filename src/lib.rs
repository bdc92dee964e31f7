//! Schema descriptions for a push-notification event API.
//!
//! One schema tree ([`ir::Ty`]) drives four consumers: runtime validation of
//! payloads, bounded fixture generation, typed declaration emission and a
//! plain-text rendering for drift comparison.

pub mod catalog;
pub mod codegen;
pub mod ir;
pub mod jq_exec;
pub mod path_de;
pub mod replay;
pub mod sample;
pub mod schema_text;
pub mod validate;

pub use catalog::{Catalog, CatalogError, Entry};
pub use codegen::{Codegen, EmitError, Target};
pub use ir::{event_dict, fields, DictTy, Field, SchemaError, Ty};
pub use replay::{replay_calls, ReplayError, ReplayReport};
pub use sample::{SampleConfig, Sampler};
pub use schema_text::schema_text;
pub use validate::{validate, ConformanceError, FieldPath};
