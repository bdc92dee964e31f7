//! Bounded combinatorial fixture generation.
//!
//! Every node yields a finite list of representative values. Dicts and tuples
//! fold their children in as a cartesian product; after each fold the working
//! set is cut back to `bound` entries by uniform random subsampling. The random
//! source is seeded explicitly so a corpus is reproducible from its seed.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use serde_json::{Map, Value, json};

use crate::ir::{DictTy, Ty};

// ------------------------------- Policy ---------------------------------- //

pub const DEFAULT_BOUND: usize = 40;
pub const DEFAULT_LIST_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleConfig {
    pub seed: u64,
    /// Maximum size of any intermediate or final sample set.
    pub bound: usize,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self { seed: 0, bound: DEFAULT_BOUND }
    }
}

// ------------------------------ Front API -------------------------------- //

pub struct Sampler {
    rng: StdRng,
    bound: usize,
    /// Largest working set carried out of any fold so far.
    peak: usize,
}

impl Sampler {
    /// A bound of zero would empty every corpus; it is raised to one.
    pub fn new(config: SampleConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            bound: config.bound.max(1),
            peak: 0,
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(SampleConfig { seed, ..SampleConfig::default() })
    }

    pub fn sample(&mut self, ty: &Ty) -> Vec<Value> {
        match ty {
            Ty::Int => vec![json!(42), json!(99)],
            Ty::Str => vec![json!("foo"), json!("bar")],
            Ty::Bool => vec![json!(true), json!(false)],
            Ty::AnyDict => vec![json!({"anonymous": "whatever"})],
            Ty::Number => vec![json!(100), json!(2.75)],
            Ty::Url => vec![json!("http://example.com")],
            Ty::Enum(lits) => lits.clone(),
            Ty::Equals(lit) => vec![lit.clone()],
            Ty::List { item, length } => {
                let n = length.unwrap_or(DEFAULT_LIST_LEN);
                self.sample(item)
                    .into_iter()
                    .map(|x| Value::Array(vec![x; n]))
                    .collect()
            }
            Ty::StringDict(inner) => self
                .sample(inner)
                .into_iter()
                .map(|v| json!({ "some_key": v }))
                .collect(),
            Ty::Optional(inner) => {
                let mut out = vec![Value::Null];
                out.extend(self.sample(inner));
                out
            }
            Ty::Tuple(elems) => self.sample_tuple(elems),
            Ty::Union(alts) => {
                let mut out = Vec::new();
                for alt in alts {
                    out.extend(self.sample(alt));
                }
                self.bounded(out, "union")
            }
            Ty::Dict(d) => self.sample_dict(d),
        }
    }

    // --------------------------- Products -------------------------------- //

    fn sample_dict(&mut self, d: &DictTy) -> Vec<Value> {
        let mut records: Vec<Map<String, Value>> = vec![Map::new()];

        for field in d.required() {
            let candidates = self.sample(&field.ty);
            let mut next = Vec::with_capacity(candidates.len() * records.len());
            for v in &candidates {
                for old in &records {
                    let mut rec = old.clone();
                    rec.insert(field.name.clone(), v.clone());
                    next.push(rec);
                }
            }
            records = self.bounded(next, &field.name);
        }

        for field in d.optional() {
            let candidates = self.sample(&field.ty);
            let mut next = Vec::with_capacity((candidates.len() + 1) * records.len());
            for v in &candidates {
                for old in &records {
                    let mut rec = old.clone();
                    rec.insert(field.name.clone(), v.clone());
                    next.push(rec);
                }
            }
            // key left out entirely
            next.extend(records.iter().cloned());
            records = self.bounded(next, &field.name);
        }

        records.into_iter().map(Value::Object).collect()
    }

    fn sample_tuple(&mut self, elems: &[Ty]) -> Vec<Value> {
        let mut rows: Vec<Vec<Value>> = vec![Vec::new()];
        for (i, elem) in elems.iter().enumerate() {
            let candidates = self.sample(elem);
            let mut next = Vec::with_capacity(candidates.len() * rows.len());
            for v in &candidates {
                for old in &rows {
                    let mut row = old.clone();
                    row.push(v.clone());
                    next.push(row);
                }
            }
            rows = self.bounded(next, &format!("tuple[{i}]"));
        }
        rows.into_iter().map(Value::Array).collect()
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    pub fn peak(&self) -> usize {
        self.peak
    }

    /// Keep at most `bound` items, chosen uniformly, in their original order.
    fn bounded<T>(&mut self, items: Vec<T>, what: &str) -> Vec<T> {
        if items.len() <= self.bound {
            self.peak = self.peak.max(items.len());
            return items;
        }
        let total = items.len();
        self.peak = self.peak.max(self.bound);
        let mut keep = index::sample(&mut self.rng, total, self.bound).into_vec();
        keep.sort_unstable();
        tracing::debug!(at = what, total, kept = keep.len(), "subsampled fixture set");

        let mut keep = keep.into_iter().peekable();
        items
            .into_iter()
            .enumerate()
            .filter_map(|(i, x)| {
                if keep.peek() == Some(&i) {
                    keep.next();
                    Some(x)
                } else {
                    None
                }
            })
            .collect()
    }
}

// ------------------------------- Tests ------------------------------------ //
