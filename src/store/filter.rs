//! Typed filter conditions translated at the store-adapter boundary
//!
//! Keeps the retriever store-agnostic: callers build `Eq | Range | In`
//! conditions and each adapter maps them onto its native predicate language.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single filter condition on a payload field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FilterCondition {
    /// Exact match on a payload field
    Eq { key: String, value: Value },
    /// Numeric range; unset bounds are open
    Range {
        key: String,
        gte: Option<f64>,
        lte: Option<f64>,
        gt: Option<f64>,
        lt: Option<f64>,
    },
    /// Set membership
    In { key: String, values: Vec<Value> },
}

/// Conjunction of filter conditions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Filter {
    pub must: Vec<FilterCondition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
    }

    pub fn eq(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.must.push(FilterCondition::Eq {
            key: key.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn gte(mut self, key: &str, bound: f64) -> Self {
        self.must.push(FilterCondition::Range {
            key: key.to_string(),
            gte: Some(bound),
            lte: None,
            gt: None,
            lt: None,
        });
        self
    }

    pub fn lte(mut self, key: &str, bound: f64) -> Self {
        self.must.push(FilterCondition::Range {
            key: key.to_string(),
            gte: None,
            lte: Some(bound),
            gt: None,
            lt: None,
        });
        self
    }

    pub fn within(mut self, key: &str, values: Vec<Value>) -> Self {
        self.must.push(FilterCondition::In {
            key: key.to_string(),
            values,
        });
        self
    }

    /// Evaluate this filter against a JSON payload
    ///
    /// Used by the in-memory adapter; remote adapters translate conditions
    /// into their own query DSL instead.
    pub fn matches(&self, payload: &Value) -> bool {
        self.must.iter().all(|cond| condition_matches(cond, payload))
    }
}

fn condition_matches(cond: &FilterCondition, payload: &Value) -> bool {
    match cond {
        FilterCondition::Eq { key, value } => payload.get(key).is_some_and(|v| json_eq(v, value)),
        FilterCondition::Range {
            key,
            gte,
            lte,
            gt,
            lt,
        } => {
            let Some(n) = payload.get(key).and_then(Value::as_f64) else {
                return false;
            };
            gte.is_none_or(|b| n >= b)
                && lte.is_none_or(|b| n <= b)
                && gt.is_none_or(|b| n > b)
                && lt.is_none_or(|b| n < b)
        }
        FilterCondition::In { key, values } => payload
            .get(key)
            .is_some_and(|v| values.iter().any(|candidate| json_eq(v, candidate))),
    }
}

/// Equality with numeric coercion (payload integers match filter floats)
fn json_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}
