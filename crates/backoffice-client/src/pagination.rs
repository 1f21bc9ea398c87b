//! Paginated envelope handling.
//!
//! Some endpoints return a bare JSON array, others a
//! `{count, next, previous, results}` envelope. Callers pick the view they
//! want without knowing which one the endpoint produces. Reducing an envelope
//! to its items drops `count`/`next`/`previous`; callers that need them ask
//! for the envelope.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A paginated envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Wrap a bare list in a minimal envelope.
    pub fn from_items(results: Vec<T>) -> Self {
        Self {
            count: results.len() as u64,
            next: None,
            previous: None,
            results,
        }
    }
}

/// Either shape a list endpoint may answer with.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListEnvelope<T> {
    Paged(Page<T>),
    Bare(Vec<T>),
}

impl<T> ListEnvelope<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            ListEnvelope::Paged(page) => page.results,
            ListEnvelope::Bare(items) => items,
        }
    }

    pub fn into_page(self) -> Page<T> {
        match self {
            ListEnvelope::Paged(page) => page,
            ListEnvelope::Bare(items) => Page::from_items(items),
        }
    }
}

/// Items-only view: `results` when present, otherwise the body unchanged.
pub fn items(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("results") => {
            map.remove("results").unwrap_or(Value::Null)
        },
        other => other,
    }
}

/// Envelope view: an envelope passes through, a bare array gets a synthesized
/// `{results, count}` envelope.
pub fn envelope(body: Value) -> Value {
    match body {
        Value::Array(list) => {
            let count = list.len();
            json!({
                "results": list,
                "count": count,
                "next": null,
                "previous": null,
            })
        },
        other => other,
    }
}
