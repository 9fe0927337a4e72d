//! Types exchanged with external collaborators: the CSV dataset iterator
//! and the experiment driver. The core never parses a CSV file or opens a
//! socket — it only defines the shapes these collaborators produce and
//! consume.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single attribute value. Every field is nullable because the source CSV
/// may contain empty or unparsable cells (`original_source`'s
/// `_to_float`/`_to_int` return `None` on invalid input rather than erroring).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Float(f64),
    Int(i64),
    Text(String),
    Null,
}

impl AttributeValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Float(v) => Some(*v),
            AttributeValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }
}

/// A string-keyed mapping to scalar attributes, e.g. a movie's popularity,
/// vote_average, vote_count, release_date, title.
pub type AttributeMap = HashMap<String, AttributeValue>;

/// One (title, attributes) pair as produced by a dataset iterator. Rows
/// lacking a title are skipped upstream; the core never sees them.
pub type DatasetRecord = (String, AttributeMap);
