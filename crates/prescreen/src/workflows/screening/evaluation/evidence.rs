use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Diagnostic snapshot attached to a rule result. Never read back by scoring.
pub type Evidence = BTreeMap<String, EvidenceValue>;

/// Semi-structured evidence value; each rule quotes a different shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvidenceValue {
    Null,
    Flag(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    List(Vec<String>),
    Map(Evidence),
}

impl From<bool> for EvidenceValue {
    fn from(value: bool) -> Self {
        EvidenceValue::Flag(value)
    }
}

impl From<usize> for EvidenceValue {
    fn from(value: usize) -> Self {
        EvidenceValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for EvidenceValue {
    fn from(value: f64) -> Self {
        EvidenceValue::Number(value)
    }
}

impl From<&str> for EvidenceValue {
    fn from(value: &str) -> Self {
        EvidenceValue::Text(value.to_string())
    }
}

impl From<String> for EvidenceValue {
    fn from(value: String) -> Self {
        EvidenceValue::Text(value)
    }
}

impl From<Vec<String>> for EvidenceValue {
    fn from(value: Vec<String>) -> Self {
        EvidenceValue::List(value)
    }
}

impl<T: Into<EvidenceValue>> From<Option<T>> for EvidenceValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(EvidenceValue::Null, Into::into)
    }
}

/// Build an evidence map from literal key/value pairs.
pub fn evidence<const N: usize>(entries: [(&str, EvidenceValue); N]) -> Evidence {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// First `limit` samples of an entity bucket.
pub(crate) fn sample(values: &[String], limit: usize) -> EvidenceValue {
    EvidenceValue::List(values.iter().take(limit).cloned().collect())
}
