//! Extracted records and the tagged field-value union.
//!
//! Provider responses are dynamically shaped (string, array, nested object,
//! null). [`FieldValue::from_json`] normalizes those shapes into a tagged
//! union at the client boundary so the rest of the pipeline only ever deals
//! with `Scalar`, `List`, or `Missing`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::NO_INFORMATION;

/// Value of one listing field.
///
/// Serializes untagged: scalars as strings, lists as arrays, `Missing` as
/// `null`, which matches the provider-side JSON shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Multi-valued field, e.g. a list of notable features.
    List(Vec<String>),
    /// Single free-text value.
    Scalar(String),
    /// No information; compares as [`NO_INFORMATION`].
    Missing,
}

impl FieldValue {
    /// Scalar constructor.
    pub fn scalar(value: impl Into<String>) -> Self {
        Self::Scalar(value.into())
    }

    /// List constructor.
    #[must_use]
    pub fn list(values: Vec<String>) -> Self {
        Self::List(values)
    }

    /// Normalize a raw provider JSON value into the tagged union.
    ///
    /// Falsy values (null, `false`, `0`, empty or whitespace-only strings)
    /// become `Missing`. Arrays become `List` with each element rendered as
    /// text; nested objects are flattened to a comma-joined scalar of their
    /// values.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Missing,
            Value::Bool(b) => {
                if *b {
                    Self::Scalar("true".to_string())
                } else {
                    Self::Missing
                }
            }
            Value::Number(n) => {
                if n.as_f64() == Some(0.0) {
                    Self::Missing
                } else {
                    Self::Scalar(n.to_string())
                }
            }
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Self::Missing
                } else {
                    Self::Scalar(trimmed.to_string())
                }
            }
            Value::Array(items) => {
                let values: Vec<String> = items
                    .iter()
                    .map(render_json_text)
                    .filter(|s| !s.is_empty())
                    .collect();
                if values.is_empty() {
                    Self::Missing
                } else {
                    Self::List(values)
                }
            }
            Value::Object(map) => {
                let values: Vec<String> = map
                    .values()
                    .map(render_json_text)
                    .filter(|s| !s.is_empty())
                    .collect();
                if values.is_empty() {
                    Self::Missing
                } else {
                    Self::Scalar(values.join(", "))
                }
            }
        }
    }

    /// The comparison form: lists comma-joined, `Missing` as the sentinel.
    #[must_use]
    pub fn normalized(&self) -> String {
        match self {
            Self::Scalar(s) => s.clone(),
            Self::List(items) => items.join(", "),
            Self::Missing => NO_INFORMATION.to_string(),
        }
    }

    /// Whether this value carries no information, either as `Missing` or as
    /// the sentinel literal itself.
    #[must_use]
    pub fn is_no_information(&self) -> bool {
        match self {
            Self::Missing => true,
            Self::Scalar(s) => s == NO_INFORMATION,
            Self::List(items) => items.is_empty(),
        }
    }
}

fn render_json_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Mapping from field name to extracted value.
///
/// Lookup of an absent field behaves as `Missing`, so a record never has to
/// carry explicit sentinel entries to be comparable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl ExtractedRecord {
    /// Empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value for a field, replacing any previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) {
        self.fields.insert(field.into(), value);
    }

    /// The stored value for a field, if present.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// The comparison form of a field's value; absent entries normalize to
    /// the [`NO_INFORMATION`] sentinel.
    #[must_use]
    pub fn normalized(&self, field: &str) -> String {
        self.fields
            .get(field)
            .map_or_else(|| NO_INFORMATION.to_string(), FieldValue::normalized)
    }

    /// Number of populated fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no fields are populated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate populated fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_scalar() {
        assert_eq!(
            FieldValue::from_json(&json!("8.5万円")),
            FieldValue::scalar("8.5万円")
        );
        // Whitespace is trimmed at the boundary.
        assert_eq!(
            FieldValue::from_json(&json!("  徒歩5分 ")),
            FieldValue::scalar("徒歩5分")
        );
    }

    #[test]
    fn test_from_json_falsy_becomes_missing() {
        assert_eq!(FieldValue::from_json(&json!(null)), FieldValue::Missing);
        assert_eq!(FieldValue::from_json(&json!("")), FieldValue::Missing);
        assert_eq!(FieldValue::from_json(&json!("   ")), FieldValue::Missing);
        assert_eq!(FieldValue::from_json(&json!(false)), FieldValue::Missing);
        assert_eq!(FieldValue::from_json(&json!(0)), FieldValue::Missing);
    }

    #[test]
    fn test_from_json_list() {
        let value = FieldValue::from_json(&json!(["エアコン", "オートロック"]));
        assert_eq!(
            value,
            FieldValue::list(vec!["エアコン".to_string(), "オートロック".to_string()])
        );
        assert_eq!(value.normalized(), "エアコン, オートロック");
    }

    #[test]
    fn test_from_json_nested_object_flattens_values() {
        let value = FieldValue::from_json(&json!({"バス": "追い焚き", "トイレ": "温水洗浄"}));
        match value {
            FieldValue::Scalar(s) => {
                assert!(s.contains("追い焚き"));
                assert!(s.contains("温水洗浄"));
                assert!(s.contains(", "));
            }
            other => panic!("expected flattened scalar, got {other:?}"),
        }
    }

    #[test]
    fn test_normalized_missing_is_sentinel() {
        assert_eq!(FieldValue::Missing.normalized(), NO_INFORMATION);
    }

    #[test]
    fn test_record_absent_field_normalizes_to_sentinel() {
        let record = ExtractedRecord::new();
        assert_eq!(record.normalized("家賃"), NO_INFORMATION);
        assert!(record.get("家賃").is_none());
    }

    #[test]
    fn test_is_no_information() {
        assert!(FieldValue::Missing.is_no_information());
        assert!(FieldValue::scalar(NO_INFORMATION).is_no_information());
        assert!(!FieldValue::scalar("8.5万円").is_no_information());
    }

    #[test]
    fn test_record_serde_round_trip() {
        let mut record = ExtractedRecord::new();
        record.insert("家賃", FieldValue::scalar("8.5万円"));
        record.insert(
            "設備（キッチン）",
            FieldValue::list(vec!["システムキッチン".to_string(), "IH".to_string()]),
        );

        let json = serde_json::to_string(&record).unwrap();
        let back: ExtractedRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
