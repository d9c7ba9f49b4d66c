//! Firestore REST API types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Firestore document value types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(String), // Firestore sends integers as strings
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    pub values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    pub fields: Option<HashMap<String, Value>>,
}

/// Firestore document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Document fields
    pub fields: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    /// Create a new document with the given fields.
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self {
            name: None,
            fields: Some(fields),
            create_time: None,
            update_time: None,
        }
    }

    /// Document ID (last segment of the resource name).
    pub fn id(&self) -> Option<&str> {
        self.name
            .as_deref()
            .and_then(|n| n.rsplit('/').next())
            .filter(|id| !id.is_empty())
    }

    /// Typed field lookup.
    pub fn get<T: FromFirestoreValue>(&self, field: &str) -> Option<T> {
        self.fields
            .as_ref()
            .and_then(|f| f.get(field))
            .and_then(T::from_firestore_value)
    }

    /// String field, empty when absent or not a string.
    pub fn get_string_or_default(&self, field: &str) -> String {
        self.get::<String>(field).unwrap_or_default()
    }
}

// ============================================================================
// Query Types
// ============================================================================

/// Structured query for `:runQuery`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuery {
    pub from: Vec<CollectionSelector>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub r#where: Option<Filter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Vec<Order>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSelector {
    pub collection_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_descendants: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_filter: Option<FieldFilter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: FieldReference,
    pub op: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldReference {
    pub field_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub field: FieldReference,
    pub direction: String,
}

impl StructuredQuery {
    /// `collection WHERE field == value ORDER BY order_field DESC`.
    pub fn equal_ordered_desc(
        collection: &str,
        field: &str,
        value: Value,
        order_field: &str,
    ) -> Self {
        Self {
            from: vec![CollectionSelector {
                collection_id: collection.to_string(),
                all_descendants: None,
            }],
            r#where: Some(Filter {
                field_filter: Some(FieldFilter {
                    field: FieldReference {
                        field_path: field.to_string(),
                    },
                    op: "EQUAL".to_string(),
                    value,
                }),
            }),
            order_by: Some(vec![Order {
                field: FieldReference {
                    field_path: order_field.to_string(),
                },
                direction: "DESCENDING".to_string(),
            }]),
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryRequest {
    pub structured_query: StructuredQuery,
}

/// One element of the `:runQuery` response array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryResponse {
    pub document: Option<Document>,
    pub read_time: Option<String>,
}

// ============================================================================
// Value Conversion
// ============================================================================

/// Convert a Rust value to Firestore Value.
pub trait ToFirestoreValue {
    fn to_firestore_value(&self) -> Value;
}

impl ToFirestoreValue for String {
    fn to_firestore_value(&self) -> Value {
        Value::StringValue(self.clone())
    }
}

impl ToFirestoreValue for &str {
    fn to_firestore_value(&self) -> Value {
        Value::StringValue(self.to_string())
    }
}

impl ToFirestoreValue for i64 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue(self.to_string())
    }
}

impl ToFirestoreValue for f64 {
    fn to_firestore_value(&self) -> Value {
        Value::DoubleValue(*self)
    }
}

impl<T: ToFirestoreValue> ToFirestoreValue for Option<T> {
    fn to_firestore_value(&self) -> Value {
        match self {
            Some(v) => v.to_firestore_value(),
            None => Value::NullValue(()),
        }
    }
}

impl<T: ToFirestoreValue> ToFirestoreValue for HashMap<String, T> {
    fn to_firestore_value(&self) -> Value {
        Value::MapValue(MapValue {
            fields: Some(
                self.iter()
                    .map(|(k, v)| (k.clone(), v.to_firestore_value()))
                    .collect(),
            ),
        })
    }
}

/// Convert Firestore Value to Rust type.
pub trait FromFirestoreValue: Sized {
    fn from_firestore_value(value: &Value) -> Option<Self>;
}

impl FromFirestoreValue for String {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::StringValue(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromFirestoreValue for i64 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntegerValue(s) => s.parse().ok(),
            Value::DoubleValue(f) => Some(*f as i64),
            _ => None,
        }
    }
}

impl FromFirestoreValue for f64 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::DoubleValue(f) => Some(*f),
            Value::IntegerValue(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl FromFirestoreValue for bool {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::BooleanValue(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromFirestoreValue for DateTime<Utc> {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::TimestampValue(s) => DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.into()),
            Value::IntegerValue(s) => s.parse().ok().and_then(DateTime::from_timestamp_millis),
            _ => None,
        }
    }
}

/// Map entries whose values do not convert are skipped.
impl<T: FromFirestoreValue> FromFirestoreValue for HashMap<String, T> {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::MapValue(MapValue { fields }) => Some(
                fields
                    .iter()
                    .flatten()
                    .filter_map(|(k, v)| T::from_firestore_value(v).map(|t| (k.clone(), t)))
                    .collect(),
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_from_name() {
        let mut doc = Document::new(HashMap::new());
        assert_eq!(doc.id(), None);
        doc.name = Some("projects/p/databases/(default)/documents/analyses/abc123".to_string());
        assert_eq!(doc.id(), Some("abc123"));
    }

    #[test]
    fn test_value_wire_format() {
        let json = serde_json::to_value(42i64.to_firestore_value()).unwrap();
        assert_eq!(json, serde_json::json!({"integerValue": "42"}));

        let json = serde_json::to_value(None::<String>.to_firestore_value()).unwrap();
        assert_eq!(json, serde_json::json!({"nullValue": null}));
    }

    #[test]
    fn test_score_map_roundtrip_skips_bad_entries() {
        let mut fields = HashMap::new();
        fields.insert("Normal".to_string(), Value::DoubleValue(0.5));
        fields.insert("TB".to_string(), Value::IntegerValue("0".to_string()));
        fields.insert("Bad".to_string(), Value::StringValue("x".to_string()));
        let value = Value::MapValue(MapValue { fields: Some(fields) });

        let scores = HashMap::<String, f64>::from_firestore_value(&value).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores["TB"], 0.0);
    }

    #[test]
    fn test_datetime_from_millis() {
        let dt = DateTime::<Utc>::from_firestore_value(&Value::IntegerValue(
            "1700000000000".to_string(),
        ))
        .unwrap();
        assert_eq!(dt.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_query_serialization() {
        let query = StructuredQuery::equal_ordered_desc(
            "analyses",
            "userId",
            "u1".to_firestore_value(),
            "createdAt",
        );
        let json = serde_json::to_value(RunQueryRequest {
            structured_query: query,
        })
        .unwrap();

        let q = &json["structuredQuery"];
        assert_eq!(q["from"][0]["collectionId"], "analyses");
        assert_eq!(q["where"]["fieldFilter"]["field"]["fieldPath"], "userId");
        assert_eq!(q["where"]["fieldFilter"]["op"], "EQUAL");
        assert_eq!(q["orderBy"][0]["direction"], "DESCENDING");
        assert!(q.get("limit").is_none());
    }
}
