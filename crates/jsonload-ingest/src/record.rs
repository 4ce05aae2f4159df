//! Typed record model
//!
//! A source file decodes into a list of [`Record`]s. Each field is either a
//! scalar that maps onto a native column or a nested document that is stored
//! as JSON. [`Record::to_params`] turns a record into the ordered parameter
//! list for one upsert, checking every field against the [`TableSchema`].

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::LoadError;
use crate::schema::{ColumnKind, TableSchema, PRIMARY_KEY};

/// Scalar JSON value
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ScalarValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ScalarValue::Null => "null",
            ScalarValue::Bool(_) => "boolean",
            ScalarValue::Integer(_) => "integer",
            ScalarValue::Float(_) => "float",
            ScalarValue::Text(_) => "string",
        }
    }

    fn to_json(&self) -> Value {
        match self {
            ScalarValue::Null => Value::Null,
            ScalarValue::Bool(b) => Value::Bool(*b),
            ScalarValue::Integer(i) => Value::from(*i),
            ScalarValue::Float(f) => Value::from(*f),
            ScalarValue::Text(s) => Value::String(s.clone()),
        }
    }
}

/// Value of one record field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(ScalarValue),
    /// Object or array; always written as JSON
    Document(Value),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Scalar(ScalarValue::Null))
    }

    fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Scalar(s) => s.kind_name(),
            FieldValue::Document(Value::Array(_)) => "array",
            FieldValue::Document(_) => "object",
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Scalar(ScalarValue::Null),
            Value::Bool(b) => FieldValue::Scalar(ScalarValue::Bool(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Scalar(ScalarValue::Integer(i)),
                // u64 above i64::MAX and fractional numbers
                None => FieldValue::Scalar(ScalarValue::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            Value::String(s) => FieldValue::Scalar(ScalarValue::Text(s)),
            doc @ (Value::Array(_) | Value::Object(_)) => FieldValue::Document(doc),
        }
    }
}

static NULL_FIELD: FieldValue = FieldValue::Scalar(ScalarValue::Null);

/// Parameter bound to one column of an upsert
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    BigInt(Option<i64>),
    Double(Option<f64>),
    Text(Option<String>),
    Boolean(Option<bool>),
    Json(Option<Value>),
}

/// One decoded record; `index` is its position in the source array
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    index: usize,
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Build from a JSON object; the `id` field must be present and non-null
    pub fn from_object(index: usize, object: Map<String, Value>) -> Result<Self, LoadError> {
        let fields: BTreeMap<String, FieldValue> = object
            .into_iter()
            .map(|(name, value)| (name, FieldValue::from(value)))
            .collect();

        match fields.get(PRIMARY_KEY) {
            Some(value) if !value.is_null() => Ok(Self { index, fields }),
            _ => Err(LoadError::MissingId {
                index,
                column: PRIMARY_KEY.to_string(),
            }),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn id(&self) -> &FieldValue {
        // Always present after `from_object`
        self.fields.get(PRIMARY_KEY).unwrap_or(&NULL_FIELD)
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Column names and parameters for this record's upsert, in field order
    pub fn to_params<'s>(
        &self,
        schema: &'s TableSchema,
    ) -> Result<(Vec<&'s str>, Vec<SqlParam>), LoadError> {
        let mut columns = Vec::with_capacity(self.fields.len());
        let mut params = Vec::with_capacity(self.fields.len());

        for (field, value) in &self.fields {
            let column = schema.column(field).ok_or_else(|| LoadError::UnknownColumn {
                index: self.index,
                field: field.clone(),
            })?;
            params.push(self.convert(field, column.kind, value)?);
            columns.push(column.name.as_str());
        }

        Ok((columns, params))
    }

    fn convert(&self, field: &str, kind: ColumnKind, value: &FieldValue) -> Result<SqlParam, LoadError> {
        use FieldValue::{Document, Scalar};
        use ScalarValue as S;

        let param = match (kind, value) {
            (ColumnKind::BigInt, Scalar(S::Null)) => SqlParam::BigInt(None),
            (ColumnKind::BigInt, Scalar(S::Integer(i))) => SqlParam::BigInt(Some(*i)),
            (ColumnKind::BigInt, Scalar(S::Float(f))) if is_integral(*f) => {
                SqlParam::BigInt(Some(*f as i64))
            },

            (ColumnKind::Double, Scalar(S::Null)) => SqlParam::Double(None),
            (ColumnKind::Double, Scalar(S::Integer(i))) => SqlParam::Double(Some(*i as f64)),
            (ColumnKind::Double, Scalar(S::Float(f))) => SqlParam::Double(Some(*f)),

            (ColumnKind::Boolean, Scalar(S::Null)) => SqlParam::Boolean(None),
            (ColumnKind::Boolean, Scalar(S::Bool(b))) => SqlParam::Boolean(Some(*b)),

            (ColumnKind::Text, Scalar(S::Null)) => SqlParam::Text(None),
            (ColumnKind::Text, Scalar(S::Text(s))) => SqlParam::Text(Some(s.clone())),
            (ColumnKind::Text, Scalar(S::Integer(i))) => SqlParam::Text(Some(i.to_string())),
            (ColumnKind::Text, Scalar(S::Float(f))) => SqlParam::Text(Some(f.to_string())),
            (ColumnKind::Text, Scalar(S::Bool(b))) => SqlParam::Text(Some(b.to_string())),
            (ColumnKind::Text, Document(doc)) => SqlParam::Text(Some(doc.to_string())),

            (ColumnKind::Json, Scalar(S::Null)) => SqlParam::Json(None),
            (ColumnKind::Json, Scalar(scalar)) => SqlParam::Json(Some(scalar.to_json())),
            (ColumnKind::Json, Document(doc)) => SqlParam::Json(Some(doc.clone())),

            (expected, other) => {
                return Err(LoadError::TypeMismatch {
                    index: self.index,
                    field: field.to_string(),
                    expected,
                    found: other.kind_name(),
                })
            },
        };

        Ok(param)
    }
}

/// Whole floats like `19.0` that fit an `i64`
fn is_integral(f: f64) -> bool {
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

/// Decode a file body: a top-level JSON array of objects
pub fn decode_records(bytes: &[u8]) -> Result<Vec<Record>, LoadError> {
    let value: Value = serde_json::from_slice(bytes)?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(_) => return Err(LoadError::NotAnArray("an object")),
        Value::String(_) => return Err(LoadError::NotAnArray("a string")),
        Value::Number(_) => return Err(LoadError::NotAnArray("a number")),
        Value::Bool(_) => return Err(LoadError::NotAnArray("a boolean")),
        Value::Null => return Err(LoadError::NotAnArray("null")),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(object) => Record::from_object(index, object),
            _ => Err(LoadError::NotAnObject { index }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> TableSchema {
        TableSchema::products("d_products").unwrap()
    }

    fn record(value: Value) -> Record {
        match value {
            Value::Object(object) => Record::from_object(0, object).unwrap(),
            _ => panic!("test record must be an object"),
        }
    }

    #[test]
    fn test_decode_array_of_objects() {
        let body = br#"[{"id": 1, "name": "a"}, {"id": 2, "specifications": {"k": [1, 2]}}]"#;
        let records = decode_records(body).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id(), &FieldValue::Scalar(ScalarValue::Integer(1)));
        assert_eq!(records[1].index(), 1);
        assert!(matches!(
            records[1].get("specifications"),
            Some(FieldValue::Document(_))
        ));
    }

    #[test]
    fn test_decode_empty_array() {
        assert!(decode_records(b"[]").unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        let err = decode_records(b"[{\"id\": 1,").unwrap_err();
        assert!(matches!(err, LoadError::Decode(_)));
    }

    #[test]
    fn test_decode_rejects_non_array() {
        let err = decode_records(br#"{"id": 1}"#).unwrap_err();
        assert!(matches!(err, LoadError::NotAnArray("an object")));
    }

    #[test]
    fn test_decode_rejects_non_object_element() {
        let err = decode_records(br#"[{"id": 1}, 7]"#).unwrap_err();
        assert!(matches!(err, LoadError::NotAnObject { index: 1 }));
    }

    #[test]
    fn test_decode_requires_id() {
        let err = decode_records(br#"[{"id": 1}, {"name": "x"}]"#).unwrap_err();
        assert!(matches!(err, LoadError::MissingId { index: 1, .. }));

        let err = decode_records(br#"[{"id": null}]"#).unwrap_err();
        assert!(matches!(err, LoadError::MissingId { index: 0, .. }));
    }

    #[test]
    fn test_params_follow_column_kinds() {
        let rec = record(json!({
            "id": 42,
            "name": "Kettle",
            "price": 1990,
            "description": null,
            "specifications": {"power": "2kW", "parts": [1, 2]},
            "images": [{"url": "a.png"}]
        }));

        let schema = schema();
        let (columns, params) = rec.to_params(&schema).unwrap();
        let bound: BTreeMap<&str, SqlParam> = columns.into_iter().zip(params).collect();

        assert_eq!(bound["id"], SqlParam::BigInt(Some(42)));
        assert_eq!(bound["name"], SqlParam::Text(Some("Kettle".into())));
        assert_eq!(bound["price"], SqlParam::BigInt(Some(1990)));
        assert_eq!(bound["description"], SqlParam::Text(None));
        assert_eq!(
            bound["specifications"],
            SqlParam::Json(Some(json!({"power": "2kW", "parts": [1, 2]})))
        );
        assert_eq!(bound["images"], SqlParam::Json(Some(json!([{"url": "a.png"}]))));
    }

    #[test]
    fn test_document_into_text_column_is_serialized() {
        let rec = record(json!({"id": 1, "description": {"short": "hi"}}));
        let schema = schema();
        let (_, params) = rec.to_params(&schema).unwrap();
        assert!(params.contains(&SqlParam::Text(Some(r#"{"short":"hi"}"#.into()))));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let rec = record(json!({"id": 1, "colour": "red"}));
        let err = rec.to_params(&schema()).unwrap_err();
        assert!(matches!(err, LoadError::UnknownColumn { ref field, .. } if field == "colour"));
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let rec = record(json!({"id": 1, "price": "cheap"}));
        let err = rec.to_params(&schema()).unwrap_err();
        match err {
            LoadError::TypeMismatch {
                field,
                expected,
                found,
                ..
            } => {
                assert_eq!(field, "price");
                assert_eq!(expected, ColumnKind::BigInt);
                assert_eq!(found, "string");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_whole_float_into_bigint_column() {
        let schema = schema();

        let rec = record(json!({"id": 1, "price": 19.0}));
        let (_, params) = rec.to_params(&schema).unwrap();
        assert!(params.contains(&SqlParam::BigInt(Some(19))));

        let rec = record(json!({"id": 1, "price": 19.5}));
        let err = rec.to_params(&schema).unwrap_err();
        assert!(matches!(err, LoadError::TypeMismatch { found: "float", .. }));
    }

    #[test]
    fn test_float_number_classification() {
        assert_eq!(
            FieldValue::from(json!(1.5)),
            FieldValue::Scalar(ScalarValue::Float(1.5))
        );
        assert_eq!(
            FieldValue::from(json!(7)),
            FieldValue::Scalar(ScalarValue::Integer(7))
        );
    }
}
