// Field Reader - the one place stored documents are parsed into typed models
// Missing fields take defaults; wrong-typed fields take defaults and are logged

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use crate::core::parse_timestamp;
use crate::infrastructure::document_store::{Collection, Document, DocumentData};

/// Lenient, logging accessor over one document (or one nested object in it).
pub struct FieldReader<'a> {
    collection: Collection,
    doc_id: &'a str,
    data: &'a DocumentData,
    path: String,
}

impl<'a> FieldReader<'a> {
    pub fn new(collection: Collection, doc: &'a Document) -> Self {
        Self {
            collection,
            doc_id: &doc.id,
            data: &doc.data,
            path: String::new(),
        }
    }

    pub fn doc_id(&self) -> &'a str {
        self.doc_id
    }

    /// Present and not `null`.
    pub fn value(&self, field: &str) -> Option<&'a Value> {
        self.data.get(field).filter(|v| !v.is_null())
    }

    pub fn has(&self, field: &str) -> bool {
        self.value(field).is_some()
    }

    fn malformed(&self, field: &str, expected: &str, found: &Value) {
        warn!(
            "Malformed field in {}/{}: '{}{}' expected {}, found {}",
            self.collection,
            self.doc_id,
            self.path,
            field,
            expected,
            json_type(found)
        );
    }

    pub fn string(&self, field: &str) -> String {
        self.opt_string(field).unwrap_or_default()
    }

    pub fn opt_string(&self, field: &str) -> Option<String> {
        match self.value(field)? {
            Value::String(s) => Some(s.clone()),
            // numbers show up where the mobile client stored e.g. a year
            Value::Number(n) => Some(n.to_string()),
            other => {
                self.malformed(field, "string", other);
                None
            }
        }
    }

    pub fn bool(&self, field: &str) -> bool {
        match self.value(field) {
            None => false,
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                self.malformed(field, "boolean", other);
                false
            }
        }
    }

    pub fn opt_f64(&self, field: &str) -> Option<f64> {
        match self.value(field)? {
            Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
            other => {
                self.malformed(field, "number", other);
                None
            }
        }
    }

    pub fn f64(&self, field: &str) -> f64 {
        self.opt_f64(field).unwrap_or(0.0)
    }

    pub fn u64(&self, field: &str) -> u64 {
        match self.value(field) {
            None => 0,
            Some(Value::Number(n)) => match n.as_u64() {
                Some(v) => v,
                None => n.as_f64().filter(|v| *v > 0.0).map(|v| v as u64).unwrap_or(0),
            },
            Some(other) => {
                self.malformed(field, "non-negative integer", other);
                0
            }
        }
    }

    pub fn i64(&self, field: &str) -> i64 {
        match self.value(field) {
            None => 0,
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|v| v as i64))
                .unwrap_or(0),
            Some(other) => {
                self.malformed(field, "integer", other);
                0
            }
        }
    }

    /// Array of strings; non-string elements are logged and skipped.
    pub fn string_list(&self, field: &str) -> Vec<String> {
        match self.value(field) {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| match item {
                    Value::String(s) => Some(s.clone()),
                    other => {
                        self.malformed(&format!("{}[{}]", field, i), "string", other);
                        None
                    }
                })
                .collect(),
            Some(other) => {
                self.malformed(field, "array", other);
                Vec::new()
            }
        }
    }

    pub fn timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        let value = self.value(field)?;
        let parsed = parse_timestamp(value);
        if parsed.is_none() {
            self.malformed(field, "timestamp", value);
        }
        parsed
    }

    /// Reader over a nested object.
    pub fn nested(&self, field: &str) -> Option<FieldReader<'a>> {
        match self.value(field)? {
            Value::Object(map) => Some(FieldReader {
                collection: self.collection,
                doc_id: self.doc_id,
                data: map,
                path: format!("{}{}.", self.path, field),
            }),
            other => {
                self.malformed(field, "object", other);
                None
            }
        }
    }

    /// Readers over an array of objects, one slot per element. Elements
    /// that are not objects are logged and left as `None` so positions hold.
    pub fn nested_list(&self, field: &str) -> Vec<Option<FieldReader<'a>>> {
        match self.value(field) {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Object(map) => Some(FieldReader {
                        collection: self.collection,
                        doc_id: self.doc_id,
                        data: map,
                        path: format!("{}{}[{}].", self.path, field, i),
                    }),
                    other => {
                        self.malformed(&format!("{}[{}]", field, i), "object", other);
                        None
                    }
                })
                .collect(),
            Some(other) => {
                self.malformed(field, "array", other);
                Vec::new()
            }
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
