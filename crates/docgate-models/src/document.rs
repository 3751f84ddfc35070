//! JSON document model.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ModelError, ModelResult};

/// Filter field name that addresses the document id when no such field is stored.
pub const ID_FIELD: &str = "_id";

/// A stored document.
///
/// Documents are plain data: they carry no reference to the session or
/// connection that produced them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document id (the natural key once upserted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Document fields
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// Create a new document with the given fields.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { id: None, fields }
    }

    /// Set the document id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Build a document from a JSON object.
    pub fn from_value(value: Value) -> ModelResult<Self> {
        match value {
            Value::Object(fields) => Ok(Self::new(fields)),
            other => Err(ModelError::Serialization(serde::de::Error::custom(format!(
                "expected a JSON object, got {}",
                type_name(&other)
            )))),
        }
    }

    /// Build a document from a JSON object, lifting a string `_id` field into
    /// [`Document::id`].
    pub fn from_value_with_id(value: Value) -> ModelResult<Self> {
        let mut doc = Self::from_value(value)?;
        match doc.fields.remove(ID_FIELD) {
            None => {}
            Some(Value::String(id)) if !id.is_empty() => doc.id = Some(id),
            Some(other) => {
                return Err(ModelError::InvalidKeyValue {
                    field: ID_FIELD.to_string(),
                    reason: format!("expected a non-empty string, got {}", type_name(&other)),
                })
            }
        }
        Ok(doc)
    }

    /// Serialize a typed record into a document.
    pub fn from_record<T: Serialize>(record: &T) -> ModelResult<Self> {
        Self::from_value(serde_json::to_value(record)?)
    }

    /// Deserialize the document fields into a typed record.
    pub fn into_record<T: DeserializeOwned>(self) -> ModelResult<T> {
        Ok(serde_json::from_value(Value::Object(self.fields))?)
    }

    /// Look up a field by dotted path (`stats.xg`).
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.fields.get(first)?;
        for part in parts {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Look up a field and deserialize it.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        self.get(path)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Set fields by dotted path, creating intermediate objects as needed.
    ///
    /// Returns true when any stored value changed.
    pub fn apply_set(&mut self, set: &Map<String, Value>) -> bool {
        let mut changed = false;
        for (path, value) in set {
            changed |= set_path(&mut self.fields, path, value.clone());
        }
        changed
    }
}

fn set_path(fields: &mut Map<String, Value>, path: &str, value: Value) -> bool {
    match path.split_once('.') {
        None => {
            if fields.get(path) == Some(&value) {
                return false;
            }
            fields.insert(path.to_string(), value);
            true
        }
        Some((head, rest)) => {
            let entry = fields
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            match entry {
                Value::Object(inner) => set_path(inner, rest, value),
                _ => unreachable!("entry was just replaced with an object"),
            }
        }
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::from_value(value).unwrap()
    }

    #[test]
    fn test_get_nested_path() {
        let d = doc(json!({"fixture": {"id": 7, "teams": [{"name": "home"}]}}));
        assert_eq!(d.get("fixture.id"), Some(&json!(7)));
        assert_eq!(d.get("fixture.teams.0.name"), Some(&json!("home")));
        assert_eq!(d.get("fixture.missing"), None);
        assert_eq!(d.get("fixture.id.deeper"), None);
    }

    #[test]
    fn test_from_value_with_id_lifts_id_field() {
        let d = Document::from_value_with_id(json!({"_id": "t1", "v": 1})).unwrap();
        assert_eq!(d.id.as_deref(), Some("t1"));
        assert!(d.get("_id").is_none());
        assert_eq!(d.get("v"), Some(&json!(1)));

        assert!(Document::from_value_with_id(json!({"v": 1})).unwrap().id.is_none());
        assert!(Document::from_value_with_id(json!({"_id": 5})).is_err());
        assert!(Document::from_value_with_id(json!({"_id": ""})).is_err());
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(Document::from_value(json!([1, 2])).is_err());
        assert!(Document::from_value(json!("text")).is_err());
    }

    #[test]
    fn test_apply_set_reports_changes() {
        let mut d = doc(json!({"status": "open", "stats": {"xg": 1.1}}));
        let set = json!({"status": "open"}).as_object().cloned().unwrap();
        assert!(!d.apply_set(&set));

        let set = json!({"stats.xg": 2.0, "stats.shots": 9}).as_object().cloned().unwrap();
        assert!(d.apply_set(&set));
        assert_eq!(d.get("stats.xg"), Some(&json!(2.0)));
        assert_eq!(d.get("stats.shots"), Some(&json!(9)));
    }

    #[test]
    fn test_record_conversion() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Injury {
            player_id: u64,
            reason: String,
        }

        let injury = Injury { player_id: 12, reason: "hamstring".into() };
        let d = Document::from_record(&injury).unwrap();
        assert_eq!(d.get_as::<u64>("player_id"), Some(12));

        let back: Injury = d.into_record().unwrap();
        assert_eq!(back, injury);
    }
}
