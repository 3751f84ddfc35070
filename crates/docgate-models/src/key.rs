//! Natural keys for idempotent upserts.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::document::{type_name, Document, ID_FIELD};
use crate::error::{ModelError, ModelResult};

/// Separator between the rendered parts of a composite key.
pub const KEY_SEPARATOR: &str = ":";

/// Escapes separators and itself inside string key parts.
const KEY_ESCAPE: char = '\\';

/// Ordered list of fields whose values identify a record.
///
/// An empty key means "use the document id as-is".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NaturalKey {
    fields: Vec<String>,
}

impl NaturalKey {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render the key of a document.
    ///
    /// Strings are used with `\` and `:` backslash-escaped, integers and
    /// booleans through their display form. Floats, nulls, arrays and objects
    /// cannot form a key. Distinct composite keys always render distinctly.
    pub fn key_for(&self, doc: &Document) -> ModelResult<String> {
        if self.fields.is_empty() {
            return doc
                .id
                .clone()
                .filter(|id| !id.is_empty())
                .ok_or_else(|| ModelError::MissingKeyField(ID_FIELD.to_string()));
        }

        let mut parts = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = doc
                .get(field)
                .ok_or_else(|| ModelError::MissingKeyField(field.clone()))?;
            parts.push(render_key_part(field, value)?);
        }
        Ok(parts.join(KEY_SEPARATOR))
    }
}

fn render_key_part(field: &str, value: &Value) -> ModelResult<String> {
    match value {
        Value::String(s) if s.is_empty() => Err(ModelError::InvalidKeyValue {
            field: field.to_string(),
            reason: "empty string".to_string(),
        }),
        Value::String(s) => Ok(escape_key_part(s)),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        other => Err(ModelError::InvalidKeyValue {
            field: field.to_string(),
            reason: format!("{} values are not supported", type_name(other)),
        }),
    }
}

fn escape_key_part(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == KEY_ESCAPE || KEY_SEPARATOR.contains(c) {
            escaped.push(KEY_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// A typed row stored in a fixed collection under a natural key.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Collection the record lives in.
    const COLLECTION: &'static str;
    /// Fields forming the natural key, in order.
    const KEY_FIELDS: &'static [&'static str];

    fn natural_key() -> NaturalKey {
        NaturalKey::new(Self::KEY_FIELDS.iter().copied())
    }
}
