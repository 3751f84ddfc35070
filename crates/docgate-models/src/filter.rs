//! Query filters.
//!
//! A [`QueryFilter`] is an AND of field clauses. Filters are built once and
//! only read afterwards; they serialize as a clause list on the wire and can
//! be parsed from the Mongo-style objects callers usually hand in:
//!
//! ```
//! use docgate_models::QueryFilter;
//! use serde_json::json;
//!
//! let filter = QueryFilter::from_json(&json!({
//!     "team_id": 5,
//!     "xg": {"$gte": 1.2},
//! }))
//! .unwrap();
//! assert_eq!(filter.len(), 2);
//! ```

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::document::{type_name, Document, ID_FIELD};
use crate::error::{ModelError, ModelResult};

/// Comparison operator of a single clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Exists,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Ne => "ne",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::In => "in",
            FilterOp::Nin => "nin",
            FilterOp::Exists => "exists",
        }
    }

    /// Parse a Mongo-style operator (`$gte`).
    pub fn from_mongo(op: &str) -> Option<Self> {
        let op = match op {
            "$eq" => FilterOp::Eq,
            "$ne" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::Nin,
            "$exists" => FilterOp::Exists,
            _ => return None,
        };
        Some(op)
    }
}

/// A single `field op value` clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl FieldFilter {
    fn validate(&self) -> ModelResult<()> {
        if self.field.is_empty() {
            return Err(ModelError::invalid_filter("field name cannot be empty"));
        }
        if self.field.starts_with('$') {
            return Err(ModelError::invalid_filter(format!(
                "field name cannot start with '$': {}",
                self.field
            )));
        }
        match self.op {
            FilterOp::In | FilterOp::Nin if !self.value.is_array() => {
                Err(ModelError::invalid_filter(format!(
                    "'{}' on {} expects an array, got {}",
                    self.op.as_str(),
                    self.field,
                    type_name(&self.value)
                )))
            }
            FilterOp::Exists if !self.value.is_boolean() => Err(ModelError::invalid_filter(format!(
                "'exists' on {} expects a boolean, got {}",
                self.field,
                type_name(&self.value)
            ))),
            _ => Ok(()),
        }
    }

    fn matches(&self, doc: &Document) -> bool {
        let id_value;
        let actual = match doc.get(&self.field) {
            Some(v) => Some(v),
            None if self.field == ID_FIELD => {
                id_value = doc.id.clone().map(Value::String);
                id_value.as_ref()
            }
            None => None,
        };
        match self.op {
            FilterOp::Eq => equals(actual, &self.value),
            FilterOp::Ne => !equals(actual, &self.value),
            FilterOp::Gt => compare(actual, &self.value) == Some(Ordering::Greater),
            FilterOp::Gte => matches!(
                compare(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lt => compare(actual, &self.value) == Some(Ordering::Less),
            FilterOp::Lte => matches!(
                compare(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::In => contains(&self.value, actual),
            FilterOp::Nin => !contains(&self.value, actual),
            FilterOp::Exists => actual.is_some() == self.value.as_bool().unwrap_or(true),
        }
    }
}

/// Read-only match specification: every clause must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryFilter {
    clauses: Vec<FieldFilter>,
}

impl QueryFilter {
    /// Empty filter (matches everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter matching a single document id.
    pub fn by_id(id: impl Into<String>) -> Self {
        Self::new().eq(ID_FIELD, id.into())
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clause(field, FilterOp::Eq, value)
    }

    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clause(field, FilterOp::Ne, value)
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clause(field, FilterOp::Gt, value)
    }

    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clause(field, FilterOp::Gte, value)
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clause(field, FilterOp::Lt, value)
    }

    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clause(field, FilterOp::Lte, value)
    }

    pub fn is_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.clause(field, FilterOp::In, Value::Array(values))
    }

    pub fn exists(self, field: impl Into<String>, exists: bool) -> Self {
        self.clause(field, FilterOp::Exists, exists)
    }

    /// Append an arbitrary clause.
    pub fn clause(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.clauses.push(FieldFilter {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    /// Parse a Mongo-style filter object.
    ///
    /// `null` parses as the empty filter. Plain values mean equality, objects
    /// whose keys all start with `$` are operator sets.
    pub fn from_json(value: &Value) -> ModelResult<Self> {
        let map = match value {
            Value::Null => return Ok(Self::new()),
            Value::Object(map) => map,
            other => {
                return Err(ModelError::invalid_filter(format!(
                    "filter must be an object, got {}",
                    type_name(other)
                )))
            }
        };

        let mut filter = Self::new();
        for (field, condition) in map {
            match condition {
                Value::Object(ops) if ops.keys().any(|k| k.starts_with('$')) => {
                    for (op, operand) in ops {
                        let parsed = FilterOp::from_mongo(op).ok_or_else(|| {
                            ModelError::invalid_filter(format!(
                                "unsupported operator '{}' on {}",
                                op, field
                            ))
                        })?;
                        filter = filter.clause(field.clone(), parsed, operand.clone());
                    }
                }
                other => filter = filter.eq(field.clone(), other.clone()),
            }
        }

        filter.validate()?;
        Ok(filter)
    }

    /// Check every clause is well formed.
    pub fn validate(&self) -> ModelResult<()> {
        self.clauses.iter().try_for_each(FieldFilter::validate)
    }

    /// Evaluate the filter against a document.
    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses.iter().all(|c| c.matches(doc))
    }

    pub fn clauses(&self) -> &[FieldFilter] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }
}

impl fmt::Display for QueryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return write!(f, "<all>");
        }
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{} {} {}", clause.field, clause.op.as_str(), clause.value)?;
        }
        Ok(())
    }
}

fn equals(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        // `{"field": null}` also matches documents without the field.
        None => expected.is_null(),
        Some(actual) => values_equal(actual, expected),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y) == Some(Ordering::Equal),
        _ => a == b,
    }
}

/// Integers compare exactly; floats and mixed pairs go through f64.
fn compare_numbers(x: &Number, y: &Number) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return Some(a.cmp(&b));
    }
    match (x.as_i64(), y.as_u64()) {
        // Negative i64 against a u64 beyond i64::MAX
        (Some(a), Some(_)) if a < 0 => return Some(Ordering::Less),
        _ => {}
    }
    match (x.as_u64(), y.as_i64()) {
        (Some(_), Some(b)) if b < 0 => return Some(Ordering::Greater),
        _ => {}
    }
    x.as_f64()?.partial_cmp(&y.as_f64()?)
}

fn compare(actual: Option<&Value>, expected: &Value) -> Option<Ordering> {
    match (actual?, expected) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn contains(list: &Value, actual: Option<&Value>) -> bool {
    match (list, actual) {
        (Value::Array(items), Some(actual)) => items.iter().any(|item| values_equal(actual, item)),
        (Value::Array(items), None) => items.iter().any(Value::is_null),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> Document {
        Document::from_value(json!({
            "fixture_id": 1001,
            "team_id": 5,
            "xg": 1.75,
            "venue": "home",
            "stats": {"shots": 14}
        }))
        .unwrap()
        .with_id("1001:5")
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = QueryFilter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&fixture()));
        assert_eq!(filter.to_string(), "<all>");
    }

    #[test]
    fn test_builder_clauses() {
        let doc = fixture();
        assert!(QueryFilter::new().eq("team_id", 5).matches(&doc));
        assert!(QueryFilter::new().eq("team_id", 5.0).matches(&doc));
        assert!(!QueryFilter::new().eq("team_id", 6).matches(&doc));
        assert!(QueryFilter::new().gte("xg", 1.75).lt("xg", 2).matches(&doc));
        assert!(QueryFilter::new().gt("stats.shots", 10).matches(&doc));
        assert!(QueryFilter::new().is_in("venue", ["home", "neutral"]).matches(&doc));
        assert!(QueryFilter::new().exists("referee", false).matches(&doc));
        assert!(!QueryFilter::new().ne("venue", "home").matches(&doc));
    }

    #[test]
    fn test_filter_by_id() {
        assert!(QueryFilter::by_id("1001:5").matches(&fixture()));
        assert!(!QueryFilter::by_id("1001:6").matches(&fixture()));
    }

    #[test]
    fn test_null_equality_matches_missing_field() {
        assert!(QueryFilter::new().eq("referee", Value::Null).matches(&fixture()));
    }

    #[test]
    fn test_comparison_across_types_never_matches() {
        assert!(!QueryFilter::new().gt("venue", 3).matches(&fixture()));
        assert!(!QueryFilter::new().lt("missing", 3).matches(&fixture()));
    }

    #[test]
    fn test_from_json_mongo_style() {
        let filter = QueryFilter::from_json(&json!({
            "team_id": 5,
            "xg": {"$gte": 1.0, "$lte": 2.0},
            "fixture_id": {"$in": [1000, 1001]}
        }))
        .unwrap();

        assert_eq!(filter.len(), 4);
        assert!(filter.matches(&fixture()));
    }

    #[test]
    fn test_from_json_null_is_empty() {
        assert!(QueryFilter::from_json(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_from_json_rejects_malformed_filters() {
        assert!(QueryFilter::from_json(&json!([1, 2])).is_err());
        assert!(QueryFilter::from_json(&json!({"a": {"$regex": "x"}})).is_err());
        assert!(QueryFilter::from_json(&json!({"a": {"$in": 3}})).is_err());
        assert!(QueryFilter::from_json(&json!({"a": {"$exists": "yes"}})).is_err());
        assert!(QueryFilter::from_json(&json!({"": 1})).is_err());
    }

    #[test]
    fn test_nested_object_equality_without_operators() {
        let doc = Document::from_value(json!({"meta": {"round": 3}})).unwrap();
        let filter = QueryFilter::from_json(&json!({"meta": {"round": 3}})).unwrap();
        assert!(filter.matches(&doc));
    }

    #[test]
    fn test_wire_format_is_clause_list() {
        let filter = QueryFilter::new().eq("team_id", 5);
        let wire = serde_json::to_value(&filter).unwrap();
        assert_eq!(wire, json!([{"field": "team_id", "op": "eq", "value": 5}]));

        let back: QueryFilter = serde_json::from_value(wire).unwrap();
        assert_eq!(back, filter);
    }

    #[test]
    fn test_large_integers_compare_exactly() {
        let doc = Document::from_value(json!({"fixture_id": 9007199254740992u64})).unwrap();

        assert!(!QueryFilter::new().eq("fixture_id", 9007199254740993u64).matches(&doc));
        assert!(QueryFilter::new().eq("fixture_id", 9007199254740992u64).matches(&doc));
        assert!(QueryFilter::new().lt("fixture_id", 9007199254740993u64).matches(&doc));
        assert!(!QueryFilter::new()
            .is_in("fixture_id", [9007199254740991u64, 9007199254740993u64])
            .matches(&doc));

        let big = Document::from_value(json!({"n": u64::MAX})).unwrap();
        assert!(QueryFilter::new().gt("n", -1).matches(&big));
        assert!(QueryFilter::new().eq("n", u64::MAX).matches(&big));

        // Mixed integer and float still compare numerically
        assert!(QueryFilter::new().eq("fixture_id", 9.007199254740992e15).matches(&doc));
    }

    #[test]
    fn test_display_lists_clauses() {
        let filter = QueryFilter::new().eq("team_id", 5).gte("xg", 1.5);
        assert_eq!(filter.to_string(), "team_id eq 5 AND xg gte 1.5");
    }
}
