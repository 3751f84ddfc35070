//! REST wire types.
//!
//! Request and response bodies are camelCase JSON. Filters travel as their
//! clause list (`[{"field", "op", "value"}]`).

use docgate_models::{Document, QueryFilter};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest<'a> {
    pub filter: &'a QueryFilter,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<&'a str>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountRequest<'a> {
    pub filter: &'a QueryFilter,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpsertRequest<'a> {
    pub documents: &'a [Document],
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteManyRequest<'a> {
    pub filter: &'a QueryFilter,
    pub allow_empty: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteManyResponse {
    pub deleted: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateManyRequest<'a> {
    pub filter: &'a QueryFilter,
    pub set: &'a Map<String, Value>,
    pub allow_empty: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_request_shape() {
        let filter = QueryFilter::new().eq("team_id", 5);
        let body = serde_json::to_value(QueryRequest {
            filter: &filter,
            limit: Some(10),
            page_token: Some("abc"),
        })
        .unwrap();

        assert_eq!(
            body,
            json!({
                "filter": [{"field": "team_id", "op": "eq", "value": 5}],
                "limit": 10,
                "pageToken": "abc"
            })
        );
    }

    #[test]
    fn test_query_response_tolerates_missing_fields() {
        let resp: QueryResponse = serde_json::from_value(json!({})).unwrap();
        assert!(resp.documents.is_empty());
        assert!(resp.next_page_token.is_none());
    }
}
