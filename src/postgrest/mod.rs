//! Database operations through the REST API

mod filter;
mod query;

use reqwest::Client;
use serde::Serialize;

use crate::error::Result;

pub use filter::*;
pub use query::*;

/// Client for database operations
#[derive(Debug, Clone)]
pub struct Postgrest {
    /// The base URL for the project
    url: String,

    /// The public API key
    key: String,

    /// Token sent as the bearer credential
    token: String,

    /// The database schema
    schema: String,

    /// HTTP client
    client: Client,
}

impl Postgrest {
    pub(crate) fn new(url: &str, key: &str, token: &str, schema: &str, client: Client) -> Self {
        Self {
            url: url.to_string(),
            key: key.to_string(),
            token: token.to_string(),
            schema: schema.to_string(),
            client,
        }
    }

    /// Start a query on a table or view
    pub fn from(&self, table: &str) -> TableQuery {
        TableQuery::new(
            format!("{}/rest/v1/{}", self.url, table),
            self.key.clone(),
            self.token.clone(),
            self.schema.clone(),
            self.client.clone(),
        )
    }

    /// Call a database function
    pub fn rpc<P: Serialize>(&self, function: &str, params: &P) -> Result<RpcCall> {
        let params = serde_json::to_value(params)?;
        Ok(RpcCall::new(
            format!("{}/rest/v1/rpc/{}", self.url, function),
            self.key.clone(),
            self.token.clone(),
            self.schema.clone(),
            params,
            self.client.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> Postgrest {
        Postgrest::new(&server.uri(), "anon", "user-token", "public", Client::new())
    }

    #[test]
    fn builder_collects_params_in_order() {
        let db = Postgrest::new("http://localhost", "k", "t", "public", Client::new());
        let query = db
            .from("spaces")
            .select("*,space_attendees(user_id)")
            .eq("status", "active")
            .in_list("id", &[1, 2])
            .gte("end_time", "2030-01-01T00:00:00Z")
            .order("start_time", SortOrder::Ascending)
            .limit(10);
        let params: Vec<(&str, &str)> = query
            .params()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            params,
            vec![
                ("select", "*,space_attendees(user_id)"),
                ("status", "eq.active"),
                ("id", "in.(1,2)"),
                ("end_time", "gte.2030-01-01T00:00:00Z"),
                ("order", "start_time.asc"),
                ("limit", "10"),
            ]
        );
    }

    #[tokio::test]
    async fn select_sends_filters_and_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .and(query_param("id", "eq.42"))
            .and(header("apikey", "anon"))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 42 }])))
            .expect(1)
            .mount(&server)
            .await;

        let row: Option<serde_json::Value> = client(&server)
            .from("profiles")
            .select("*")
            .eq("id", 42)
            .single()
            .await
            .unwrap();
        assert_eq!(row, Some(json!({ "id": 42 })));
    }

    #[tokio::test]
    async fn insert_asks_for_representation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/ratings"))
            .and(header("prefer", "return=representation"))
            .and(body_json(json!({ "score": 5 })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{ "id": "r1", "score": 5 }])))
            .mount(&server)
            .await;

        let rows: Vec<serde_json::Value> = client(&server)
            .from("ratings")
            .insert(&json!({ "score": 5 }))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn rpc_posts_params_and_maps_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/validate_invite_code"))
            .and(body_json(json!({ "p_code": "ABC" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/check_event_capacity"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({ "code": "PGRST202", "message": "function not found" })),
            )
            .mount(&server)
            .await;

        let db = client(&server);
        let valid: bool = db
            .rpc("validate_invite_code", &json!({ "p_code": "ABC" }))
            .unwrap()
            .execute()
            .await
            .unwrap();
        assert!(valid);

        let err = db
            .rpc("check_event_capacity", &json!({ "p_event_id": "e" }))
            .unwrap()
            .execute::<bool>()
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
    }
}
