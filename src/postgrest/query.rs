//! Query builders for table and RPC requests

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};
use crate::fetch::{api_error, Fetch, FetchBuilder};
use crate::postgrest::filter::{list_literal, FilterOperator, SortOrder};

/// Builder for requests against one table
#[derive(Debug, Clone)]
pub struct TableQuery {
    url: String,
    key: String,
    token: String,
    schema: String,
    client: Client,
    params: Vec<(String, String)>,
}

impl TableQuery {
    pub(crate) fn new(url: String, key: String, token: String, schema: String, client: Client) -> Self {
        Self {
            url,
            key,
            token,
            schema,
            client,
            params: Vec::new(),
        }
    }

    fn request<'a>(&'a self, fetch: FetchBuilder<'a>) -> FetchBuilder<'a> {
        fetch
            .header("apikey", &self.key)
            .bearer_auth(&self.token)
            .header("Accept-Profile", &self.schema)
            .header("Content-Profile", &self.schema)
            .query(&self.params)
    }

    fn push(mut self, key: &str, value: String) -> Self {
        self.params.push((key.to_string(), value));
        self
    }

    /// Select specific columns; embedded resources use the usual `rel(cols)` syntax
    pub fn select(self, columns: &str) -> Self {
        self.push("select", columns.to_string())
    }

    /// Add a filter on a column
    pub fn filter(self, column: &str, operator: FilterOperator, value: &str) -> Self {
        let rendered = operator.apply(value);
        self.push(column, rendered)
    }

    /// Filter rows where column equals a value
    pub fn eq<T: ToString>(self, column: &str, value: T) -> Self {
        self.filter(column, FilterOperator::Eq, &value.to_string())
    }

    /// Filter rows where column is greater than or equal to a value
    pub fn gte<T: ToString>(self, column: &str, value: T) -> Self {
        self.filter(column, FilterOperator::Gte, &value.to_string())
    }

    /// Filter rows where column is in a list of values
    pub fn in_list<T: ToString>(self, column: &str, values: &[T]) -> Self {
        let literal = list_literal(values);
        self.filter(column, FilterOperator::In, &literal)
    }

    /// Order the results by a column
    pub fn order(self, column: &str, order: SortOrder) -> Self {
        self.push("order", format!("{}.{}", column, order.as_str()))
    }

    /// Limit the number of rows returned
    pub fn limit(self, count: usize) -> Self {
        self.push("limit", count.to_string())
    }

    /// Query parameters collected so far
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Execute the query and return the rows
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.request(Fetch::get(&self.client, &self.url))
            .execute::<Vec<T>>()
            .await
    }

    /// Execute the query and return the first row
    pub async fn single<T: DeserializeOwned>(self) -> Result<Option<T>> {
        let rows = self.limit(1).execute::<T>().await?;
        Ok(rows.into_iter().next())
    }

    /// Count the filtered rows without transferring them
    pub async fn count(&self) -> Result<usize> {
        let response = self
            .request(Fetch::head(&self.client, &self.url))
            .header("Prefer", "count=exact")
            .execute_raw()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let range = response
            .headers()
            .get("Content-Range")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        total_from_content_range(range)
            .ok_or_else(|| Error::General(format!("missing row count in Content-Range {:?}", range)))
    }

    /// Insert rows and return the stored representation
    pub async fn insert<T: Serialize + ?Sized, R: DeserializeOwned>(&self, values: &T) -> Result<Vec<R>> {
        self.request(Fetch::post(&self.client, &self.url))
            .header("Prefer", "return=representation")
            .json(values)?
            .execute::<Vec<R>>()
            .await
    }

    /// Insert rows without reading them back
    pub async fn insert_no_return<T: Serialize + ?Sized>(&self, values: &T) -> Result<()> {
        self.request(Fetch::post(&self.client, &self.url))
            .header("Prefer", "return=minimal")
            .json(values)?
            .execute_empty()
            .await
    }

    /// Insert or merge rows that collide on `on_conflict`
    pub async fn upsert<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        values: &T,
        on_conflict: &str,
    ) -> Result<Vec<R>> {
        self.request(Fetch::post(&self.client, &self.url))
            .header("Prefer", "return=representation,resolution=merge-duplicates")
            .query_pair("on_conflict", on_conflict)
            .json(values)?
            .execute::<Vec<R>>()
            .await
    }

    /// Update the filtered rows and return them
    pub async fn update<T: Serialize + ?Sized, R: DeserializeOwned>(&self, values: &T) -> Result<Vec<R>> {
        self.request(Fetch::patch(&self.client, &self.url))
            .header("Prefer", "return=representation")
            .json(values)?
            .execute::<Vec<R>>()
            .await
    }

    /// Delete the filtered rows
    pub async fn delete(&self) -> Result<()> {
        self.request(Fetch::delete(&self.client, &self.url))
            .header("Prefer", "return=minimal")
            .execute_empty()
            .await
    }
}

/// Total from `0-49/60` or `*/0`
fn total_from_content_range(range: &str) -> Option<usize> {
    range.rsplit_once('/')?.1.trim().parse().ok()
}

/// Builder for RPC (stored procedure) calls
#[derive(Debug, Clone)]
pub struct RpcCall {
    url: String,
    key: String,
    token: String,
    schema: String,
    params: serde_json::Value,
    client: Client,
}

impl RpcCall {
    pub(crate) fn new(
        url: String,
        key: String,
        token: String,
        schema: String,
        params: serde_json::Value,
        client: Client,
    ) -> Self {
        Self {
            url,
            key,
            token,
            schema,
            params,
            client,
        }
    }

    /// Execute the RPC call and return the result
    pub async fn execute<R: DeserializeOwned>(&self) -> Result<R> {
        Fetch::post(&self.client, &self.url)
            .header("apikey", &self.key)
            .bearer_auth(&self.token)
            .header("Content-Profile", &self.schema)
            .json(&self.params)?
            .execute::<R>()
            .await
    }

    /// Execute an RPC that returns nothing (`void` functions)
    pub async fn execute_void(&self) -> Result<()> {
        Fetch::post(&self.client, &self.url)
            .header("apikey", &self.key)
            .bearer_auth(&self.token)
            .header("Content-Profile", &self.schema)
            .json(&self.params)?
            .execute_empty()
            .await
    }
}
