//! PostgREST-style HTTP store
//!
//! `GET/POST/PATCH/DELETE {base}/rest/v1/{table}?col=eq.value`,
//! `POST {base}/rest/v1/rpc/{function}`.

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::{Filter, Query, RemoteStore};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};

/// Error body returned by PostgREST
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP implementation of [`RemoteStore`]
#[derive(Debug)]
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
    token: RwLock<Option<String>>,
}

impl RestStore {
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| StoreError::network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            token: RwLock::new(config.token.clone()),
        })
    }

    /// Replace the session token (on sign-in / refresh)
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .token
            .read()
            .clone()
            .unwrap_or_else(|| self.api_key.clone());
        request
            .header("apikey", &self.api_key)
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {}", bearer))
    }

    fn filter_params(filter: &Filter) -> Vec<(String, String)> {
        filter
            .eq
            .iter()
            .map(|(column, value)| (column.clone(), format!("eq.{}", value)))
            .collect()
    }

    /// Send and decode, mapping error bodies to [`StoreError`]
    async fn send(request: RequestBuilder) -> StoreResult<Value> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await?;
            return Err(Self::error_from_body(status, &text));
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(StoreError::decode)
    }

    fn error_from_body(status: StatusCode, text: &str) -> StoreError {
        match serde_json::from_str::<ErrorBody>(text) {
            Ok(ErrorBody {
                code: Some(code),
                message,
            }) => StoreError::new(code, message.unwrap_or_else(|| text.to_string())),
            _ => {
                let code = match status {
                    StatusCode::NOT_FOUND => StoreError::NOT_FOUND.to_string(),
                    StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => StoreError::DENIED.to_string(),
                    other => other.as_u16().to_string(),
                };
                StoreError::new(code, text.to_string())
            }
        }
    }

    fn into_rows(value: Value) -> Vec<Value> {
        match value {
            Value::Array(rows) => rows,
            Value::Null => Vec::new(),
            row => vec![row],
        }
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn select(&self, table: &str, query: Query) -> StoreResult<Vec<Value>> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(Self::filter_params(&query.filter));
        if let Some(order) = &query.order {
            let dir = if order.ascending { "asc" } else { "desc" };
            params.push(("order".to_string(), format!("{}.{}", order.column, dir)));
        }

        let request = self.authorize(self.client.get(self.table_url(table)).query(&params));
        Self::send(request).await.map(Self::into_rows)
    }

    async fn insert(&self, table: &str, row: Value) -> StoreResult<Value> {
        let request = self
            .authorize(self.client.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .json(&row);
        Self::into_rows(Self::send(request).await?)
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(format!("insert into {table} returned no row")))
    }

    async fn update(&self, table: &str, filter: Filter, patch: Value) -> StoreResult<Vec<Value>> {
        let request = self
            .authorize(
                self.client
                    .patch(self.table_url(table))
                    .query(&Self::filter_params(&filter)),
            )
            .header("Prefer", "return=representation")
            .json(&patch);
        Self::send(request).await.map(Self::into_rows)
    }

    async fn delete(&self, table: &str, filter: Filter) -> StoreResult<Vec<Value>> {
        let request = self
            .authorize(
                self.client
                    .delete(self.table_url(table))
                    .query(&Self::filter_params(&filter)),
            )
            .header("Prefer", "return=representation");
        Self::send(request).await.map(Self::into_rows)
    }

    async fn rpc(&self, function: &str, args: Value) -> StoreResult<Value> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, function);
        let request = self.authorize(self.client.post(url)).json(&args);
        Self::send(request).await
    }
}
