use async_trait::async_trait;
use serde_json::Value;

use crate::backend::{EqFilter, OrderBy, TableBackend};
use crate::error::{Result, StoreError};

/// `TableBackend` over the hosted data service's REST surface.
///
/// Each table maps to `{base_url}/{table}`; equality filters and ordering
/// are passed as query parameters. Requests carry the project API key and
/// the authenticated user's access token.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, api_key: &str, access_token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            access_token: access_token.to_string(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.access_token))
    }

    fn filter_params(filters: &[EqFilter]) -> Vec<(String, String)> {
        filters
            .iter()
            .map(|f| {
                let rendered = match &f.value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (f.column.clone(), format!("eq.{rendered}"))
            })
            .collect()
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Backend {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl TableBackend for HttpBackend {
    async fn select(
        &self,
        table: &str,
        filters: &[EqFilter],
        order: Option<&OrderBy>,
    ) -> Result<Vec<Value>> {
        let mut params = Self::filter_params(filters);
        if let Some(order) = order {
            let dir = if order.descending { "desc" } else { "asc" };
            params.push(("order".to_string(), format!("{}.{dir}", order.column)));
        }

        let resp = self
            .request(reqwest::Method::GET, &self.table_url(table))
            .query(&params)
            .send()
            .await?;
        let rows: Vec<Value> = Self::check(resp).await?.json().await?;
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let resp = self
            .request(reqwest::Method::POST, &self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;
        let mut rows: Vec<Value> = Self::check(resp).await?.json().await?;
        if rows.is_empty() {
            return Err(StoreError::Other(format!(
                "insert into {table} returned no representation"
            )));
        }
        Ok(rows.remove(0))
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value> {
        let resp = self
            .request(reqwest::Method::PATCH, &self.table_url(table))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        let mut rows: Vec<Value> = Self::check(resp).await?.json().await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound {
                entity: "row",
                id: id.to_string(),
            });
        }
        Ok(rows.remove(0))
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        let resp = self
            .request(reqwest::Method::DELETE, &self.table_url(table))
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }
}
