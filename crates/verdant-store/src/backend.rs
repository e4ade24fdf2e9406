use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// An equality filter on one column.
#[derive(Debug, Clone)]
pub struct EqFilter {
    pub column: String,
    pub value: Value,
}

impl EqFilter {
    pub fn new(column: &str, value: impl Into<Value>) -> Self {
        Self {
            column: column.to_string(),
            value: value.into(),
        }
    }
}

/// Result ordering on one column.
#[derive(Debug, Clone)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            descending: true,
        }
    }
}

/// Generic table abstraction over the hosted data service.
///
/// Rows are JSON objects keyed by an `id` column. The store layer owns row
/// shapes and user scoping; implementations only move JSON in and out.
#[async_trait]
pub trait TableBackend: Send + Sync {
    /// Select rows matching every filter, optionally ordered.
    async fn select(
        &self,
        table: &str,
        filters: &[EqFilter],
        order: Option<&OrderBy>,
    ) -> Result<Vec<Value>>;

    /// Insert one row and return it as stored.
    async fn insert(&self, table: &str, row: Value) -> Result<Value>;

    /// Patch the row with the given `id` and return it as stored.
    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value>;

    /// Delete the row with the given `id`.
    async fn delete(&self, table: &str, id: &str) -> Result<()>;
}
