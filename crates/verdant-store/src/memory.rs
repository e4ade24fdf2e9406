use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::backend::{EqFilter, OrderBy, TableBackend};
use crate::error::{Result, StoreError};

/// In-memory `TableBackend` used by tests and the host app's offline mode.
#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Vec<Value>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

fn matches(row: &Value, filters: &[EqFilter]) -> bool {
    filters
        .iter()
        .all(|f| row.get(&f.column) == Some(&f.value))
}

fn sort_key(row: &Value, column: &str) -> String {
    match row.get(column) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[async_trait]
impl TableBackend for MemoryBackend {
    async fn select(
        &self,
        table: &str,
        filters: &[EqFilter],
        order: Option<&OrderBy>,
    ) -> Result<Vec<Value>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Value> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches(row, filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = order {
            rows.sort_by_key(|row| sort_key(row, &order.column));
            if order.descending {
                rows.reverse();
            }
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value> {
        let mut tables = self.tables.write().await;
        let rows = tables.get_mut(table).ok_or_else(|| StoreError::NotFound {
            entity: "row",
            id: id.to_string(),
        })?;
        let row = rows
            .iter_mut()
            .find(|row| row_id(row) == Some(id))
            .ok_or_else(|| StoreError::NotFound {
                entity: "row",
                id: id.to_string(),
            })?;

        if let (Value::Object(target), Value::Object(fields)) = (&mut *row, &patch) {
            for (k, v) in fields {
                target.insert(k.clone(), v.clone());
            }
        }
        Ok(row.clone())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let rows = tables.get_mut(table).ok_or_else(|| StoreError::NotFound {
            entity: "row",
            id: id.to_string(),
        })?;
        let before = rows.len();
        rows.retain(|row| row_id(row) != Some(id));
        if rows.len() == before {
            return Err(StoreError::NotFound {
                entity: "row",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
