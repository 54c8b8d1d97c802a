//! Concrete [`WarehouseConnection`] backed by `tokio_postgres`.
//!
//! The warehouse this gateway fronts speaks a Databricks/Unity-Catalog SQL
//! dialect over its own wire protocol; no async, open-source Rust driver for
//! that protocol exists in this ecosystem. The pool and identity-reuse
//! semantics below are dialect-agnostic, so they are implemented once here
//! against `tokio_postgres` — the wire-protocol boundary the rest of the
//! gateway (builders, validators, lifecycle) never touches directly.

use std::collections::BTreeMap;

use async_trait::async_trait;
use gateway_error::{GatewayError, Result};
use serde_json::Value as JsonValue;

use crate::convert::{row_to_json, BoundValue};
use crate::placeholders::to_positional;
use crate::pool::ConnectionGuard;
use crate::types::{ColumnarBatch, JsonRow};

pub struct PostgresConnection {
    guard: ConnectionGuard,
}

impl PostgresConnection {
    pub fn new(guard: ConnectionGuard) -> Self {
        Self { guard }
    }

    fn bind(params: &BTreeMap<String, JsonValue>, order: &[JsonValue]) -> Vec<BoundValue> {
        let _ = params;
        order.iter().map(BoundValue::from).collect()
    }

    async fn query_rows(&self, sql: &str, params: &BTreeMap<String, JsonValue>) -> Result<(Vec<JsonRow>, Vec<String>)> {
        let (rewritten, order) = to_positional(sql, params)?;
        let bound = Self::bind(params, &order);
        let refs: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> =
            bound.iter().map(|v| v as &(dyn tokio_postgres::types::ToSql + Sync)).collect();

        let rows = self
            .guard
            .client()
            .query(&rewritten, &refs)
            .await
            .map_err(|e| query_execution_error(&rewritten, e))?;

        let columns = rows
            .first()
            .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        Ok((rows.iter().map(row_to_json).collect(), columns))
    }
}

fn query_execution_error(sql: &str, err: tokio_postgres::Error) -> GatewayError {
    let snippet: String = sql.chars().take(200).collect();
    GatewayError::QueryExecution {
        user_message: "The query could not be executed".to_string(),
        internal_message: err.to_string(),
        sql_snippet: Some(snippet),
    }
}

#[async_trait]
impl crate::traits::WarehouseConnection for PostgresConnection {
    async fn execute_query(&self, sql: &str, params: &BTreeMap<String, JsonValue>) -> Result<Vec<JsonRow>> {
        let (rows, _columns) = self.query_rows(sql, params).await?;
        Ok(rows)
    }

    async fn execute_query_arrow(
        &self,
        sql: &str,
        params: &BTreeMap<String, JsonValue>,
    ) -> Result<arrow::record_batch::RecordBatch> {
        let (rows, columns) = self.query_rows(sql, params).await?;
        crate::arrow_bridge::rows_to_record_batch(&rows, &columns)
    }

    async fn execute_query_frame(
        &self,
        sql: &str,
        params: &BTreeMap<String, JsonValue>,
    ) -> Result<ColumnarBatch> {
        let (rows, columns) = self.query_rows(sql, params).await?;
        Ok(ColumnarBatch::from_rows(&columns, &rows))
    }

    async fn execute_non_query(&self, sql: &str, params: &BTreeMap<String, JsonValue>) -> Result<i64> {
        let (rewritten, order) = to_positional(sql, params)?;
        let bound = Self::bind(params, &order);
        let refs: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> =
            bound.iter().map(|v| v as &(dyn tokio_postgres::types::ToSql + Sync)).collect();

        let affected = self
            .guard
            .client()
            .execute(&rewritten, &refs)
            .await
            .map_err(|e| query_execution_error(&rewritten, e))?;

        Ok(affected as i64)
    }

    async fn execute_non_query_many(
        &self,
        sql_template: &str,
        param_sets: &[BTreeMap<String, JsonValue>],
    ) -> Result<i64> {
        let mut total: i64 = 0;
        for params in param_sets {
            total += self.execute_non_query(sql_template, params).await?;
        }
        Ok(total)
    }

    async fn begin(&self) -> Result<()> {
        self.guard
            .client()
            .batch_execute("BEGIN")
            .await
            .map_err(|e| GatewayError::connection("Could not start a transaction", e.to_string()))
    }

    async fn commit(&self) -> Result<()> {
        self.guard
            .client()
            .batch_execute("COMMIT")
            .await
            .map_err(|e| GatewayError::connection("Could not commit the transaction", e.to_string()))
    }

    async fn rollback(&self) -> Result<()> {
        self.guard
            .client()
            .batch_execute("ROLLBACK")
            .await
            .map_err(|e| GatewayError::connection("Could not roll back the transaction", e.to_string()))
    }

    async fn cancel(&self) -> Result<()> {
        self.guard
            .client()
            .cancel_token()
            .cancel_query(tokio_postgres::NoTls)
            .await
            .map_err(|e| GatewayError::connection("Could not cancel the in-flight statement", e.to_string()))
    }
}
