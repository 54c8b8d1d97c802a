//! The driver port: the one trait object every handler executes SQL through.

use std::collections::BTreeMap;

use async_trait::async_trait;
use gateway_error::Result;
use serde_json::Value as JsonValue;

use crate::types::{ColumnarBatch, JsonRow};

/// A checked-out connection to the warehouse, bound to a single identity
/// (service principal or on-behalf-of user). Implementations wrap a real
/// driver handle; `Send` because the lifecycle may hop tasks around a
/// timeout.
#[async_trait]
pub trait WarehouseConnection: Send + Sync {
    async fn execute_query(&self, sql: &str, params: &BTreeMap<String, JsonValue>) -> Result<Vec<JsonRow>>;

    async fn execute_query_arrow(
        &self,
        sql: &str,
        params: &BTreeMap<String, JsonValue>,
    ) -> Result<arrow::record_batch::RecordBatch>;

    async fn execute_query_frame(
        &self,
        sql: &str,
        params: &BTreeMap<String, JsonValue>,
    ) -> Result<ColumnarBatch>;

    /// Returns rows affected. Databricks-style drivers report `-1` when the
    /// affected-row count is unknown rather than zero; callers must not
    /// treat `-1` as failure.
    async fn execute_non_query(&self, sql: &str, params: &BTreeMap<String, JsonValue>) -> Result<i64>;

    async fn execute_non_query_many(
        &self,
        sql_template: &str,
        param_sets: &[BTreeMap<String, JsonValue>],
    ) -> Result<i64>;

    async fn begin(&self) -> Result<()>;
    async fn commit(&self) -> Result<()>;
    async fn rollback(&self) -> Result<()>;

    /// Best-effort cancellation of whatever statement is in flight on this
    /// connection. Used by the per-statement timeout to interrupt a stalled
    /// driver call rather than leaving it running after the caller has
    /// moved on.
    async fn cancel(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarehouseKind {
    DatabricksSql,
}
