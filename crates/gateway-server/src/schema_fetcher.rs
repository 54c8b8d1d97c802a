//! Concrete `SchemaFetcher`: on a cache miss, reads the `schema.table_columns`
//! and `schema.primary_keys` named queries over an SP lease and merges their
//! rows into one `TableSchema` (spec §4.7).

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use gateway_core::identifiers::parse_table_ref;
use gateway_core::{QueryLoader, SchemaFetcher, TableSchema};
use gateway_db::{ColumnMetadata, ConnectionPool, PostgresConnection, WarehouseConnection};
use gateway_error::Result;
use serde_json::json;

pub struct WarehouseSchemaFetcher {
    pool: Arc<ConnectionPool>,
    query_loader: Arc<QueryLoader>,
}

impl WarehouseSchemaFetcher {
    pub fn new(pool: Arc<ConnectionPool>, query_loader: Arc<QueryLoader>) -> Self {
        Self { pool, query_loader }
    }
}

#[async_trait]
impl SchemaFetcher for WarehouseSchemaFetcher {
    async fn fetch(&self, table_ref: &str) -> Result<TableSchema> {
        let parts = parse_table_ref(table_ref)?;
        let mut params = BTreeMap::new();
        params.insert("catalog".to_string(), json!(parts.catalog));
        params.insert("schema".to_string(), json!(parts.schema));
        params.insert("table".to_string(), json!(parts.table));

        let guard = self.pool.get_connection(None).await?;
        let conn = PostgresConnection::new(guard);

        let columns_def = self.query_loader.get("schema.table_columns")?;
        let columns_params = columns_def.apply_and_validate(&params)?;
        let columns_rows = conn.execute_query(&columns_def.sql, &columns_params).await?;

        let pk_def = self.query_loader.get("schema.primary_keys")?;
        let pk_params = pk_def.apply_and_validate(&params)?;
        let pk_rows = conn.execute_query(&pk_def.sql, &pk_params).await?;
        let pk_columns: HashSet<String> = pk_rows
            .iter()
            .filter_map(|row| row.get("column_name").and_then(|v| v.as_str()).map(str::to_string))
            .collect();

        let mut columns = Vec::with_capacity(columns_rows.len());
        for row in &columns_rows {
            let name = row.get("column_name").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            let data_type = row.get("data_type").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            let nullable = row
                .get("is_nullable")
                .and_then(|v| v.as_str())
                .map(|s| s.eq_ignore_ascii_case("YES"))
                .unwrap_or(true);
            let ordinal_position = row.get("ordinal_position").and_then(|v| v.as_i64()).unwrap_or(0) as i32;
            let is_primary_key = pk_columns.contains(&name);
            columns.push(ColumnMetadata { name, data_type, nullable, is_primary_key, ordinal_position });
        }

        Ok(TableSchema {
            catalog: parts.catalog,
            schema: parts.schema,
            table: parts.table,
            columns,
            fetched_at: Utc::now(),
        })
    }
}
