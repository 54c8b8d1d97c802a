//! SCHEMA handlers (spec §4.9): one instance per `SchemaScenario`, all
//! running on a service-principal lease rather than OBO, since catalog
//! metadata is not user-scoped the way row data is.

use std::collections::BTreeMap;

use async_trait::async_trait;
use gateway_core::{HandlerOutput, OperationRequest, OperationResponse};
use gateway_db::PostgresConnection;
use gateway_error::{GatewayError, Result};
use serde_json::{json, Value as JsonValue};

use crate::deps::Dependencies;
use crate::registry::Handler;
use crate::context::RequestContext;

fn named_query_params(request: &OperationRequest) -> BTreeMap<String, JsonValue> {
    let mut params = BTreeMap::new();
    if let Some(catalog) = &request.catalog {
        params.insert("catalog".to_string(), json!(catalog));
    }
    if let Some(schema_name) = &request.schema_name {
        params.insert("schema".to_string(), json!(schema_name));
    }
    params
}

async fn run_named_query(key: &str, request: &OperationRequest, deps: &Dependencies) -> Result<HandlerOutput> {
    let definition = deps.query_loader.get(key)?;
    let provided = named_query_params(request);
    let mut resolved = definition.apply_and_validate(&provided)?;
    let sql_text = definition.substitute_table_refs(&definition.sql, &mut resolved)?;

    let guard = deps.pool.get_connection(None).await?;
    let conn = PostgresConnection::new(guard);
    let rows = conn.execute_query(&sql_text, &resolved).await?;
    let columns = rows.first().map(|r| r.keys().cloned().collect()).unwrap_or_default();
    Ok(HandlerOutput::Query(gateway_core::rows_result(rows, columns)))
}

fn table_ref_of(request: &OperationRequest) -> Result<String> {
    if !request.table.is_empty() {
        return Ok(request.table.clone());
    }
    let catalog = request.catalog.as_deref().ok_or_else(|| {
        GatewayError::validation("SCHEMA request requires a table reference or catalog/schema_name", "catalog is absent")
    })?;
    let schema_name = request.schema_name.as_deref().ok_or_else(|| {
        GatewayError::validation("SCHEMA request requires a table reference or catalog/schema_name", "schema_name is absent")
    })?;
    Err(GatewayError::validation(
        "SCHEMA request requires a table reference",
        format!("no table given for {catalog}.{schema_name}"),
    ))
}

pub struct ListCatalogsHandler;

#[async_trait]
impl Handler for ListCatalogsHandler {
    async fn handle(&self, _ctx: &RequestContext, request: &OperationRequest, deps: &Dependencies) -> Result<HandlerOutput> {
        run_named_query("schema.list_catalogs", request, deps).await
    }
}

pub struct ListSchemasHandler;

#[async_trait]
impl Handler for ListSchemasHandler {
    async fn handle(&self, _ctx: &RequestContext, request: &OperationRequest, deps: &Dependencies) -> Result<HandlerOutput> {
        run_named_query("schema.list_schemas", request, deps).await
    }
}

pub struct ListTablesHandler;

#[async_trait]
impl Handler for ListTablesHandler {
    async fn handle(&self, _ctx: &RequestContext, request: &OperationRequest, deps: &Dependencies) -> Result<HandlerOutput> {
        run_named_query("schema.list_tables", request, deps).await
    }
}

pub struct TableColumnsHandler;

#[async_trait]
impl Handler for TableColumnsHandler {
    async fn handle(&self, _ctx: &RequestContext, request: &OperationRequest, deps: &Dependencies) -> Result<HandlerOutput> {
        let table_ref = table_ref_of(request)?;
        let schema = deps.schema_provider.get_table_schema(&table_ref).await?;
        let mut response = OperationResponse::ok("table columns resolved");
        response.schema = schema.columns.clone();
        response.columns = schema.column_names();
        response.data = Some(json!({ "table": schema.table_ref(), "columns": schema.columns }));
        Ok(HandlerOutput::Response(response))
    }
}

pub struct TableInfoHandler;

#[async_trait]
impl Handler for TableInfoHandler {
    async fn handle(&self, _ctx: &RequestContext, request: &OperationRequest, deps: &Dependencies) -> Result<HandlerOutput> {
        let table_ref = table_ref_of(request)?;
        let schema = deps.schema_provider.get_table_schema(&table_ref).await?;
        let mut response = OperationResponse::ok("table info resolved");
        response.schema = schema.columns.clone();
        response.columns = schema.column_names();
        response.data = Some(json!({
            "catalog": schema.catalog,
            "schema": schema.schema,
            "table": schema.table,
            "primary_key_columns": schema.primary_key_columns(),
            "fetched_at": schema.fetched_at,
        }));
        Ok(HandlerOutput::Response(response))
    }
}

pub struct InvalidateTableSchemaHandler;

#[async_trait]
impl Handler for InvalidateTableSchemaHandler {
    async fn handle(&self, _ctx: &RequestContext, request: &OperationRequest, deps: &Dependencies) -> Result<HandlerOutput> {
        let table_ref = table_ref_of(request)?;
        deps.schema_provider.invalidate_table_schema(&table_ref);
        Ok(HandlerOutput::Response(OperationResponse::ok("table schema cache invalidated")))
    }
}
