//! READ handlers: SINGLE, BATCH, NAMED (spec §4.9).

use std::collections::BTreeMap;

use async_trait::async_trait;
use gateway_core::{sql, DataFormat, HandlerOutput, OperationRequest, RequestOptions, SelectIntent};
use gateway_db::{PostgresConnection, QueryResult, WarehouseConnection};
use gateway_error::{GatewayError, Result};

use crate::context::RequestContext;
use crate::deps::Dependencies;
use crate::intent_build::map_to_filters;
use crate::registry::Handler;

async fn execute_select(
    conn: &PostgresConnection,
    rendered: &gateway_core::RenderedStatement,
    data_format: DataFormat,
    columns: Vec<String>,
) -> Result<QueryResult> {
    match data_format {
        DataFormat::JsonRows => {
            let rows = conn.execute_query(&rendered.sql, &rendered.params).await?;
            Ok(QueryResult::rows(rows, columns))
        }
        DataFormat::Arrow => {
            let batch = conn.execute_query_arrow(&rendered.sql, &rendered.params).await?;
            Ok(QueryResult {
                arrow_batch: Some(batch),
                columns,
                data_format: DataFormat::Arrow,
                ..Default::default()
            })
        }
        DataFormat::Frame => {
            let frame = conn.execute_query_frame(&rendered.sql, &rendered.params).await?;
            let row_count = frame.len();
            Ok(QueryResult {
                row_count,
                frame: Some(frame),
                columns,
                data_format: DataFormat::Frame,
                ..Default::default()
            })
        }
    }
}

pub struct ReadSingleHandler;

#[async_trait]
impl Handler for ReadSingleHandler {
    async fn handle(&self, ctx: &RequestContext, request: &OperationRequest, deps: &Dependencies) -> Result<HandlerOutput> {
        let filters = match &request.filter_where {
            Some(spec) => map_to_filters(&crate::intent_build::shared_where_map(&Some(spec.clone()))?),
            None => vec![],
        };
        let columns = request.columns.clone().unwrap_or_default();
        let intent = SelectIntent::new(
            &request.table,
            columns,
            filters,
            &request.options,
            deps.config.default_read_limit,
            deps.config.max_read_limit,
        )?;
        let rendered = sql::build_select(&intent)?;

        let guard = deps.pool.get_connection(ctx.obo_token.as_deref()).await?;
        let conn = PostgresConnection::new(guard);
        let result = gateway_db::with_statement_timeout(
            &conn,
            deps.config.query_timeout,
            execute_select(&conn, &rendered, request.data_format, intent.columns.clone()),
        )
        .await?;
        Ok(HandlerOutput::Query(result))
    }
}

/// Executes one `SELECT` per primary-key set and concatenates the rows.
/// `SelectIntent`/`build_select` only AND-combine a single filter list (no
/// OR-of-AND-groups), so a batch read with several PK sets is expressed as
/// N single-set reads rather than one OR'd statement; documented as a
/// deliberate simplification in the grounding ledger.
pub struct ReadBatchHandler;

#[async_trait]
impl Handler for ReadBatchHandler {
    async fn handle(&self, ctx: &RequestContext, request: &OperationRequest, deps: &Dependencies) -> Result<HandlerOutput> {
        let sets = match &request.filter_where {
            Some(gateway_core::WhereSpec::PerRecord(sets)) => sets.clone(),
            Some(gateway_core::WhereSpec::Shared(map)) => vec![map.clone()],
            None => {
                return Err(GatewayError::validation(
                    "Batch READ requires filter_where",
                    "filter_where is absent for READ/BATCH",
                ))
            }
        };

        let columns = request.columns.clone().unwrap_or_default();
        let guard = deps.pool.get_connection(ctx.obo_token.as_deref()).await?;
        let conn = PostgresConnection::new(guard);

        let mut all_rows = Vec::new();
        let mut result_columns = columns.clone();
        for set in &sets {
            let filters = map_to_filters(set);
            let intent = SelectIntent::new(
                &request.table,
                columns.clone(),
                filters,
                &RequestOptions::default(),
                deps.config.default_read_limit,
                deps.config.max_read_limit,
            )?;
            let rendered = sql::build_select(&intent)?;
            let rows = conn.execute_query(&rendered.sql, &rendered.params).await?;
            if result_columns.is_empty() {
                if let Some(first) = rows.first() {
                    result_columns = first.keys().cloned().collect();
                }
            }
            all_rows.extend(rows);
        }

        Ok(HandlerOutput::Query(QueryResult::rows(all_rows, result_columns)))
    }
}

pub struct ReadNamedHandler;

#[async_trait]
impl Handler for ReadNamedHandler {
    async fn handle(&self, ctx: &RequestContext, request: &OperationRequest, deps: &Dependencies) -> Result<HandlerOutput> {
        let key = &request.table;
        let definition = deps.query_loader.get(key)?;

        let provided: BTreeMap<String, serde_json::Value> = request
            .filter_where
            .as_ref()
            .map(|spec| crate::intent_build::shared_where_map(&Some(spec.clone())))
            .transpose()?
            .unwrap_or_default();
        let mut resolved = definition.apply_and_validate(&provided)?;
        let sql_text = definition.substitute_table_refs(&definition.sql, &mut resolved)?;

        let guard = deps.pool.get_connection(ctx.obo_token.as_deref()).await?;
        let conn = PostgresConnection::new(guard);
        let rows = conn.execute_query(&sql_text, &resolved).await?;
        let columns = rows.first().map(|r| r.keys().cloned().collect()).unwrap_or_default();
        Ok(HandlerOutput::Query(QueryResult::rows(rows, columns)))
    }
}
