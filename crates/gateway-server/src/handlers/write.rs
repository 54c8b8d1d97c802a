//! WRITE handlers: INSERT/UPDATE/MERGE, SINGLE and BATCH (spec §4.9).

use async_trait::async_trait;
use gateway_core::{sql, HandlerOutput, InsertIntent, Operation, OperationRequest, OperationResponse, UpdateIntent, UpdateStrategy};
use gateway_db::{transaction_context, PostgresConnection};
use gateway_error::{GatewayError, Result};

use crate::context::RequestContext;
use crate::deps::Dependencies;
use crate::intent_build::{batch_payload, per_record_where, shared_where_map, single_payload};
use crate::registry::Handler;

/// Folds an `execute_non_query` affected-row count into a write response.
/// `-1` means the driver didn't report a count; treated as success rather
/// than failure. `0` means no row matched: a conflict if `old_values` were
/// supplied (optimistic-concurrency check failed), otherwise a plain
/// not-found.
fn write_response(affected: i64, had_old_values: bool) -> OperationResponse {
    if affected == 0 {
        let message = if had_old_values {
            "No row matched the expected prior values".to_string()
        } else {
            "No matching record".to_string()
        };
        OperationResponse {
            success: false,
            message,
            affected_rows: 0,
            ..Default::default()
        }
    } else {
        let mut response = OperationResponse::ok("write succeeded");
        response.affected_rows = affected;
        response
    }
}

fn update_strategy(operation: Operation) -> UpdateStrategy {
    match operation {
        Operation::Merge => UpdateStrategy::Merge,
        _ => UpdateStrategy::Update,
    }
}

pub struct WriteSingleHandler;

#[async_trait]
impl Handler for WriteSingleHandler {
    async fn handle(&self, ctx: &RequestContext, request: &OperationRequest, deps: &Dependencies) -> Result<HandlerOutput> {
        let guard = deps.pool.get_connection(ctx.obo_token.as_deref()).await?;
        let conn = PostgresConnection::new(guard);

        let response = transaction_context(&conn, || async {
            match request.operation {
                Operation::Insert => {
                    let values = single_payload(&request.payload)?;
                    let intent = InsertIntent::new(&request.table, values)?;
                    let rendered = sql::build_insert(&intent)?;
                    let affected = conn.execute_non_query(&rendered.sql, &rendered.params).await?;
                    Ok(write_response(affected, false))
                }
                Operation::Update | Operation::Merge => {
                    let pk_values = shared_where_map(&request.filter_where)?;
                    let updates = single_payload(&request.payload)?;
                    let old_values = request.options.old_values.clone();
                    let intent = UpdateIntent::new(
                        &request.table,
                        pk_values,
                        updates,
                        old_values.clone(),
                        update_strategy(request.operation),
                    )?;
                    let rendered = sql::build_update(&intent)?;
                    let affected = conn.execute_non_query(&rendered.sql, &rendered.params).await?;
                    Ok(write_response(affected, !old_values.is_empty()))
                }
                other => Err(GatewayError::validation(
                    "Unsupported WRITE operation",
                    format!("{other:?} is not a write operation"),
                )),
            }
        })
        .await?;

        Ok(HandlerOutput::Response(response))
    }
}

/// Batch INSERT uses the driver's multi-row path on one templated
/// statement; batch UPDATE/MERGE has a per-record WHERE so each record
/// runs as its own statement inside the same transaction.
pub struct WriteBatchHandler;

#[async_trait]
impl Handler for WriteBatchHandler {
    async fn handle(&self, ctx: &RequestContext, request: &OperationRequest, deps: &Dependencies) -> Result<HandlerOutput> {
        let guard = deps.pool.get_connection(ctx.obo_token.as_deref()).await?;
        let conn = PostgresConnection::new(guard);

        let response = transaction_context(&conn, || async {
            match request.operation {
                Operation::Insert => {
                    let records = batch_payload(&request.payload)?;
                    if records.is_empty() {
                        return Err(GatewayError::validation("Batch INSERT requires at least one record", "payload is empty"));
                    }
                    let template = InsertIntent::new(&request.table, records[0].clone())?;
                    let rendered_template = sql::build_insert(&template)?;

                    let mut param_sets = Vec::with_capacity(records.len());
                    for record in &records {
                        let intent = InsertIntent::new(&request.table, record.clone())?;
                        let rendered = sql::build_insert(&intent)?;
                        param_sets.push(rendered.params);
                    }

                    let affected = conn.execute_non_query_many(&rendered_template.sql, &param_sets).await?;
                    let mut response = OperationResponse::ok("batch write succeeded");
                    response.affected_rows = affected;
                    Ok(response)
                }
                Operation::Update | Operation::Merge => {
                    let records = batch_payload(&request.payload)?;
                    let where_sets = per_record_where(&request.filter_where, records.len())?;
                    let strategy = update_strategy(request.operation);

                    let mut total_affected: i64 = 0;
                    for (record, pk_values) in records.iter().zip(where_sets.into_iter()) {
                        let intent = UpdateIntent::new(&request.table, pk_values, record.clone(), Default::default(), strategy)?;
                        let rendered = sql::build_update(&intent)?;
                        let affected = conn.execute_non_query(&rendered.sql, &rendered.params).await?;
                        if affected > 0 {
                            total_affected += affected;
                        }
                    }

                    let mut response = OperationResponse::ok("batch write succeeded");
                    response.affected_rows = total_affected;
                    Ok(response)
                }
                other => Err(GatewayError::validation(
                    "Unsupported WRITE operation",
                    format!("{other:?} is not a write operation"),
                )),
            }
        })
        .await?;

        Ok(HandlerOutput::Response(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_affected_without_old_values_is_not_found() {
        let response = write_response(0, false);
        assert!(!response.success);
        assert_eq!(response.message, "No matching record");
    }

    #[test]
    fn zero_affected_with_old_values_is_conflict_message() {
        let response = write_response(0, true);
        assert!(!response.success);
        assert_eq!(response.message, "No row matched the expected prior values");
    }

    #[test]
    fn unknown_affected_count_is_treated_as_success() {
        let response = write_response(-1, false);
        assert!(response.success);
        assert_eq!(response.affected_rows, -1);
    }
}
