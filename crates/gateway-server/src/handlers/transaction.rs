//! TRANSACTION handler (spec §4.9): runs a list of single-record mutation
//! sub-operations on one connection inside one transaction. Shape is
//! enforced upstream by `gateway_core::validators::validate_transaction_shape`
//! during the VALIDATE phase; this handler trusts that invariant and only
//! re-checks per-operation WHERE safety before compiling SQL.

use async_trait::async_trait;
use gateway_core::{
    sql, validators, HandlerOutput, InsertIntent, Operation, OperationRequest, OperationResponse, UpdateIntent,
};
use gateway_db::{transaction_context, PostgresConnection};
use gateway_error::{GatewayError, Result};

use crate::context::RequestContext;
use crate::deps::Dependencies;
use crate::intent_build::{shared_where_map, single_payload};
use crate::registry::Handler;

async fn run_sub_operation(conn: &PostgresConnection, sub: &OperationRequest) -> Result<i64> {
    validators::validate_mutation_safety(sub)?;

    match sub.operation {
        Operation::Insert => {
            let values = single_payload(&sub.payload)?;
            let intent = InsertIntent::new(&sub.table, values)?;
            let rendered = sql::build_insert(&intent)?;
            conn.execute_non_query(&rendered.sql, &rendered.params).await
        }
        Operation::Update | Operation::Merge => {
            let pk_values = shared_where_map(&sub.filter_where)?;
            let updates = single_payload(&sub.payload)?;
            let old_values = sub.options.old_values.clone();
            let strategy = if sub.operation == Operation::Merge {
                gateway_core::UpdateStrategy::Merge
            } else {
                gateway_core::UpdateStrategy::Update
            };
            let intent = UpdateIntent::new(&sub.table, pk_values, updates, old_values, strategy)?;
            let rendered = sql::build_update(&intent)?;
            conn.execute_non_query(&rendered.sql, &rendered.params).await
        }
        Operation::Delete => {
            let pk_values = shared_where_map(&sub.filter_where)?;
            let intent = gateway_core::DeleteIntent::new(&sub.table, vec![pk_values])?;
            let rendered = sql::build_delete(&intent)?;
            conn.execute_non_query(&rendered.sql, &rendered.params).await
        }
        other => Err(GatewayError::validation(
            "Transaction sub-operations must be mutations",
            format!("{other:?} cannot appear inside a TRANSACTION"),
        )),
    }
}

pub struct TransactionHandler;

#[async_trait]
impl Handler for TransactionHandler {
    async fn handle(&self, ctx: &RequestContext, request: &OperationRequest, deps: &Dependencies) -> Result<HandlerOutput> {
        validators::validate_transaction_shape(request, deps.config.max_transaction_statements)?;

        let guard = deps.pool.get_connection(ctx.obo_token.as_deref()).await?;
        let conn = PostgresConnection::new(guard);

        let total_affected = transaction_context(&conn, || async {
            let mut total = 0i64;
            for sub in &request.operations {
                let affected = run_sub_operation(&conn, sub).await?;
                if affected > 0 {
                    total += affected;
                }
            }
            Ok(total)
        })
        .await?;

        let mut response = OperationResponse::ok("transaction succeeded");
        response.affected_rows = total_affected;
        Ok(HandlerOutput::Response(response))
    }
}
