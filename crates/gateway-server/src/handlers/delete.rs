//! DELETE handlers: SINGLE and BATCH (spec §4.9). Both funnel into
//! `DeleteIntent`, which already OR-combines multiple primary-key sets
//! into one statement, so batch delete needs no per-record looping.

use async_trait::async_trait;
use gateway_core::{sql, DeleteIntent, HandlerOutput, OperationRequest, OperationResponse, WhereSpec};
use gateway_db::{transaction_context, PostgresConnection};
use gateway_error::{GatewayError, Result};

use crate::context::RequestContext;
use crate::deps::Dependencies;
use crate::intent_build::shared_where_map;
use crate::registry::Handler;

fn pk_sets(where_spec: &Option<WhereSpec>) -> Result<Vec<std::collections::BTreeMap<String, serde_json::Value>>> {
    match where_spec {
        Some(WhereSpec::PerRecord(sets)) => Ok(sets.clone()),
        Some(WhereSpec::Shared(map)) => Ok(vec![map.clone()]),
        None => Err(GatewayError::validation("DELETE requires filter_where", "filter_where is absent")),
    }
}

pub struct DeleteSingleHandler;

#[async_trait]
impl Handler for DeleteSingleHandler {
    async fn handle(&self, ctx: &RequestContext, request: &OperationRequest, deps: &Dependencies) -> Result<HandlerOutput> {
        let pk_values = shared_where_map(&request.filter_where)?;
        if pk_values.is_empty() {
            return Err(GatewayError::validation("DELETE requires filter_where", "filter_where is empty"));
        }
        let intent = DeleteIntent::new(&request.table, vec![pk_values])?;
        let rendered = sql::build_delete(&intent)?;

        let guard = deps.pool.get_connection(ctx.obo_token.as_deref()).await?;
        let conn = PostgresConnection::new(guard);
        let affected = transaction_context(&conn, || conn.execute_non_query(&rendered.sql, &rendered.params)).await?;

        let response = if affected == 0 {
            OperationResponse {
                success: false,
                message: "No matching record".to_string(),
                ..Default::default()
            }
        } else {
            let mut response = OperationResponse::ok("delete succeeded");
            response.affected_rows = affected;
            response
        };
        Ok(HandlerOutput::Response(response))
    }
}

pub struct DeleteBatchHandler;

#[async_trait]
impl Handler for DeleteBatchHandler {
    async fn handle(&self, ctx: &RequestContext, request: &OperationRequest, deps: &Dependencies) -> Result<HandlerOutput> {
        let sets = pk_sets(&request.filter_where)?;
        let intent = DeleteIntent::new(&request.table, sets)?;
        let rendered = sql::build_delete(&intent)?;

        let guard = deps.pool.get_connection(ctx.obo_token.as_deref()).await?;
        let conn = PostgresConnection::new(guard);
        let affected = transaction_context(&conn, || conn.execute_non_query(&rendered.sql, &rendered.params)).await?;

        let mut response = OperationResponse::ok("batch delete succeeded");
        response.affected_rows = affected;
        Ok(HandlerOutput::Response(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_filter_where_is_rejected() {
        assert!(pk_sets(&None).is_err());
    }

    #[test]
    fn shared_where_becomes_one_set() {
        let mut map = std::collections::BTreeMap::new();
        map.insert("id".to_string(), json!(1));
        let sets = pk_sets(&Some(WhereSpec::Shared(map))).unwrap();
        assert_eq!(sets.len(), 1);
    }

    #[test]
    fn per_record_where_passes_through_every_set() {
        let mut a = std::collections::BTreeMap::new();
        a.insert("id".to_string(), json!(1));
        let mut b = std::collections::BTreeMap::new();
        b.insert("id".to_string(), json!(2));
        let sets = pk_sets(&Some(WhereSpec::PerRecord(vec![a, b]))).unwrap();
        assert_eq!(sets.len(), 2);
    }
}
