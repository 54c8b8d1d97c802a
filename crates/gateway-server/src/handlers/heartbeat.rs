//! Best-effort liveness check (spec §4.9). Never fails the request: a
//! failed warehouse ping is reported as a degraded status, not an error.

use async_trait::async_trait;
use gateway_core::{HandlerOutput, OperationRequest, OperationResponse};
use gateway_db::{PostgresConnection, WarehouseConnection};
use gateway_error::Result;
use serde_json::json;

use crate::context::RequestContext;
use crate::deps::Dependencies;
use crate::registry::Handler;

pub struct HeartbeatHandler;

#[async_trait]
impl Handler for HeartbeatHandler {
    async fn handle(&self, ctx: &RequestContext, _request: &OperationRequest, deps: &Dependencies) -> Result<HandlerOutput> {
        let outcome = async {
            let guard = deps.pool.get_connection(ctx.obo_token.as_deref()).await?;
            let conn = PostgresConnection::new(guard);
            conn.execute_non_query("SELECT 1", &Default::default()).await
        }
        .await;

        let mut response = OperationResponse::ok("heartbeat");
        match outcome {
            Ok(_) => {
                response.data = Some(json!({"status": "ok"}));
            }
            Err(e) => {
                response.data = Some(json!({"status": "degraded", "detail": e.user_message()}));
            }
        }
        Ok(HandlerOutput::Response(response))
    }
}
