//! Per-statement timeout and best-effort cancellation.
//!
//! Every driver call is raced against a deadline. If the deadline wins, the
//! in-flight call is not just abandoned: `cancel` is sent on the same
//! connection first, so the warehouse itself learns the statement is no
//! longer wanted rather than continuing to burn compute for a caller that
//! has already moved on.

use std::future::Future;
use std::time::Duration;

use gateway_error::{GatewayError, Result};
use tracing::warn;

use crate::traits::WarehouseConnection;

/// Runs `fut` to completion or until `timeout` elapses, whichever comes
/// first. On timeout, issues a best-effort `cancel()` against `conn` before
/// returning a `Timeout` error; cancellation failures are logged, not
/// propagated, since the timeout itself is the operative failure.
pub async fn with_statement_timeout<F, T>(
    conn: &dyn WarehouseConnection,
    timeout: Duration,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            if let Err(e) = conn.cancel().await {
                warn!(error = %e, "cancel() after statement timeout failed");
            }
            Err(GatewayError::timeout(
                "statement exceeded its execution deadline",
                timeout.as_millis() as u64,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gateway_error::Result as GResult;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct SlowConn {
        cancelled: Arc<AtomicBool>,
    }

    #[async_trait]
    impl WarehouseConnection for SlowConn {
        async fn execute_query(
            &self,
            _sql: &str,
            _params: &BTreeMap<String, serde_json::Value>,
        ) -> GResult<Vec<crate::types::JsonRow>> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(Vec::new())
        }

        async fn execute_query_arrow(
            &self,
            _sql: &str,
            _params: &BTreeMap<String, serde_json::Value>,
        ) -> GResult<arrow::record_batch::RecordBatch> {
            unimplemented!()
        }

        async fn execute_query_frame(
            &self,
            _sql: &str,
            _params: &BTreeMap<String, serde_json::Value>,
        ) -> GResult<crate::types::ColumnarBatch> {
            unimplemented!()
        }

        async fn execute_non_query(&self, _sql: &str, _params: &BTreeMap<String, serde_json::Value>) -> GResult<i64> {
            unimplemented!()
        }

        async fn execute_non_query_many(
            &self,
            _sql_template: &str,
            _param_sets: &[BTreeMap<String, serde_json::Value>],
        ) -> GResult<i64> {
            unimplemented!()
        }

        async fn begin(&self) -> GResult<()> {
            Ok(())
        }

        async fn commit(&self) -> GResult<()> {
            Ok(())
        }

        async fn rollback(&self) -> GResult<()> {
            Ok(())
        }

        async fn cancel(&self) -> GResult<()> {
            self.cancelled.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_triggers_cancel() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let conn = SlowConn { cancelled: cancelled.clone() };
        let timeout_fut = with_statement_timeout(&conn, Duration::from_millis(10), async {
            conn.execute_query("select 1", &BTreeMap::new()).await
        });
        tokio::pin!(timeout_fut);
        tokio::time::advance(Duration::from_millis(20)).await;
        let result = timeout_fut.await;
        assert!(matches!(result, Err(GatewayError::Timeout { .. })));
        assert!(cancelled.load(Ordering::SeqCst));
    }
}
