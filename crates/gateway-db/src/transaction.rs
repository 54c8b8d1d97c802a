//! Explicit transaction scoping.
//!
//! Every mutation runs inside an explicit `BEGIN`/`COMMIT`/`ROLLBACK`, even a
//! single-statement write, so single-op and multi-op (batch, transaction)
//! mutations share one commit/rollback code path instead of two.

use gateway_error::Result;

use crate::traits::WarehouseConnection;

/// Runs `body` inside a transaction on `conn`. Commits on `Ok`, rolls back
/// (best-effort, logging but not propagating a rollback failure) on `Err`.
pub async fn transaction_context<F, Fut, T>(conn: &dyn WarehouseConnection, body: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    conn.begin().await?;

    match body().await {
        Ok(value) => {
            conn.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = conn.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback after failed transaction also failed");
            }
            Err(err)
        }
    }
}
