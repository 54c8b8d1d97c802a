//! Single-flight warmup gate (spec §4.6). Keeps a cold warehouse warm by
//! pinging it with a cheap statement, never on the caller's critical path
//! long enough to fail the request that triggered it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gateway_db::{ConnectionPool, PostgresConnection, WarehouseConnection};
use parking_lot::Mutex;
use tracing::warn;

struct WarmupState {
    last_success: Option<Instant>,
    last_attempt: Option<Instant>,
}

pub struct WarmupGate {
    enabled: bool,
    success_ttl: Duration,
    failure_backoff: Duration,
    warmup_sql: String,
    state: Mutex<WarmupState>,
}

impl WarmupGate {
    pub fn new(enabled: bool, success_ttl: Duration, failure_backoff: Duration, warmup_sql: String) -> Self {
        Self {
            enabled,
            success_ttl,
            failure_backoff,
            warmup_sql,
            state: Mutex::new(WarmupState {
                last_success: None,
                last_attempt: None,
            }),
        }
    }

    /// Best-effort: never returns an error to the caller. Runs the
    /// configured statement against an SP lease only, fast-path skipping
    /// when the warehouse is known warm or a recent attempt already failed.
    pub async fn warm(&self, pool: &Arc<ConnectionPool>) {
        if !self.enabled {
            return;
        }

        let now = Instant::now();
        {
            let state = self.state.lock();
            if let Some(last_success) = state.last_success {
                if now.duration_since(last_success) < self.success_ttl {
                    return;
                }
            }
            if let Some(last_attempt) = state.last_attempt {
                if now.duration_since(last_attempt) < self.failure_backoff {
                    return;
                }
            }
        }

        self.state.lock().last_attempt = Some(now);

        let outcome = async {
            let guard = pool.get_connection(None).await?;
            let conn = PostgresConnection::new(guard);
            conn.execute_non_query(&self.warmup_sql, &Default::default()).await
        }
        .await;

        match outcome {
            Ok(_) => {
                self.state.lock().last_success = Some(Instant::now());
            }
            Err(e) => {
                warn!(error = %e, "warehouse warmup attempt failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_gate_never_touches_state() {
        let gate = WarmupGate::new(false, Duration::from_secs(600), Duration::from_secs(30), "SELECT 1".into());
        assert!(gate.state.lock().last_attempt.is_none());
    }
}
