//! Connection pool with identity-aware reuse.
//!
//! Two identities ever acquire a connection: the service principal (SP),
//! whose connections are pooled and reused across requests, and
//! on-behalf-of (OBO) end users, whose connections are created fresh per
//! request and dropped afterward. The two are never mixed: an SP connection
//! never serves an OBO request and vice versa, because an OBO connection
//! carries a short-lived, per-user token that has no business outliving the
//! request that presented it.

use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use deadpool_postgres::{Config as PoolConfig, ManagerConfig, Pool, RecyclingMethod, Runtime};
use gateway_error::{GatewayError, Result};
use tokio_postgres::NoTls;
use tracing::{debug, warn};

tokio::task_local! {
    static CONNECTION_CACHE: RefCell<TaskConnectionCache>;
}

/// Per-task cache of the connections a task has already leased (spec.md
/// §4.3: "connections are task-local"). Entered once per logical request
/// via [`with_task_local_connections`]; torn down, and its connections
/// dropped, when that scope exits.
#[derive(Default)]
struct TaskConnectionCache {
    sp: Option<Arc<deadpool_postgres::Object>>,
    obo: Option<(String, Arc<tokio_postgres::Client>)>,
}

/// Runs `f` with a fresh task-local connection cache in scope, so that
/// repeated `get_connection` calls inside it reuse the same SP connection,
/// and the same OBO connection for a given token, instead of leasing a new
/// one each time. Call sites that never establish this scope (unit tests,
/// isolated tool invocations) still work correctly: `get_connection` simply
/// leases a fresh connection every time, it just doesn't reuse across calls.
pub async fn with_task_local_connections<F, Fut, T>(f: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    CONNECTION_CACHE.scope(RefCell::new(TaskConnectionCache::default()), f()).await
}

/// Settings the pool needs; the full application `Config` implements
/// conversion into this via `From`.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub host: String,
    pub port: u16,
    pub http_path: String,
    pub database: String,
    pub sp_token: Option<String>,
    pub max_pool_size: usize,
    pub connect_timeout: Duration,
    pub statement_timeout: Duration,
}

/// Owns the SP connection pool and knows how to mint one-shot OBO
/// connections. Cheap to clone (wraps an `Arc`).
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<Inner>,
}

struct Inner {
    settings: PoolSettings,
    sp_pool: Pool,
}

impl ConnectionPool {
    pub fn new(settings: PoolSettings) -> Result<Self> {
        if settings.host.trim().is_empty() {
            return Err(GatewayError::validation(
                "Warehouse is not configured",
                "connection host is empty",
            ));
        }

        let mut cfg = PoolConfig::new();
        cfg.host = Some(settings.host.clone());
        cfg.port = Some(settings.port);
        cfg.dbname = Some(settings.database.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let sp_pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| GatewayError::connection("Could not initialize the warehouse pool", e.to_string()))?;

        Ok(Self {
            inner: Arc::new(Inner { settings, sp_pool }),
        })
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.inner.settings
    }

    /// Acquire a connection for the given identity.
    ///
    /// `token = None` uses the pooled SP identity; `token = Some(_)` uses a
    /// connection scoped to that OBO token. Within a task-local scope
    /// (see [`with_task_local_connections`]), repeated calls reuse the SP
    /// connection already leased, and reuse the OBO connection already
    /// leased *for the same token* — leasing OBO with a different token
    /// than the cached one opens a one-shot connection without disturbing
    /// the cached entry (spec.md §4.3).
    pub async fn get_connection(&self, token: Option<&str>) -> Result<ConnectionGuard> {
        match token {
            None => self.get_sp_connection().await,
            Some(obo_token) => self.get_obo_connection(obo_token).await,
        }
    }

    async fn get_sp_connection(&self) -> Result<ConnectionGuard> {
        if let Ok(Some(cached)) = CONNECTION_CACHE.try_with(|cache| cache.borrow().sp.clone()) {
            debug!("reused task-local SP connection");
            return Ok(ConnectionGuard::Pooled(cached));
        }

        let client = self
            .inner
            .sp_pool
            .get()
            .await
            .map_err(|e| GatewayError::connection("Could not reach the warehouse", e.to_string()))?;
        let client = Arc::new(client);
        let _ = CONNECTION_CACHE.try_with(|cache| cache.borrow_mut().sp = Some(client.clone()));
        debug!("acquired pooled SP connection");
        Ok(ConnectionGuard::Pooled(client))
    }

    async fn get_obo_connection(&self, obo_token: &str) -> Result<ConnectionGuard> {
        if obo_token.trim().is_empty() {
            return Err(GatewayError::validation("Missing user identity", "OBO token is empty"));
        }

        if let Ok(Some((cached_token, cached_client))) = CONNECTION_CACHE.try_with(|cache| cache.borrow().obo.clone()) {
            if cached_token == obo_token {
                debug!("reused task-local OBO connection");
                return Ok(ConnectionGuard::OneShot(cached_client));
            }
            let client = self.create_one_shot(obo_token).await?;
            debug!("created one-shot OBO connection (different token than cached)");
            return Ok(ConnectionGuard::OneShot(Arc::new(client)));
        }

        let client = Arc::new(self.create_one_shot(obo_token).await?);
        let _ = CONNECTION_CACHE.try_with(|cache| cache.borrow_mut().obo = Some((obo_token.to_string(), client.clone())));
        debug!("created one-shot OBO connection");
        Ok(ConnectionGuard::OneShot(client))
    }

    async fn create_one_shot(&self, obo_token: &str) -> Result<tokio_postgres::Client> {
        let s = &self.inner.settings;
        let conn_str = format!(
            "host={} port={} dbname={} connect_timeout={}",
            s.host,
            s.port,
            s.database,
            s.connect_timeout.as_secs().max(1)
        );

        let connect = tokio_postgres::connect(&conn_str, NoTls);
        let (client, connection) = tokio::time::timeout(s.connect_timeout, connect)
            .await
            .map_err(|_| GatewayError::timeout("connect() to warehouse timed out", s.connect_timeout.as_millis() as u64))?
            .map_err(|e| GatewayError::connection("Could not reach the warehouse", e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "one-shot OBO connection terminated");
            }
        });

        Ok(client)
    }
}

/// Handle to either a pooled SP connection or an OBO one. Both are `Arc`-
/// wrapped so that a task-local cache hit and the lease that populated it
/// can share the same underlying connection (spec.md §4.3's reuse rule).
pub enum ConnectionGuard {
    Pooled(Arc<deadpool_postgres::Object>),
    OneShot(Arc<tokio_postgres::Client>),
}

impl ConnectionGuard {
    pub fn client(&self) -> &tokio_postgres::Client {
        match self {
            Self::Pooled(obj) => obj,
            Self::OneShot(client) => client,
        }
    }
}
