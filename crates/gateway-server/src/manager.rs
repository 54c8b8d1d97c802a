//! Public façade (spec §6): the single `execute()` entry point the UI
//! layer calls, wiring config, the connection pool, the handler registry,
//! and the lifecycle together behind one process-wide instance.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use gateway_core::{get_settings, manifest::default_queries_dir, Config, Operation, OperationRequest, OperationResponse, ProcessingMode, SchemaScenario, QueryLoader, SchemaProvider};
use gateway_db::{with_task_local_connections, ConnectionPool, PoolSettings};
use gateway_error::Result;

use crate::admission::AdmissionGate;
use crate::context::{RequestContext, RequestHeaders};
use crate::deps::Dependencies;
use crate::handlers::{delete, heartbeat, read, schema, transaction, write};
use crate::lifecycle::Lifecycle;
use crate::rate_limiter::RateLimiter;
use crate::registry::HandlerRegistry;
use crate::schema_fetcher::WarehouseSchemaFetcher;
use crate::warmup::WarmupGate;

const POSTGRES_DEFAULT_PORT: u16 = 5432;

fn pool_settings(config: &Config) -> PoolSettings {
    PoolSettings {
        host: config.databricks_host.clone(),
        port: POSTGRES_DEFAULT_PORT,
        http_path: config.databricks_http_path.clone(),
        database: config.databricks_catalog.clone().unwrap_or_else(|| "default".to_string()),
        sp_token: config.databricks_token.clone(),
        max_pool_size: config.connection_pool_size,
        connect_timeout: config.db_socket_timeout,
        statement_timeout: config.query_timeout,
    }
}

fn build_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();

    registry.register(Operation::Heartbeat, ProcessingMode::Single, None, Arc::new(heartbeat::HeartbeatHandler));

    registry.register(Operation::Read, ProcessingMode::Single, None, Arc::new(read::ReadSingleHandler));
    registry.register(Operation::Read, ProcessingMode::Batch, None, Arc::new(read::ReadBatchHandler));
    registry.register(Operation::Read, ProcessingMode::Named, None, Arc::new(read::ReadNamedHandler));

    registry.register(Operation::Insert, ProcessingMode::Single, None, Arc::new(write::WriteSingleHandler));
    registry.register(Operation::Insert, ProcessingMode::Batch, None, Arc::new(write::WriteBatchHandler));
    registry.register(Operation::Update, ProcessingMode::Single, None, Arc::new(write::WriteSingleHandler));
    registry.register(Operation::Update, ProcessingMode::Batch, None, Arc::new(write::WriteBatchHandler));
    registry.register(Operation::Merge, ProcessingMode::Single, None, Arc::new(write::WriteSingleHandler));
    registry.register(Operation::Merge, ProcessingMode::Batch, None, Arc::new(write::WriteBatchHandler));

    registry.register(Operation::Delete, ProcessingMode::Single, None, Arc::new(delete::DeleteSingleHandler));
    registry.register(Operation::Delete, ProcessingMode::Batch, None, Arc::new(delete::DeleteBatchHandler));

    registry.register(Operation::Transaction, ProcessingMode::Single, None, Arc::new(transaction::TransactionHandler));

    registry.register(
        Operation::Schema,
        ProcessingMode::Single,
        Some(SchemaScenario::ListCatalogs),
        Arc::new(schema::ListCatalogsHandler),
    );
    registry.register(
        Operation::Schema,
        ProcessingMode::Single,
        Some(SchemaScenario::ListSchemas),
        Arc::new(schema::ListSchemasHandler),
    );
    registry.register(
        Operation::Schema,
        ProcessingMode::Single,
        Some(SchemaScenario::ListTables),
        Arc::new(schema::ListTablesHandler),
    );
    registry.register(
        Operation::Schema,
        ProcessingMode::Single,
        Some(SchemaScenario::TableColumns),
        Arc::new(schema::TableColumnsHandler),
    );
    registry.register(
        Operation::Schema,
        ProcessingMode::Single,
        Some(SchemaScenario::TableInfo),
        Arc::new(schema::TableInfoHandler),
    );
    registry.register(
        Operation::Schema,
        ProcessingMode::Single,
        Some(SchemaScenario::InvalidateTableSchema),
        Arc::new(schema::InvalidateTableSchemaHandler),
    );

    registry
}

pub struct Manager {
    lifecycle: Lifecycle,
    deps: Dependencies,
}

impl Manager {
    pub fn new(config: &'static Config) -> Result<Self> {
        let pool = Arc::new(ConnectionPool::new(pool_settings(config))?);
        let query_loader = Arc::new(QueryLoader::new(default_queries_dir()));
        let fetcher = Arc::new(WarehouseSchemaFetcher::new(pool.clone(), query_loader.clone()));
        let schema_provider = Arc::new(SchemaProvider::new("cache/schema", config.schema_cache_ttl, fetcher));

        let rate_limiter = RateLimiter::new(
            config.rate_limit_requests,
            config.rate_limit_window,
            Duration::from_secs(config.rate_limit_cleanup_interval.as_secs() * 3),
        );
        let admission = AdmissionGate::new(config.max_concurrent_queries);
        let warmup = WarmupGate::new(
            config.warehouse_warmup_enabled,
            config.warehouse_warmup_ttl,
            config.warehouse_warmup_failure_backoff,
            config.warehouse_warmup_sql.clone(),
        );
        let registry = build_registry();

        Ok(Self {
            lifecycle: Lifecycle::new(registry, rate_limiter, admission, warmup),
            deps: Dependencies { config, pool, schema_provider, query_loader },
        })
    }

    /// The sole entry point (spec §6): validates, throttles, authenticates,
    /// routes, warms, resolves, executes, shapes, and observes one request.
    pub async fn execute(
        &self,
        request: OperationRequest,
        obo_token: Option<String>,
        correlation_id: Option<String>,
        headers: Option<HashMap<String, String>>,
    ) -> OperationResponse {
        let session_id = headers
            .as_ref()
            .and_then(|h| h.get("x-session-id").or_else(|| h.get("X-Session-Id")))
            .cloned();
        let ctx = RequestContext::new(correlation_id, session_id, obo_token);
        let headers = RequestHeaders::new(headers.unwrap_or_default());

        with_task_local_connections(|| self.lifecycle.process(request, ctx, &headers, &self.deps)).await
    }
}

/// Process-wide manager instance, built once from the environment-derived
/// `Config` on first use.
static MANAGER: once_cell::sync::OnceCell<Manager> = once_cell::sync::OnceCell::new();

pub fn get_manager() -> Result<&'static Manager> {
    if let Some(manager) = MANAGER.get() {
        return Ok(manager);
    }
    let manager = Manager::new(get_settings())?;
    Ok(MANAGER.get_or_init(|| manager))
}
