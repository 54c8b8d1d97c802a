//! Shared, immutable dependencies every handler is given. Constructed once
//! by the manager facade and cloned cheaply (everything inside is an `Arc`).

use std::sync::Arc;

use gateway_core::{Config, QueryLoader, SchemaProvider};
use gateway_db::ConnectionPool;

#[derive(Clone)]
pub struct Dependencies {
    pub config: &'static Config,
    pub pool: Arc<ConnectionPool>,
    pub schema_provider: Arc<SchemaProvider>,
    pub query_loader: Arc<QueryLoader>,
}
