//! Connection pool and SQL driver port for the warehouse gateway.
//!
//! Everything above this crate executes SQL through the [`WarehouseConnection`]
//! trait; nothing above it knows that the wire protocol underneath happens
//! to be Postgres's.

pub mod adapter;
pub mod arrow_bridge;
pub mod convert;
pub mod execute;
pub mod placeholders;
pub mod pool;
pub mod traits;
pub mod transaction;
pub mod types;

pub use adapter::PostgresConnection;
pub use execute::with_statement_timeout;
pub use pool::{with_task_local_connections, ConnectionGuard, ConnectionPool, PoolSettings};
pub use traits::{WarehouseConnection, WarehouseKind};
pub use transaction::transaction_context;
pub use types::{ColumnMetadata, ColumnarBatch, DataFormat, JsonRow, QueryResult, UiFormat};
