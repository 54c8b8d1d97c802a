//! # Gateway Core
//!
//! SQL intent engine for the warehouse gateway: turns a validated operation
//! request into safe, parameterized SQL, and carries the supporting
//! configuration, schema cache, named-query manifest, and logging plumbing
//! that the lifecycle orchestrator (`gateway-server`) drives.
//!
//! ## Modules
//!
//! - [`config`]: process-wide configuration loaded once from the environment.
//! - [`model`]: request/response shapes and the closed operation vocabulary.
//! - [`identifiers`]: catalog/schema/table/column name validation and quoting.
//! - [`intents`]: validated, ready-to-render SELECT/INSERT/UPDATE/DELETE intents.
//! - [`sql`]: the hand-rolled SQL AST renderer.
//! - [`validators`]: read-only/dangerous-statement/batch-size/mutation-safety checks.
//! - [`schema`]: hybrid in-memory/on-disk schema cache with single-flight refetch.
//! - [`manifest`]: named query loader (`manifest.json` + `.sql` files).
//! - [`logging`]: structured logging setup and redaction helpers.
//! - [`ui_log`]: per-session UI log capture ring buffers.
//! - [`shape`]: output format conversion (`DataFormat` -> `UiFormat`).

pub mod config;
pub mod identifiers;
pub mod intents;
pub mod logging;
pub mod manifest;
pub mod model;
pub mod schema;
pub mod shape;
pub mod sql;
pub mod ui_log;
pub mod validators;

pub use config::{get_settings, Config, LogFormatStyle};
pub use intents::{DeleteIntent, InsertIntent, SelectIntent, UpdateIntent, UpdateStrategy};
pub use manifest::{ParamType, QueryDefinition, QueryLoader, QueryParameter};
pub use model::{
    rows_result, AggregateColumn, AggregateFunction, FilterClause, FilterOp, HandlerOutput, HandlerQueryResult,
    Operation, OperationRequest, OperationResponse, OrderByClause, Payload, ProcessingMode, RequestOptions,
    SchemaScenario, SortDirection, WhereSpec,
};
pub use schema::{SchemaCache, SchemaFetcher, SchemaProvider, TableSchema};
pub use shape::{resolve_ui_format, shape_result, ShapedResult};
pub use sql::{build_delete, build_insert, build_select, build_update, RenderedStatement};
pub use ui_log::{UiLogBuffer, UiLogMessage, UiLogRegistry};
