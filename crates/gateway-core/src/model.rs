//! The request/response data model: the sole input and output of the
//! gateway (spec §3).

use std::collections::BTreeMap;

use gateway_db::{ColumnMetadata, DataFormat, JsonRow, UiFormat};
use gateway_error::ErrorDetail;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Read,
    Insert,
    Update,
    Merge,
    Delete,
    Heartbeat,
    Transaction,
    Schema,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProcessingMode {
    Single,
    Batch,
    Named,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaScenario {
    ListCatalogs,
    ListSchemas,
    ListTables,
    TableColumns,
    TableInfo,
    InvalidateTableSchema,
}

impl SchemaScenario {
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::ListCatalogs => "list_catalogs",
            Self::ListSchemas => "list_schemas",
            Self::ListTables => "list_tables",
            Self::TableColumns => "table_columns",
            Self::TableInfo => "table_info",
            Self::InvalidateTableSchema => "invalidate_table_schema",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    Like,
    NotLike,
    IsNull,
    IsNotNull,
    Between,
}

impl FilterOp {
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
            Self::Between => "BETWEEN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterClause {
    pub column: String,
    pub op: FilterOp,
    pub value: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderByClause {
    pub column: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateColumn {
    pub function: AggregateFunction,
    pub column: String,
    pub alias: Option<String>,
}

/// Recognised keys of `OperationRequest.options`; closed set, spec §3.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestOptions {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub order_by: Vec<OrderByClause>,
    pub group_by: Vec<String>,
    pub aggregations: Vec<AggregateColumn>,
    pub having: Vec<FilterClause>,
    pub old_values: BTreeMap<String, JsonValue>,
}

/// Either a single WHERE map (shared across a batch) or one map per
/// payload record (batch UPDATE/MERGE), spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WhereSpec {
    Shared(BTreeMap<String, JsonValue>),
    PerRecord(Vec<BTreeMap<String, JsonValue>>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Single(BTreeMap<String, JsonValue>),
    Batch(Vec<BTreeMap<String, JsonValue>>),
}

/// The sole input to the gateway. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRequest {
    pub operation: Operation,
    pub mode: ProcessingMode,
    pub table: String,
    pub payload: Option<Payload>,
    pub columns: Option<Vec<String>>,
    pub filter_where: Option<WhereSpec>,
    pub options: RequestOptions,
    pub data_format: DataFormat,
    pub ui_format: UiFormat,
    pub operations: Vec<OperationRequest>,
    pub scenario: Option<SchemaScenario>,
    pub catalog: Option<String>,
    pub schema_name: Option<String>,
}

impl OperationRequest {
    pub fn wants_wildcard_columns(&self) -> bool {
        match &self.columns {
            None => true,
            Some(cols) => cols.is_empty() || cols == &["*".to_string()],
        }
    }
}

/// The sole output of the gateway. Immutable once constructed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationResponse {
    pub success: bool,
    pub data: Option<JsonValue>,
    pub affected_rows: i64,
    pub message: String,
    pub errors: Vec<ErrorDetail>,
    pub metadata: BTreeMap<String, JsonValue>,
    pub columns: Vec<String>,
    pub schema: Vec<ColumnMetadata>,
}

impl OperationResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn failure(detail: ErrorDetail) -> Self {
        Self {
            success: false,
            message: detail.message.clone(),
            errors: vec![detail],
            ..Default::default()
        }
    }
}

/// Internal handler output, distinct from `OperationResponse`: handlers
/// return whichever of the two fits their operation, and the lifecycle's
/// SHAPE phase normalises either into the final envelope.
pub type HandlerQueryResult = gateway_db::QueryResult;

pub enum HandlerOutput {
    Query(HandlerQueryResult),
    Response(OperationResponse),
}

/// Rows convenience constructor used by handlers that already have JSON
/// rows in hand (the common case for this warehouse's JSON_ROWS format).
pub fn rows_result(rows: Vec<JsonRow>, columns: Vec<String>) -> HandlerQueryResult {
    gateway_db::QueryResult::rows(rows, columns)
}
