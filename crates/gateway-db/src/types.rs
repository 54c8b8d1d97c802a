//! Wire-level value and result shapes shared by the driver port.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A single result row, column name to value. Ordering of keys is not
/// meaningful; callers needing column order should use [`ColumnarBatch`].
pub type JsonRow = BTreeMap<String, JsonValue>;

/// The three shapes a query result can take. Named after the representation,
/// not the language that historically produced it: `Frame` is a columnar,
/// in-memory tabular batch (the Rust analogue of a dataframe), distinct from
/// [`arrow::record_batch::RecordBatch`] only in that it carries loosely typed
/// JSON values rather than an Arrow schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataFormat {
    JsonRows,
    Arrow,
    Frame,
}

impl Default for DataFormat {
    fn default() -> Self {
        Self::JsonRows
    }
}

/// Delivery format requested by the caller. `Auto` defers to the natural
/// mapping of the underlying `DataFormat` (see `resolve_ui_format`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UiFormat {
    Auto,
    JsonDict,
    ArrowTable,
    FrameTable,
}

impl Default for UiFormat {
    fn default() -> Self {
        Self::Auto
    }
}

/// A columnar batch: one `Vec<JsonValue>` per column, all of equal length.
/// Stands in for a dataframe in a Rust-native way — no pandas equivalent
/// exists in this ecosystem, so the shape is reproduced directly rather than
/// wrapped around a borrowed crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnarBatch {
    pub columns: Vec<String>,
    pub data: BTreeMap<String, Vec<JsonValue>>,
}

impl ColumnarBatch {
    pub fn len(&self) -> usize {
        self.columns
            .first()
            .and_then(|c| self.data.get(c))
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn from_rows(columns: &[String], rows: &[JsonRow]) -> Self {
        let mut data: BTreeMap<String, Vec<JsonValue>> = columns
            .iter()
            .map(|c| (c.clone(), Vec::with_capacity(rows.len())))
            .collect();
        for row in rows {
            for col in columns {
                data.entry(col.clone())
                    .or_default()
                    .push(row.get(col).cloned().unwrap_or(JsonValue::Null));
            }
        }
        Self {
            columns: columns.to_vec(),
            data,
        }
    }

    pub fn to_rows(&self) -> Vec<JsonRow> {
        let n = self.len();
        (0..n)
            .map(|i| {
                self.columns
                    .iter()
                    .map(|c| {
                        let v = self
                            .data
                            .get(c)
                            .and_then(|col| col.get(i))
                            .cloned()
                            .unwrap_or(JsonValue::Null);
                        (c.clone(), v)
                    })
                    .collect::<JsonRow>()
            })
            .collect()
    }
}

/// A query result in whichever `DataFormat` the caller requested. Exactly
/// one of `rows` / `arrow_batch` / `frame` is populated, matching
/// `data_format`.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub rows: Option<Vec<JsonRow>>,
    pub arrow_batch: Option<arrow::record_batch::RecordBatch>,
    pub frame: Option<ColumnarBatch>,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub data_format: DataFormat,
    pub column_metadata: Vec<ColumnMetadata>,
    pub metadata: BTreeMap<String, JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub ordinal_position: i32,
}

impl QueryResult {
    pub fn rows(rows: Vec<JsonRow>, columns: Vec<String>) -> Self {
        let row_count = rows.len();
        Self {
            rows: Some(rows),
            columns,
            row_count,
            data_format: DataFormat::JsonRows,
            ..Default::default()
        }
    }
}
