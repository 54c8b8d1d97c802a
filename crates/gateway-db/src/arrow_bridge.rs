//! Converts loosely-typed JSON rows into an Arrow `RecordBatch`.
//!
//! The driver port itself only ever produces JSON rows; this is the one
//! place a caller requesting the `Arrow` data format pays the cost of
//! building a typed, columnar batch from them. Every column is currently
//! materialized as a UTF-8 array — good enough for the row counts this
//! gateway deals in, and it sidesteps per-driver type metadata that the
//! underlying warehouse does not expose uniformly across column types.

use std::sync::Arc;

use arrow::array::StringArray;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use gateway_error::{GatewayError, Result};

use crate::types::JsonRow;

pub fn rows_to_record_batch(rows: &[JsonRow], columns: &[String]) -> Result<RecordBatch> {
    let fields: Vec<Field> = columns
        .iter()
        .map(|name| Field::new(name, DataType::Utf8, true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let arrays: Vec<Arc<dyn arrow::array::Array>> = columns
        .iter()
        .map(|col| {
            let values: Vec<Option<String>> = rows
                .iter()
                .map(|row| row.get(col).map(json_cell_to_text))
                .collect();
            Arc::new(StringArray::from(values)) as Arc<dyn arrow::array::Array>
        })
        .collect();

    RecordBatch::try_new(schema, arrays)
        .map_err(|e| GatewayError::validation("Could not build the Arrow result", e.to_string()))
}

fn json_cell_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_one_column_per_field() {
        let mut row = JsonRow::new();
        row.insert("id".to_string(), json!(1));
        row.insert("name".to_string(), json!("alice"));
        let batch = rows_to_record_batch(&[row], &["id".to_string(), "name".to_string()]).unwrap();
        assert_eq!(batch.num_columns(), 2);
        assert_eq!(batch.num_rows(), 1);
    }
}
