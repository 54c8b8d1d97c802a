//! Output shaping: converts a driver-native [`QueryResult`] into whatever
//! `UiFormat` the caller asked for, following the passthrough/convert matrix
//! (spec §4.10, SPEC_FULL §8).

use gateway_db::{ColumnarBatch, DataFormat, JsonRow, QueryResult, UiFormat};
use gateway_error::{GatewayError, Result};
use serde_json::Value as JsonValue;

/// Resolves `UiFormat::Auto` to the natural UI representation for a given
/// `DataFormat`; any other `UiFormat` passes through unchanged.
pub fn resolve_ui_format(data_format: DataFormat, ui_format: UiFormat) -> UiFormat {
    match ui_format {
        UiFormat::Auto => match data_format {
            DataFormat::JsonRows => UiFormat::JsonDict,
            DataFormat::Arrow => UiFormat::ArrowTable,
            DataFormat::Frame => UiFormat::FrameTable,
        },
        other => other,
    }
}

/// Whether converting `result.data_format` into `target` requires any work
/// at all, versus a pure passthrough of the already-computed shape.
pub fn needs_conversion(result: &QueryResult, target: UiFormat) -> bool {
    match (result.data_format, target) {
        (DataFormat::JsonRows, UiFormat::JsonDict) => false,
        (DataFormat::Arrow, UiFormat::ArrowTable) => false,
        (DataFormat::Frame, UiFormat::FrameTable) => false,
        (_, UiFormat::Auto) => false,
        _ => true,
    }
}

/// A shaped result ready for the wire: JSON rows, a columnar frame, or an
/// Arrow-table JSON rendering (column name -> values), depending on target.
#[derive(Debug, Clone)]
pub enum ShapedResult {
    JsonRows(Vec<JsonRow>),
    Frame(ColumnarBatch),
    ArrowTable(ColumnarBatch),
}

/// Converts `result` into the shape implied by `ui_format` (after resolving
/// `Auto`). Only JSON-rows results can be converted into every other shape;
/// Arrow and Frame results can be downgraded to JSON rows but converting
/// between Arrow and Frame directly is not supported (matches spec §4.10:
/// the gateway never holds two full copies of a result to bridge them).
pub fn shape_result(result: &QueryResult, ui_format: UiFormat) -> Result<ShapedResult> {
    let target = resolve_ui_format(result.data_format, ui_format);

    match (result.data_format, target) {
        (DataFormat::JsonRows, UiFormat::JsonDict) => {
            Ok(ShapedResult::JsonRows(result.rows.clone().unwrap_or_default()))
        }
        (DataFormat::JsonRows, UiFormat::FrameTable) => {
            let rows = result.rows.clone().unwrap_or_default();
            Ok(ShapedResult::Frame(ColumnarBatch::from_rows(&result.columns, &rows)))
        }
        (DataFormat::JsonRows, UiFormat::ArrowTable) => {
            let rows = result.rows.clone().unwrap_or_default();
            Ok(ShapedResult::ArrowTable(ColumnarBatch::from_rows(&result.columns, &rows)))
        }
        (DataFormat::Frame, UiFormat::FrameTable) => {
            Ok(ShapedResult::Frame(result.frame.clone().unwrap_or_default()))
        }
        (DataFormat::Frame, UiFormat::JsonDict) => {
            let frame = result.frame.clone().unwrap_or_default();
            Ok(ShapedResult::JsonRows(frame.to_rows()))
        }
        (DataFormat::Arrow, UiFormat::ArrowTable) => {
            let rows = record_batch_to_rows(result)?;
            Ok(ShapedResult::ArrowTable(ColumnarBatch::from_rows(&result.columns, &rows)))
        }
        (DataFormat::Arrow, UiFormat::JsonDict) => {
            let rows = record_batch_to_rows(result)?;
            Ok(ShapedResult::JsonRows(rows))
        }
        (actual, target) => Err(GatewayError::validation(
            "Result format cannot be converted to the requested UI format",
            format!("{actual:?} -> {target:?} is not a supported conversion"),
        )),
    }
}

fn record_batch_to_rows(result: &QueryResult) -> Result<Vec<JsonRow>> {
    let Some(batch) = &result.arrow_batch else {
        return Ok(Vec::new());
    };
    let mut rows = Vec::with_capacity(batch.num_rows());
    for row_idx in 0..batch.num_rows() {
        let mut row: JsonRow = JsonRow::new();
        for (col_idx, column_name) in result.columns.iter().enumerate() {
            let Some(array) = batch.column(col_idx).as_any().downcast_ref::<arrow::array::StringArray>() else {
                continue;
            };
            let value = if array.is_null(row_idx) {
                JsonValue::Null
            } else {
                JsonValue::String(array.value(row_idx).to_string())
            };
            row.insert(column_name.clone(), value);
        }
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn auto_resolves_to_natural_format() {
        assert_eq!(resolve_ui_format(DataFormat::JsonRows, UiFormat::Auto), UiFormat::JsonDict);
        assert_eq!(resolve_ui_format(DataFormat::Arrow, UiFormat::Auto), UiFormat::ArrowTable);
        assert_eq!(resolve_ui_format(DataFormat::Frame, UiFormat::Auto), UiFormat::FrameTable);
    }

    #[test]
    fn json_rows_passthrough_needs_no_conversion() {
        let result = QueryResult::rows(vec![], vec!["a".to_string()]);
        assert!(!needs_conversion(&result, UiFormat::JsonDict));
        assert!(needs_conversion(&result, UiFormat::FrameTable));
    }

    #[test]
    fn json_rows_convert_to_frame() {
        let mut row = JsonRow::new();
        row.insert("a".to_string(), json!(1));
        let result = QueryResult::rows(vec![row], vec!["a".to_string()]);
        let shaped = shape_result(&result, UiFormat::FrameTable).unwrap();
        match shaped {
            ShapedResult::Frame(batch) => assert_eq!(batch.len(), 1),
            _ => panic!("expected Frame"),
        }
    }
}
