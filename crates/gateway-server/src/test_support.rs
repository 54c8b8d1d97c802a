//! Shared test fixtures for handler and registry unit tests.

use gateway_core::{DataFormat, Operation, OperationRequest, ProcessingMode, RequestOptions, UiFormat};

pub fn sample_request(operation: Operation, mode: ProcessingMode) -> OperationRequest {
    OperationRequest {
        operation,
        mode,
        table: "main.sales.orders".to_string(),
        payload: None,
        columns: None,
        filter_where: None,
        options: RequestOptions::default(),
        data_format: DataFormat::JsonRows,
        ui_format: UiFormat::Auto,
        operations: vec![],
        scenario: None,
        catalog: None,
        schema_name: None,
    }
}
