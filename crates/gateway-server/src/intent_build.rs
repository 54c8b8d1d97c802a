//! Bridges the wire-level `OperationRequest` fields (`filter_where`,
//! `payload`, `options`) into the typed intents `gateway_core::sql` renders.
//! `filter_where` is always an equality map; list values degenerate through
//! the same rules the SQL engine already applies to `IN`/`=` (spec §4.2), so
//! a caller wanting `IN` semantics just supplies an array value.

use std::collections::BTreeMap;

use gateway_core::{FilterClause, FilterOp, Payload, WhereSpec};
use gateway_error::{GatewayError, Result};
use serde_json::Value as JsonValue;

pub fn shared_where_map(where_spec: &Option<WhereSpec>) -> Result<BTreeMap<String, JsonValue>> {
    match where_spec {
        Some(WhereSpec::Shared(map)) => Ok(map.clone()),
        Some(WhereSpec::PerRecord(_)) => Err(GatewayError::validation(
            "This operation requires a single WHERE map, not one per record",
            "expected WhereSpec::Shared, got WhereSpec::PerRecord",
        )),
        None => Ok(BTreeMap::new()),
    }
}

pub fn per_record_where(where_spec: &Option<WhereSpec>, record_count: usize) -> Result<Vec<BTreeMap<String, JsonValue>>> {
    match where_spec {
        Some(WhereSpec::PerRecord(sets)) => {
            if sets.len() != record_count {
                return Err(GatewayError::validation(
                    "filter_where must have one entry per batch record",
                    format!("{} where entries for {record_count} records", sets.len()),
                ));
            }
            Ok(sets.clone())
        }
        Some(WhereSpec::Shared(map)) => Ok(vec![map.clone(); record_count]),
        None => Err(GatewayError::validation(
            "Batch UPDATE/MERGE requires filter_where", "filter_where is absent",
        )),
    }
}

pub fn map_to_filters(map: &BTreeMap<String, JsonValue>) -> Vec<FilterClause> {
    map.iter()
        .map(|(column, value)| FilterClause {
            column: column.clone(),
            op: FilterOp::Eq,
            value: Some(value.clone()),
        })
        .collect()
}

pub fn single_payload(payload: &Option<Payload>) -> Result<BTreeMap<String, JsonValue>> {
    match payload {
        Some(Payload::Single(map)) => Ok(map.clone()),
        Some(Payload::Batch(_)) => Err(GatewayError::validation(
            "This operation requires a single-record payload",
            "expected Payload::Single, got Payload::Batch",
        )),
        None => Err(GatewayError::validation("This operation requires a payload", "payload is absent")),
    }
}

pub fn batch_payload(payload: &Option<Payload>) -> Result<Vec<BTreeMap<String, JsonValue>>> {
    match payload {
        Some(Payload::Batch(records)) => Ok(records.clone()),
        Some(Payload::Single(map)) => Ok(vec![map.clone()]),
        None => Err(GatewayError::validation("This operation requires a payload", "payload is absent")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shared_where_rejects_per_record() {
        let spec = Some(WhereSpec::PerRecord(vec![]));
        assert!(shared_where_map(&spec).is_err());
    }

    #[test]
    fn map_to_filters_preserves_equality() {
        let mut map = BTreeMap::new();
        map.insert("id".to_string(), json!(1));
        let filters = map_to_filters(&map);
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].op, FilterOp::Eq);
    }
}
