//! Validated intent records: the typed input to the SQL engine (spec §3's
//! `SelectIntent`/`InsertIntent`/`UpdateIntent`/`DeleteIntent`, §3's
//! invariants).

use std::collections::BTreeMap;

use gateway_error::{GatewayError, Result};
use serde_json::Value as JsonValue;

use crate::identifiers::{validate_column, validate_identifier, validate_table_ref};
use crate::model::{AggregateColumn, FilterClause, OrderByClause, RequestOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStrategy {
    Update,
    Merge,
}

#[derive(Debug, Clone)]
pub struct SelectIntent {
    pub table: String,
    pub columns: Vec<String>,
    pub filters: Vec<FilterClause>,
    pub group_by: Vec<String>,
    pub having: Vec<FilterClause>,
    pub order_by: Vec<OrderByClause>,
    pub aggregations: Vec<AggregateColumn>,
    pub limit: u64,
    pub offset: Option<u64>,
    pub limit_capped: bool,
}

#[derive(Debug, Clone)]
pub struct InsertIntent {
    pub table: String,
    pub values: BTreeMap<String, JsonValue>,
}

#[derive(Debug, Clone)]
pub struct UpdateIntent {
    pub table: String,
    pub pk_values: BTreeMap<String, JsonValue>,
    pub updates: BTreeMap<String, JsonValue>,
    pub old_values: BTreeMap<String, JsonValue>,
    pub strategy: UpdateStrategy,
}

#[derive(Debug, Clone)]
pub struct DeleteIntent {
    pub table: String,
    pub pk_values: Vec<BTreeMap<String, JsonValue>>,
}

fn validate_columns(columns: &[String]) -> Result<()> {
    for c in columns {
        validate_column(c)?;
    }
    Ok(())
}

impl SelectIntent {
    /// Builds and validates a `SelectIntent`. `limit` is silently capped at
    /// `max_read_limit` (the open question in spec §9, resolved in favor of
    /// capping rather than rejecting — see DESIGN.md); `limit_capped`
    /// records whether that happened so the response can surface it.
    pub fn new(
        table: &str,
        columns: Vec<String>,
        filters: Vec<FilterClause>,
        options: &RequestOptions,
        default_limit: u64,
        max_limit: u64,
    ) -> Result<Self> {
        validate_table_ref(table)?;
        validate_columns(&columns)?;

        if options.offset.is_some() && options.limit.is_none() {
            return Err(GatewayError::validation(
                "offset requires a limit",
                "SelectIntent has offset but no limit",
            ));
        }

        if !options.having.is_empty() && options.group_by.is_empty() {
            return Err(GatewayError::validation(
                "HAVING requires GROUP BY",
                "SelectIntent has having clauses without group_by",
            ));
        }

        for c in &options.group_by {
            validate_identifier(c)?;
        }
        for agg in &options.aggregations {
            validate_identifier(&agg.column)?;
        }
        for ob in &options.order_by {
            validate_identifier(&ob.column)?;
        }

        let requested = options.limit.unwrap_or(default_limit);
        let limit_capped = requested > max_limit;
        let limit = requested.min(max_limit).max(1);

        Ok(Self {
            table: table.to_string(),
            columns,
            filters,
            group_by: options.group_by.clone(),
            having: options.having.clone(),
            order_by: options.order_by.clone(),
            aggregations: options.aggregations.clone(),
            limit,
            offset: options.offset,
            limit_capped,
        })
    }
}

impl InsertIntent {
    pub fn new(table: &str, values: BTreeMap<String, JsonValue>) -> Result<Self> {
        validate_table_ref(table)?;
        if values.is_empty() {
            return Err(GatewayError::validation(
                "INSERT requires at least one column",
                "InsertIntent.values is empty",
            ));
        }
        for c in values.keys() {
            validate_identifier(c)?;
        }
        Ok(Self {
            table: table.to_string(),
            values,
        })
    }
}

impl UpdateIntent {
    pub fn new(
        table: &str,
        pk_values: BTreeMap<String, JsonValue>,
        updates: BTreeMap<String, JsonValue>,
        old_values: BTreeMap<String, JsonValue>,
        strategy: UpdateStrategy,
    ) -> Result<Self> {
        validate_table_ref(table)?;

        if updates.is_empty() {
            return Err(GatewayError::validation(
                "UPDATE requires at least one column to set",
                "UpdateIntent.updates is empty",
            ));
        }
        if pk_values.is_empty() {
            return Err(GatewayError::validation(
                "UPDATE requires primary key values",
                "UpdateIntent.pk_values is empty",
            ));
        }
        if updates.keys().any(|k| pk_values.contains_key(k)) {
            return Err(GatewayError::validation(
                "Cannot update a primary key column",
                "UpdateIntent.updates intersects pk_values",
            ));
        }
        if old_values.keys().any(|k| pk_values.contains_key(k)) {
            return Err(GatewayError::validation(
                "old_values cannot reference a primary key column",
                "UpdateIntent.old_values intersects pk_values",
            ));
        }

        for c in pk_values.keys().chain(updates.keys()).chain(old_values.keys()) {
            validate_identifier(c)?;
        }

        Ok(Self {
            table: table.to_string(),
            pk_values,
            updates,
            old_values,
            strategy,
        })
    }
}

impl DeleteIntent {
    pub fn new(table: &str, pk_values: Vec<BTreeMap<String, JsonValue>>) -> Result<Self> {
        validate_table_ref(table)?;
        if pk_values.is_empty() || pk_values.iter().any(BTreeMap::is_empty) {
            return Err(GatewayError::validation(
                "DELETE requires non-empty primary key values",
                "DeleteIntent.pk_values is empty or contains an empty set",
            ));
        }
        for set in &pk_values {
            for c in set.keys() {
                validate_identifier(c)?;
            }
        }
        Ok(Self {
            table: table.to_string(),
            pk_values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn select_caps_limit_and_records_it() {
        let options = RequestOptions {
            limit: Some(50_000),
            ..Default::default()
        };
        let intent = SelectIntent::new("c.s.t", vec!["*".to_string()], vec![], &options, 1000, 10_000).unwrap();
        assert_eq!(intent.limit, 10_000);
        assert!(intent.limit_capped);
    }

    #[test]
    fn offset_without_limit_is_rejected_even_with_a_default_limit() {
        let options = RequestOptions {
            offset: Some(10),
            ..Default::default()
        };
        let err = SelectIntent::new("c.s.t", vec!["*".to_string()], vec![], &options, 1000, 10_000).unwrap_err();
        assert_eq!(err.category(), gateway_error::ErrorCategory::Validation);
    }

    #[test]
    fn offset_with_explicit_limit_is_fine() {
        let options = RequestOptions {
            offset: Some(10),
            limit: Some(50),
            ..Default::default()
        };
        let intent = SelectIntent::new("c.s.t", vec!["*".to_string()], vec![], &options, 1000, 10_000).unwrap();
        assert_eq!(intent.offset, Some(10));
    }

    #[test]
    fn update_rejects_pk_overlap_with_updates() {
        let mut pk = BTreeMap::new();
        pk.insert("id".to_string(), json!(1));
        let mut updates = BTreeMap::new();
        updates.insert("id".to_string(), json!(2));
        let err = UpdateIntent::new("c.s.t", pk, updates, BTreeMap::new(), UpdateStrategy::Update).unwrap_err();
        assert_eq!(err.category(), gateway_error::ErrorCategory::Validation);
    }

    #[test]
    fn delete_requires_nonempty_pk_sets() {
        assert!(DeleteIntent::new("c.s.t", vec![]).is_err());
        assert!(DeleteIntent::new("c.s.t", vec![BTreeMap::new()]).is_err());
    }

    proptest::proptest! {
        /// spec §8 invariant 3: the effective limit is never below 1 and
        /// never above `max_limit`, and `limit_capped` is set exactly when
        /// the request asked for more than `max_limit`.
        #[test]
        fn select_limit_is_always_between_one_and_max(
            requested in 1u64..1_000_000,
            max_limit in 1u64..1_000_000,
        ) {
            let options = RequestOptions {
                limit: Some(requested),
                ..Default::default()
            };
            let intent = SelectIntent::new("c.s.t", vec!["*".to_string()], vec![], &options, 1000, max_limit).unwrap();
            prop_assert!(intent.limit >= 1);
            prop_assert!(intent.limit <= max_limit);
            prop_assert_eq!(intent.limit_capped, requested > max_limit);
            prop_assert_eq!(intent.limit, requested.min(max_limit));
        }
    }
}
