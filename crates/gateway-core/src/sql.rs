//! SQL AST construction and rendering (spec §4.2). The only module that
//! produces SQL text; every fragment is assembled from typed nodes, never
//! string concatenation of caller-controlled values.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use gateway_error::{GatewayError, Result};
use serde_json::Value as JsonValue;

use crate::identifiers::quote_identifier;
use crate::intents::{DeleteIntent, InsertIntent, SelectIntent, UpdateIntent, UpdateStrategy};
use crate::model::{AggregateFunction, FilterClause, FilterOp, OrderByClause, SortDirection};

/// An emitted statement: dialect-neutral `:name` placeholders plus the
/// values bound to them. Never executed directly by this crate — handed
/// off to `gateway_db::placeholders::to_positional` at the driver
/// boundary.
#[derive(Debug, Clone)]
pub struct RenderedStatement {
    pub sql: String,
    pub params: BTreeMap<String, JsonValue>,
}

/// Generates fresh, collision-free placeholder names as a statement is
/// assembled.
#[derive(Default)]
struct ParamSink {
    params: BTreeMap<String, JsonValue>,
    next: usize,
}

impl ParamSink {
    fn bind(&mut self, value: JsonValue) -> String {
        let name = format!("p{}", self.next);
        self.next += 1;
        self.params.insert(name.clone(), value);
        name
    }
}

/// Applies the list-value degeneration rules from the original
/// normaliser: an empty list under `=`/`IN` becomes an always-false
/// predicate (`IS NULL`); a single-element list collapses to a scalar
/// comparison; a multi-element list keeps `IN`/`NOT IN`.
fn normalize_operator(op: FilterOp, value: Option<&JsonValue>) -> (FilterOp, Option<JsonValue>) {
    let Some(JsonValue::Array(items)) = value else {
        return (op, value.cloned());
    };

    match (op, items.len()) {
        (FilterOp::Eq | FilterOp::In, 0) => (FilterOp::IsNull, None),
        (FilterOp::Neq | FilterOp::NotIn, 0) => (FilterOp::IsNotNull, None),
        (FilterOp::Eq | FilterOp::In, 1) => (FilterOp::Eq, Some(items[0].clone())),
        (FilterOp::Neq | FilterOp::NotIn, 1) => (FilterOp::Neq, Some(items[0].clone())),
        (FilterOp::Eq | FilterOp::In, _) => (FilterOp::In, Some(JsonValue::Array(items.clone()))),
        (FilterOp::Neq | FilterOp::NotIn, _) => (FilterOp::NotIn, Some(JsonValue::Array(items.clone()))),
        _ => (op, value.cloned()),
    }
}

fn render_filter(filter: &FilterClause, sink: &mut ParamSink) -> Result<String> {
    let (op, value) = normalize_operator(filter.op, filter.value.as_ref());
    let column = quote_identifier(&filter.column);

    Ok(match op {
        FilterOp::IsNull => format!("{column} IS NULL"),
        FilterOp::IsNotNull => format!("{column} IS NOT NULL"),
        FilterOp::Between => {
            let JsonValue::Array(items) = value.ok_or_else(|| {
                GatewayError::validation("BETWEEN requires a two-element value", "missing BETWEEN bounds")
            })?
            else {
                return Err(GatewayError::validation(
                    "BETWEEN requires a two-element array",
                    "BETWEEN value was not an array",
                ));
            };
            if items.len() != 2 {
                return Err(GatewayError::validation(
                    "BETWEEN requires exactly two bounds",
                    "BETWEEN array length != 2",
                ));
            }
            let lo = sink.bind(items[0].clone());
            let hi = sink.bind(items[1].clone());
            format!("{column} BETWEEN :{lo} AND :{hi}")
        }
        FilterOp::In | FilterOp::NotIn => {
            let JsonValue::Array(items) = value.unwrap_or(JsonValue::Array(vec![])) else {
                return Err(GatewayError::validation(
                    "IN/NOT IN requires an array value",
                    "IN value was not an array",
                ));
            };
            let placeholders: Vec<String> = items.into_iter().map(|v| format!(":{}", sink.bind(v))).collect();
            format!("{column} {} ({})", op.as_sql(), placeholders.join(", "))
        }
        _ => {
            let value = value.ok_or_else(|| {
                GatewayError::validation(
                    "Filter requires a value",
                    format!("operator {} requires a value", op.as_sql()),
                )
            })?;
            let name = sink.bind(value);
            format!("{column} {} :{name}", op.as_sql())
        }
    })
}

fn render_conjunction(filters: &[FilterClause], sink: &mut ParamSink) -> Result<Option<String>> {
    if filters.is_empty() {
        return Ok(None);
    }
    let mut parts = Vec::with_capacity(filters.len());
    for f in filters {
        parts.push(render_filter(f, sink)?);
    }
    Ok(Some(parts.join(" AND ")))
}

pub fn build_select(intent: &SelectIntent) -> Result<RenderedStatement> {
    let mut sink = ParamSink::default();
    let mut sql = String::new();

    let mut projection: Vec<String> = if intent.columns.is_empty() || intent.columns == ["*"] {
        vec!["*".to_string()]
    } else {
        intent.columns.iter().map(|c| quote_identifier(c)).collect()
    };
    for agg in &intent.aggregations {
        let func = match agg.function {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        };
        let expr = format!("{func}({})", quote_identifier(&agg.column));
        projection.push(match &agg.alias {
            Some(alias) => format!("{expr} AS {}", quote_identifier(alias)),
            None => expr,
        });
    }

    write!(sql, "SELECT {} FROM {}", projection.join(", "), quote_table_ref_for_sql(&intent.table)?).unwrap();

    if let Some(where_sql) = render_conjunction(&intent.filters, &mut sink)? {
        write!(sql, " WHERE {where_sql}").unwrap();
    }

    if !intent.group_by.is_empty() {
        let cols: Vec<String> = intent.group_by.iter().map(|c| quote_identifier(c)).collect();
        write!(sql, " GROUP BY {}", cols.join(", ")).unwrap();
    }

    if let Some(having_sql) = render_conjunction(&intent.having, &mut sink)? {
        write!(sql, " HAVING {having_sql}").unwrap();
    }

    if !intent.order_by.is_empty() {
        let parts: Vec<String> = intent
            .order_by
            .iter()
            .map(|o| {
                let dir = match o.direction {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };
                format!("{} {dir}", quote_identifier(&o.column))
            })
            .collect();
        write!(sql, " ORDER BY {}", parts.join(", ")).unwrap();
    }

    write!(sql, " LIMIT {}", intent.limit).unwrap();
    if let Some(offset) = intent.offset {
        write!(sql, " OFFSET {offset}").unwrap();
    }

    Ok(RenderedStatement { sql, params: sink.params })
}

pub fn build_insert(intent: &InsertIntent) -> Result<RenderedStatement> {
    let mut sink = ParamSink::default();
    let columns: Vec<&String> = intent.values.keys().collect();
    let quoted_cols: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
    let placeholders: Vec<String> = columns
        .iter()
        .map(|c| format!(":{}", sink.bind(intent.values[*c].clone())))
        .collect();

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_table_ref_for_sql(&intent.table)?,
        quoted_cols.join(", "),
        placeholders.join(", ")
    );

    Ok(RenderedStatement { sql, params: sink.params })
}

pub fn build_update(intent: &UpdateIntent) -> Result<RenderedStatement> {
    match intent.strategy {
        UpdateStrategy::Update => build_update_statement(intent),
        UpdateStrategy::Merge => build_merge_statement(intent),
    }
}

fn build_update_statement(intent: &UpdateIntent) -> Result<RenderedStatement> {
    let mut sink = ParamSink::default();

    let set_parts: Vec<String> = intent
        .updates
        .iter()
        .map(|(col, val)| format!("{} = :{}", quote_identifier(col), sink.bind(val.clone())))
        .collect();

    let mut where_parts: Vec<String> = intent
        .pk_values
        .iter()
        .map(|(col, val)| format!("{} = :{}", quote_identifier(col), sink.bind(val.clone())))
        .collect();

    for (col, val) in &intent.old_values {
        where_parts.push(format!("{} = :{}", quote_identifier(col), sink.bind(val.clone())));
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        quote_table_ref_for_sql(&intent.table)?,
        set_parts.join(", "),
        where_parts.join(" AND ")
    );

    Ok(RenderedStatement { sql, params: sink.params })
}

fn build_merge_statement(intent: &UpdateIntent) -> Result<RenderedStatement> {
    let mut sink = ParamSink::default();

    let mut source_cols: Vec<(&String, String)> = Vec::new();
    for (col, val) in intent.pk_values.iter().chain(intent.updates.iter()) {
        let placeholder = sink.bind(val.clone());
        source_cols.push((col, placeholder));
    }

    let source_select: Vec<String> = source_cols
        .iter()
        .map(|(col, ph)| format!(":{ph} AS {}", quote_identifier(col)))
        .collect();

    let on_clause: Vec<String> = intent
        .pk_values
        .keys()
        .map(|col| format!("t.{} = s.{}", quote_identifier(col), quote_identifier(col)))
        .collect();

    let update_set: Vec<String> = intent
        .updates
        .keys()
        .map(|col| format!("t.{} = s.{}", quote_identifier(col), quote_identifier(col)))
        .collect();

    let insert_cols: Vec<String> = intent
        .pk_values
        .keys()
        .chain(intent.updates.keys())
        .map(|c| quote_identifier(c))
        .collect();
    let insert_source_cols: Vec<String> = intent
        .pk_values
        .keys()
        .chain(intent.updates.keys())
        .map(|c| format!("s.{}", quote_identifier(c)))
        .collect();

    let sql = format!(
        "MERGE INTO {table} AS t USING (SELECT {source_select}) AS s ON {on} \
         WHEN MATCHED THEN UPDATE SET {set} \
         WHEN NOT MATCHED THEN INSERT ({insert_cols}) VALUES ({insert_vals})",
        table = quote_table_ref_for_sql(&intent.table)?,
        source_select = source_select.join(", "),
        on = on_clause.join(" AND "),
        set = update_set.join(", "),
        insert_cols = insert_cols.join(", "),
        insert_vals = insert_source_cols.join(", "),
    );

    Ok(RenderedStatement { sql, params: sink.params })
}

pub fn build_delete(intent: &DeleteIntent) -> Result<RenderedStatement> {
    let mut sink = ParamSink::default();

    let sets: Vec<String> = intent
        .pk_values
        .iter()
        .map(|set| {
            let parts: Vec<String> = set
                .iter()
                .map(|(col, val)| format!("{} = :{}", quote_identifier(col), sink.bind(val.clone())))
                .collect();
            format!("({})", parts.join(" AND "))
        })
        .collect();

    let sql = format!(
        "DELETE FROM {} WHERE {}",
        quote_table_ref_for_sql(&intent.table)?,
        sets.join(" OR ")
    );

    Ok(RenderedStatement { sql, params: sink.params })
}

fn quote_table_ref_for_sql(table_ref: &str) -> Result<String> {
    crate::identifiers::quote_table_ref(table_ref)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intents::UpdateStrategy;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn empty_in_list_becomes_is_null() {
        let mut sink = ParamSink::default();
        let filter = FilterClause {
            column: "status".to_string(),
            op: FilterOp::In,
            value: Some(json!([])),
        };
        let rendered = render_filter(&filter, &mut sink).unwrap();
        assert_eq!(rendered, "`status` IS NULL");
    }

    #[test]
    fn single_item_in_list_collapses_to_equality() {
        let mut sink = ParamSink::default();
        let filter = FilterClause {
            column: "id".to_string(),
            op: FilterOp::In,
            value: Some(json!([1])),
        };
        let rendered = render_filter(&filter, &mut sink).unwrap();
        assert_eq!(rendered, "`id` = :p0");
        assert_eq!(sink.params.get("p0"), Some(&json!(1)));
    }

    #[test]
    fn select_emits_limit_and_offset() {
        let intent = SelectIntent {
            table: "main.sales.orders".to_string(),
            columns: vec!["*".to_string()],
            filters: vec![],
            group_by: vec![],
            having: vec![],
            order_by: vec![],
            aggregations: vec![],
            limit: 100,
            offset: Some(20),
            limit_capped: false,
        };
        let rendered = build_select(&intent).unwrap();
        assert!(rendered.sql.ends_with("LIMIT 100 OFFSET 20"));
    }

    #[test]
    fn insert_binds_every_column() {
        let mut values = BTreeMap::new();
        values.insert("id".to_string(), json!(1));
        values.insert("name".to_string(), json!("a"));
        let intent = InsertIntent {
            table: "main.sales.orders".to_string(),
            values,
        };
        let rendered = build_insert(&intent).unwrap();
        assert_eq!(rendered.params.len(), 2);
    }

    #[test]
    fn merge_builds_matched_and_not_matched_branches() {
        let mut pk = BTreeMap::new();
        pk.insert("id".to_string(), json!(1));
        let mut updates = BTreeMap::new();
        updates.insert("name".to_string(), json!("a"));
        let intent = UpdateIntent {
            table: "main.sales.orders".to_string(),
            pk_values: pk,
            updates,
            old_values: BTreeMap::new(),
            strategy: UpdateStrategy::Merge,
        };
        let rendered = build_update(&intent).unwrap();
        assert!(rendered.sql.contains("WHEN MATCHED THEN UPDATE"));
        assert!(rendered.sql.contains("WHEN NOT MATCHED THEN INSERT"));
    }

    #[test]
    fn select_sql_snapshot() {
        let intent = SelectIntent {
            table: "main.sales.orders".to_string(),
            columns: vec!["id".to_string(), "customer".to_string()],
            filters: vec![FilterClause {
                column: "status".to_string(),
                op: FilterOp::Eq,
                value: Some(json!("open")),
            }],
            group_by: vec![],
            having: vec![],
            order_by: vec![OrderByClause {
                column: "id".to_string(),
                direction: SortDirection::Desc,
            }],
            aggregations: vec![],
            limit: 50,
            offset: Some(10),
            limit_capped: false,
        };
        let rendered = build_select(&intent).unwrap();
        insta::assert_snapshot!(rendered.sql, @"SELECT `id`, `customer` FROM `main`.`sales`.`orders` WHERE `status` = :p0 ORDER BY `id` DESC LIMIT 50 OFFSET 10");
    }

    #[test]
    fn insert_sql_snapshot() {
        let mut values = BTreeMap::new();
        values.insert("id".to_string(), json!(1));
        values.insert("name".to_string(), json!("a"));
        let intent = InsertIntent {
            table: "main.sales.orders".to_string(),
            values,
        };
        let rendered = build_insert(&intent).unwrap();
        insta::assert_snapshot!(rendered.sql, @"INSERT INTO `main`.`sales`.`orders` (`id`, `name`) VALUES (:p0, :p1)");
    }

    #[test]
    fn update_sql_snapshot() {
        let mut pk = BTreeMap::new();
        pk.insert("id".to_string(), json!(1));
        let mut updates = BTreeMap::new();
        updates.insert("name".to_string(), json!("a"));
        let intent = UpdateIntent {
            table: "main.sales.orders".to_string(),
            pk_values: pk,
            updates,
            old_values: BTreeMap::new(),
            strategy: UpdateStrategy::Update,
        };
        let rendered = build_update(&intent).unwrap();
        insta::assert_snapshot!(rendered.sql, @"UPDATE `main`.`sales`.`orders` SET `name` = :p0 WHERE `id` = :p1");
    }

    #[test]
    fn merge_sql_snapshot() {
        let mut pk = BTreeMap::new();
        pk.insert("id".to_string(), json!(1));
        let mut updates = BTreeMap::new();
        updates.insert("name".to_string(), json!("a"));
        let intent = UpdateIntent {
            table: "main.sales.orders".to_string(),
            pk_values: pk,
            updates,
            old_values: BTreeMap::new(),
            strategy: UpdateStrategy::Merge,
        };
        let rendered = build_update(&intent).unwrap();
        insta::assert_snapshot!(
            rendered.sql,
            @"MERGE INTO `main`.`sales`.`orders` AS t USING (SELECT :p0 AS `id`, :p1 AS `name`) AS s ON t.`id` = s.`id` WHEN MATCHED THEN UPDATE SET t.`name` = s.`name` WHEN NOT MATCHED THEN INSERT (`id`, `name`) VALUES (s.`id`, s.`name`)"
        );
    }

    #[test]
    fn delete_sql_snapshot() {
        let mut pk = BTreeMap::new();
        pk.insert("id".to_string(), json!(1));
        let intent = DeleteIntent {
            table: "main.sales.orders".to_string(),
            pk_values: vec![pk],
        };
        let rendered = build_delete(&intent).unwrap();
        insta::assert_snapshot!(rendered.sql, @"DELETE FROM `main`.`sales`.`orders` WHERE (`id` = :p0)");
    }
}
