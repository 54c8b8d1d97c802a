//! Rewrites dialect-neutral `:name` placeholders into the driver's native
//! positional form.
//!
//! Callers and query builders only ever produce `:name` tokens; this is the
//! single seam where that neutral syntax is translated into whatever a
//! concrete driver expects, so swapping drivers never touches SQL-building
//! code upstream.

use std::collections::BTreeMap;

use gateway_error::{GatewayError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r":([a-zA-Z_][a-zA-Z0-9_]*)").unwrap());

/// Rewrites every `:name` in `sql` to `$1`, `$2`, ... in first-seen order,
/// returning the rewritten SQL and the matching positional values pulled
/// from `params`. Errors if a placeholder has no corresponding entry in
/// `params`.
pub fn to_positional(sql: &str, params: &BTreeMap<String, JsonValue>) -> Result<(String, Vec<JsonValue>)> {
    let mut ordered: Vec<JsonValue> = Vec::new();
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    let mut missing: Option<String> = None;

    let rewritten = PLACEHOLDER.replace_all(sql, |caps: &regex::Captures| {
        let name = &caps[1];
        if let Some(&idx) = seen.get(name) {
            return format!("${}", idx + 1);
        }
        match params.get(name) {
            Some(value) => {
                ordered.push(value.clone());
                let idx = ordered.len();
                seen.insert(name.to_string(), idx - 1);
                format!("${idx}")
            }
            None => {
                missing.get_or_insert_with(|| name.to_string());
                caps[0].to_string()
            }
        }
    });

    if let Some(name) = missing {
        return Err(GatewayError::validation_field(
            "A required query parameter is missing",
            format!("no value bound for placeholder :{name}"),
            name,
        ));
    }

    Ok((rewritten.into_owned(), ordered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rewrites_in_first_seen_order() {
        let mut params = BTreeMap::new();
        params.insert("b".to_string(), json!(2));
        params.insert("a".to_string(), json!(1));
        let (sql, values) = to_positional("select * from t where x = :b and y = :a", &params).unwrap();
        assert_eq!(sql, "select * from t where x = $1 and y = $2");
        assert_eq!(values, vec![json!(2), json!(1)]);
    }

    #[test]
    fn reuses_index_for_repeated_name() {
        let mut params = BTreeMap::new();
        params.insert("id".to_string(), json!(42));
        let (sql, values) = to_positional("where id = :id or parent_id = :id", &params).unwrap();
        assert_eq!(sql, "where id = $1 or parent_id = $1");
        assert_eq!(values, vec![json!(42)]);
    }

    #[test]
    fn missing_param_is_a_validation_error() {
        let params = BTreeMap::new();
        let err = to_positional("where id = :id", &params).unwrap_err();
        assert_eq!(err.category(), gateway_error::ErrorCategory::Validation);
    }

    proptest::proptest! {
        /// Every name bound in `params` and referenced in `sql` round-trips:
        /// the rewritten SQL has exactly one `$n` per distinct name, in
        /// first-seen order, and `values[n - 1]` is that name's bound value.
        #[test]
        fn positional_rewrite_round_trips(raw_names in proptest::collection::vec("[a-z][a-z0-9]{0,5}", 1..6)) {
            let mut seen = std::collections::BTreeSet::new();
            let names: Vec<String> = raw_names.into_iter().filter(|n| seen.insert(n.clone())).collect();
            let mut params = BTreeMap::new();
            for (i, name) in names.iter().enumerate() {
                params.insert(name.clone(), json!(i as i64));
            }
            let sql = names.iter().map(|n| format!(":{n}")).collect::<Vec<_>>().join(" ");

            let (rewritten, values) = to_positional(&sql, &params).unwrap();

            prop_assert_eq!(values.len(), names.len());
            for (i, name) in names.iter().enumerate() {
                prop_assert_eq!(&values[i], params.get(name).unwrap());
            }
            let expected_rewritten = (1..=names.len()).map(|i| format!("${i}")).collect::<Vec<_>>().join(" ");
            prop_assert_eq!(rewritten, expected_rewritten);
        }
    }
}
