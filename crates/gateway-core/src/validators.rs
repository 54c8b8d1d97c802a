//! Request-level validation that sits above the intent builders: batch
//! bounds, transaction depth/shape, and the read-only-prefix guard used
//! for named queries (spec §4.1 VALIDATE phase, §4.8).

use gateway_error::{GatewayError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{Operation, OperationRequest, Payload, ProcessingMode};

static READONLY_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)^\s*(WITH|SELECT)\b").unwrap());

/// A single pass of dangerous-token checks applied to named-query SQL
/// before it is cached, mirroring the original `validate_sql` guard.
static DANGEROUS_STATEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\b(DROP|TRUNCATE|ALTER|GRANT|REVOKE|CREATE\s+USER)\b").unwrap());

pub fn validate_readonly_prefix(sql: &str) -> Result<()> {
    if READONLY_PREFIX.is_match(sql) {
        Ok(())
    } else {
        Err(GatewayError::security(
            "Named queries must be read-only",
            "named query SQL does not start with SELECT/WITH",
        ))
    }
}

pub fn validate_sql_is_safe(sql: &str) -> Result<()> {
    if DANGEROUS_STATEMENT.is_match(sql) {
        Err(GatewayError::security(
            "Query contains a disallowed statement",
            "named query SQL matched a disallowed-token pattern",
        ))
    } else {
        Ok(())
    }
}

pub fn validate_batch_size(payload: &Payload, max_batch_size: usize) -> Result<()> {
    if let Payload::Batch(records) = payload {
        if records.len() > max_batch_size {
            return Err(GatewayError::validation(
                "Batch exceeds the maximum allowed size",
                format!("batch of {} exceeds max_batch_size={max_batch_size}", records.len()),
            ));
        }
    }
    Ok(())
}

/// A `TRANSACTION` may only contain `SINGLE`-mode mutations, never a
/// nested `TRANSACTION`, never batch payloads (spec §3).
pub fn validate_transaction_shape(request: &OperationRequest, max_statements: usize) -> Result<()> {
    if request.operations.len() > max_statements {
        return Err(GatewayError::validation(
            "Transaction exceeds the maximum number of statements",
            format!(
                "transaction has {} sub-operations, max is {max_statements}",
                request.operations.len()
            ),
        ));
    }

    for sub in &request.operations {
        if sub.operation == Operation::Transaction {
            return Err(GatewayError::validation(
                "Transactions cannot be nested",
                "sub-operation is itself a TRANSACTION",
            ));
        }
        if sub.mode != ProcessingMode::Single {
            return Err(GatewayError::validation(
                "Transaction sub-operations must be single-record mutations",
                "sub-operation mode is not SINGLE",
            ));
        }
        if !matches!(sub.operation, Operation::Insert | Operation::Update | Operation::Merge | Operation::Delete) {
            return Err(GatewayError::validation(
                "Transaction sub-operations must be mutations",
                "sub-operation is not INSERT/UPDATE/MERGE/DELETE",
            ));
        }
        match &sub.payload {
            Some(Payload::Single(_)) => {}
            _ => {
                return Err(GatewayError::validation(
                    "Transaction sub-operations require a single-record payload",
                    "sub-operation payload is not a single mapping",
                ))
            }
        }
    }

    Ok(())
}

/// Mutations require a `WHERE`/PK specification; this guards against an
/// UPDATE/DELETE with no scoping at all reaching the SQL engine.
pub fn validate_mutation_safety(request: &OperationRequest) -> Result<()> {
    match request.operation {
        Operation::Update | Operation::Merge | Operation::Delete => {
            if request.filter_where.is_none() {
                return Err(GatewayError::security(
                    "Mutations require a WHERE clause",
                    format!("{:?} request has no filter_where", request.operation),
                ));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readonly_prefix_accepts_select_and_with() {
        assert!(validate_readonly_prefix("SELECT 1").is_ok());
        assert!(validate_readonly_prefix("  with t as (select 1) select * from t").is_ok());
    }

    #[test]
    fn readonly_prefix_rejects_insert() {
        assert!(validate_readonly_prefix("INSERT INTO t VALUES (1)").is_err());
    }

    #[test]
    fn dangerous_statement_detects_drop() {
        assert!(validate_sql_is_safe("SELECT 1; DROP TABLE t").is_err());
    }

    #[test]
    fn batch_size_limit_is_enforced() {
        let payload = Payload::Batch(vec![Default::default(); 5]);
        assert!(validate_batch_size(&payload, 4).is_err());
        assert!(validate_batch_size(&payload, 5).is_ok());
    }
}
