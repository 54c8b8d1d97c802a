//! Identifier and table-reference validation (spec §3's regex invariant,
//! §9's "AST, not strings" discipline starts here: every identifier that
//! reaches the SQL engine has already passed through this module).

use gateway_error::{GatewayError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());
static TABLE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*){2}$").unwrap());

pub fn validate_identifier(name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(GatewayError::validation_field(
            "Invalid identifier",
            format!("identifier '{name}' does not match the allowed pattern"),
            name,
        ))
    }
}

/// `"*"` is only ever valid as a column list entry, never as a table
/// reference or a bare identifier.
pub fn validate_column(name: &str) -> Result<()> {
    if name == "*" {
        Ok(())
    } else {
        validate_identifier(name)
    }
}

pub fn validate_table_ref(table_ref: &str) -> Result<()> {
    if TABLE_REF.is_match(table_ref) {
        Ok(())
    } else {
        Err(GatewayError::validation_field(
            "Invalid table reference",
            format!("'{table_ref}' is not a three-level catalog.schema.table reference"),
            "table",
        ))
    }
}

pub struct TableParts {
    pub catalog: String,
    pub schema: String,
    pub table: String,
}

pub fn parse_table_ref(table_ref: &str) -> Result<TableParts> {
    validate_table_ref(table_ref)?;
    let mut parts = table_ref.split('.');
    Ok(TableParts {
        catalog: parts.next().unwrap_or_default().to_string(),
        schema: parts.next().unwrap_or_default().to_string(),
        table: parts.next().unwrap_or_default().to_string(),
    })
}

/// Backtick-quotes a single identifier for Spark-flavoured SQL output.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quotes each of the three parts of a table reference independently,
/// joined by `.`.
pub fn quote_table_ref(table_ref: &str) -> Result<String> {
    let parts = parse_table_ref(table_ref)?;
    Ok(format!(
        "{}.{}.{}",
        quote_identifier(&parts.catalog),
        quote_identifier(&parts.schema),
        quote_identifier(&parts.table)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_three_level_reference() {
        assert!(validate_table_ref("main.sales.orders").is_ok());
    }

    #[test]
    fn rejects_two_level_reference() {
        assert!(validate_table_ref("sales.orders").is_err());
    }

    #[test]
    fn star_is_a_valid_column_but_not_an_identifier() {
        assert!(validate_column("*").is_ok());
        assert!(validate_identifier("*").is_err());
    }

    #[test]
    fn quoting_escapes_backticks() {
        assert_eq!(quote_identifier("weird`name"), "`weird``name`");
    }
}
