//! Structured logging setup, redaction, and SQL/intent log helpers
//! (SPEC_FULL §14.1).

use std::sync::Once;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, LogFormatStyle};

static SENSITIVE_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(token|password|secret|key|credential|auth|api_key|apikey|access_token|refresh_token)").unwrap()
});

const REDACTED: &str = "***REDACTED***";

/// Redacts any object key matching the sensitive-key pattern, recursively.
/// Used before any structured value (params, intent snapshots) reaches a
/// log line.
pub fn redact_sensitive(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                if SENSITIVE_KEY.is_match(k) {
                    out.insert(k.clone(), JsonValue::String(REDACTED.to_string()));
                } else {
                    out.insert(k.clone(), redact_sensitive(v));
                }
            }
            JsonValue::Object(out)
        }
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(redact_sensitive).collect()),
        other => other.clone(),
    }
}

static INIT: Once = Once::new();

/// Idempotent logging setup, reading level/format/sink from `Config`.
pub fn init_logging(config: &Config) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
        let builder = tracing_subscriber::fmt().with_env_filter(filter);

        match config.log_format_style {
            LogFormatStyle::Json => {
                let _ = builder.json().try_init();
            }
            LogFormatStyle::Terminal => {
                let _ = builder.try_init();
            }
        }
    });
}

/// Truncates SQL text for logging, appending a marker when truncation
/// happened, and redacts bound parameters.
pub fn log_sql_preview(sql: &str, params: &JsonValue, max_length: usize) -> (String, JsonValue) {
    let preview = if sql.chars().count() > max_length {
        let truncated: String = sql.chars().take(max_length).collect();
        format!("{truncated}... [TRUNCATED at {max_length} chars]")
    } else {
        sql.to_string()
    };
    (preview, redact_sensitive(params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_nested_token_fields() {
        let value = json!({"user": "a", "headers": {"x-auth-token": "secret-value"}});
        let redacted = redact_sensitive(&value);
        assert_eq!(redacted["headers"]["x-auth-token"], json!(REDACTED));
        assert_eq!(redacted["user"], json!("a"));
    }

    #[test]
    fn truncates_long_sql() {
        let sql = "SELECT ".to_string() + &"x".repeat(1000);
        let (preview, _) = log_sql_preview(&sql, &json!({}), 20);
        assert!(preview.contains("TRUNCATED"));
    }
}
