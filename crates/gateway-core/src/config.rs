//! Immutable, process-wide configuration snapshot loaded from environment
//! variables once, on first use.

use std::env;
use std::time::Duration;

use once_cell::sync::OnceCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormatStyle {
    Terminal,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub databricks_host: String,
    pub databricks_http_path: String,
    pub databricks_token: Option<String>,
    pub databricks_catalog: Option<String>,
    pub databricks_schema: Option<String>,

    pub default_read_limit: u64,
    pub max_read_limit: u64,
    pub max_batch_size: usize,
    pub max_transaction_statements: usize,

    pub query_timeout: Duration,
    pub connection_pool_size: usize,
    pub db_socket_timeout: Duration,
    pub db_session_timeout: Duration,
    pub use_cloud_fetch: bool,

    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
    pub rate_limit_cleanup_interval: Duration,
    pub max_concurrent_queries: usize,

    pub warehouse_warmup_enabled: bool,
    pub warehouse_warmup_ttl: Duration,
    pub warehouse_warmup_failure_backoff: Duration,
    pub warehouse_warmup_sql: String,

    pub schema_cache_ttl: Duration,

    pub log_level: String,
    pub log_format_style: LogFormatStyle,
    pub log_file: Option<String>,
    pub log_intent_enabled: bool,
    pub log_sql_enabled: bool,
    pub sql_log_max_length: usize,

    pub ui_log_level: String,
    pub ui_log_buffer_max_messages: usize,
}

fn env_str(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt_str(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn env_num<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_secs(key: &str, default_secs: u64) -> Duration {
    Duration::from_secs(env_num(key, default_secs))
}

impl Config {
    /// Builds a snapshot from the current process environment. Host and
    /// HTTP path accept either of two legacy-compatible variable names,
    /// matching the original implementation's fallback order.
    pub fn from_env() -> Self {
        let host = env_opt_str("DATABRICKS_SERVER_HOSTNAME")
            .or_else(|| env_opt_str("DATABRICKS_HOST"))
            .unwrap_or_default();
        let host = host.trim_start_matches("https://").trim_start_matches("http://").to_string();

        let http_path = env_opt_str("DATABRICKS_HTTP_PATH")
            .or_else(|| env_opt_str("WAREHOUSE_ID"))
            .unwrap_or_default();

        let log_format_style = match env_str("LOG_FORMAT_STYLE", "terminal").to_lowercase().as_str() {
            "json" => LogFormatStyle::Json,
            _ => LogFormatStyle::Terminal,
        };

        Self {
            databricks_host: host,
            databricks_http_path: http_path,
            databricks_token: env_opt_str("DATABRICKS_TOKEN"),
            databricks_catalog: env_opt_str("DATABRICKS_CATALOG"),
            databricks_schema: env_opt_str("DATABRICKS_SCHEMA"),

            default_read_limit: env_num("DEFAULT_READ_LIMIT", 1000),
            max_read_limit: env_num("MAX_READ_LIMIT", 10_000),
            max_batch_size: env_num("MAX_BATCH_SIZE", 1000),
            max_transaction_statements: env_num("MAX_TRANSACTION_STATEMENTS", 50),

            query_timeout: env_secs("QUERY_TIMEOUT_SECONDS", 900),
            connection_pool_size: env_num("CONNECTION_POOL_SIZE", 5),
            db_socket_timeout: env_secs("DB_SOCKET_TIMEOUT", 600),
            db_session_timeout: env_secs("DB_SESSION_TIMEOUT", 3600),
            use_cloud_fetch: env_bool("USE_CLOUD_FETCH", false),

            rate_limit_requests: env_num("RATE_LIMIT_REQUESTS", 8),
            rate_limit_window: env_secs("RATE_LIMIT_WINDOW_SECONDS", 10),
            rate_limit_cleanup_interval: env_secs("RATE_LIMIT_CLEANUP_INTERVAL_SECONDS", 300),
            max_concurrent_queries: env_num("MAX_CONCURRENT_QUERIES", 20),

            warehouse_warmup_enabled: env_bool("WAREHOUSE_WARMUP_ENABLED", true),
            warehouse_warmup_ttl: env_secs("WAREHOUSE_WARMUP_TTL_SECONDS", 600),
            warehouse_warmup_failure_backoff: env_secs("WAREHOUSE_WARMUP_FAILURE_BACKOFF_SECONDS", 30),
            warehouse_warmup_sql: env_str("WAREHOUSE_WARMUP_SQL", "SELECT 1"),

            schema_cache_ttl: env_secs("SCHEMA_CACHE_TTL_SECONDS", 3600),

            log_level: env_str("LOG_LEVEL", "info"),
            log_format_style,
            log_file: env_opt_str("LOG_FILE"),
            log_intent_enabled: env_bool("LOG_INTENT_ENABLED", false),
            log_sql_enabled: env_bool("LOG_SQL_ENABLED", true),
            sql_log_max_length: env_num("SQL_LOG_MAX_LENGTH", 500),

            ui_log_level: env_str("UI_LOG_LEVEL", "info"),
            ui_log_buffer_max_messages: env_num("UI_LOG_BUFFER_MAX_MESSAGES", 500),
        }
    }
}

static CONFIG: OnceCell<Config> = OnceCell::new();

/// Returns the process-wide config, building it from the environment on
/// first call. Never mutated after first publication.
pub fn get_settings() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        temp_env::with_vars_unset(
            vec!["DEFAULT_READ_LIMIT", "MAX_READ_LIMIT", "RATE_LIMIT_REQUESTS"],
            || {
                let cfg = Config::from_env();
                assert_eq!(cfg.default_read_limit, 1000);
                assert_eq!(cfg.max_read_limit, 10_000);
                assert_eq!(cfg.rate_limit_requests, 8);
            },
        );
    }

    #[test]
    fn strips_scheme_from_host() {
        temp_env::with_var("DATABRICKS_HOST", Some("https://example.cloud.databricks.com"), || {
            let cfg = Config::from_env();
            assert_eq!(cfg.databricks_host, "example.cloud.databricks.com");
        });
    }
}
