//! Closed error taxonomy shared by every gateway crate.
//!
//! `GatewayError` is the single error type propagated out of the SQL engine,
//! connection layer, and lifecycle phases. Each variant carries a
//! `user_message` that is safe to return to the UI and an `internal_message`
//! that is only ever written to logs.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, GatewayError>;

/// The closed set of error categories surfaced to callers.
///
/// Exhaustive by design: a new failure mode must be slotted into one of
/// these categories rather than growing the set, so that callers dispatching
/// on category (retry policy, HTTP status mapping, alerting) never need a
/// catch-all arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorCategory {
    Validation,
    Security,
    Authentication,
    Authorization,
    NotFound,
    Conflict,
    Connection,
    Timeout,
    Throttle,
    Admission,
    Unknown,
}

impl ErrorCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::Security => "SECURITY",
            Self::Authentication => "AUTHENTICATION",
            Self::Authorization => "AUTHORIZATION",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Connection => "CONNECTION",
            Self::Timeout => "TIMEOUT",
            Self::Throttle => "THROTTLE",
            Self::Admission => "ADMISSION",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Closed set of operation failures.
///
/// One variant per category, each carrying the fields that category's
/// callers need (a field name, a table reference, a retry-after hint, ...).
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{user_message}")]
    Validation {
        user_message: String,
        internal_message: String,
        field: Option<String>,
    },

    #[error("{user_message}")]
    Security {
        user_message: String,
        internal_message: String,
    },

    #[error("{user_message}")]
    Authentication {
        user_message: String,
        internal_message: String,
    },

    /// A same-category sub-kind of `Authentication`: the token parsed and was
    /// well-formed, but its validity window has elapsed. Kept distinct so
    /// handlers can special-case "please refresh" UX without the category
    /// itself splitting in two.
    #[error("{user_message}")]
    TokenExpired {
        user_message: String,
        internal_message: String,
    },

    #[error("{user_message}")]
    Authorization {
        user_message: String,
        internal_message: String,
    },

    #[error("{user_message}")]
    NotFound {
        user_message: String,
        internal_message: String,
        resource: Option<String>,
    },

    #[error("{user_message}")]
    Conflict {
        user_message: String,
        internal_message: String,
    },

    #[error("{user_message}")]
    Connection {
        user_message: String,
        internal_message: String,
    },

    #[error("{user_message}")]
    Timeout {
        user_message: String,
        internal_message: String,
        timeout_ms: u64,
    },

    #[error("{user_message}")]
    Throttle {
        user_message: String,
        internal_message: String,
        retry_after_secs: u64,
    },

    #[error("{user_message}")]
    Admission {
        user_message: String,
        internal_message: String,
    },

    /// A query reached the driver and failed there. `sql_snippet` is a
    /// truncated prefix of the statement, never the full text or bound
    /// parameters.
    #[error("{user_message}")]
    QueryExecution {
        user_message: String,
        internal_message: String,
        sql_snippet: Option<String>,
    },

    #[error("{user_message}")]
    MetadataAccess {
        user_message: String,
        internal_message: String,
        table_ref: Option<String>,
    },
}

impl GatewayError {
    pub fn validation(user_message: impl Into<String>, internal_message: impl Into<String>) -> Self {
        Self::Validation {
            user_message: user_message.into(),
            internal_message: internal_message.into(),
            field: None,
        }
    }

    pub fn validation_field(
        user_message: impl Into<String>,
        internal_message: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self::Validation {
            user_message: user_message.into(),
            internal_message: internal_message.into(),
            field: Some(field.into()),
        }
    }

    pub fn security(user_message: impl Into<String>, internal_message: impl Into<String>) -> Self {
        Self::Security {
            user_message: user_message.into(),
            internal_message: internal_message.into(),
        }
    }

    pub fn connection(user_message: impl Into<String>, internal_message: impl Into<String>) -> Self {
        Self::Connection {
            user_message: user_message.into(),
            internal_message: internal_message.into(),
        }
    }

    pub fn timeout(internal_message: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            user_message: "The request took too long and was cancelled".into(),
            internal_message: internal_message.into(),
            timeout_ms,
        }
    }

    pub fn throttled(retry_after_secs: u64) -> Self {
        Self::Throttle {
            user_message: "Too many requests, please slow down".into(),
            internal_message: format!("session exceeded its request budget, retry_after={retry_after_secs}s"),
            retry_after_secs,
        }
    }

    pub fn admission_rejected() -> Self {
        Self::Admission {
            user_message: "The service is at capacity, please retry shortly".into(),
            internal_message: "admission gate permit unavailable".into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Security { .. } => ErrorCategory::Security,
            // TokenExpired stays in the Authentication category: it is a
            // sub-kind, not a sibling category.
            Self::Authentication { .. } | Self::TokenExpired { .. } => ErrorCategory::Authentication,
            Self::Authorization { .. } => ErrorCategory::Authorization,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Throttle { .. } => ErrorCategory::Throttle,
            Self::Admission { .. } => ErrorCategory::Admission,
            Self::QueryExecution { .. } => ErrorCategory::Unknown,
            Self::MetadataAccess { .. } => ErrorCategory::NotFound,
        }
    }

    pub fn user_message(&self) -> &str {
        match self {
            Self::Validation { user_message, .. }
            | Self::Security { user_message, .. }
            | Self::Authentication { user_message, .. }
            | Self::TokenExpired { user_message, .. }
            | Self::Authorization { user_message, .. }
            | Self::NotFound { user_message, .. }
            | Self::Conflict { user_message, .. }
            | Self::Connection { user_message, .. }
            | Self::Timeout { user_message, .. }
            | Self::Throttle { user_message, .. }
            | Self::Admission { user_message, .. }
            | Self::QueryExecution { user_message, .. }
            | Self::MetadataAccess { user_message, .. } => user_message,
        }
    }

    pub fn internal_message(&self) -> &str {
        match self {
            Self::Validation { internal_message, .. }
            | Self::Security { internal_message, .. }
            | Self::Authentication { internal_message, .. }
            | Self::TokenExpired { internal_message, .. }
            | Self::Authorization { internal_message, .. }
            | Self::NotFound { internal_message, .. }
            | Self::Conflict { internal_message, .. }
            | Self::Connection { internal_message, .. }
            | Self::Timeout { internal_message, .. }
            | Self::Throttle { internal_message, .. }
            | Self::Admission { internal_message, .. }
            | Self::QueryExecution { internal_message, .. }
            | Self::MetadataAccess { internal_message, .. } => internal_message,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::Security { .. } => "security_error",
            Self::Authentication { .. } => "authentication_error",
            Self::TokenExpired { .. } => "token_expired",
            Self::Authorization { .. } => "authorization_error",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Connection { .. } => "connection_error",
            Self::Timeout { .. } => "timeout",
            Self::Throttle { .. } => "throttle",
            Self::Admission { .. } => "admission_rejected",
            Self::QueryExecution { .. } => "query_execution_error",
            Self::MetadataAccess { .. } => "metadata_access_error",
        }
    }

    /// Field implicated by a `Validation` error, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => field.as_deref(),
            _ => None,
        }
    }
}

/// Safe-for-UI projection of a `GatewayError`, suitable for JSON
/// serialization in an `OperationResponse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub category: ErrorCategory,
    pub code: String,
    pub message: String,
    pub field: Option<String>,
}

impl From<&GatewayError> for ErrorDetail {
    fn from(err: &GatewayError) -> Self {
        Self {
            category: err.category(),
            code: err.code().to_string(),
            message: err.user_message().to_string(),
            field: err.field().map(str::to_string),
        }
    }
}

impl ErrorDetail {
    /// Fallback for failures that never became a `GatewayError` (a panic
    /// caught at a task boundary, an unexpected driver error). Never leaks
    /// the underlying message to the UI.
    pub fn unknown(_internal_message: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::Unknown,
            code: "unknown_error".to_string(),
            message: "An unexpected error occurred".to_string(),
            field: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_expired_stays_in_authentication_category() {
        let err = GatewayError::TokenExpired {
            user_message: "Your session has expired".into(),
            internal_message: "obo token exp in the past".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Authentication);
        assert_eq!(err.code(), "token_expired");
    }

    #[test]
    fn error_detail_never_leaks_internal_message() {
        let err = GatewayError::Connection {
            user_message: "Could not reach the warehouse".into(),
            internal_message: "connect() to 10.0.0.5:443 refused".into(),
        };
        let detail = ErrorDetail::from(&err);
        assert!(!detail.message.contains("10.0.0.5"));
    }

    #[test]
    fn unknown_detail_is_generic() {
        let detail = ErrorDetail::unknown("stack trace with secrets in it");
        assert_eq!(detail.category, ErrorCategory::Unknown);
        assert!(!detail.message.contains("secrets"));
    }
}
