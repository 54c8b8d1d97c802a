//! Per-request context threaded through the lifecycle: identity, headers,
//! and the scoped logging fields the orchestrator updates as it advances
//! through phases (spec §4.1, §6).

use std::collections::HashMap;

/// How the caller authenticated, detected from headers/environment in the
/// AUTHN phase. Soft-checked only: no authorization decision is made here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Obo,
    ServicePrincipal,
    Local,
}

#[derive(Debug, Clone, Default)]
pub struct RequestHeaders {
    inner: HashMap<String, String>,
}

impl RequestHeaders {
    pub fn new(headers: HashMap<String, String>) -> Self {
        let inner = headers.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect();
        Self { inner }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn obo_token(&self) -> Option<&str> {
        self.get("x-forwarded-access-token")
    }

    pub fn user_email(&self) -> Option<&str> {
        self.get("x-forwarded-email")
    }

    pub fn user_name(&self) -> Option<&str> {
        self.get("x-forwarded-user")
    }

    pub fn preferred_username(&self) -> Option<&str> {
        self.get("x-forwarded-preferred-username")
    }
}

/// Carries everything the lifecycle phases read or write for a single
/// request. Built once per call to `execute()` and never shared across
/// tasks.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub correlation_id: String,
    pub session_id: Option<String>,
    pub obo_token: Option<String>,
    pub auth_method: Option<AuthMethod>,
    pub user_email: Option<String>,
    pub phase: String,
}

impl RequestContext {
    pub fn new(correlation_id: Option<String>, session_id: Option<String>, obo_token: Option<String>) -> Self {
        Self {
            correlation_id: correlation_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            session_id,
            obo_token,
            auth_method: None,
            user_email: None,
            phase: "INIT".to_string(),
        }
    }

    pub fn set_phase(&mut self, phase: &str) {
        self.phase = phase.to_string();
    }

    /// Detects the auth method from headers and the presence of an OBO
    /// token, and records the caller's email for the logging context
    /// (spec §4.1 step 3 — soft check, never raises).
    pub fn detect_auth(&mut self, headers: &RequestHeaders, has_sp_token: bool) {
        self.user_email = headers.user_email().map(str::to_string).or_else(|| headers.user_name().map(str::to_string));

        self.auth_method = Some(if self.obo_token.is_some() || headers.obo_token().is_some() {
            if self.obo_token.is_none() {
                self.obo_token = headers.obo_token().map(str::to_string);
            }
            AuthMethod::Obo
        } else if has_sp_token {
            AuthMethod::ServicePrincipal
        } else {
            AuthMethod::Local
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_obo_from_header() {
        let mut ctx = RequestContext::new(None, None, None);
        let mut headers = HashMap::new();
        headers.insert("X-Forwarded-Access-Token".to_string(), "tok".to_string());
        ctx.detect_auth(&RequestHeaders::new(headers), true);
        assert_eq!(ctx.auth_method, Some(AuthMethod::Obo));
        assert_eq!(ctx.obo_token.as_deref(), Some("tok"));
    }

    #[test]
    fn falls_back_to_service_principal_then_local() {
        let mut ctx = RequestContext::new(None, None, None);
        ctx.detect_auth(&RequestHeaders::new(HashMap::new()), true);
        assert_eq!(ctx.auth_method, Some(AuthMethod::ServicePrincipal));

        let mut ctx2 = RequestContext::new(None, None, None);
        ctx2.detect_auth(&RequestHeaders::new(HashMap::new()), false);
        assert_eq!(ctx2.auth_method, Some(AuthMethod::Local));
    }
}
