//! Request-scoped context passed to every handler
//!
//! Replaces hidden side channels with an explicit, typed parameter: the
//! request `_meta` and, for authenticated calls, the verified token claims.

use serde_json::Value;

/// Verified bearer-token identity attached to a request
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedAuth {
    /// Subject (upstream user id)
    pub subject: String,
    /// Full claim set of the access token
    pub claims: Value,
    /// Scopes granted to the token
    pub scopes: Vec<String>,
    /// Decrypted upstream provider access token, when an encryption key is
    /// configured and the claim was present
    pub upstream_token: Option<String>,
}

impl VerifiedAuth {
    /// Whether the token carries every one of the given scopes
    pub fn has_scopes(&self, required: &[&str]) -> bool {
        required
            .iter()
            .all(|scope| self.scopes.iter().any(|s| s == scope))
    }
}

/// Context handed to tool, resource, and prompt handlers
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Session the request arrived on
    pub session_id: Option<String>,
    /// Request-scope metadata (`params._meta`), passed through untouched
    pub meta: Option<Value>,
    /// Verified token claims, when the request carried a valid bearer token
    pub auth: Option<VerifiedAuth>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_auth(mut self, auth: VerifiedAuth) -> Self {
        self.auth = Some(auth);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scope_check() {
        let auth = VerifiedAuth {
            subject: "u1".to_string(),
            claims: json!({}),
            scopes: vec!["read".to_string(), "write".to_string()],
            upstream_token: None,
        };
        assert!(auth.has_scopes(&["read"]));
        assert!(auth.has_scopes(&["read", "write"]));
        assert!(!auth.has_scopes(&["admin"]));
    }

    #[test]
    fn test_context_builders() {
        let ctx = RequestContext::new()
            .with_session("s-1")
            .with_meta(json!({"progressToken": 9}));
        assert_eq!(ctx.session_id.as_deref(), Some("s-1"));
        assert_eq!(ctx.meta.unwrap()["progressToken"], 9);
    }
}
