//! Resource-server token verification
//!
//! Verifies HS256 access tokens minted by the authorization server, in
//! order: three-segment structure, signature, `exp` and `nbf` against a
//! clock tolerance, issuer equality, audience membership. When an encryption
//! key is configured and the `upstream_token` claim is present, the upstream
//! credential is decrypted and surfaced to handlers; tag failures invalidate
//! the token.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::jwt::{EncryptedToken, decrypt_upstream_token};
use crate::core::context::VerifiedAuth;

/// Default clock tolerance for `exp`/`nbf` checks
pub const DEFAULT_CLOCK_TOLERANCE_SECONDS: u64 = 60;

/// Machine-readable verification failure codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyErrorCode {
    InvalidToken,
    ExpiredToken,
    InsufficientScope,
}

impl VerifyErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidToken => "invalid_token",
            Self::ExpiredToken => "expired_token",
            Self::InsufficientScope => "insufficient_scope",
        }
    }
}

/// A failed verification: code plus a human-readable reason
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationFailure {
    pub code: VerifyErrorCode,
    pub error: String,
}

impl VerificationFailure {
    fn invalid<S: Into<String>>(error: S) -> Self {
        Self {
            code: VerifyErrorCode::InvalidToken,
            error: error.into(),
        }
    }

    fn expired<S: Into<String>>(error: S) -> Self {
        Self {
            code: VerifyErrorCode::ExpiredToken,
            error: error.into(),
        }
    }
}

/// Verifies bearer tokens for resource-server dispatch
#[derive(Clone)]
pub struct TokenVerifier {
    signing_secret: String,
    /// Decrypts `upstream_token` claims when configured
    encryption_key: Option<[u8; 32]>,
    issuer: String,
    clock_tolerance_seconds: u64,
}

impl TokenVerifier {
    pub fn new(signing_secret: String, issuer: String) -> Self {
        Self {
            signing_secret,
            encryption_key: None,
            issuer,
            clock_tolerance_seconds: DEFAULT_CLOCK_TOLERANCE_SECONDS,
        }
    }

    pub fn with_encryption_key(mut self, key: [u8; 32]) -> Self {
        self.encryption_key = Some(key);
        self
    }

    pub fn with_clock_tolerance(mut self, seconds: u64) -> Self {
        self.clock_tolerance_seconds = seconds;
        self
    }

    /// Verify a token against the expected audience
    pub fn verify(&self, token: &str, audience: &str) -> Result<VerifiedAuth, VerificationFailure> {
        if token.split('.').count() != 3 {
            return Err(VerificationFailure::invalid("malformed token"));
        }

        // Signature only; temporal and claim checks run below with explicit
        // tolerance and error codes
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = Default::default();

        let claims = decode::<Value>(
            token,
            &DecodingKey::from_secret(self.signing_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| VerificationFailure::invalid(format!("signature verification failed: {e}")))?
        .claims;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let tolerance = self.clock_tolerance_seconds;

        let exp = claims
            .get("exp")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| VerificationFailure::invalid("missing exp claim"))?;
        if exp + tolerance <= now {
            return Err(VerificationFailure::expired("token expired"));
        }

        if let Some(nbf) = claims.get("nbf").and_then(|v| v.as_u64()) {
            if nbf > now + tolerance {
                return Err(VerificationFailure::invalid("token not yet valid"));
            }
        }

        match claims.get("iss").and_then(|v| v.as_str()) {
            Some(iss) if iss == self.issuer => {}
            _ => return Err(VerificationFailure::invalid("issuer mismatch")),
        }

        if !audience_matches(claims.get("aud"), audience) {
            return Err(VerificationFailure::invalid("audience mismatch"));
        }

        let upstream_token = match (&self.encryption_key, claims.get("upstream_token")) {
            (Some(key), Some(claim)) => {
                let encrypted: EncryptedToken = serde_json::from_value(claim.clone())
                    .map_err(|_| VerificationFailure::invalid("malformed upstream_token claim"))?;
                Some(decrypt_upstream_token(key, &encrypted).map_err(|e| {
                    VerificationFailure::invalid(format!("upstream_token decryption failed: {e}"))
                })?)
            }
            _ => None,
        };

        let subject = claims
            .get("sub")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let scopes = scopes_of(&claims);

        Ok(VerifiedAuth {
            subject,
            claims,
            scopes,
            upstream_token,
        })
    }

    /// Check that all required scopes are present on verified claims
    pub fn check_scopes(auth: &VerifiedAuth, required: &[&str]) -> Result<(), VerificationFailure> {
        if auth.has_scopes(required) {
            Ok(())
        } else {
            Err(VerificationFailure {
                code: VerifyErrorCode::InsufficientScope,
                error: format!("required scopes: {}", required.join(" ")),
            })
        }
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("issuer", &self.issuer)
            .field("has_encryption_key", &self.encryption_key.is_some())
            .field("clock_tolerance_seconds", &self.clock_tolerance_seconds)
            .finish()
    }
}

/// `aud` may be a single string or an array of strings
fn audience_matches(aud: Option<&Value>, audience: &str) -> bool {
    match aud {
        Some(Value::String(s)) => s == audience,
        Some(Value::Array(items)) => items.iter().any(|v| v.as_str() == Some(audience)),
        _ => false,
    }
}

/// Space-separated `scope` claim; absent means no scopes granted
fn scopes_of(claims: &Value) -> Vec<String> {
    claims
        .get("scope")
        .and_then(|v| v.as_str())
        .map(|s| s.split_whitespace().map(String::from).collect())
        .unwrap_or_default()
}

/// Structured auth-error payload a tool handler can return in place of its
/// result, pointing the client at the resource metadata to start its flow
pub fn auth_error_payload(
    resource_metadata_url: &str,
    failure: &VerificationFailure,
) -> serde_json::Value {
    serde_json::json!({
        "error": failure.code.as_str(),
        "error_description": failure.error,
        "resource_metadata": resource_metadata_url,
    })
}

/// Build an RFC 9728 `WWW-Authenticate` header value for a 401 response
pub fn www_authenticate(
    resource_metadata_url: &str,
    error: Option<&VerificationFailure>,
    scope: Option<&str>,
) -> String {
    let mut header = format!("Bearer resource_metadata=\"{resource_metadata_url}\"");
    if let Some(failure) = error {
        header.push_str(&format!(", error=\"{}\"", failure.code.as_str()));
        header.push_str(&format!(
            ", error_description=\"{}\"",
            failure.error.replace('"', "'")
        ));
    }
    if let Some(scope) = scope {
        header.push_str(&format!(", scope=\"{scope}\""));
    }
    header
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{MintRequest, TokenMinter};
    use crate::auth::provider::UserInfo;

    const ISSUER: &str = "https://mcp.example";

    fn key() -> [u8; 32] {
        [7u8; 32]
    }

    fn minter_with_ttl(ttl: u64) -> TokenMinter {
        TokenMinter::new(ISSUER.to_string(), "signing-secret".to_string(), key(), ttl, None)
    }

    fn mint(scope: Option<&str>, upstream: Option<&str>) -> String {
        minter_with_ttl(3600)
            .mint(
                &UserInfo {
                    sub: "user-1".to_string(),
                    ..UserInfo::default()
                },
                MintRequest {
                    audience: Some(ISSUER),
                    scope,
                    client_id: None,
                    upstream_access_token: upstream,
                },
            )
            .unwrap()
    }

    fn verifier() -> TokenVerifier {
        TokenVerifier::new("signing-secret".to_string(), ISSUER.to_string())
            .with_encryption_key(key())
    }

    #[test]
    fn test_valid_token() {
        let token = mint(Some("read write"), Some("gho_upstream"));
        let auth = verifier().verify(&token, ISSUER).unwrap();

        assert_eq!(auth.subject, "user-1");
        assert_eq!(auth.scopes, vec!["read", "write"]);
        assert_eq!(auth.upstream_token.as_deref(), Some("gho_upstream"));
    }

    #[test]
    fn test_wrong_secret_is_invalid_token() {
        let token = mint(None, None);
        let wrong = TokenVerifier::new("other-secret".to_string(), ISSUER.to_string());
        let failure = wrong.verify(&token, ISSUER).unwrap_err();
        assert_eq!(failure.code, VerifyErrorCode::InvalidToken);
    }

    #[test]
    fn test_malformed_token() {
        let failure = verifier().verify("not-a-jwt", ISSUER).unwrap_err();
        assert_eq!(failure.code, VerifyErrorCode::InvalidToken);
        assert!(failure.error.contains("malformed"));
    }

    #[test]
    fn test_expired_token_code() {
        // TTL 0: exp == iat == now, expired once past the tolerance window
        let token = minter_with_ttl(0)
            .mint(&UserInfo::default(), MintRequest { audience: Some(ISSUER), ..Default::default() })
            .unwrap();

        let strict = TokenVerifier::new("signing-secret".to_string(), ISSUER.to_string())
            .with_clock_tolerance(0);
        let failure = strict.verify(&token, ISSUER).unwrap_err();
        assert_eq!(failure.code, VerifyErrorCode::ExpiredToken);

        // Within tolerance the same token still verifies
        assert!(verifier().verify(&token, ISSUER).is_ok());
    }

    #[test]
    fn test_audience_mismatch() {
        let token = mint(None, None);
        let failure = verifier().verify(&token, "https://other.example").unwrap_err();
        assert_eq!(failure.code, VerifyErrorCode::InvalidToken);
        assert!(failure.error.contains("audience"));
    }

    #[test]
    fn test_issuer_mismatch() {
        let other_issuer = TokenMinter::new(
            "https://rogue.example".to_string(),
            "signing-secret".to_string(),
            key(),
            3600,
            None,
        );
        let token = other_issuer
            .mint(&UserInfo::default(), MintRequest { audience: Some(ISSUER), ..Default::default() })
            .unwrap();
        let failure = verifier().verify(&token, ISSUER).unwrap_err();
        assert!(failure.error.contains("issuer"));
    }

    #[test]
    fn test_upstream_decryption_failure_invalidates() {
        let token = mint(None, Some("gho_upstream"));
        let wrong_key = TokenVerifier::new("signing-secret".to_string(), ISSUER.to_string())
            .with_encryption_key([9u8; 32]);
        let failure = wrong_key.verify(&token, ISSUER).unwrap_err();
        assert_eq!(failure.code, VerifyErrorCode::InvalidToken);
        assert!(failure.error.contains("decryption"));
    }

    #[test]
    fn test_no_encryption_key_skips_decryption() {
        let token = mint(None, Some("gho_upstream"));
        let plain = TokenVerifier::new("signing-secret".to_string(), ISSUER.to_string());
        let auth = plain.verify(&token, ISSUER).unwrap();
        assert!(auth.upstream_token.is_none());
    }

    #[test]
    fn test_scope_check() {
        let token = mint(Some("read"), None);
        let auth = verifier().verify(&token, ISSUER).unwrap();

        assert!(TokenVerifier::check_scopes(&auth, &["read"]).is_ok());
        let failure = TokenVerifier::check_scopes(&auth, &["read", "admin"]).unwrap_err();
        assert_eq!(failure.code, VerifyErrorCode::InsufficientScope);
    }

    #[test]
    fn test_auth_error_payload_shape() {
        let failure = VerificationFailure::invalid("issuer mismatch");
        let payload = auth_error_payload("https://mcp.example/.well-known/oauth-protected-resource", &failure);
        assert_eq!(payload["error"], "invalid_token");
        assert_eq!(payload["error_description"], "issuer mismatch");
        assert!(
            payload["resource_metadata"]
                .as_str()
                .unwrap()
                .ends_with("oauth-protected-resource")
        );
    }

    #[test]
    fn test_www_authenticate_shape() {
        let plain = www_authenticate("https://mcp.example/.well-known/oauth-protected-resource", None, None);
        assert_eq!(
            plain,
            "Bearer resource_metadata=\"https://mcp.example/.well-known/oauth-protected-resource\""
        );

        let failure = VerificationFailure::expired("token expired");
        let full = www_authenticate("https://mcp.example/.well-known/oauth-protected-resource", Some(&failure), Some("read"));
        assert!(full.contains("error=\"expired_token\""));
        assert!(full.contains("error_description=\"token expired\""));
        assert!(full.contains("scope=\"read\""));
    }
}
