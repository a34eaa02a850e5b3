// ! Error types for the beacon-mcp framework
// !
// ! Module defines all error types that can occur within the framework,
// ! providing structured error handling with detailed context.

use thiserror::Error;

/// The main error type for the framework
#[derive(Error, Debug, Clone)]
pub enum McpError {
    /// Protocol-level errors (invalid messages, wrong session state, etc.)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Requested tool was not found
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Requested resource was not found
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Requested prompt was not found
    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    /// Method not found (JSON-RPC error)
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Invalid parameters (JSON-RPC error)
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Input validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Session lookup/lifecycle errors
    #[error("Session error: {0}")]
    Session(String),

    /// Bearer-token authentication errors
    #[error("Authentication error: {0}")]
    Auth(String),

    /// OAuth 2.1 protocol errors at the authorization server
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// HTTP-layer errors (bind failures, upstream calls)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Pluggable storage backend errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors (missing secrets, unparseable values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors from the standard library
    #[error("I/O error: {0}")]
    Io(String),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(String),

    /// Internal errors that shouldn't normally occur
    #[error("Internal error: {0}")]
    Internal(String),
}

// Manual From implementations for types that don't implement Clone
impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        McpError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for McpError {
    fn from(err: std::io::Error) -> Self {
        McpError::Io(err.to_string())
    }
}

impl From<url::ParseError> for McpError {
    fn from(err: url::ParseError) -> Self {
        McpError::Url(err.to_string())
    }
}

impl From<reqwest::Error> for McpError {
    fn from(err: reqwest::Error) -> Self {
        McpError::Http(err.to_string())
    }
}

/// Result type alias for framework operations
pub type McpResult<T> = Result<T, McpError>;

impl McpError {
    /// Create a new protocol error
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::Protocol(message.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new session error
    pub fn session<S: Into<String>>(message: S) -> Self {
        Self::Session(message.into())
    }

    /// Create a new authentication error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        Self::Auth(message.into())
    }

    /// Create a new OAuth error
    pub fn oauth<S: Into<String>>(message: S) -> Self {
        Self::OAuth(message.into())
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage(message.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get the error category for logging/metrics
    pub fn category(&self) -> &'static str {
        match self {
            McpError::Protocol(_) => "protocol",
            McpError::Serialization(_) => "serialization",
            McpError::ToolNotFound(_) => "not_found",
            McpError::ResourceNotFound(_) => "not_found",
            McpError::PromptNotFound(_) => "not_found",
            McpError::MethodNotFound(_) => "not_found",
            McpError::InvalidParams(_) => "validation",
            McpError::Validation(_) => "validation",
            McpError::Session(_) => "session",
            McpError::Auth(_) => "auth",
            McpError::OAuth(_) => "oauth",
            McpError::Http(_) => "http",
            McpError::Storage(_) => "storage",
            McpError::Config(_) => "config",
            McpError::Io(_) => "io",
            McpError::Url(_) => "validation",
            McpError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = McpError::protocol("bad frame");
        assert_eq!(error.to_string(), "Protocol error: bad frame");
        assert_eq!(error.category(), "protocol");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            McpError::ToolNotFound("missing".to_string()).category(),
            "not_found"
        );
        assert_eq!(McpError::auth("unauthorized").category(), "auth");
        assert_eq!(McpError::oauth("invalid_grant").category(), "oauth");
        assert_eq!(McpError::config("missing secret").category(), "config");
    }

    #[test]
    fn test_from_serde_json() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let mcp: McpError = err.into();
        assert_eq!(mcp.category(), "serialization");
    }
}
