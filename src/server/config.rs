//! Server configuration
//!
//! Options mirror the environment variables of the same uppercased names
//! (`MCP_NAME`, `MCP_PORT`, ...). CORS is deny-by-default: origins must be
//! listed explicitly for the layer to be installed at all.

use crate::core::error::{McpError, McpResult};

/// CORS configuration. Disabled unless origins are provided.
#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    pub enabled: bool,
    /// Explicit allowed origins; there is no wildcard default
    pub origins: Vec<String>,
    pub allow_credentials: bool,
}

impl CorsConfig {
    pub fn allow_origins<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: true,
            origins: origins.into_iter().map(Into::into).collect(),
            allow_credentials: false,
        }
    }
}

/// Top-level server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub port: u16,
    pub cors: CorsConfig,
    /// Log level filter handed to [`init_logging`]; `None` leaves logging to
    /// the embedding application
    pub logging: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "beacon-mcp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            port: 3000,
            cors: CorsConfig::default(),
            logging: None,
        }
    }
}

impl ServerConfig {
    pub fn new<S: Into<String>>(name: S, version: S) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_cors(mut self, cors: CorsConfig) -> Self {
        self.cors = cors;
        self
    }

    /// Read configuration from `MCP_*` environment variables
    pub fn from_env() -> McpResult<Self> {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("MCP_NAME") {
            config.name = name;
        }
        if let Ok(version) = std::env::var("MCP_VERSION") {
            config.version = version;
        }
        if let Ok(port) = std::env::var("MCP_PORT") {
            config.port = validate_port(&port)?;
        }
        if let Ok(origins) = std::env::var("MCP_CORS_ORIGINS") {
            config.cors = CorsConfig::allow_origins(
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from),
            );
        }
        if let Ok(logging) = std::env::var("MCP_LOGGING") {
            config.logging = Some(logging);
        }

        Ok(config)
    }
}

/// Parse and range-check a port value: integer in [1, 65535]
pub fn validate_port(raw: &str) -> McpResult<u16> {
    let port: u32 = raw
        .trim()
        .parse()
        .map_err(|_| McpError::config(format!("invalid port '{raw}'")))?;
    if !(1..=65535).contains(&port) {
        return Err(McpError::config(format!(
            "port {port} outside valid range 1-65535"
        )));
    }
    Ok(port as u16)
}

/// Install a global tracing subscriber honoring `RUST_LOG`, falling back to
/// the given level. A subscriber installed earlier wins silently.
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
