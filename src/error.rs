use thiserror::Error;

/// Unified error type for the sqlfirewall library.
#[derive(Debug, Error)]
pub enum SqlFirewallError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Environment variable {0} used in config is not set")]
    ConfigEnvVar(String),

    #[error("Unknown dialect: {0}")]
    InvalidDialect(String),

    #[error("Invalid upstream URL: {0}")]
    InvalidUpstream(String),

    #[error("Upstream request error: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Proxy error: {0}")]
    Proxy(String),
}

pub type Result<T> = std::result::Result<T, SqlFirewallError>;
