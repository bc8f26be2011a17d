//! TOML configuration types for sqlfirewall.
//!
//! The top-level [`AppConfig`] is deserialized from `sqlfirewall.toml` and has
//! a `[server]` section for the reverse proxy and a `[firewall]` section for
//! the filter itself.
//!
//! # Example `sqlfirewall.toml`
//!
//! ```toml
//! [server]
//! listen = "127.0.0.1:8080"
//! upstream = "http://127.0.0.1:5000"
//! server_header = "Firewall"
//!
//! [firewall]
//! dialects = ["mssql"]
//! allow_urls = ["/Admins/Logs/Ajax/GetLoginList", "/static/*"]
//! ```

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::detect::inspect::DEFAULT_MAX_DEPTH;
use crate::dialect::DialectSet;
use crate::error::{Result, SqlFirewallError};

/// Reverse-proxy settings (`[server]` section).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., `"127.0.0.1:8080"`).
    pub listen: String,
    /// Base URL of the protected application (e.g., `"http://127.0.0.1:5000"`).
    pub upstream: String,
    /// Value for the `Server` response header. An empty string leaves the
    /// upstream's header untouched.
    #[serde(default = "default_server_header")]
    pub server_header: String,
}

fn default_server_header() -> String {
    "Firewall".to_string()
}

/// Filter settings (`[firewall]` section).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FirewallConfig {
    /// Dialects whose catalog patterns are enabled: a list of names or `"all"`.
    pub dialects: DialectSet,
    /// Paths exempt from inspection. A trailing `*` marks a prefix.
    pub allow_urls: Vec<String>,
    /// Methods whose form or JSON body is inspected. Query strings are
    /// inspected for every method.
    pub body_methods: Vec<String>,
    /// Largest body read for inspection, in bytes.
    pub max_body_bytes: usize,
    /// Deepest JSON nesting walked before a branch is skipped.
    pub max_depth: usize,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            dialects: DialectSet::all(),
            allow_urls: Vec::new(),
            body_methods: vec!["POST".to_string()],
            max_body_bytes: 30_000_000,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl FirewallConfig {
    /// Defaults with the given dialect set.
    pub fn with_dialects(dialects: DialectSet) -> Self {
        Self {
            dialects,
            ..Default::default()
        }
    }

    pub fn allow_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn body_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.body_methods = methods.into_iter().map(Into::into).collect();
        self
    }
}

/// Top-level application configuration deserialized from `sqlfirewall.toml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub firewall: FirewallConfig,
}

impl AppConfig {
    /// Load and parse the configuration from a TOML file at the given path.
    ///
    /// `${VAR}` and `$VAR` placeholders are replaced with environment variable
    /// values before parsing; an unset variable is an error.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration text, substituting environment placeholders.
    pub fn from_toml(content: &str) -> Result<Self> {
        let content = expand_env_placeholders(content)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

/// `${name}` with any identifier, or bare `$NAME` in uppercase so that
/// `$where`-style values in allow lists are left alone.
static ENV_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Z_][A-Z0-9_]*)").expect("valid regex")
});

/// Expand environment placeholders in raw config text, left to right in a
/// single pass. Expanded values are inserted verbatim and never rescanned.
fn expand_env_placeholders(text: &str) -> Result<String> {
    let mut expanded = String::with_capacity(text.len());
    let mut copied_to = 0;
    for caps in ENV_PLACEHOLDER.captures_iter(text) {
        let (Some(placeholder), Some(name)) = (caps.get(0), caps.get(1).or_else(|| caps.get(2)))
        else {
            continue;
        };
        let value = std::env::var(name.as_str())
            .map_err(|_| SqlFirewallError::ConfigEnvVar(name.as_str().to_string()))?;
        expanded.push_str(&text[copied_to..placeholder.start()]);
        expanded.push_str(&value);
        copied_to = placeholder.end();
    }
    expanded.push_str(&text[copied_to..]);
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;

    const MINIMAL: &str = r#"
[server]
listen = "127.0.0.1:8080"
upstream = "http://127.0.0.1:5000"
"#;

    #[test]
    fn firewall_section_defaults() {
        let config = AppConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.firewall, FirewallConfig::default());
        assert_eq!(config.firewall.dialects, DialectSet::all());
        assert_eq!(config.firewall.body_methods, vec!["POST"]);
        assert_eq!(config.server.server_header, "Firewall");
    }

    #[test]
    fn parses_full_firewall_section() {
        let text = format!(
            "{}\n{}",
            MINIMAL,
            r#"
[firewall]
dialects = ["mssql", "nosql"]
allow_urls = ["/health", "/static/*"]
body_methods = ["POST", "PUT"]
max_body_bytes = 1024
max_depth = 16
"#
        );
        let config = AppConfig::from_toml(&text).unwrap();
        assert_eq!(config.firewall.dialects, Dialect::MsSql | Dialect::NoSql);
        assert_eq!(config.firewall.allow_urls, vec!["/health", "/static/*"]);
        assert_eq!(config.firewall.body_methods, vec!["POST", "PUT"]);
        assert_eq!(config.firewall.max_body_bytes, 1024);
        assert_eq!(config.firewall.max_depth, 16);
    }

    #[test]
    fn unknown_dialect_is_parse_error() {
        let text = format!("{}\n[firewall]\ndialects = [\"sybase\"]\n", MINIMAL);
        let err = AppConfig::from_toml(&text).unwrap_err();
        assert!(matches!(err, SqlFirewallError::ConfigParse(_)));
    }

    #[test]
    fn substitutes_environment_variables() {
        std::env::set_var("SQLFIREWALL_TEST_UPSTREAM", "http://10.0.0.5:9000");
        let text = r#"
[server]
listen = "127.0.0.1:8080"
upstream = "${SQLFIREWALL_TEST_UPSTREAM}"
"#;
        let config = AppConfig::from_toml(text).unwrap();
        assert_eq!(config.server.upstream, "http://10.0.0.5:9000");
    }

    #[test]
    fn missing_environment_variable_is_error() {
        let text = r#"
[server]
listen = "127.0.0.1:8080"
upstream = "${SQLFIREWALL_TEST_SURELY_UNSET}"
"#;
        let err = AppConfig::from_toml(text).unwrap_err();
        assert!(
            matches!(err, SqlFirewallError::ConfigEnvVar(ref v) if v == "SQLFIREWALL_TEST_SURELY_UNSET")
        );
    }

    #[test]
    fn expanded_values_are_not_rescanned() {
        std::env::set_var("SQLFIREWALL_TEST_HEADER", "Edge $SQLFIREWALL_TEST_SURELY_UNSET");
        let text = format!("{}server_header = \"$SQLFIREWALL_TEST_HEADER\"\n", MINIMAL);
        let config = AppConfig::from_toml(&text).unwrap();
        assert_eq!(config.server.server_header, "Edge $SQLFIREWALL_TEST_SURELY_UNSET");
    }

    #[test]
    fn braced_and_bare_placeholders_mix_on_one_line() {
        std::env::set_var("SQLFIREWALL_TEST_HOST", "10.0.0.7");
        std::env::set_var("SQLFIREWALL_TEST_PORT", "9100");
        let expanded =
            expand_env_placeholders("url = \"http://${SQLFIREWALL_TEST_HOST}:$SQLFIREWALL_TEST_PORT/\"")
                .unwrap();
        assert_eq!(expanded, "url = \"http://10.0.0.7:9100/\"");
    }

    #[test]
    fn lowercase_dollar_tokens_are_left_alone() {
        let text = format!("{}\n[firewall]\nallow_urls = [\"/q/$where\"]\n", MINIMAL);
        let config = AppConfig::from_toml(&text).unwrap();
        assert_eq!(config.firewall.allow_urls, vec!["/q/$where"]);
    }

    #[test]
    fn default_template_parses() {
        let config = AppConfig::from_toml(include_str!("../templates/default.toml")).unwrap();
        assert!(!config.server.listen.is_empty());
        assert_eq!(config.firewall.dialects, DialectSet::only(Dialect::MsSql));
    }

    #[test]
    fn load_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sqlfirewall.toml");
        std::fs::write(&path, MINIMAL).unwrap();
        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:8080");
    }
}
