//! Configuration loading for pryv-client.
//!
//! Configuration can be built in code or loaded from a TOML file:
//!
//! ```toml
//! [connection]
//! username = "jane"
//! auth = "ck0q9s0u0000001"
//! domain = "pryv.me"
//!
//! [http]
//! timeout_secs = 30
//! ```

use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration for pryv-client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Account and endpoint settings.
    pub connection: ConnectionSettings,
    /// HTTP transport settings.
    #[serde(default)]
    pub http: HttpConfig,
}

/// Where and as whom to connect.
///
/// The API endpoint is `{scheme}://{username}.{domain}:{port}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionSettings {
    /// Account username.
    pub username: String,
    /// Access token.
    pub auth: String,
    /// Service domain (default: pryv.io).
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Port (default: 443).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Use HTTPS (default: true).
    #[serde(default = "default_ssl")]
    pub ssl: bool,
}

impl ConnectionSettings {
    /// Settings for a user on the default domain.
    pub fn new(username: &str, auth: &str) -> Self {
        Self {
            username: username.to_string(),
            auth: auth.to_string(),
            domain: default_domain(),
            port: default_port(),
            ssl: default_ssl(),
        }
    }

    /// Set the domain.
    pub fn with_domain(mut self, domain: &str) -> Self {
        self.domain = domain.to_string();
        self
    }

    /// Set port and scheme.
    pub fn with_port(mut self, port: u16, ssl: bool) -> Self {
        self.port = port;
        self.ssl = ssl;
        self
    }

    /// The user's API host, `username.domain`.
    pub fn host(&self) -> String {
        format!("{}.{}", self.username, self.domain)
    }

    /// Base URL of the user's API, without trailing slash.
    pub fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host(), self.port)
    }
}

/// HTTP transport configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// User-Agent header value.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

// Default value functions
fn default_domain() -> String {
    "pryv.io".to_string()
}

fn default_port() -> u16 {
    443
}

fn default_ssl() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("pryv-client/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl ClientConfig {
    /// Configuration for a user with default HTTP settings.
    pub fn new(connection: ConnectionSettings) -> Self {
        Self {
            connection,
            http: HttpConfig::default(),
        }
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_toml_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = ClientConfig::from_toml_str(
            r#"
            [connection]
            username = "jane"
            auth = "token"
            "#,
        )
        .unwrap();

        assert_eq!(config.connection.domain, "pryv.io");
        assert_eq!(config.connection.port, 443);
        assert!(config.connection.ssl);
        assert_eq!(config.http.timeout_secs, 30);
        assert!(config.http.user_agent.starts_with("pryv-client/"));
    }

    #[test]
    fn base_url_follows_scheme_and_port() {
        let settings = ConnectionSettings::new("jane", "token").with_domain("pryv.me");
        assert_eq!(settings.base_url(), "https://jane.pryv.me:443");

        let plain = settings.with_port(8080, false);
        assert_eq!(plain.base_url(), "http://jane.pryv.me:8080");
    }

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[connection]\nusername = \"jane\"\nauth = \"tok\"\ndomain = \"pryv.me\"\nport = 4443\n\n[http]\ntimeout_secs = 5"
        )
        .unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.connection.host(), "jane.pryv.me");
        assert_eq!(config.connection.port, 4443);
        assert_eq!(config.http.timeout_secs, 5);
    }

    #[test]
    fn missing_file_is_read_error() {
        let result = ClientConfig::from_file(std::path::Path::new("/nonexistent/pryv.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn missing_username_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[connection]\nauth = \"tok\"").unwrap();

        let result = ClientConfig::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }
}
