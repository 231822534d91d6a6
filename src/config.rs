//! Connection configuration.
//!
//! All fields are optional; only fields with a present value are forwarded
//! to the physical connect call, never explicit nulls. Configuration may be
//! supplied as a static record, a producer function, or an asynchronous
//! producer, and is validated before any connect attempt.

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::{DbError, DbResult};

/// TLS negotiation mode for the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    Disable,
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl std::fmt::Display for SslMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disable => "disable",
            Self::Prefer => "prefer",
            Self::Require => "require",
            Self::VerifyCa => "verify-ca",
            Self::VerifyFull => "verify-full",
        };
        write!(f, "{s}")
    }
}

/// Immutable connection configuration record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection arguments in libpq connection URI format
    pub dsn: Option<String>,
    /// Database host address
    pub host: Option<String>,
    /// Port number to connect to
    pub port: Option<u16>,
    /// Name of the database role used for authentication
    pub user: Option<String>,
    /// Password to be used for authentication
    pub password: Option<String>,
    /// Name of the file used to store passwords
    pub passfile: Option<String>,
    /// Name of the database to connect to
    pub database: Option<String>,
    /// Connection timeout in seconds
    pub timeout: Option<f64>,
    /// TLS negotiation mode
    pub ssl: Option<SslMode>,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(timeout) = self.timeout {
            if !timeout.is_finite() || timeout < 0.0 {
                return Err(format!(
                    "timeout must be a non-negative number of seconds, got {timeout}"
                ));
            }
        }
        if let Some(port) = self.port {
            if port == 0 {
                return Err("port must be greater than 0".to_string());
            }
        }
        Ok(())
    }

    /// Build the connect-call argument list from the fields that are present.
    pub fn connect_params(&self) -> ConnectParams {
        let mut params = Vec::new();
        let mut push = |key: &'static str, value: Option<String>| {
            if let Some(value) = value {
                params.push((key, value));
            }
        };
        push("dsn", self.dsn.clone());
        push("host", self.host.clone());
        push("port", self.port.map(|p| p.to_string()));
        push("user", self.user.clone());
        push("password", self.password.clone());
        push("passfile", self.passfile.clone());
        push("database", self.database.clone());
        push("timeout", self.timeout.map(|t| t.to_string()));
        push("ssl", self.ssl.map(|s| s.to_string()));
        ConnectParams(params)
    }
}

/// Named arguments for the physical connect call; absent options are omitted.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectParams(Vec<(&'static str, String)>);

impl ConnectParams {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Where configuration comes from: a static record, a producer, or a
/// producer whose result is produced asynchronously.
pub enum ConfigSource {
    Static(Config),
    Provider(Box<dyn Fn() -> Config + Send + Sync>),
    AsyncProvider(Box<dyn Fn() -> BoxFuture<'static, Config> + Send + Sync>),
}

impl From<Config> for ConfigSource {
    fn from(config: Config) -> Self {
        Self::Static(config)
    }
}

impl ConfigSource {
    /// Resolve and validate the configuration. Fails with a configuration
    /// error before any physical connect attempt.
    pub async fn resolve(&self) -> DbResult<Config> {
        let config = match self {
            Self::Static(config) => config.clone(),
            Self::Provider(provider) => provider(),
            Self::AsyncProvider(provider) => provider().await,
        };
        config.validate().map_err(DbError::config)?;
        Ok(config)
    }
}

impl std::fmt::Debug for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(config) => f.debug_tuple("Static").field(config).finish(),
            Self::Provider(_) => f.write_str("Provider(..)"),
            Self::AsyncProvider(_) => f.write_str("AsyncProvider(..)"),
        }
    }
}
