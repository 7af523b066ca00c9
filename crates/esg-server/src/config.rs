//! Server configuration read from environment variables.
//!
//! - `ESG_DB_PATH`: SQLite database file path (default: "esg.db")
//! - `ESG_HOST`: listen address (default: "0.0.0.0")
//! - `ESG_PORT`: listen port (default: "3000")

use std::num::ParseIntError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid ESG_PORT '{value}': {source}")]
    InvalidPort {
        value: String,
        source: ParseIntError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub db_path: String,
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            db_path: "esg.db".to_string(),
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ServerConfig::default();
        let port = match lookup("ESG_PORT") {
            Some(value) => value
                .parse()
                .map_err(|source| ConfigError::InvalidPort { value, source })?,
            None => defaults.port,
        };
        Ok(ServerConfig {
            db_path: lookup("ESG_DB_PATH").unwrap_or(defaults.db_path),
            host: lookup("ESG_HOST").unwrap_or(defaults.host),
            port,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_apply_when_unset() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.addr(), "0.0.0.0:3000");
    }

    #[test]
    fn variables_override_defaults() {
        let vars: HashMap<&str, &str> =
            [("ESG_DB_PATH", "/tmp/x.db"), ("ESG_PORT", "8080")].into_iter().collect();
        let config = ServerConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.db_path, "/tmp/x.db");
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = ServerConfig::from_lookup(|k| (k == "ESG_PORT").then(|| "http".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("http"));
    }
}
