//! Configuration management for CoinLedger

use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Delete and recreate the database on startup
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_node_url")]
    pub node_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            overwrite: false,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            node_url: default_node_url(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.database.path.is_empty() {
            return Err("database.path must be set in config.toml".into());
        }

        if self.server.port == 0 {
            return Err("server.port must be non-zero".into());
        }

        if self.client.node_url.is_empty() {
            return Err("client.node_url must be set in config.toml".into());
        }

        Ok(())
    }

    /// Address the API server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

pub fn load_config() -> Result<Config, Box<dyn std::error::Error>> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

/// Reads `path`, falling back to defaults when the file is absent or empty.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let config_str = fs::read_to_string(path).unwrap_or_default();
    let config: Config = if config_str.trim().is_empty() {
        Config::default()
    } else {
        toml::from_str(&config_str)?
    };

    config.validate()?;
    Ok(config)
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_db_path() -> String {
    "ledger.db".to_string()
}

fn default_node_url() -> String {
    "http://localhost:8080".to_string()
}
