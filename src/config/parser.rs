use std::path::Path;

use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::ConfigError;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub channex: ChannexConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub rooms: RoomsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChannexConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    pub property_id: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ChannexConfig {
    /// API key wrapped so it never lands in debug output of callers.
    pub fn api_key(&self) -> SecretString {
        SecretString::from(self.api_key.clone())
    }
}

/// Inbound webhook settings. `token` is the shared bearer credential the
/// channel manager is expected to present; when unset, deliveries are
/// accepted without authentication.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct WebhookConfig {
    #[serde(default)]
    pub token: Option<String>,
}

impl WebhookConfig {
    pub fn token(&self) -> Option<SecretString> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(SecretString::from)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub min_connections: Option<u32>,
}

impl DatabaseConfig {
    pub fn db_type(&self) -> DbType {
        if self.connection_string().starts_with("sqlite://") {
            DbType::Sqlite
        } else {
            DbType::Postgres
        }
    }

    pub fn connection_string(&self) -> String {
        if let Some(ref url) = self.url {
            url.clone()
        } else if let Some(ref file) = self.filename {
            format!("sqlite://{}", file)
        } else {
            String::new()
        }
    }

    pub fn sqlite_path(&self) -> Option<String> {
        if let DbType::Sqlite = self.db_type() {
            let url = self.connection_string();
            Some(url.strip_prefix("sqlite://").unwrap_or(&url).to_string())
        } else {
            None
        }
    }

    pub fn max_connections(&self) -> Option<u32> {
        match self.db_type() {
            DbType::Postgres => self.max_connections,
            DbType::Sqlite => Some(1),
        }
    }

    pub fn min_connections(&self) -> Option<u32> {
        match self.db_type() {
            DbType::Postgres => self.min_connections,
            DbType::Sqlite => Some(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    Postgres,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Room/rate mapping table plus property-level defaults applied to every
/// outbound payload.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoomsConfig {
    #[serde(default = "default_currency")]
    pub currency: String,
    pub default_category: String,
    pub mappings: Vec<RoomMappingEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoomMappingEntry {
    pub category: String,
    pub room_type_id: String,
    pub rate_plan_id: String,
    pub title: String,
    pub base_price: Decimal,
    #[serde(default = "default_max_occupancy")]
    pub max_occupancy: u32,
    #[serde(default)]
    pub availability: u32,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
        Self::load_from_file(config_path)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(&path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channex.property_id.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "channex.property_id cannot be empty".to_string(),
            ));
        }

        if self.channex.api_key.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "channex.api_key cannot be empty (set channex.api_key or CHANNEX_API_KEY)"
                    .to_string(),
            ));
        }

        if self.database.connection_string().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "database connection string cannot be empty".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "server.port must be between 1 and 65535".to_string(),
            ));
        }

        if self.rooms.mappings.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "rooms.mappings cannot be empty".to_string(),
            ));
        }

        let mut categories = std::collections::HashSet::new();
        let mut room_type_ids = std::collections::HashSet::new();
        let mut rate_plan_ids = std::collections::HashSet::new();
        for entry in &self.rooms.mappings {
            if !categories.insert(entry.category.as_str()) {
                return Err(ConfigError::InvalidConfig(format!(
                    "duplicate room category in rooms.mappings: {}",
                    entry.category
                )));
            }
            if !room_type_ids.insert(entry.room_type_id.as_str()) {
                return Err(ConfigError::InvalidConfig(format!(
                    "duplicate room_type_id in rooms.mappings: {}",
                    entry.room_type_id
                )));
            }
            if !rate_plan_ids.insert(entry.rate_plan_id.as_str()) {
                return Err(ConfigError::InvalidConfig(format!(
                    "duplicate rate_plan_id in rooms.mappings: {}",
                    entry.rate_plan_id
                )));
            }
            if entry.base_price.is_sign_negative() {
                return Err(ConfigError::InvalidConfig(format!(
                    "rooms.mappings[{}].base_price cannot be negative",
                    entry.category
                )));
            }
            if entry.max_occupancy == 0 {
                return Err(ConfigError::InvalidConfig(format!(
                    "rooms.mappings[{}].max_occupancy must be at least 1",
                    entry.category
                )));
            }
        }

        if !categories.contains(self.rooms.default_category.as_str()) {
            return Err(ConfigError::InvalidConfig(format!(
                "rooms.default_category '{}' has no entry in rooms.mappings",
                self.rooms.default_category
            )));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("CHANNEX_API_KEY") {
            self.channex.api_key = value;
        }
        if let Ok(value) = std::env::var("CHANNEX_API_URL") {
            self.channex.api_url = value;
        }
        if let Ok(value) = std::env::var("CHANNEX_PROPERTY_ID") {
            self.channex.property_id = value;
        }
        if let Ok(value) = std::env::var("PMS_WEBHOOK_TOKEN") {
            self.webhook.token = Some(value);
        }
        if let Ok(value) = std::env::var("DATABASE_URL") {
            self.database.url = Some(value);
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9310
}

fn default_api_url() -> String {
    "https://staging.channex.io/api/v1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_max_occupancy() -> u32 {
    2
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use secrecy::ExposeSecret;

    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
channex:
  api_key: test-key
  property_id: prop-1
database:
  filename: sync.db
rooms:
  currency: EUR
  default_category: standard
  mappings:
    - category: standard
      room_type_id: rt-std
      rate_plan_id: rp-std
      title: Standard Room
      base_price: 100
    - category: deluxe
      room_type_id: rt-dlx
      rate_plan_id: rp-dlx
      title: Deluxe Room
      base_price: "150.50"
      max_occupancy: 3
      availability: 4
"#
    }

    #[test]
    fn loads_minimal_config_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(sample_yaml().as_bytes()).expect("write");

        let config = Config::load_from_file(file.path()).expect("config should load");
        assert_eq!(config.server.port, 9310);
        assert_eq!(config.rooms.currency, "EUR");
        assert_eq!(config.rooms.mappings.len(), 2);
        assert_eq!(
            config.rooms.mappings[1].base_price,
            Decimal::new(15050, 2)
        );
        assert_eq!(config.rooms.mappings[0].max_occupancy, 2);
        assert_eq!(config.database.db_type(), DbType::Sqlite);
    }

    #[test]
    fn rejects_duplicate_room_type_ids() {
        let yaml = sample_yaml().replace("rt-dlx", "rt-std");
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(yaml.as_bytes()).expect("write");

        let err = Config::load_from_file(file.path()).expect_err("duplicate ids must fail");
        assert!(matches!(err, ConfigError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_unknown_default_category() {
        let yaml = sample_yaml().replace("default_category: standard", "default_category: suite");
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(yaml.as_bytes()).expect("write");

        let err = Config::load_from_file(file.path()).expect_err("unknown default must fail");
        assert!(matches!(err, ConfigError::InvalidConfig(_)));
    }

    #[test]
    fn webhook_token_ignores_blank_values() {
        let config = WebhookConfig {
            token: Some("   ".to_string()),
        };
        assert!(config.token().is_none());

        let config = WebhookConfig {
            token: Some("secret".to_string()),
        };
        assert_eq!(
            config.token().map(|t| t.expose_secret().to_string()),
            Some("secret".to_string())
        );
    }
}
