//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use crate::application::errors::ConfigError;

/// Bot configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub bot: BotConfig,
    pub database: DatabaseConfig,
    pub plugins: PluginConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BotConfig {
    pub name: String,
    /// Primary command prefix, overridable at runtime
    pub prefix: String,
    /// Additional prefixes always accepted
    pub prefixes: Vec<String>,
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DatabaseConfig {
    pub sqlite_path: PathBuf,
    pub remote_url: Option<String>,
    pub remote_token: Option<String>,
    pub remote_timeout_secs: u64,
    /// Defaults to `bot_state.json` beside the SQLite file
    pub legacy_state_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PluginConfig {
    pub auto_load: bool,
    /// Unit ids skipped during discovery
    pub disabled: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SecurityConfig {
    pub rate_limit: RateLimitConfig,
    pub pm_protection: bool,
    pub pm_warn_limit: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_seconds: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "ember-bot".to_string(),
            prefix: ".".to_string(),
            prefixes: vec!["!".to_string(), "/".to_string()],
            owner_id: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("bot_state.db"),
            remote_url: None,
            remote_token: None,
            remote_timeout_secs: 10,
            legacy_state_path: None,
        }
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            auto_load: true,
            disabled: Vec::new(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            pm_protection: false,
            pm_warn_limit: 5,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window_seconds: 60,
        }
    }
}

impl DatabaseConfig {
    pub fn legacy_path(&self) -> PathBuf {
        match &self.legacy_state_path {
            Some(path) => path.clone(),
            None => self
                .sqlite_path
                .parent()
                .map(|dir| dir.join("bot_state.json"))
                .unwrap_or_else(|| PathBuf::from("bot_state.json")),
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config.with_env())
    }

    pub fn load_env() -> Self {
        Config::default().with_env()
    }

    /// Apply environment overrides on top of this configuration
    pub fn with_env(mut self) -> Self {
        if let Ok(prefix) = std::env::var("BOT_PREFIX") {
            self.bot.prefix = prefix;
        }

        if let Ok(owner) = std::env::var("OWNER_ID") {
            self.bot.owner_id = Some(owner);
        }

        if let Ok(path) = std::env::var("SQLITE_PATH") {
            self.database.sqlite_path = PathBuf::from(path);
        }

        if let Ok(url) = std::env::var("REMOTE_STORE_URL") {
            self.database.remote_url = Some(url);
        }

        if let Ok(token) = std::env::var("REMOTE_STORE_TOKEN") {
            self.database.remote_token = Some(token);
        }

        if self.bot.owner_id.is_none() {
            tracing::warn!("No owner id configured. Owner-only commands will be inaccessible.");
        }

        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.prefix.is_empty() {
            return Err(ConfigError::InvalidValue("bot.prefix must not be empty".to_string()));
        }
        if self.security.rate_limit.max_requests == 0 {
            return Err(ConfigError::InvalidValue(
                "security.rate-limit.max-requests must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Static prefixes: the primary one followed by the extras
    pub fn static_prefixes(&self) -> Vec<String> {
        let mut prefixes = vec![self.bot.prefix.clone()];
        for prefix in &self.bot.prefixes {
            if !prefixes.contains(prefix) {
                prefixes.push(prefix.clone());
            }
        }
        prefixes
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "bot:\n  owner-id: \"628123\"\ndatabase:\n  sqlite-path: data/state.db\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.bot.owner_id.as_deref(), Some("628123"));
        assert_eq!(config.bot.prefix, ".");
        assert_eq!(config.database.remote_timeout_secs, 10);
        assert_eq!(config.database.legacy_path(), PathBuf::from("data/bot_state.json"));
        assert!(config.plugins.auto_load);
    }

    #[test]
    fn static_prefixes_are_deduplicated() {
        let mut config = Config::default();
        config.bot.prefix = "!".to_string();
        assert_eq!(config.static_prefixes(), vec!["!".to_string(), "/".to_string()]);
    }

    #[test]
    fn rejects_empty_prefix() {
        let mut config = Config::default();
        config.bot.prefix.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_config_round_trips_through_yaml() {
        let yaml = Config::default().to_yaml().unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.security.pm_warn_limit, 5);
        assert_eq!(parsed.bot.prefixes, vec!["!".to_string(), "/".to_string()]);
    }
}
