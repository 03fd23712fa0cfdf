//! Agent configuration.
//!
//! Values come from `config.toml` (by default
//! `$XDG_CONFIG_HOME/termora/config.toml`) and are then overridden by
//! environment variables. Missing keys fall back to [`Config::default`].

use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TermoraError};

/// File name looked up in the XDG config directory.
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub ai_provider: String,
    pub ai_model: String,
    /// Whether captured command output may leave the machine in planning
    /// requests
    pub send_to_api: bool,
    pub auto_confirm: bool,
    pub backup_enabled: bool,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// External planner run for natural-language intents
    pub planner_command: Option<String>,
    pub planning_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ai_provider: "groq".to_string(),
            ai_model: "llama3-70b-8192".to_string(),
            send_to_api: true,
            auto_confirm: false,
            backup_enabled: true,
            log_level: "warn".to_string(),
            log_dir: None,
            max_tokens: 2000,
            temperature: 0.7,
            planner_command: None,
            planning_timeout_secs: 30,
            command_timeout_secs: 300,
            data_dir: None,
        }
    }
}

impl Config {
    /// Loads `path` (or the default location) and applies the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path(),
        };
        let config = match path {
            Some(path) if path.is_file() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.with_env(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| TermoraError::fs(path, e))?;
        Self::from_toml(&content).map_err(|e| TermoraError::Configuration {
            message: format!("{}: {e}", path.display()),
        })
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| TermoraError::Configuration {
            message: e.to_string(),
        })
    }

    /// Applies overrides from `lookup`, a stand-in for `std::env::var`.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get("AI_PROVIDER") {
            self.ai_provider = value;
        }
        if let Some(value) = get("AI_MODEL") {
            self.ai_model = value;
        }
        if let Some(value) = get("SEND_TO_API") {
            self.send_to_api = parse_bool("SEND_TO_API", &value)?;
        }
        if let Some(value) = get("AUTO_CONFIRM") {
            self.auto_confirm = parse_bool("AUTO_CONFIRM", &value)?;
        }
        if let Some(value) = get("BACKUP_ENABLED") {
            self.backup_enabled = parse_bool("BACKUP_ENABLED", &value)?;
        }
        if let Some(value) = get("LOG_LEVEL") {
            self.log_level = value;
        }
        if let Some(value) = get("LOG_DIR") {
            self.log_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = get("MAX_TOKENS") {
            self.max_tokens = parse_number("MAX_TOKENS", &value)?;
        }
        if let Some(value) = get("TEMPERATURE") {
            self.temperature = parse_number("TEMPERATURE", &value)?;
        }
        if let Some(value) = get("TERMORA_PLANNER_COMMAND") {
            self.planner_command = Some(value);
        }
        if let Some(value) = get("PLANNING_TIMEOUT_SECS") {
            self.planning_timeout_secs = parse_number("PLANNING_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = get("COMMAND_TIMEOUT_SECS") {
            self.command_timeout_secs = parse_number("COMMAND_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = get("TERMORA_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(value));
        }

        self.log_level_filter()?;
        Ok(self)
    }

    /// `log_level` as a filter.
    pub fn log_level_filter(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(self.log_level.trim()).map_err(|_| TermoraError::Configuration {
            message: format!("unknown log level '{}'", self.log_level),
        })
    }
}

/// `$XDG_CONFIG_HOME/termora/config.toml`, if the base directories resolve.
pub fn default_config_path() -> Option<PathBuf> {
    xdg::BaseDirectories::with_prefix("termora").get_config_file(CONFIG_FILE)
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(TermoraError::Configuration {
            message: format!("{key} must be true or false, got '{value}'"),
        }),
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| TermoraError::Configuration {
        message: format!("{key} must be a number, got '{value}'"),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::TempDir;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.ai_provider, "groq");
        assert_eq!(config.ai_model, "llama3-70b-8192");
        assert!(config.send_to_api);
        assert!(!config.auto_confirm);
        assert!(config.backup_enabled);
        assert_eq!(config.log_level_filter().unwrap(), LevelFilter::Warn);
        assert_eq!(config.max_tokens, 2000);
        assert_eq!(config.planning_timeout_secs, 30);
        assert_eq!(config.command_timeout_secs, 300);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml("auto_confirm = true\nai_model = \"llama3-8b\"\n").unwrap();
        assert!(config.auto_confirm);
        assert_eq!(config.ai_model, "llama3-8b");
        assert_eq!(config.ai_provider, "groq");
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "send_to_api = true\nmax_tokens = 100\n").unwrap();

        let config = Config::from_file(&path)
            .unwrap()
            .with_env(env(&[
                ("SEND_TO_API", "False"),
                ("MAX_TOKENS", "512"),
                ("TERMORA_PLANNER_COMMAND", "my-planner --json"),
                ("LOG_LEVEL", "debug"),
                ("AI_MODEL", ""),
            ]))
            .unwrap();

        assert!(!config.send_to_api);
        assert_eq!(config.max_tokens, 512);
        assert_eq!(config.planner_command.as_deref(), Some("my-planner --json"));
        assert_eq!(config.log_level_filter().unwrap(), LevelFilter::Debug);
        assert_eq!(config.ai_model, "llama3-70b-8192", "empty values are ignored");
    }

    #[test]
    fn test_bad_values_are_configuration_errors() {
        let err = Config::default()
            .with_env(env(&[("BACKUP_ENABLED", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, TermoraError::Configuration { .. }));

        let err = Config::default()
            .with_env(env(&[("LOG_LEVEL", "loud")]))
            .unwrap_err();
        assert!(matches!(err, TermoraError::Configuration { .. }));

        assert!(Config::from_toml("max_tokens = \"many\"").is_err());
    }
}
