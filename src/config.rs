//! Configuration loader and validator for the broadcast bot.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const ENV_BOT_TOKEN: &str = "BOT_TOKEN";
pub const ENV_ADMIN_IDS: &str = "ADMIN_IDS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("Invalid admin id {0:?} in ADMIN_IDS")]
    AdminId(String),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub telegram: Telegram,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct App {
    pub data_dir: String,
    /// Delay between two consecutive sends of a broadcast.
    pub send_interval_ms: u64,
    /// Number of records shown by the history view.
    pub history_limit: u32,
}

impl Default for App {
    fn default() -> Self {
        Self {
            data_dir: "./data".into(),
            send_interval_ms: 50,
            history_limit: 10,
        }
    }
}

/// Telegram bot settings. `admins` is fixed for the lifetime of the process.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Telegram {
    pub bot_token: String,
    pub admins: Vec<i64>,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        fs::create_dir_all(&self.app.data_dir)
    }

    pub fn send_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.app.send_interval_ms)
    }

    pub fn database_url(&self) -> String {
        format!(
            "sqlite://{}/broadcastbot.db",
            self.app.data_dir.trim_end_matches('/')
        )
    }
}

/// Load configuration from a YAML file, apply environment overrides and validate.
/// - If `path` is None, uses `config.yaml` in the current working directory.
/// - A missing file is not an error; defaults are used and the environment
///   must then supply the token and admin list.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let mut cfg = if path.exists() {
        let content = fs::read_to_string(path)?;
        serde_yaml::from_str(&content)?
    } else {
        Config::default()
    };
    apply_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Apply `BOT_TOKEN` / `ADMIN_IDS` style overrides using `lookup` as the source.
pub fn apply_overrides<F>(cfg: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = lookup(ENV_BOT_TOKEN).filter(|t| !t.trim().is_empty()) {
        cfg.telegram.bot_token = token.trim().to_string();
    }
    if let Some(ids) = lookup(ENV_ADMIN_IDS) {
        cfg.telegram.admins = parse_admin_ids(&ids)?;
    }
    Ok(())
}

/// Parse a comma-separated list of admin ids, skipping empty items.
pub fn parse_admin_ids(raw: &str) -> Result<Vec<i64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(|_| ConfigError::AdminId(s.to_string())))
        .collect()
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.history_limit == 0 {
        return Err(ConfigError::Invalid("app.history_limit must be > 0"));
    }
    if cfg.telegram.bot_token.trim().is_empty() {
        return Err(ConfigError::Invalid("telegram.bot_token must be non-empty"));
    }
    if cfg.telegram.admins.is_empty() {
        return Err(ConfigError::Invalid(
            "telegram.admins must list at least one administrator",
        ));
    }
    Ok(())
}

/// Returns an example YAML configuration.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  send_interval_ms: 50
  history_limit: 10

telegram:
  bot_token: "YOUR_TELEGRAM_BOT_TOKEN"
  admins:
    - 123456789
"#
}
