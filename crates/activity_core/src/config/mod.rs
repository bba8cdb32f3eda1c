use crate::error::AppError;
use crate::model::{Principal, default_principals};
use crate::storage::json_store::DEFAULT_STORE_KEY;
use crate::suspension::THRESHOLD_DAYS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "ACTIVITY_CONFIG_PATH";
const DEFAULT_CHECK_INTERVAL_SECS: u64 = 5 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_threshold_days")]
    pub threshold_days: u32,
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    #[serde(default = "default_store_key")]
    pub store_key: String,
    #[serde(default = "default_principals")]
    pub users: Vec<Principal>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold_days: default_threshold_days(),
            check_interval_secs: default_check_interval_secs(),
            store_key: default_store_key(),
            users: default_principals(),
        }
    }
}

impl Config {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }
}

fn default_threshold_days() -> u32 {
    THRESHOLD_DAYS
}

fn default_check_interval_secs() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

fn default_store_key() -> String {
    DEFAULT_STORE_KEY.to_string()
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub threshold_days: Option<u32>,
    pub check_interval_secs: Option<u64>,
    pub store_key: Option<String>,
}

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata)
            .join("activity_tracker")
            .join(CONFIG_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("activity_tracker")
            .join(CONFIG_FILE_NAME))
    }
}

/// Loads the config file, falling back to defaults. A missing file is not an
/// error; an unreadable one is reported alongside the defaults.
pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let config: Config = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), AppError> {
    if config.store_key.trim().is_empty() {
        return Err(AppError::invalid_data("store_key must not be empty"));
    }

    for (index, user) in config.users.iter().enumerate() {
        if user.username.trim().is_empty() {
            return Err(AppError::invalid_data(format!(
                "users[{index}] has an empty username"
            )));
        }
        if config.users[..index]
            .iter()
            .any(|other| other.username == user.username)
        {
            return Err(AppError::invalid_data(format!(
                "duplicate user '{}'",
                user.username
            )));
        }
    }

    Ok(())
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Config {
    let mut merged = base.clone();
    if let Some(threshold_days) = overrides.threshold_days {
        merged.threshold_days = threshold_days;
    }
    if let Some(check_interval_secs) = overrides.check_interval_secs {
        merged.check_interval_secs = check_interval_secs;
    }
    if let Some(store_key) = overrides.store_key.as_ref()
        && !store_key.trim().is_empty()
    {
        merged.store_key = store_key.trim().to_string();
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::{
        Config, ConfigOverrides, load_config_from_path, load_config_with_fallback_from_path,
        merge_overrides,
    };
    use crate::model::Role;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    fn temp_path(file_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("activity-tracker-{nanos}-{file_name}"))
    }

    #[test]
    fn defaults_match_the_suspension_protocol() {
        let config = Config::default();
        assert_eq!(config.threshold_days, 3);
        assert_eq!(config.check_interval(), Duration::from_secs(300));
        assert_eq!(config.store_key, "activity_tracker");
        assert_eq!(config.users.len(), 3);
        assert_eq!(config.users[0].role, Role::Supervisor);
    }

    #[test]
    fn load_config_missing_returns_defaults_without_error() {
        let path = temp_path("missing-config.json");
        let result = load_config_with_fallback_from_path(&path);

        assert_eq!(result.config, Config::default());
        assert!(result.error.is_none());
    }

    #[test]
    fn load_config_invalid_returns_defaults_and_error() {
        let path = temp_path("invalid-config.json");
        fs::write(&path, "{ invalid json ").unwrap();

        let result = load_config_with_fallback_from_path(&path);
        fs::remove_file(&path).ok();

        assert_eq!(result.config, Config::default());
        assert_eq!(result.error.unwrap().code(), "invalid_data");
    }

    #[test]
    fn load_config_reads_partial_file() {
        let path = temp_path("partial-config.json");
        let content = serde_json::json!({
            "threshold_days": 5,
            "users": [
                { "username": "boss", "role": "supervisor", "unit": "all" }
            ]
        });
        fs::write(&path, serde_json::to_string(&content).unwrap()).unwrap();

        let loaded = load_config_from_path(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded.threshold_days, 5);
        assert_eq!(loaded.check_interval_secs, 300);
        assert_eq!(loaded.users.len(), 1);
        assert_eq!(loaded.users[0].username, "boss");
    }

    #[test]
    fn load_config_rejects_duplicate_users() {
        let path = temp_path("duplicate-users.json");
        let content = serde_json::json!({
            "users": [
                { "username": "boss", "role": "supervisor" },
                { "username": "boss", "role": "employee" }
            ]
        });
        fs::write(&path, serde_json::to_string(&content).unwrap()).unwrap();

        let err = load_config_from_path(&path).unwrap_err();
        fs::remove_file(&path).ok();

        assert!(err.message().contains("duplicate user"));
    }

    #[test]
    fn merge_overrides_updates_fields_and_preserves_base() {
        let base = Config::default();
        let overrides = ConfigOverrides {
            threshold_days: Some(7),
            check_interval_secs: Some(60),
            store_key: Some(" team ".into()),
        };

        let merged = merge_overrides(&base, &overrides);

        assert_eq!(base.threshold_days, 3);
        assert_eq!(merged.threshold_days, 7);
        assert_eq!(merged.check_interval_secs, 60);
        assert_eq!(merged.store_key, "team");
        assert_eq!(merged.users, base.users);
    }

    #[test]
    fn merge_overrides_with_empty_overrides_returns_clone() {
        let base = Config::default();
        let merged = merge_overrides(&base, &ConfigOverrides::default());
        assert_eq!(merged, base);
    }

    #[test]
    fn check_interval_is_never_zero() {
        let config = Config {
            check_interval_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.check_interval(), Duration::from_secs(1));
    }
}
