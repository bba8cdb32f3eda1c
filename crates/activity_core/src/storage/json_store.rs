use crate::error::AppError;
use crate::model::Activity;
use crate::storage::ActivityStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const STORE_PATH_ENV_VAR: &str = "ACTIVITY_STORE_PATH";
pub const DEFAULT_STORE_KEY: &str = "activity_tracker";
const APP_DIR_NAME: &str = "activity_tracker";

/// The persisted blob. `users` and `settings` are carried through untouched.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredData {
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub users: Vec<serde_json::Value>,
    #[serde(default)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Store for `store_key`, honouring the path override variable.
    pub fn from_env(store_key: &str) -> Result<Self, AppError> {
        Ok(Self::new(store_path(store_key)?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ActivityStore for JsonStore {
    fn load(&self) -> Result<Vec<Activity>, AppError> {
        Ok(load_data(&self.path)?.activities)
    }

    fn save(&self, activities: &[Activity]) -> Result<(), AppError> {
        let mut data = load_data(&self.path)?;
        data.activities = activities.to_vec();
        save_data(&self.path, &data)
    }
}

pub fn store_path(store_key: &str) -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(STORE_PATH_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    let key = store_key.trim();
    if key.is_empty() || key.contains(['/', '\\']) {
        return Err(AppError::invalid_data(format!(
            "store key '{store_key}' is not a valid file name"
        )));
    }
    let file_name = format!("{key}.json");

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join(APP_DIR_NAME).join(file_name))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join(APP_DIR_NAME)
            .join(file_name))
    }
}

pub fn load_data(path: &Path) -> Result<StoredData, AppError> {
    if !path.exists() {
        return Ok(StoredData::default());
    }

    let content = std::fs::read_to_string(path).map_err(|err| AppError::io(err.to_string()))?;
    if content.trim().is_empty() {
        return Ok(StoredData::default());
    }

    serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })
}

pub fn save_data(path: &Path, data: &StoredData) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| AppError::io(err.to_string()))?;
    }

    let content =
        serde_json::to_string_pretty(data).map_err(|err| AppError::invalid_data(err.to_string()))?;
    std::fs::write(path, content).map_err(|err| AppError::io(err.to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, permissions).map_err(|err| AppError::io(err.to_string()))?;
    }

    Ok(())
}
