//! Configuration discovery and loading for cloudplug

pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{EndpointSettings, KindSettings, PollSettings, Settings};

use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "CLOUDPLUG_CONFIG_PATH";

const CANDIDATES: [&str; 4] = [
    "cloudplug.local.yaml",
    ".cloudplug.local.yaml",
    "cloudplug.yaml",
    ".cloudplug.yaml",
];

/// User-level config directory (`~/.config/cloudplug` on Linux)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("cloudplug"))
}

/// Locate the config file.
///
/// Search order:
/// 1. `CLOUDPLUG_CONFIG_PATH` (direct path)
/// 2. current directory: cloudplug.local.yaml, .cloudplug.local.yaml, cloudplug.yaml, .cloudplug.yaml
/// 3. `./.cloudplug/` with the same names
/// 4. `~/.config/cloudplug/config.yaml`
///
/// Returns `Ok(None)` when nothing is found.
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    let current_dir = std::env::current_dir()?;
    for dir in [current_dir.clone(), current_dir.join(".cloudplug")] {
        if !dir.is_dir() {
            continue;
        }
        for filename in &CANDIDATES {
            let path = dir.join(filename);
            if path.exists() {
                return Ok(Some(path));
            }
        }
    }

    if let Some(dir) = config_dir() {
        let global_config = dir.join("config.yaml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

/// Settings plus the file they came from, if any
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedConfig {
    pub path: Option<PathBuf>,
    pub settings: Settings,
}

/// Read and validate one config file
pub fn load_file(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    let settings = Settings::from_yaml(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    settings.validate()?;
    Ok(settings)
}

/// Load `explicit` when given, otherwise the discovered file, otherwise defaults
pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file()?,
    };

    match path {
        Some(path) => Ok(LoadedConfig {
            settings: load_file(&path)?,
            path: Some(path),
        }),
        None => Ok(LoadedConfig::default()),
    }
}
