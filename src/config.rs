use anyhow::{anyhow, Result};
use log::{info, warn, LevelFilter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use sochat::models::Location;

/// An account the local backend knows about before anyone signs in.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeedAccount {
    pub uid: String,
    pub name: String,
    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    pub storage_bucket: String,
    pub log_level: String,
    pub location: Option<Location>,
    pub accounts: Vec<SeedAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_phone_number: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            storage_bucket: "sochat-local".to_string(),
            log_level: "debug".to_string(),
            location: None,
            accounts: vec![SeedAccount {
                uid: "rina".to_string(),
                name: "Rina".to_string(),
                phone_number: "+628000000001".to_string(),
                about: Some("Available".to_string()),
            }],
            last_phone_number: None,
        }
    }
}

impl AppConfig {
    pub fn log_level(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or_else(|_| {
            eprintln!("Unknown log level '{}', using info", self.log_level);
            LevelFilter::Info
        })
    }
}

static CONFIG_PATH_OVERRIDE: OnceCell<PathBuf> = OnceCell::new();

pub fn set_config_path_override(path: PathBuf) {
    if CONFIG_PATH_OVERRIDE.set(path).is_err() {
        warn!("Config path override already set; ignoring");
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow!("Could not determine config directory"))?
        .join("sochat");

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

fn get_config_path() -> Result<PathBuf> {
    if let Some(path) = CONFIG_PATH_OVERRIDE.get() {
        return Ok(path.clone());
    }
    Ok(get_config_dir()?.join("config.json"))
}

pub fn load_config() -> Result<AppConfig> {
    load_config_from(&get_config_path()?)
}

pub fn save_config(config: &AppConfig) -> Result<()> {
    save_config_to(&get_config_path()?, config)
}

/// Missing file gives defaults; an unreadable one is reported and replaced
/// by defaults.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let contents = fs::read_to_string(path)?;
    match serde_json::from_str::<AppConfig>(&contents) {
        Ok(config) => {
            info!("Loaded config from {}", path.display());
            Ok(config)
        }
        Err(e) => {
            warn!("Failed to parse config file {}: {}", path.display(), e);
            Ok(AppConfig::default())
        }
    }
}

pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, config)?;
    info!("Config saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.last_phone_number = Some("+62811".to_string());
        config.location = Some(Location { latitude: -6.2, longitude: 106.8 });
        save_config_to(&path, &config).unwrap();

        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "logLevel": "warn" }"#).unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.log_level(), LevelFilter::Warn);
        assert_eq!(config.storage_bucket, "sochat-local");
    }

    #[test]
    fn test_garbage_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(load_config_from(&path).unwrap(), AppConfig::default());
    }
}
