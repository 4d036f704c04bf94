//! Configuration module for IP-Federator
//!
//! Handles loading settings from YAML files and environment variables.

mod settings;

pub use settings::*;

use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

/// Candidate settings locations, in lookup order
pub fn settings_paths(explicit: Option<PathBuf>) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(path) = std::env::var("GLOBALIP_SETTINGS_PATH") {
        paths.push(PathBuf::from(path));
    }
    paths.extend(explicit);
    paths.push(PathBuf::from("settings.yml"));
    paths.push(PathBuf::from("config/settings.yml"));
    paths.push(PathBuf::from("/etc/ip-federator/settings.yml"));
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("ip-federator/settings.yml"));
    }

    paths
}

/// Load settings from the first existing file, or use defaults
pub fn load(explicit: Option<PathBuf>) -> Result<Settings> {
    let mut settings = match settings_paths(explicit).into_iter().find(|p| p.exists()) {
        Some(path) => {
            info!("Loading settings from: {}", path.display());
            Settings::from_file(&path)?
        }
        None => {
            info!("No settings file found, using defaults");
            Settings::default()
        }
    };

    settings.merge_env();
    Ok(settings)
}
