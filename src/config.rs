use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const APP_NAME: &str = "qtdl";
pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QtdlSettings {
    /// Root of the online repository (OS directories live here).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Root of the `<major.minor>/<version>/` release index.
    #[serde(default = "default_version_index_url")]
    pub version_index_url: String,
    /// 7z-compatible extraction tool.
    #[serde(default = "default_archive_tool")]
    pub archive_tool: String,
    /// Exit non-zero on every failure, including plain I/O errors.
    #[serde(default = "default_strict_exit")]
    pub strict_exit: bool,
}

fn default_base_url() -> String {
    "https://download.qt.io/online/qtsdkrepository/".to_string()
}
fn default_version_index_url() -> String {
    "https://download.qt.io/official_releases/qt/".to_string()
}
fn default_archive_tool() -> String {
    "7z".to_string()
}
fn default_strict_exit() -> bool {
    true
}

impl Default for QtdlSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            version_index_url: default_version_index_url(),
            archive_tool: default_archive_tool(),
            strict_exit: default_strict_exit(),
        }
    }
}

pub fn get_config_file_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("QTDL_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    let path = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join(APP_NAME)
        .join(CONFIG_FILE_NAME);
    tracing::debug!("Config file path: {}", path.display());
    Ok(path)
}

pub fn load_settings() -> Result<QtdlSettings> {
    let config_path = get_config_file_path()?;

    let settings = if config_path.exists() {
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Could not read config file at {}", config_path.display()))?;
        serde_json::from_str(&content).with_context(|| "Could not parse config file as JSON")?
    } else {
        QtdlSettings::default()
    };

    Ok(apply_env_overrides(settings, |key| std::env::var(key).ok()))
}

/// Apply `QTDL_*` environment overrides on top of file settings.
pub fn apply_env_overrides<F>(mut settings: QtdlSettings, lookup: F) -> QtdlSettings
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("QTDL_BASE_URL") {
        settings.base_url = url;
    }
    if let Some(url) = lookup("QTDL_VERSION_INDEX_URL") {
        settings.version_index_url = url;
    }
    if let Some(tool) = lookup("QTDL_ARCHIVE_TOOL") {
        settings.archive_tool = tool;
    }
    if let Some(strict) = lookup("QTDL_STRICT_EXIT") {
        settings.strict_exit = strict.to_lowercase() == "true" || strict == "1";
    }

    settings.base_url = with_trailing_slash(&settings.base_url);
    settings.version_index_url = with_trailing_slash(&settings.version_index_url);
    settings
}

pub fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}
