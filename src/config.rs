use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

const CONFIG_ENV: &str = "MAPSMITH_CONFIG";

pub const DEFAULT_DOWNLOAD_URL: &str = "https://static.gaq9.com/maps/map_files.7z";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:140.0) Gecko/20100101 Firefox/140.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogMode {
    Flat,
    #[default]
    Latest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorKind {
    TeamFortress2,
    #[default]
    KnownGames,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub download_url: String,
    pub user_agent: String,
    pub archive_name: PathBuf,
    pub extract_dir: PathBuf,
    pub catalog_mode: CatalogMode,
    pub locator: LocatorKind,
    pub dedupe_installs: bool,
    pub extra_library_roots: Vec<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            archive_name: PathBuf::from("map_files.7z"),
            extract_dir: PathBuf::from("map_files"),
            catalog_mode: CatalogMode::default(),
            locator: LocatorKind::default(),
            dedupe_installs: true,
            extra_library_roots: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn load_or_create() -> Result<Self> {
        let path = config_path()?;
        Self::load_or_create_at(&path)
    }

    pub fn load_or_create_at(path: &Path) -> Result<Self> {
        if path.exists() {
            let raw = fs::read_to_string(path).context("read app config")?;
            let config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            return Ok(config);
        }

        let config = AppConfig::default();
        config.save_at(path)?;
        Ok(config)
    }

    pub fn save_at(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("create app config dir")?;
        }
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        fs::write(path, raw).context("write app config")?;
        Ok(())
    }
}

fn config_path() -> Result<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    Ok(base_data_dir()?.join("config.json"))
}

fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("mapsmith"))
}
