use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ExplorerError;
use crate::policy::Role;

const APP_DIR: &str = ".api-explorer";

/// User configuration, read from `~/.api-explorer/config.json`.
///
/// Every field has a default so a partial (or missing) file works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    pub base_url: String,
    pub bypass_header: String,
    pub team_header: String,
    pub api_key: Option<String>,
    pub session_cookie: Option<String>,
    pub role: Role,
    pub timeout_secs: Option<u64>,
    pub history_limit: usize,
    pub registry_path: Option<PathBuf>,
    pub presets_path: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            bypass_header: "x-admin-bypass".to_string(),
            team_header: "x-team-id".to_string(),
            api_key: None,
            session_cookie: None,
            role: Role::Member,
            timeout_secs: None,
            history_limit: 100,
            registry_path: None,
            presets_path: None,
            database_path: None,
        }
    }
}

impl ExplorerConfig {
    /// Load from `path`, or from the default location when `None`, then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ExplorerError> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_path().ok().filter(|p| p.exists()),
        };

        let mut config = match path {
            Some(path) => {
                log::debug!("loading config from {}", path.display());
                Self::from_file(&path)?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ExplorerError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ExplorerError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            ExplorerError::Config(format!("cannot parse {}: {}", path.display(), e))
        })
    }

    /// Overlay `API_EXPLORER_*` variables. `lookup` is injectable for tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup("API_EXPLORER_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(api_key) = lookup("API_EXPLORER_API_KEY") {
            self.api_key = Some(api_key).filter(|k| !k.is_empty());
        }
        if let Some(cookie) = lookup("API_EXPLORER_SESSION_COOKIE") {
            self.session_cookie = Some(cookie).filter(|c| !c.is_empty());
        }
        if let Some(role) = lookup("API_EXPLORER_ROLE") {
            match Role::from_str(&role) {
                Some(role) => self.role = role,
                None => log::warn!("ignoring unknown role in API_EXPLORER_ROLE: {}", role),
            }
        }
    }

    /// Application data directory, `~/.api-explorer`.
    pub fn app_dir() -> Result<PathBuf, ExplorerError> {
        let home = dirs::home_dir()
            .ok_or_else(|| ExplorerError::Config("Cannot find home directory".to_string()))?;
        Ok(home.join(APP_DIR))
    }

    pub fn default_path() -> Result<PathBuf, ExplorerError> {
        Ok(Self::app_dir()?.join("config.json"))
    }

    pub fn database_path(&self) -> Result<PathBuf, ExplorerError> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::app_dir()?.join("explorer.db")),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }
}
