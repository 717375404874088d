//! Application context shared by the front end.
//!
//! The route registry and preset catalog are hydrated exactly once, on first
//! use, and cached in the context that owns them.

use rust_embed::RustEmbed;
use std::sync::OnceLock;

use crate::config::ExplorerConfig;
use crate::editor::RequestEditor;
use crate::error::ExplorerError;
use crate::executor::RequestExecutor;
use crate::policy::{HeaderPolicy, SessionContext};
use crate::presets::PresetCatalog;
use crate::registry::RouteRegistry;
use crate::store::Database;

/// Built-in registry and presets, embedded from `./assets`.
#[derive(RustEmbed)]
#[folder = "assets"]
pub struct Assets;

impl Assets {
    fn text(path: &str) -> Result<String, ExplorerError> {
        let file = Self::get(path)
            .ok_or_else(|| ExplorerError::NotFound(format!("could not find asset at path \"{path}\"")))?;
        String::from_utf8(file.data.into_owned())
            .map_err(|e| ExplorerError::Config(format!("asset {} is not UTF-8: {}", path, e)))
    }

    pub fn registry() -> Result<RouteRegistry, ExplorerError> {
        RouteRegistry::from_json(&Self::text("registry.json")?)
    }

    pub fn presets() -> Result<PresetCatalog, ExplorerError> {
        PresetCatalog::from_json(&Self::text("presets.json")?)
    }
}

/// Registry and presets, loaded together.
#[derive(Debug, Clone)]
pub struct Catalogs {
    pub registry: RouteRegistry,
    pub presets: PresetCatalog,
}

pub struct AppContext {
    config: ExplorerConfig,
    db: Database,
    catalogs: OnceLock<Catalogs>,
}

impl AppContext {
    pub fn new(config: ExplorerConfig, db: Database) -> Self {
        Self {
            config,
            db,
            catalogs: OnceLock::new(),
        }
    }

    /// Open the configured database and build a context around it.
    pub fn open(config: ExplorerConfig) -> Result<Self, ExplorerError> {
        let db = Database::open(&config.database_path()?)?;
        Ok(Self::new(config, db))
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn is_hydrated(&self) -> bool {
        self.catalogs.get().is_some()
    }

    /// Load the catalogs on first call; later calls return the cached copy.
    pub fn catalogs(&self) -> Result<&Catalogs, ExplorerError> {
        if let Some(catalogs) = self.catalogs.get() {
            return Ok(catalogs);
        }

        let loaded = self.load_catalogs()?;
        // A concurrent first call may have won; either copy is equivalent.
        Ok(self.catalogs.get_or_init(|| loaded))
    }

    fn load_catalogs(&self) -> Result<Catalogs, ExplorerError> {
        let registry = match &self.config.registry_path {
            Some(path) => RouteRegistry::from_file(path)?,
            None => Assets::registry()?,
        };

        let mut presets = Assets::presets()?;
        if let Some(path) = &self.config.presets_path {
            presets.merge(PresetCatalog::from_file(path)?);
        }

        log::info!(
            "hydrated {} endpoints and {} presets",
            registry.len(),
            presets.len()
        );
        Ok(Catalogs { registry, presets })
    }

    pub fn registry(&self) -> Result<&RouteRegistry, ExplorerError> {
        Ok(&self.catalogs()?.registry)
    }

    pub fn presets(&self) -> Result<&PresetCatalog, ExplorerError> {
        Ok(&self.catalogs()?.presets)
    }

    pub fn header_policy(&self) -> HeaderPolicy {
        HeaderPolicy::from_config(&self.config)
    }

    /// Session from configuration, scoped to the cached active team.
    pub fn session(&self) -> SessionContext {
        let mut session = SessionContext::from_config(&self.config);
        session.team_id = self.db.active_team_id().unwrap_or_else(|e| {
            log::error!("Failed to read active team: {}", e);
            None
        });
        session
    }

    pub fn editor(&self) -> RequestEditor {
        RequestEditor::new(self.session())
    }

    pub fn executor(&self) -> Result<RequestExecutor, ExplorerError> {
        RequestExecutor::with_timeout(self.config.timeout())
    }
}
