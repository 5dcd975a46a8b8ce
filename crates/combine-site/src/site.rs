//! Reloadable site context.
//!
//! A [`SiteState`] is an immutable snapshot of configuration, catalog and
//! template environment. [`Site`] holds the current snapshot behind an
//! `RwLock<Arc<_>>`; [`Site::reload`] builds a complete new snapshot and swaps
//! it in, so a build that already holds the previous `Arc` finishes against
//! the state it started with.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use combine_config::{CliSettings, Config, ConfigError};
use rayon::prelude::*;

use crate::build::{self, BuildError, BuildReport};
use crate::catalog::{Catalog, CatalogError};
use crate::file::File;
use crate::render;
use crate::templates::Templates;

/// Error returned when a site snapshot cannot be loaded.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Configuration, catalog and templates of one load generation.
pub struct SiteState {
    config: Config,
    catalog: Catalog,
    templates: Templates,
}

impl SiteState {
    /// Scan the content roots and resolve every file's references.
    pub fn load(config: Config) -> Result<Self, LoadError> {
        let catalog = Catalog::load(&config.content_paths)?;
        let templates = Templates::new(&config);

        let files: Vec<&File> = catalog.files().collect();
        files
            .par_iter()
            .for_each(|file| file.set_references(render::load_references(file, &templates)));

        tracing::debug!(files = files.len(), "Loaded site");
        Ok(Self {
            config,
            catalog,
            templates,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    /// Files that must be re-rendered when `content_relative_path` changes:
    /// the file itself and every file referencing it.
    pub fn affected_files(&self, content_relative_path: &str) -> Vec<&File> {
        self.catalog
            .files()
            .filter(|f| f.is_affected_by(content_relative_path))
            .collect()
    }

    /// Map an absolute path to a content-relative path, if it lies in a content root.
    pub fn content_relative_path(&self, path: &Path) -> Option<String> {
        self.catalog.content_relative_path(path)
    }

    /// Build this snapshot. See [`build::build`].
    pub fn build(&self, only_paths: &HashSet<PathBuf>) -> Result<BuildReport, BuildError> {
        build::build(self, only_paths)
    }
}

/// The site being built, reloadable as a whole.
///
/// # Thread Safety
///
/// - `state()` clones the current `Arc<SiteState>` under a read lock
/// - `reload()` is serialized by `reload_lock` and swaps the snapshot under a
///   short write lock
pub struct Site {
    config_path: PathBuf,
    settings: CliSettings,
    /// Mutex for serializing reload operations.
    reload_lock: Mutex<()>,
    /// Current snapshot (atomically swappable).
    current_state: RwLock<Arc<SiteState>>,
}

impl Site {
    /// Load the site described by `config_path`.
    ///
    /// `settings` are re-applied on every reload.
    pub fn load(config_path: &Path, settings: CliSettings) -> Result<Self, LoadError> {
        let config = Config::load(config_path, Some(&settings))?;
        let state = SiteState::load(config)?;

        Ok(Self {
            config_path: config_path.to_path_buf(),
            settings,
            reload_lock: Mutex::new(()),
            current_state: RwLock::new(Arc::new(state)),
        })
    }

    /// Current snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    pub fn state(&self) -> Arc<SiteState> {
        self.current_state.read().unwrap().clone()
    }

    /// Re-read configuration, catalog and templates, and swap in the new snapshot.
    ///
    /// On error the previous snapshot stays current.
    ///
    /// # Panics
    ///
    /// Panics if internal locks are poisoned.
    pub fn reload(&self) -> Result<Arc<SiteState>, LoadError> {
        let _guard = self.reload_lock.lock().unwrap();

        let config = Config::load(&self.config_path, Some(&self.settings))?;
        let state = Arc::new(SiteState::load(config)?);
        *self.current_state.write().unwrap() = Arc::clone(&state);

        tracing::info!(files = state.catalog().len(), "Reloaded site");
        Ok(state)
    }

    /// Build the current snapshot.
    pub fn build(&self, only_paths: &HashSet<PathBuf>) -> Result<BuildReport, BuildError> {
        self.state().build(only_paths)
    }

    /// Path of the configuration file the site was loaded from.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}
