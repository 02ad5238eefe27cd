use crate::app::cli::ConfigOverrides;
use crate::app::error::{ContextError, Result};
use crate::app::models::Configuration;
use anyhow::Context;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

pub const CONFIG_FILE: &str = "config.toml";

/// On-disk layout holding the configuration, static texts, global files and
/// cloned repositories.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn default_location() -> anyhow::Result<PathBuf> {
        let base = dirs::config_dir().context("Could not determine config directory")?;
        Ok(base.join("repo_context"))
    }

    /// Creates the workspace directories if they are missing.
    pub fn ensure(&self) -> anyhow::Result<()> {
        for dir in [self.static_dir(), self.global_dir(), self.repositories_dir()] {
            fs::create_dir_all(&dir).context(format!("Failed to create {:?}", dir))?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn static_dir(&self) -> PathBuf {
        self.root.join("static_files")
    }

    pub fn global_dir(&self) -> PathBuf {
        self.root.join("global_files")
    }

    pub fn repositories_dir(&self) -> PathBuf {
        self.root.join("repositories")
    }

    pub fn static_file(&self, name: &str) -> PathBuf {
        self.static_dir().join(name)
    }

    /// Names of the directories under `repositories/`, sorted.
    pub fn list_repositories(&self) -> anyhow::Result<Vec<String>> {
        let dir = self.repositories_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir).context(format!("Failed to list {:?}", dir))? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Regular files under `global_files/`, sorted by name.
    pub fn global_files(&self) -> Vec<PathBuf> {
        let Ok(read_dir) = fs::read_dir(self.global_dir()) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = read_dir
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect();
        files.sort();
        files
    }

    pub fn add_global_file(&self, source: &Path) -> anyhow::Result<PathBuf> {
        let name = source
            .file_name()
            .context(format!("{:?} has no file name", source))?;
        fs::create_dir_all(self.global_dir())?;
        let target = self.global_dir().join(name);
        fs::copy(source, &target).context(format!("Failed to copy {:?}", source))?;
        log::info!("Global file {:?} added", name);
        Ok(target)
    }

    /// Resolves a repository argument: an existing path, or a name under `repositories/`.
    pub fn resolve_repository(&self, repo: &Path) -> anyhow::Result<PathBuf> {
        if repo.is_dir() {
            return Ok(repo.to_path_buf());
        }
        let cloned = self.repositories_dir().join(repo);
        if cloned.is_dir() {
            return Ok(cloned);
        }
        anyhow::bail!("Repository {:?} not found", repo)
    }
}

/// Loads and saves the configuration document, serializing writers.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing document yields the empty default; a malformed one is an error.
    pub fn load(&self) -> Result<Configuration> {
        if !self.path.exists() {
            log::info!("No configuration at {:?}, using defaults", self.path);
            return Ok(Configuration::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|source| ContextError::ConfigRead {
            path: self.path.clone(),
            source,
        })?;

        let config = toml::from_str(&content).map_err(|source| ContextError::ConfigParse {
            path: self.path.clone(),
            source,
        })?;
        log::debug!("Loaded configuration from {:?}", self.path);
        Ok(config)
    }

    pub fn save(&self, config: &Configuration) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.write(config)
    }

    /// Read-modify-write under the writer lock.
    pub fn update<F>(&self, change: F) -> Result<Configuration>
    where
        F: FnOnce(&mut Configuration),
    {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut config = self.load()?;
        change(&mut config);
        self.write(&config)?;
        Ok(config)
    }

    fn write(&self, config: &Configuration) -> Result<()> {
        let content = toml::to_string_pretty(config)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| ContextError::ConfigWrite {
                path: self.path.clone(),
                source,
            })?;
        }
        fs::write(&self.path, content).map_err(|source| ContextError::ConfigWrite {
            path: self.path.clone(),
            source,
        })?;
        log::info!("Configuration saved to {:?}", self.path);
        Ok(())
    }
}

/// Concatenates two optional lists, dropping later duplicates.
pub fn merge_vecs(base: Option<Vec<String>>, extra: Option<Vec<String>>) -> Vec<String> {
    let mut combined = base.unwrap_or_default();
    if let Some(mut items) = extra {
        combined.append(&mut items);
    }
    let mut seen = HashSet::new();
    combined.retain(|item| seen.insert(item.clone()));
    combined
}

/// Layers command-line overrides over the stored configuration.
pub fn resolve_config(base: Configuration, overrides: &ConfigOverrides) -> Configuration {
    Configuration {
        source_directory: overrides.source_directory.clone().or(base.source_directory),
        exclude_dirs: merge_vecs(Some(base.exclude_dirs), overrides.exclude_dirs.clone()),
        important_files: merge_vecs(Some(base.important_files), overrides.important_files.clone()),
        ..base
    }
}
