//! Storage configuration loaded from environment variables.
//!
//! Every setting has a default so the engine starts with zero configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::warn;

use crate::error::{Error, Result};

const SQLITE_MEMORY_URL: &str = "sqlite::memory:";
const DATABASE_FILE: &str = "moneymate.db";

/// Which storage substrate backs the facade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// In-process object store with optional YAML snapshots
    ObjectStore,
    /// Embedded SQLite through sqlx
    Sqlite,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::ObjectStore => "object-store",
            BackendKind::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(BackendKind::Sqlite),
            "object-store" | "object_store" => Ok(BackendKind::ObjectStore),
            other => Err(Error::Config(format!("unknown backend '{}'", other))),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Env: `MONEYMATE_BACKEND` (`sqlite` or `object-store`)
    /// Default: `sqlite`
    pub backend: BackendKind,

    /// Explicit SQLite URL.
    /// Env: `MONEYMATE_DATABASE_URL`
    /// Default: `sqlite://<data_dir>/moneymate.db`
    pub database_url: Option<String>,

    /// Directory holding the database file or the object-store snapshots.
    /// Env: `MONEYMATE_DATA_DIR`
    /// Default: `<local data dir>/moneymate`, or `./moneymate-data`
    pub data_dir: PathBuf,

    /// Whether the object store writes snapshots. Ignored by SQLite.
    /// Env: `MONEYMATE_PERSIST` (true/false)
    /// Default: `true`
    pub persist: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Sqlite,
            database_url: None,
            data_dir: default_data_dir(),
            persist: true,
        }
    }
}

impl StorageConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`StorageConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(backend) = lookup("MONEYMATE_BACKEND") {
            config.backend = backend.parse()?;
        }

        if let Some(dir) = lookup("MONEYMATE_DATA_DIR") {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }

        if let Some(url) = lookup("MONEYMATE_DATABASE_URL") {
            if !url.trim().is_empty() {
                config.database_url = Some(url);
            }
        }

        if let Some(persist) = lookup("MONEYMATE_PERSIST") {
            match persist.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => config.persist = true,
                "false" | "0" | "no" => config.persist = false,
                _ => warn!(value = %persist, "Invalid MONEYMATE_PERSIST, using default"),
            }
        }

        Ok(config)
    }

    /// A throwaway configuration that never touches the filesystem
    pub fn in_memory(backend: BackendKind) -> Self {
        Self {
            backend,
            database_url: Some(SQLITE_MEMORY_URL.to_string()),
            data_dir: std::env::temp_dir().join("moneymate-unused"),
            persist: false,
        }
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// The SQLite URL to open, derived from `data_dir` when not set
    pub fn database_url(&self) -> String {
        match self.database_url {
            Some(ref url) => url.clone(),
            None => format!("sqlite://{}", self.data_dir.join(DATABASE_FILE).display()),
        }
    }

    pub fn is_memory_database(&self) -> bool {
        let url = self.database_url();
        url.contains(":memory:") || url.contains("mode=memory")
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("moneymate"))
        .unwrap_or_else(|| PathBuf::from("./moneymate-data"))
}
