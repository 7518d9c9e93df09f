//! Test utilities with automatic cleanup.
//!
//! `TestEnvironment` owns a temporary directory that is removed when it goes
//! out of scope, even if the test panics.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::config::{BackendKind, StorageConfig};

pub struct TestEnvironment {
    _temp_dir: TempDir,
    pub base_path: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = tempfile::Builder::new().prefix("moneymate-test").tempdir()?;
        let base_path = temp_dir.path().to_path_buf();
        Ok(Self {
            _temp_dir: temp_dir,
            base_path,
        })
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_path
    }

    /// Object store snapshotting into this environment
    pub fn object_store_config(&self) -> StorageConfig {
        StorageConfig::default()
            .with_backend(BackendKind::ObjectStore)
            .with_data_dir(&self.base_path)
            .with_persist(true)
    }

    /// SQLite file database inside this environment
    pub fn sqlite_config(&self) -> StorageConfig {
        StorageConfig::default()
            .with_backend(BackendKind::Sqlite)
            .with_data_dir(&self.base_path)
    }
}
