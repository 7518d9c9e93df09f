//! # Storage Module
//!
//! Persistence for every entity, behind one repository trait per entity.
//! Two backends implement the traits: an indexed object store with optional
//! YAML snapshots ([`object_store`]) and SQLite through sqlx ([`sqlite`]).
//! [`Database`] picks one from [`StorageConfig`] and runs the startup phases
//! in order: initialize, migrate, seed.

pub mod balance;
pub mod object_store;
pub mod records;
pub mod seed;
pub mod sqlite;
pub mod stats;
pub mod traits;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use tracing::info;

pub use object_store::ObjectStoreConnection;
pub use seed::SeedReport;
pub use sqlite::DbConnection;
pub use traits::*;

use crate::config::{BackendKind, StorageConfig};
use crate::error::{Error, Result};

/// The database facade: one backend plus its six repositories.
///
/// Cheap to clone; clones share the same backend.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Repositories>,
}

struct Repositories {
    connection: Arc<dyn Connection>,
    accounts: Arc<dyn AccountStorage>,
    categories: Arc<dyn CategoryStorage>,
    transactions: Arc<dyn TransactionStorage>,
    budgets: Arc<dyn BudgetStorage>,
    chat_messages: Arc<dyn ChatMessageStorage>,
    settings: Arc<dyn SettingsStorage>,
}

impl Database {
    /// Open the configured backend, apply the schema and seed empty tables.
    ///
    /// Any failure is reported as [`Error::Initialization`] naming the phase.
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        info!(backend = %config.backend, "Opening storage");
        let connection = Self::initialize(config)
            .await
            .map_err(|e| phase_error("initialize", e))?;
        let database = Self::from_connection(connection);

        database
            .migrate()
            .await
            .map_err(|e| phase_error("migrate", e))?;
        database.seed().await.map_err(|e| phase_error("seed", e))?;

        info!(backend = %config.backend, "Storage ready");
        Ok(database)
    }

    async fn initialize(config: &StorageConfig) -> Result<Arc<dyn Connection>> {
        let connection: Arc<dyn Connection> = match config.backend {
            BackendKind::ObjectStore => Arc::new(ObjectStoreConnection::initialize(config).await?),
            BackendKind::Sqlite => Arc::new(DbConnection::initialize(config).await?),
        };
        Ok(connection)
    }

    /// Wrap an already initialized backend without migrating or seeding
    pub fn from_connection(connection: Arc<dyn Connection>) -> Self {
        Self {
            inner: Arc::new(Repositories {
                accounts: connection.create_account_repository(),
                categories: connection.create_category_repository(),
                transactions: connection.create_transaction_repository(),
                budgets: connection.create_budget_repository(),
                chat_messages: connection.create_chat_message_repository(),
                settings: connection.create_settings_repository(),
                connection,
            }),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.inner.connection.kind()
    }

    pub async fn migrate(&self) -> Result<()> {
        self.inner.connection.migrate().await
    }

    /// Populate defaults into whichever tables are empty
    pub async fn seed(&self) -> Result<SeedReport> {
        seed::seed_defaults(
            self.inner.accounts.as_ref(),
            self.inner.categories.as_ref(),
            self.inner.settings.as_ref(),
        )
        .await
    }

    /// Empty every table. Defaults are not restored; call [`Database::seed`].
    pub async fn clear(&self) -> Result<()> {
        self.inner.connection.clear().await
    }

    /// Clear, then seed the defaults again
    pub async fn reset_to_factory(&self) -> Result<SeedReport> {
        self.clear().await?;
        self.seed().await
    }

    pub async fn close(&self) -> Result<()> {
        self.inner.connection.close().await
    }

    pub fn accounts(&self) -> Arc<dyn AccountStorage> {
        self.inner.accounts.clone()
    }

    pub fn categories(&self) -> Arc<dyn CategoryStorage> {
        self.inner.categories.clone()
    }

    pub fn transactions(&self) -> Arc<dyn TransactionStorage> {
        self.inner.transactions.clone()
    }

    pub fn budgets(&self) -> Arc<dyn BudgetStorage> {
        self.inner.budgets.clone()
    }

    pub fn chat_messages(&self) -> Arc<dyn ChatMessageStorage> {
        self.inner.chat_messages.clone()
    }

    pub fn settings(&self) -> Arc<dyn SettingsStorage> {
        self.inner.settings.clone()
    }

    /// Whether both handles share one backend
    pub fn ptr_eq(&self, other: &Database) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

fn phase_error(phase: &str, err: Error) -> Error {
    match err {
        Error::Initialization(_) => err,
        other => Error::Initialization(format!("{} failed: {}", phase, other)),
    }
}
