use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use shared::{Account, Budget, Category, ChatMessage, Setting, Transaction};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::store::{ObjectStore, StagedSnapshot};
use super::{
    ObjectAccountRepository, ObjectBudgetRepository, ObjectCategoryRepository,
    ObjectChatMessageRepository, ObjectSettingsRepository, ObjectTransactionRepository,
};
use crate::config::{BackendKind, StorageConfig};
use crate::error::Result;
use crate::storage::traits::{
    AccountStorage, BudgetStorage, CategoryStorage, ChatMessageStorage, Connection,
    SettingsStorage, TransactionStorage,
};

/// Names of the individual stores, used to pick which snapshots to rewrite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreName {
    Accounts,
    Categories,
    Transactions,
    Budgets,
    ChatMessages,
    Settings,
}

impl StoreName {
    pub const ALL: [StoreName; 6] = [
        StoreName::Accounts,
        StoreName::Categories,
        StoreName::Transactions,
        StoreName::Budgets,
        StoreName::ChatMessages,
        StoreName::Settings,
    ];
}

/// Every store of one object-store database
#[derive(Debug, Default)]
pub struct ObjectStores {
    pub accounts: ObjectStore<Account>,
    pub categories: ObjectStore<Category>,
    pub transactions: ObjectStore<Transaction>,
    pub budgets: ObjectStore<Budget>,
    pub chat_messages: ObjectStore<ChatMessage>,
    pub settings: ObjectStore<Setting>,
}

impl ObjectStores {
    fn load(dir: &std::path::Path) -> Result<Self> {
        Ok(Self {
            accounts: ObjectStore::load(dir)?,
            categories: ObjectStore::load(dir)?,
            transactions: ObjectStore::load(dir)?,
            budgets: ObjectStore::load(dir)?,
            chat_messages: ObjectStore::load(dir)?,
            settings: ObjectStore::load(dir)?,
        })
    }

    fn save(&self, name: StoreName, dir: &std::path::Path) -> Result<()> {
        match name {
            StoreName::Accounts => self.accounts.save(dir),
            StoreName::Categories => self.categories.save(dir),
            StoreName::Transactions => self.transactions.save(dir),
            StoreName::Budgets => self.budgets.save(dir),
            StoreName::ChatMessages => self.chat_messages.save(dir),
            StoreName::Settings => self.settings.save(dir),
        }
    }

    fn stage(&self, name: StoreName, dir: &std::path::Path) -> Result<StagedSnapshot> {
        match name {
            StoreName::Accounts => self.accounts.stage(dir),
            StoreName::Categories => self.categories.stage(dir),
            StoreName::Transactions => self.transactions.stage(dir),
            StoreName::Budgets => self.budgets.stage(dir),
            StoreName::ChatMessages => self.chat_messages.stage(dir),
            StoreName::Settings => self.settings.stage(dir),
        }
    }

    /// Rewrite the named snapshots. Every file is staged before any is
    /// replaced, so a failed write leaves all of them as they were.
    fn persist(&self, names: &[StoreName], dir: &std::path::Path) -> Result<()> {
        let mut staged = Vec::with_capacity(names.len());
        for name in names {
            match self.stage(*name, dir) {
                Ok(snapshot) => staged.push(snapshot),
                Err(e) => {
                    staged.into_iter().for_each(StagedSnapshot::discard);
                    return Err(e);
                }
            }
        }
        for snapshot in staged {
            snapshot.commit()?;
        }
        Ok(())
    }

    /// Copy of the named stores; the rest are left empty
    fn backup(&self, names: &[StoreName]) -> ObjectStores {
        let mut backup = ObjectStores::default();
        for name in names {
            match name {
                StoreName::Accounts => backup.accounts = self.accounts.clone(),
                StoreName::Categories => backup.categories = self.categories.clone(),
                StoreName::Transactions => backup.transactions = self.transactions.clone(),
                StoreName::Budgets => backup.budgets = self.budgets.clone(),
                StoreName::ChatMessages => backup.chat_messages = self.chat_messages.clone(),
                StoreName::Settings => backup.settings = self.settings.clone(),
            }
        }
        backup
    }

    fn restore(&mut self, mut backup: ObjectStores, names: &[StoreName]) {
        for name in names {
            match name {
                StoreName::Accounts => self.accounts = std::mem::take(&mut backup.accounts),
                StoreName::Categories => self.categories = std::mem::take(&mut backup.categories),
                StoreName::Transactions => {
                    self.transactions = std::mem::take(&mut backup.transactions)
                }
                StoreName::Budgets => self.budgets = std::mem::take(&mut backup.budgets),
                StoreName::ChatMessages => {
                    self.chat_messages = std::mem::take(&mut backup.chat_messages)
                }
                StoreName::Settings => self.settings = std::mem::take(&mut backup.settings),
            }
        }
    }

    fn clear(&mut self) {
        self.accounts.clear();
        self.categories.clear();
        self.transactions.clear();
        self.budgets.clear();
        self.chat_messages.clear();
        self.settings.clear();
    }
}

/// In-process object-store backend.
///
/// All state sits behind one `RwLock`. With persistence enabled every write
/// rewrites the snapshots of the stores it touched while the lock is held.
#[derive(Clone)]
pub struct ObjectStoreConnection {
    state: Arc<RwLock<ObjectStores>>,
    snapshot_dir: Option<Arc<PathBuf>>,
}

impl ObjectStoreConnection {
    /// Open the store, loading snapshots from `data_dir` when persisting
    pub async fn initialize(config: &StorageConfig) -> Result<Self> {
        if !config.persist {
            debug!("Object store running without snapshots");
            return Ok(Self::in_memory());
        }

        let dir = config.data_dir.clone();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
            info!(path = %dir.display(), "Created data directory");
        }
        let stores = ObjectStores::load(&dir)?;
        info!(path = %dir.display(), "Object store loaded");

        Ok(Self {
            state: Arc::new(RwLock::new(stores)),
            snapshot_dir: Some(Arc::new(dir)),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            state: Arc::new(RwLock::new(ObjectStores::default())),
            snapshot_dir: None,
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.snapshot_dir.is_some()
    }

    /// Run a read-only closure against the stores
    pub async fn read<R>(&self, f: impl FnOnce(&ObjectStores) -> R) -> R {
        let state = self.state.read().await;
        f(&*state)
    }

    /// Run one unit of work under the write lock.
    ///
    /// `f` must finish every check before its first mutation. With
    /// persistence on, the `touched` stores are copied first; if `f` fails or
    /// their snapshots cannot be written, the copies are put back and the
    /// error is returned.
    pub async fn write<R>(
        &self,
        touched: &[StoreName],
        f: impl FnOnce(&mut ObjectStores) -> Result<R>,
    ) -> Result<R> {
        let mut state = self.state.write().await;
        let Some(ref dir) = self.snapshot_dir else {
            return f(&mut *state);
        };

        let backup = state.backup(touched);
        let outcome = f(&mut *state).and_then(|result| {
            state.persist(touched, dir)?;
            Ok(result)
        });
        if let Err(ref e) = outcome {
            warn!(stores = ?touched, error = %e, "Write failed, restoring previous state");
            state.restore(backup, touched);
        }
        outcome
    }

    /// Rewrite every snapshot
    pub async fn flush(&self) -> Result<()> {
        let Some(ref dir) = self.snapshot_dir else {
            return Ok(());
        };
        let state = self.state.read().await;
        for name in StoreName::ALL {
            state.save(name, dir)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for ObjectStoreConnection {
    fn kind(&self) -> BackendKind {
        BackendKind::ObjectStore
    }

    async fn migrate(&self) -> Result<()> {
        // Schema-less: stores and indexes exist as soon as they are loaded
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.write(&StoreName::ALL, |stores| {
            stores.clear();
            Ok(())
        })
        .await?;
        info!("Cleared all object stores");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.flush().await?;
        debug!("Object store closed");
        Ok(())
    }

    fn create_account_repository(&self) -> Arc<dyn AccountStorage> {
        Arc::new(ObjectAccountRepository::new(self.clone()))
    }

    fn create_category_repository(&self) -> Arc<dyn CategoryStorage> {
        Arc::new(ObjectCategoryRepository::new(self.clone()))
    }

    fn create_transaction_repository(&self) -> Arc<dyn TransactionStorage> {
        Arc::new(ObjectTransactionRepository::new(self.clone()))
    }

    fn create_budget_repository(&self) -> Arc<dyn BudgetStorage> {
        Arc::new(ObjectBudgetRepository::new(self.clone()))
    }

    fn create_chat_message_repository(&self) -> Arc<dyn ChatMessageStorage> {
        Arc::new(ObjectChatMessageRepository::new(self.clone()))
    }

    fn create_settings_repository(&self) -> Arc<dyn SettingsStorage> {
        Arc::new(ObjectSettingsRepository::new(self.clone()))
    }
}
