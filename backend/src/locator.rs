//! Lazily initialized access to the backend.
//!
//! A `ServiceLocator` is a plain value owned by the application and passed to
//! whoever needs services. The first call to [`ServiceLocator::services`]
//! opens storage; concurrent first callers wait on the same lock and share
//! the result. A failed initialization is not remembered, so the next call
//! starts over.

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::config::StorageConfig;
use crate::domain::{
    AccountService, ActionService, BudgetService, CategoryService, ChatService, SettingsService,
    TransactionService,
};
use crate::error::{Error, Result};
use crate::storage::SeedReport;
use crate::{initialize_backend, AppState};

enum LocatorState {
    Idle,
    Ready(AppState),
    ShutDown,
}

pub struct ServiceLocator {
    config: StorageConfig,
    state: Mutex<LocatorState>,
}

impl ServiceLocator {
    /// No I/O happens until the first service is requested
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LocatorState::Idle),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// The shared services, initializing them on first use
    pub async fn services(&self) -> Result<AppState> {
        let mut state = self.state.lock().await;
        match &*state {
            LocatorState::Ready(app_state) => return Ok(app_state.clone()),
            LocatorState::ShutDown => return Err(Error::Closed),
            LocatorState::Idle => {}
        }

        info!("Initializing services");
        let app_state = initialize_backend(&self.config).await.map_err(|e| {
            error!("Service initialization failed: {}", e);
            match e {
                Error::Initialization(_) => e,
                other => Error::Initialization(other.to_string()),
            }
        })?;
        *state = LocatorState::Ready(app_state.clone());
        Ok(app_state)
    }

    pub async fn is_initialized(&self) -> bool {
        matches!(*self.state.lock().await, LocatorState::Ready(_))
    }

    pub async fn account_service(&self) -> Result<AccountService> {
        Ok(self.services().await?.account_service)
    }

    pub async fn category_service(&self) -> Result<CategoryService> {
        Ok(self.services().await?.category_service)
    }

    pub async fn transaction_service(&self) -> Result<TransactionService> {
        Ok(self.services().await?.transaction_service)
    }

    pub async fn budget_service(&self) -> Result<BudgetService> {
        Ok(self.services().await?.budget_service)
    }

    pub async fn chat_service(&self) -> Result<ChatService> {
        Ok(self.services().await?.chat_service)
    }

    pub async fn settings_service(&self) -> Result<SettingsService> {
        Ok(self.services().await?.settings_service)
    }

    pub async fn action_service(&self) -> Result<ActionService> {
        Ok(self.services().await?.action_service)
    }

    /// Close storage and forget it; the next request initializes again
    pub async fn reset(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if let LocatorState::Ready(ref app_state) = *state {
            info!("Resetting services");
            app_state.database.close().await?;
        }
        if !matches!(*state, LocatorState::ShutDown) {
            *state = LocatorState::Idle;
        }
        Ok(())
    }

    /// Close storage for good. Later requests fail with [`Error::Closed`].
    pub async fn shutdown(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let previous = std::mem::replace(&mut *state, LocatorState::ShutDown);
        if let LocatorState::Ready(app_state) = previous {
            info!("Shutting down services");
            app_state.database.close().await?;
        }
        Ok(())
    }

    /// Wipe every table and restore the defaults
    pub async fn clear_all_data(&self) -> Result<SeedReport> {
        let app_state = self.services().await?;
        info!("Clearing all data");
        let report = app_state.database.reset_to_factory().await?;
        app_state.category_service.invalidate().await;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendKind;
    use crate::storage::test_utils::TestEnvironment;
    use shared::{CreateTransactionDto, TransactionFilter};

    fn setup_test() -> ServiceLocator {
        ServiceLocator::new(StorageConfig::in_memory(BackendKind::Sqlite))
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_share_one_backend() {
        let locator = setup_test();
        assert!(!locator.is_initialized().await);

        let (a, b) = tokio::join!(locator.services(), locator.services());
        let (a, b) = (a.unwrap(), b.unwrap());

        assert!(a.database.ptr_eq(&b.database));
        assert!(locator.is_initialized().await);
    }

    #[tokio::test]
    async fn test_failed_initialization_is_retried() {
        let env = TestEnvironment::new().unwrap();
        let blocker = env.base_directory().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let locator = ServiceLocator::new(env.object_store_config().with_data_dir(blocker.join("data")));

        let err = locator.services().await.err().unwrap();
        assert!(matches!(err, Error::Initialization(_)));
        assert!(!locator.is_initialized().await);

        std::fs::remove_file(&blocker).unwrap();
        let app_state = locator.services().await.unwrap();
        assert_eq!(app_state.account_service.get_all_accounts().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reset_reinitializes() {
        let locator = setup_test();
        let first = locator.services().await.unwrap();

        locator.reset().await.unwrap();
        assert!(!locator.is_initialized().await);

        let second = locator.services().await.unwrap();
        assert!(!first.database.ptr_eq(&second.database));
    }

    #[tokio::test]
    async fn test_shutdown_is_final() {
        let locator = setup_test();
        locator.services().await.unwrap();

        locator.shutdown().await.unwrap();
        assert!(matches!(locator.services().await, Err(Error::Closed)));
        assert!(matches!(locator.account_service().await, Err(Error::Closed)));

        locator.reset().await.unwrap();
        assert!(matches!(locator.services().await, Err(Error::Closed)));
    }

    #[tokio::test]
    async fn test_clear_all_data_reseeds() {
        let locator = setup_test();
        let accounts = locator.account_service().await.unwrap();
        let transactions = locator.transaction_service().await.unwrap();
        let cash = accounts.get_all_accounts().await.unwrap()[0].id.clone();
        transactions
            .create_transaction(CreateTransactionDto::expense(10_000.0, &cash, "food"))
            .await
            .unwrap();

        let categories = locator.category_service().await.unwrap();
        categories.delete_category("food").await.unwrap();
        categories.get_category_tree().await.unwrap();

        let report = locator.clear_all_data().await.unwrap();

        assert_eq!(report.accounts, 2);
        let tree = categories.get_category_tree().await.unwrap();
        assert!(tree.iter().any(|n| n.category.id == "food" && n.children.len() == 3));
        assert!(transactions
            .get_transactions(&TransactionFilter::default())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(accounts.get_total_balance().await.unwrap(), 0.0);
    }
}
