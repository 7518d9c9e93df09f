//! # MoneyMate Backend
//!
//! The persistence engine behind the MoneyMate personal-finance assistant.
//!
//! ## Architecture
//!
//! ```text
//! Caller (UI, CLI, assistant)
//!     ↓
//! ServiceLocator (lazy, shared initialization)
//!     ↓
//! Domain (services: validation, trees, budgets, actions)
//!     ↓
//! Storage (Database facade → object store | SQLite)
//! ```
//!
//! Storage is selected by [`StorageConfig`]. Both backends satisfy the same
//! repository traits, so everything above the facade is backend-agnostic.

pub mod config;
pub mod domain;
pub mod error;
pub mod locator;
pub mod storage;

use tracing::info;

pub use config::{BackendKind, StorageConfig};
pub use domain::*;
pub use error::{Error, Result, ValidationError};
pub use locator::ServiceLocator;
pub use storage::{Database, SeedReport};

/// Every service, wired to one shared database
#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub account_service: AccountService,
    pub category_service: CategoryService,
    pub transaction_service: TransactionService,
    pub budget_service: BudgetService,
    pub chat_service: ChatService,
    pub settings_service: SettingsService,
    pub action_service: ActionService,
}

impl AppState {
    /// Wire the services over an already opened database
    pub fn new(database: Database) -> Self {
        let account_service = AccountService::new(database.accounts());
        let category_service = CategoryService::new(database.categories());
        let transaction_service = TransactionService::new(database.transactions(), database.categories());
        let budget_service = BudgetService::new(database.budgets(), database.transactions());
        let chat_service = ChatService::new(database.chat_messages());
        let settings_service = SettingsService::new(database.settings());
        let action_service = ActionService::new(
            transaction_service.clone(),
            account_service.clone(),
            category_service.clone(),
        );

        Self {
            database,
            account_service,
            category_service,
            transaction_service,
            budget_service,
            chat_service,
            settings_service,
            action_service,
        }
    }
}

/// Open storage and build every service
pub async fn initialize_backend(config: &StorageConfig) -> Result<AppState> {
    info!("Setting up storage");
    let database = Database::open(config).await?;

    info!("Setting up domain services");
    let app_state = AppState::new(database);

    info!("Backend ready on {}", app_state.database.kind());
    Ok(app_state)
}
