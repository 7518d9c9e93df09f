//! SQLite backend through sqlx.

pub mod account_repository;
pub mod budget_repository;
pub mod category_repository;
pub mod chat_repository;
pub mod connection;
pub mod rows;
pub mod settings_repository;
pub mod transaction_repository;

pub use account_repository::SqlAccountRepository;
pub use budget_repository::SqlBudgetRepository;
pub use category_repository::SqlCategoryRepository;
pub use chat_repository::SqlChatMessageRepository;
pub use connection::DbConnection;
pub use settings_repository::SqlSettingsRepository;
pub use transaction_repository::SqlTransactionRepository;
