//! Object-store backend: one keyed store per entity with secondary indexes,
//! held in memory and optionally snapshotted to YAML files.

pub mod account_repository;
pub mod budget_repository;
pub mod category_repository;
pub mod chat_repository;
pub mod connection;
pub mod settings_repository;
pub mod store;
pub mod transaction_repository;

pub use account_repository::ObjectAccountRepository;
pub use budget_repository::ObjectBudgetRepository;
pub use category_repository::ObjectCategoryRepository;
pub use chat_repository::ObjectChatMessageRepository;
pub use connection::{ObjectStoreConnection, ObjectStores, StoreName};
pub use settings_repository::ObjectSettingsRepository;
pub use store::{ObjectStore, StoredObject};
pub use transaction_repository::ObjectTransactionRepository;
