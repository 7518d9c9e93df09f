//! # Storage Traits
//!
//! One repository trait per entity plus a [`Connection`] that bundles the six
//! repositories of a backend. The object store and SQLite both implement the
//! full set and must return identical results for identical operations.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::{
    Account, AccountType, Budget, BudgetPeriod, Category, CategoryStats, CategoryType,
    ChatMessage, CreateAccountDto, CreateBudgetDto, CreateCategoryDto, CreateChatMessageDto,
    CreateTransactionDto, Setting, Transaction, TransactionFilter, TransactionStats,
    UpdateAccountDto, UpdateBudgetDto, UpdateCategoryDto, UpdateTransactionDto,
};

use crate::config::BackendKind;
use crate::error::Result;

/// Account persistence. Accounts are ordered by `created_at, id`.
#[async_trait]
pub trait AccountStorage: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Account>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>>;

    /// Active and inactive accounts of one type
    async fn find_by_type(&self, account_type: AccountType) -> Result<Vec<Account>>;

    async fn find_active(&self) -> Result<Vec<Account>>;

    async fn count(&self) -> Result<u64>;

    async fn create(&self, dto: CreateAccountDto) -> Result<Account>;

    /// Fails with `NotFound` and writes nothing when the id is unknown
    async fn update(&self, id: &str, dto: UpdateAccountDto) -> Result<Account>;

    /// Add a signed delta to the stored balance
    async fn update_balance(&self, id: &str, delta: f64) -> Result<Account>;

    async fn soft_delete(&self, id: &str) -> Result<()>;

    async fn restore(&self, id: &str) -> Result<()>;
}

/// Category persistence. Categories are ordered by `sort_order, id`.
#[async_trait]
pub trait CategoryStorage: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Category>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Category>>;

    async fn find_by_type(&self, category_type: CategoryType) -> Result<Vec<Category>>;

    /// Children of `parent_id`, or the roots when `None`
    async fn find_by_parent_id(&self, parent_id: Option<&str>) -> Result<Vec<Category>>;

    async fn find_active(&self) -> Result<Vec<Category>>;

    async fn count(&self) -> Result<u64>;

    async fn create(&self, dto: CreateCategoryDto) -> Result<Category>;

    /// Insert fully formed records as they are. Used for seeding with stable ids.
    async fn insert_many(&self, categories: Vec<Category>) -> Result<()>;

    async fn update(&self, id: &str, dto: UpdateCategoryDto) -> Result<Category>;

    async fn soft_delete(&self, id: &str) -> Result<()>;

    async fn restore(&self, id: &str) -> Result<()>;
}

/// Transaction persistence. Owns balance bookkeeping: every write adjusts the
/// affected account balances in the same unit of work as the row change.
///
/// Lists are ordered by `transaction_date DESC, created_at DESC, id DESC`.
#[async_trait]
pub trait TransactionStorage: Send + Sync {
    /// Filtered listing, with `limit`/`offset` applied after ordering
    async fn find_all(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Transaction>>;

    /// Transactions where the account is the source or the transfer destination
    async fn find_by_account_id(&self, account_id: &str) -> Result<Vec<Transaction>>;

    async fn find_by_category_id(&self, category_id: &str) -> Result<Vec<Transaction>>;

    /// Inclusive on both ends
    async fn find_by_date_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Transaction>>;

    async fn create(&self, dto: CreateTransactionDto) -> Result<Transaction>;

    /// Re-applies the balance effect when amount, type or accounts change
    async fn update(&self, id: &str, dto: UpdateTransactionDto) -> Result<Transaction>;

    /// Reverses the balance effect, then removes the row
    async fn delete(&self, id: &str) -> Result<()>;

    async fn get_stats(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<TransactionStats>;

    /// Expense totals per category, largest first
    async fn get_stats_by_category(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<CategoryStats>>;
}

/// Budget persistence. Budgets are ordered by `created_at, id`.
#[async_trait]
pub trait BudgetStorage: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Budget>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Budget>>;

    async fn find_by_category_id(&self, category_id: &str) -> Result<Vec<Budget>>;

    /// Budgets for a period and year; `month` narrows further when given
    async fn find_by_period(
        &self,
        period: BudgetPeriod,
        year: i32,
        month: Option<u32>,
    ) -> Result<Vec<Budget>>;

    async fn create(&self, dto: CreateBudgetDto) -> Result<Budget>;

    async fn update(&self, id: &str, dto: UpdateBudgetDto) -> Result<Budget>;

    async fn delete(&self, id: &str) -> Result<()>;
}

/// Append-only chat history, ordered by `created_at, id` ascending.
#[async_trait]
pub trait ChatMessageStorage: Send + Sync {
    /// Oldest first, truncated to the first `limit` messages when given
    async fn find_all(&self, limit: Option<u32>) -> Result<Vec<ChatMessage>>;

    /// The newest `limit` messages, still in chronological order
    async fn find_recent(&self, limit: u32) -> Result<Vec<ChatMessage>>;

    async fn create(&self, dto: CreateChatMessageDto) -> Result<ChatMessage>;

    async fn delete_all(&self) -> Result<()>;

    /// Remove messages created strictly before `timestamp`. Returns the count.
    async fn delete_older_than(&self, timestamp: &str) -> Result<u64>;
}

/// Key/value settings with JSON text values
#[async_trait]
pub trait SettingsStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Setting>>;

    /// All stored settings ordered by key
    async fn get_all(&self) -> Result<Vec<Setting>>;

    async fn set(&self, key: &str, value: &str) -> Result<Setting>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn count(&self) -> Result<u64>;
}

/// A live backend. Constructed by the backend's own `initialize`.
#[async_trait]
pub trait Connection: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Apply the schema. Idempotent.
    async fn migrate(&self) -> Result<()>;

    /// Empty every table
    async fn clear(&self) -> Result<()>;

    /// Release the pool or flush the snapshots
    async fn close(&self) -> Result<()>;

    fn create_account_repository(&self) -> Arc<dyn AccountStorage>;

    fn create_category_repository(&self) -> Arc<dyn CategoryStorage>;

    fn create_transaction_repository(&self) -> Arc<dyn TransactionStorage>;

    fn create_budget_repository(&self) -> Arc<dyn BudgetStorage>;

    fn create_chat_message_repository(&self) -> Arc<dyn ChatMessageStorage>;

    fn create_settings_repository(&self) -> Arc<dyn SettingsStorage>;
}
