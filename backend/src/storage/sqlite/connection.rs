use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use super::{
    SqlAccountRepository, SqlBudgetRepository, SqlCategoryRepository, SqlChatMessageRepository,
    SqlSettingsRepository, SqlTransactionRepository,
};
use crate::config::{BackendKind, StorageConfig};
use crate::error::{Error, Result};
use crate::storage::traits::{
    AccountStorage, BudgetStorage, CategoryStorage, ChatMessageStorage, Connection,
    SettingsStorage, TransactionStorage,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_CONNECTIONS: u32 = 5;

/// Tables in dependency-free deletion order
const TABLES: [&str; 6] = [
    "transactions",
    "budgets",
    "chat_messages",
    "settings",
    "categories",
    "accounts",
];

/// Schema statements, applied in order. Every statement is idempotent.
const SCHEMA: [(&str, &str); 18] = [
    (
        "accounts",
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            balance REAL NOT NULL DEFAULT 0,
            icon TEXT,
            color TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "categories",
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            icon TEXT,
            color TEXT,
            type TEXT NOT NULL,
            parent_id TEXT,
            sort_order INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "transactions",
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            amount REAL NOT NULL,
            type TEXT NOT NULL,
            note TEXT,
            transaction_date TEXT NOT NULL,
            account_id TEXT NOT NULL,
            category_id TEXT,
            to_account_id TEXT,
            location TEXT,
            attachment TEXT,
            is_recurring INTEGER NOT NULL DEFAULT 0,
            recurring_rule TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "budgets",
        r#"
        CREATE TABLE IF NOT EXISTS budgets (
            id TEXT PRIMARY KEY,
            category_id TEXT,
            limit_amount REAL NOT NULL,
            period TEXT NOT NULL,
            year INTEGER NOT NULL,
            month INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "chat_messages",
        r#"
        CREATE TABLE IF NOT EXISTS chat_messages (
            id TEXT PRIMARY KEY,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            metadata TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "settings",
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
    ("idx_accounts_type", "CREATE INDEX IF NOT EXISTS idx_accounts_type ON accounts(type)"),
    (
        "idx_accounts_is_active",
        "CREATE INDEX IF NOT EXISTS idx_accounts_is_active ON accounts(is_active)",
    ),
    ("idx_categories_type", "CREATE INDEX IF NOT EXISTS idx_categories_type ON categories(type)"),
    (
        "idx_categories_parent_id",
        "CREATE INDEX IF NOT EXISTS idx_categories_parent_id ON categories(parent_id)",
    ),
    (
        "idx_categories_is_active",
        "CREATE INDEX IF NOT EXISTS idx_categories_is_active ON categories(is_active)",
    ),
    (
        "idx_transactions_date",
        "CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(transaction_date)",
    ),
    (
        "idx_transactions_account",
        "CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account_id)",
    ),
    (
        "idx_transactions_category",
        "CREATE INDEX IF NOT EXISTS idx_transactions_category ON transactions(category_id)",
    ),
    (
        "idx_transactions_to_account",
        "CREATE INDEX IF NOT EXISTS idx_transactions_to_account ON transactions(to_account_id)",
    ),
    ("idx_transactions_type", "CREATE INDEX IF NOT EXISTS idx_transactions_type ON transactions(type)"),
    ("idx_budgets_category", "CREATE INDEX IF NOT EXISTS idx_budgets_category ON budgets(category_id)"),
    ("idx_chat_created", "CREATE INDEX IF NOT EXISTS idx_chat_created ON chat_messages(created_at)"),
];

/// DbConnection owns the SQLite pool shared by every repository
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Open the pool described by `config`.
    ///
    /// In-memory databases get exactly one long-lived connection, since every
    /// new SQLite memory connection would otherwise be a separate database.
    pub async fn initialize(config: &StorageConfig) -> Result<Self> {
        let url = config.database_url();
        let memory = config.is_memory_database();

        let mut options = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool_options = if memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            if config.database_url.is_none() && !config.data_dir.exists() {
                std::fs::create_dir_all(&config.data_dir)?;
                info!(path = %config.data_dir.display(), "Created data directory");
            }
            options = options.journal_mode(SqliteJournalMode::Wal);
            SqlitePoolOptions::new().max_connections(MAX_CONNECTIONS)
        };

        let pool = pool_options.connect_with(options).await?;
        info!(url = %url, memory, "Opened SQLite database");

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// A private in-memory database, for tests
    pub async fn in_memory() -> Result<Self> {
        Self::initialize(&StorageConfig::in_memory(BackendKind::Sqlite)).await
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Connection for DbConnection {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    async fn migrate(&self) -> Result<()> {
        for (name, statement) in SCHEMA {
            sqlx::query(statement)
                .execute(self.pool())
                .await
                .map_err(|e| Error::Migration(format!("{}: {}", name, e)))?;
        }
        debug!(statements = SCHEMA.len(), "Schema applied");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool().begin().await?;
        for table in TABLES {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        info!("Cleared all tables");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        debug!("SQLite pool closed");
        Ok(())
    }

    fn create_account_repository(&self) -> Arc<dyn AccountStorage> {
        Arc::new(SqlAccountRepository::new(self.clone()))
    }

    fn create_category_repository(&self) -> Arc<dyn CategoryStorage> {
        Arc::new(SqlCategoryRepository::new(self.clone()))
    }

    fn create_transaction_repository(&self) -> Arc<dyn TransactionStorage> {
        Arc::new(SqlTransactionRepository::new(self.clone()))
    }

    fn create_budget_repository(&self) -> Arc<dyn BudgetStorage> {
        Arc::new(SqlBudgetRepository::new(self.clone()))
    }

    fn create_chat_message_repository(&self) -> Arc<dyn ChatMessageStorage> {
        Arc::new(SqlChatMessageRepository::new(self.clone()))
    }

    fn create_settings_repository(&self) -> Arc<dyn SettingsStorage> {
        Arc::new(SqlSettingsRepository::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_utils::TestEnvironment;
    use sqlx::Row;

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let db = DbConnection::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        db.migrate().await.unwrap();

        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(row.get::<i64, _>("n"), 12);
    }

    #[tokio::test]
    async fn test_lookup_columns_are_indexed() {
        let db = DbConnection::in_memory().await.unwrap();
        db.migrate().await.unwrap();

        for (table, column) in [
            ("transactions", "to_account_id"),
            ("budgets", "category_id"),
            ("categories", "is_active"),
        ] {
            let rows = sqlx::query(&format!("PRAGMA index_list({})", table))
                .fetch_all(db.pool())
                .await
                .unwrap();
            let mut covered = false;
            for row in rows {
                let index: String = row.get("name");
                let columns = sqlx::query(&format!("PRAGMA index_info({})", index))
                    .fetch_all(db.pool())
                    .await
                    .unwrap();
                covered |= columns.iter().any(|c| c.get::<String, _>("name") == column);
            }
            assert!(covered, "{}.{} has no index", table, column);
        }
    }

    #[tokio::test]
    async fn test_file_database_created_in_data_dir() {
        let env = TestEnvironment::new().unwrap();
        let config = env.sqlite_config();

        let db = DbConnection::initialize(&config).await.unwrap();
        db.migrate().await.unwrap();
        db.close().await.unwrap();

        assert!(env.base_directory().join("moneymate.db").exists());
    }
}
