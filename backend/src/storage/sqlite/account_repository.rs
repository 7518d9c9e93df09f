use async_trait::async_trait;
use shared::{Account, AccountType, CreateAccountDto, UpdateAccountDto};
use sqlx::Row;
use tracing::debug;

use super::connection::DbConnection;
use super::rows::{account_from_row, map_rows, ACCOUNT_COLUMNS};
use crate::error::{Error, Result};
use crate::storage::records::{merge_account, new_account, now_timestamp};
use crate::storage::traits::AccountStorage;

const ENTITY: &str = "account";

/// Repository for account operations
#[derive(Clone)]
pub struct SqlAccountRepository {
    db: DbConnection,
}

impl SqlAccountRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    async fn set_active(&self, id: &str, active: bool) -> Result<()> {
        let result = sqlx::query("UPDATE accounts SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(now_timestamp())
            .bind(id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(ENTITY, id));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStorage for SqlAccountRepository {
    async fn find_all(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM accounts ORDER BY created_at, id",
            ACCOUNT_COLUMNS
        ))
        .fetch_all(self.db.pool())
        .await?;
        map_rows(&rows, account_from_row)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>> {
        let row = sqlx::query(&format!("SELECT {} FROM accounts WHERE id = ?", ACCOUNT_COLUMNS))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn find_by_type(&self, account_type: AccountType) -> Result<Vec<Account>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE type = ? ORDER BY created_at, id",
            ACCOUNT_COLUMNS
        ))
        .bind(account_type.as_str())
        .fetch_all(self.db.pool())
        .await?;
        map_rows(&rows, account_from_row)
    }

    async fn find_active(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE is_active = 1 ORDER BY created_at, id",
            ACCOUNT_COLUMNS
        ))
        .fetch_all(self.db.pool())
        .await?;
        map_rows(&rows, account_from_row)
    }

    async fn count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM accounts")
            .fetch_one(self.db.pool())
            .await?;
        Ok(row.try_get::<i64, _>("count")? as u64)
    }

    async fn create(&self, dto: CreateAccountDto) -> Result<Account> {
        let account = new_account(dto);
        sqlx::query(
            r#"
            INSERT INTO accounts (id, name, type, balance, icon, color, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.name)
        .bind(account.account_type.as_str())
        .bind(account.balance)
        .bind(&account.icon)
        .bind(&account.color)
        .bind(account.is_active)
        .bind(&account.created_at)
        .bind(&account.updated_at)
        .execute(self.db.pool())
        .await?;

        debug!(id = %account.id, name = %account.name, "Created account");
        Ok(account)
    }

    async fn update(&self, id: &str, dto: UpdateAccountDto) -> Result<Account> {
        let mut account = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(ENTITY, id))?;
        merge_account(&mut account, dto);

        sqlx::query(
            r#"
            UPDATE accounts SET name = ?, type = ?, icon = ?, color = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&account.name)
        .bind(account.account_type.as_str())
        .bind(&account.icon)
        .bind(&account.color)
        .bind(&account.updated_at)
        .bind(id)
        .execute(self.db.pool())
        .await?;

        Ok(account)
    }

    async fn update_balance(&self, id: &str, delta: f64) -> Result<Account> {
        let result = sqlx::query(
            "UPDATE accounts SET balance = balance + ?, updated_at = ? WHERE id = ?",
        )
        .bind(delta)
        .bind(now_timestamp())
        .bind(id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(ENTITY, id));
        }
        self.find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(ENTITY, id))
    }

    async fn soft_delete(&self, id: &str) -> Result<()> {
        self.set_active(id, false).await
    }

    async fn restore(&self, id: &str) -> Result<()> {
        self.set_active(id, true).await
    }
}
