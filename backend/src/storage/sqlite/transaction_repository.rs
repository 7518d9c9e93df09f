use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::{
    CategoryStats, CreateTransactionDto, Transaction, TransactionFilter, TransactionStats,
    TransactionType, UpdateTransactionDto,
};
use sqlx::sqlite::SqliteConnection;
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::{debug, info};

use super::connection::DbConnection;
use super::rows::{map_rows, transaction_from_row, TRANSACTION_COLUMNS};
use crate::error::{Error, Result};
use crate::storage::balance::{net_changes, touched_accounts};
use crate::storage::records::{format_date, new_transaction, now_timestamp};
use crate::storage::stats::{rank_categories, sql_minor, summarize, CategoryTotal};
use crate::storage::traits::TransactionStorage;

const ENTITY: &str = "transaction";
const ORDER_NEWEST_FIRST: &str = " ORDER BY transaction_date DESC, created_at DESC, id DESC";

/// Repository for transaction operations.
///
/// Every write opens one SQL transaction covering the balance updates and
/// the row change. Any error drops the transaction, which rolls it back.
#[derive(Clone)]
pub struct SqlTransactionRepository {
    db: DbConnection,
}

impl SqlTransactionRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    async fn select_where(&self, clause: &str, binds: &[&str]) -> Result<Vec<Transaction>> {
        let sql = format!(
            "SELECT {} FROM transactions {}{}",
            TRANSACTION_COLUMNS, clause, ORDER_NEWEST_FIRST
        );
        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(*value);
        }
        let rows = query.fetch_all(self.db.pool()).await?;
        map_rows(&rows, transaction_from_row)
    }
}

async fn fetch_one_in(conn: &mut SqliteConnection, id: &str) -> Result<Option<Transaction>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM transactions WHERE id = ?",
        TRANSACTION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(transaction_from_row).transpose()
}

async fn ensure_accounts(conn: &mut SqliteConnection, ids: &[String]) -> Result<()> {
    for id in ids {
        let exists = sqlx::query("SELECT 1 FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .is_some();
        if !exists {
            return Err(Error::not_found("account", id.clone()));
        }
    }
    Ok(())
}

async fn apply_changes(conn: &mut SqliteConnection, changes: BTreeMap<String, f64>) -> Result<()> {
    if changes.is_empty() {
        return Ok(());
    }
    let now = now_timestamp();
    for (account_id, delta) in changes {
        let result = sqlx::query(
            "UPDATE accounts SET balance = balance + ?, updated_at = ? WHERE id = ?",
        )
        .bind(delta)
        .bind(&now)
        .bind(&account_id)
        .execute(&mut *conn)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("account", account_id));
        }
    }
    Ok(())
}

fn push_window(
    builder: &mut QueryBuilder<'_, Sqlite>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    column: &str,
) {
    if let Some(start) = start {
        builder
            .push(format!(" AND {} >= ", column))
            .push_bind(format_date(start));
    }
    if let Some(end) = end {
        builder
            .push(format!(" AND {} <= ", column))
            .push_bind(format_date(end));
    }
}

#[async_trait]
impl TransactionStorage for SqlTransactionRepository {
    async fn find_all(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM transactions WHERE 1=1",
            TRANSACTION_COLUMNS
        ));
        push_window(&mut builder, filter.start_date, filter.end_date, "transaction_date");
        if let Some(kind) = filter.transaction_type {
            builder.push(" AND type = ").push_bind(kind.as_str());
        }
        if let Some(ref account_id) = filter.account_id {
            builder.push(" AND account_id = ").push_bind(account_id.clone());
        }
        if let Some(ref category_id) = filter.category_id {
            builder.push(" AND category_id = ").push_bind(category_id.clone());
        }
        if let Some(min) = filter.min_amount {
            builder.push(" AND amount >= ").push_bind(min);
        }
        if let Some(max) = filter.max_amount {
            builder.push(" AND amount <= ").push_bind(max);
        }
        builder.push(ORDER_NEWEST_FIRST);

        match filter.limit {
            Some(limit) => {
                builder.push(" LIMIT ").push_bind(i64::from(limit));
            }
            None if filter.offset.is_some() => {
                builder.push(" LIMIT -1");
            }
            None => {}
        }
        if let Some(offset) = filter.offset {
            builder.push(" OFFSET ").push_bind(i64::from(offset));
        }

        let rows = builder.build().fetch_all(self.db.pool()).await?;
        map_rows(&rows, transaction_from_row)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Transaction>> {
        let mut conn = self.db.pool().acquire().await?;
        fetch_one_in(&mut conn, id).await
    }

    async fn find_by_account_id(&self, account_id: &str) -> Result<Vec<Transaction>> {
        self.select_where("WHERE account_id = ? OR to_account_id = ?", &[account_id, account_id])
            .await
    }

    async fn find_by_category_id(&self, category_id: &str) -> Result<Vec<Transaction>> {
        self.select_where("WHERE category_id = ?", &[category_id]).await
    }

    async fn find_by_date_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Transaction>> {
        let (from, to) = (format_date(start), format_date(end));
        self.select_where("WHERE transaction_date BETWEEN ? AND ?", &[from.as_str(), to.as_str()])
            .await
    }

    async fn create(&self, dto: CreateTransactionDto) -> Result<Transaction> {
        let transaction = new_transaction(dto);
        let changes = net_changes(None, Some(&transaction));

        let mut tx = self.db.pool().begin().await?;
        ensure_accounts(&mut tx, &touched_accounts(&transaction)).await?;
        apply_changes(&mut tx, changes).await?;
        sqlx::query(
            r#"
            INSERT INTO transactions (id, amount, type, note, transaction_date, account_id,
                category_id, to_account_id, location, attachment, is_recurring, recurring_rule,
                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&transaction.id)
        .bind(transaction.amount)
        .bind(transaction.transaction_type.as_str())
        .bind(&transaction.note)
        .bind(format_date(transaction.transaction_date))
        .bind(&transaction.account_id)
        .bind(&transaction.category_id)
        .bind(&transaction.to_account_id)
        .bind(&transaction.location)
        .bind(&transaction.attachment)
        .bind(transaction.is_recurring)
        .bind(&transaction.recurring_rule)
        .bind(&transaction.created_at)
        .bind(&transaction.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        info!(
            id = %transaction.id,
            kind = %transaction.transaction_type,
            amount = transaction.amount,
            "Created transaction"
        );
        Ok(transaction)
    }

    async fn update(&self, id: &str, dto: UpdateTransactionDto) -> Result<Transaction> {
        let mut tx = self.db.pool().begin().await?;
        let existing = fetch_one_in(&mut tx, id)
            .await?
            .ok_or_else(|| Error::not_found(ENTITY, id))?;
        let mut next = existing.merged(&dto);
        next.updated_at = now_timestamp();

        let changes = net_changes(Some(&existing), Some(&next));
        ensure_accounts(&mut tx, &touched_accounts(&next)).await?;
        apply_changes(&mut tx, changes).await?;
        sqlx::query(
            r#"
            UPDATE transactions
            SET amount = ?, type = ?, note = ?, transaction_date = ?, account_id = ?,
                category_id = ?, to_account_id = ?, location = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(next.amount)
        .bind(next.transaction_type.as_str())
        .bind(&next.note)
        .bind(format_date(next.transaction_date))
        .bind(&next.account_id)
        .bind(&next.category_id)
        .bind(&next.to_account_id)
        .bind(&next.location)
        .bind(&next.updated_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(id = %next.id, "Updated transaction");
        Ok(next)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;
        let existing = fetch_one_in(&mut tx, id)
            .await?
            .ok_or_else(|| Error::not_found(ENTITY, id))?;

        apply_changes(&mut tx, net_changes(Some(&existing), None)).await?;
        sqlx::query("DELETE FROM transactions WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(id = %id, "Deleted transaction");
        Ok(())
    }

    async fn get_stats(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<TransactionStats> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT type, SUM({}) AS total, COUNT(*) AS count FROM transactions WHERE 1=1",
            sql_minor("amount")
        ));
        push_window(&mut builder, start, end, "transaction_date");
        builder.push(" GROUP BY type");

        let rows = builder.build().fetch_all(self.db.pool()).await?;
        let (mut income, mut expense, mut count) = (0i64, 0i64, 0u64);
        for row in &rows {
            let kind: TransactionType = row.try_get::<String, _>("type")?.parse()?;
            let total: i64 = row.try_get("total")?;
            count += row.try_get::<i64, _>("count")? as u64;
            match kind {
                TransactionType::Income => income = total,
                TransactionType::Expense => expense = total,
                TransactionType::Transfer => {}
            }
        }
        Ok(summarize(income, expense, count))
    }

    async fn get_stats_by_category(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<CategoryStats>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            r#"
            SELECT t.category_id AS category_id, c.name AS category_name,
                   SUM({}) AS total, COUNT(*) AS count
            FROM transactions t
            LEFT JOIN categories c ON t.category_id = c.id
            WHERE t.type = 'EXPENSE' AND t.category_id IS NOT NULL
            "#,
            sql_minor("t.amount")
        ));
        push_window(&mut builder, start, end, "t.transaction_date");
        builder.push(" GROUP BY t.category_id");

        let rows = builder.build().fetch_all(self.db.pool()).await?;
        let totals = rows
            .iter()
            .map(|row| -> Result<CategoryTotal> {
                Ok(CategoryTotal {
                    category_id: row.try_get("category_id")?,
                    category_name: row.try_get("category_name")?,
                    total: row.try_get("total")?,
                    count: row.try_get::<i64, _>("count")? as u64,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(rank_categories(totals))
    }
}
