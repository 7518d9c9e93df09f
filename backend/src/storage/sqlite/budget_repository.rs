use async_trait::async_trait;
use shared::{Budget, BudgetPeriod, CreateBudgetDto, UpdateBudgetDto};
use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

use super::connection::DbConnection;
use super::rows::{budget_from_row, map_rows, BUDGET_COLUMNS};
use crate::error::{Error, Result};
use crate::storage::records::{merge_budget, new_budget};
use crate::storage::traits::BudgetStorage;

const ENTITY: &str = "budget";

#[derive(Clone)]
pub struct SqlBudgetRepository {
    db: DbConnection,
}

impl SqlBudgetRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BudgetStorage for SqlBudgetRepository {
    async fn find_all(&self) -> Result<Vec<Budget>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM budgets ORDER BY created_at, id",
            BUDGET_COLUMNS
        ))
        .fetch_all(self.db.pool())
        .await?;
        map_rows(&rows, budget_from_row)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Budget>> {
        let row = sqlx::query(&format!("SELECT {} FROM budgets WHERE id = ?", BUDGET_COLUMNS))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref().map(budget_from_row).transpose()
    }

    async fn find_by_category_id(&self, category_id: &str) -> Result<Vec<Budget>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM budgets WHERE category_id = ? ORDER BY created_at, id",
            BUDGET_COLUMNS
        ))
        .bind(category_id)
        .fetch_all(self.db.pool())
        .await?;
        map_rows(&rows, budget_from_row)
    }

    async fn find_by_period(
        &self,
        period: BudgetPeriod,
        year: i32,
        month: Option<u32>,
    ) -> Result<Vec<Budget>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM budgets WHERE period = ", BUDGET_COLUMNS));
        builder.push_bind(period.as_str());
        builder.push(" AND year = ").push_bind(year);
        if let Some(month) = month {
            builder.push(" AND month = ").push_bind(month);
        }
        builder.push(" ORDER BY created_at, id");

        let rows = builder.build().fetch_all(self.db.pool()).await?;
        map_rows(&rows, budget_from_row)
    }

    async fn create(&self, dto: CreateBudgetDto) -> Result<Budget> {
        let budget = new_budget(dto);
        sqlx::query(
            r#"
            INSERT INTO budgets (id, category_id, limit_amount, period, year, month, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&budget.id)
        .bind(&budget.category_id)
        .bind(budget.limit_amount)
        .bind(budget.period.as_str())
        .bind(budget.year)
        .bind(budget.month)
        .bind(&budget.created_at)
        .bind(&budget.updated_at)
        .execute(self.db.pool())
        .await?;

        debug!(id = %budget.id, period = %budget.period, "Created budget");
        Ok(budget)
    }

    async fn update(&self, id: &str, dto: UpdateBudgetDto) -> Result<Budget> {
        let mut budget = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(ENTITY, id))?;
        merge_budget(&mut budget, dto);

        sqlx::query("UPDATE budgets SET limit_amount = ?, updated_at = ? WHERE id = ?")
            .bind(budget.limit_amount)
            .bind(&budget.updated_at)
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(budget)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM budgets WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found(ENTITY, id));
        }
        Ok(())
    }
}
