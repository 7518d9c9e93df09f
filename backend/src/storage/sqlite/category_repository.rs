use async_trait::async_trait;
use shared::{Category, CategoryType, CreateCategoryDto, UpdateCategoryDto};
use sqlx::Row;
use tracing::debug;

use super::connection::DbConnection;
use super::rows::{category_from_row, map_rows, CATEGORY_COLUMNS};
use crate::error::{Error, Result};
use crate::storage::records::{merge_category, new_category, now_timestamp};
use crate::storage::traits::CategoryStorage;

const ENTITY: &str = "category";

const INSERT_CATEGORY: &str = r#"
    INSERT OR REPLACE INTO categories
        (id, name, icon, color, type, parent_id, sort_order, is_active, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

#[derive(Clone)]
pub struct SqlCategoryRepository {
    db: DbConnection,
}

impl SqlCategoryRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    async fn select(&self, clause: &str, bind: Option<&str>) -> Result<Vec<Category>> {
        let sql = format!(
            "SELECT {} FROM categories {} ORDER BY sort_order, id",
            CATEGORY_COLUMNS, clause
        );
        let mut query = sqlx::query(&sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query.fetch_all(self.db.pool()).await?;
        map_rows(&rows, category_from_row)
    }

    async fn set_active(&self, id: &str, active: bool) -> Result<()> {
        let result = sqlx::query("UPDATE categories SET is_active = ?, updated_at = ? WHERE id = ?")
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
impl CategoryStorage for SqlCategoryRepository {
    async fn find_all(&self) -> Result<Vec<Category>> {
        self.select("", None).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Category>> {
        let row = sqlx::query(&format!("SELECT {} FROM categories WHERE id = ?", CATEGORY_COLUMNS))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref().map(category_from_row).transpose()
    }

    async fn find_by_type(&self, category_type: CategoryType) -> Result<Vec<Category>> {
        self.select("WHERE type = ?", Some(category_type.as_str())).await
    }

    async fn find_by_parent_id(&self, parent_id: Option<&str>) -> Result<Vec<Category>> {
        match parent_id {
            Some(parent) => self.select("WHERE parent_id = ?", Some(parent)).await,
            None => self.select("WHERE parent_id IS NULL", None).await,
        }
    }

    async fn find_active(&self) -> Result<Vec<Category>> {
        self.select("WHERE is_active = 1", None).await
    }

    async fn count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM categories")
            .fetch_one(self.db.pool())
            .await?;
        Ok(row.try_get::<i64, _>("count")? as u64)
    }

    async fn create(&self, dto: CreateCategoryDto) -> Result<Category> {
        let category = new_category(dto);
        bind_category(sqlx::query(INSERT_CATEGORY), &category)
            .execute(self.db.pool())
            .await?;
        debug!(id = %category.id, name = %category.name, "Created category");
        Ok(category)
    }

    async fn insert_many(&self, categories: Vec<Category>) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;
        for category in &categories {
            bind_category(sqlx::query(INSERT_CATEGORY), category)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        debug!(count = categories.len(), "Inserted categories");
        Ok(())
    }

    async fn update(&self, id: &str, dto: UpdateCategoryDto) -> Result<Category> {
        let mut category = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(ENTITY, id))?;
        merge_category(&mut category, dto);

        sqlx::query(
            r#"
            UPDATE categories
            SET name = ?, icon = ?, color = ?, parent_id = ?, sort_order = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&category.name)
        .bind(&category.icon)
        .bind(&category.color)
        .bind(&category.parent_id)
        .bind(category.sort_order)
        .bind(&category.updated_at)
        .bind(id)
        .execute(self.db.pool())
        .await?;

        Ok(category)
    }

    async fn soft_delete(&self, id: &str) -> Result<()> {
        self.set_active(id, false).await
    }

    async fn restore(&self, id: &str) -> Result<()> {
        self.set_active(id, true).await
    }
}

fn bind_category<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    category: &'q Category,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.icon)
        .bind(&category.color)
        .bind(category.category_type.as_str())
        .bind(&category.parent_id)
        .bind(category.sort_order)
        .bind(category.is_active)
        .bind(&category.created_at)
        .bind(&category.updated_at)
}
