use async_trait::async_trait;
use shared::{Category, CategoryType, CreateCategoryDto, UpdateCategoryDto};
use tracing::debug;

use super::connection::{ObjectStoreConnection, StoreName};
use super::store::NONE_KEY;
use crate::error::{Error, Result};
use crate::storage::records::{cmp_categories, merge_category, new_category, now_timestamp};
use crate::storage::traits::CategoryStorage;

const ENTITY: &str = "category";

#[derive(Clone)]
pub struct ObjectCategoryRepository {
    connection: ObjectStoreConnection,
}

impl ObjectCategoryRepository {
    pub fn new(connection: ObjectStoreConnection) -> Self {
        Self { connection }
    }

    fn sorted<'a>(categories: impl IntoIterator<Item = &'a Category>) -> Vec<Category> {
        let mut list: Vec<Category> = categories.into_iter().cloned().collect();
        list.sort_by(cmp_categories);
        list
    }

    async fn set_active(&self, id: &str, active: bool) -> Result<()> {
        let id = id.to_string();
        self.connection
            .write(&[StoreName::Categories], move |stores| {
                let mut category = stores
                    .categories
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| Error::not_found(ENTITY, id.clone()))?;
                category.is_active = active;
                category.updated_at = now_timestamp();
                stores.categories.put(category);
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl CategoryStorage for ObjectCategoryRepository {
    async fn find_all(&self) -> Result<Vec<Category>> {
        Ok(self
            .connection
            .read(|stores| Self::sorted(stores.categories.values()))
            .await)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Category>> {
        Ok(self
            .connection
            .read(|stores| stores.categories.get(id).cloned())
            .await)
    }

    async fn find_by_type(&self, category_type: CategoryType) -> Result<Vec<Category>> {
        Ok(self
            .connection
            .read(|stores| {
                Self::sorted(
                    stores
                        .categories
                        .get_all_from_index("type", category_type.as_str()),
                )
            })
            .await)
    }

    async fn find_by_parent_id(&self, parent_id: Option<&str>) -> Result<Vec<Category>> {
        let value = parent_id.unwrap_or(NONE_KEY);
        Ok(self
            .connection
            .read(|stores| Self::sorted(stores.categories.get_all_from_index("parent_id", value)))
            .await)
    }

    async fn find_active(&self) -> Result<Vec<Category>> {
        Ok(self
            .connection
            .read(|stores| Self::sorted(stores.categories.get_all_from_index("is_active", "1")))
            .await)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self
            .connection
            .read(|stores| stores.categories.len() as u64)
            .await)
    }

    async fn create(&self, dto: CreateCategoryDto) -> Result<Category> {
        let category = new_category(dto);
        let stored = category.clone();
        self.connection
            .write(&[StoreName::Categories], move |stores| {
                stores.categories.put(stored);
                Ok(())
            })
            .await?;
        debug!(id = %category.id, name = %category.name, "Created category");
        Ok(category)
    }

    async fn insert_many(&self, categories: Vec<Category>) -> Result<()> {
        let count = categories.len();
        self.connection
            .write(&[StoreName::Categories], move |stores| {
                for category in categories {
                    stores.categories.put(category);
                }
                Ok(())
            })
            .await?;
        debug!(count, "Inserted categories");
        Ok(())
    }

    async fn update(&self, id: &str, dto: UpdateCategoryDto) -> Result<Category> {
        let id = id.to_string();
        self.connection
            .write(&[StoreName::Categories], move |stores| {
                let mut category = stores
                    .categories
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| Error::not_found(ENTITY, id.clone()))?;
                merge_category(&mut category, dto);
                stores.categories.put(category.clone());
                Ok(category)
            })
            .await
    }

    async fn soft_delete(&self, id: &str) -> Result<()> {
        self.set_active(id, false).await
    }

    async fn restore(&self, id: &str) -> Result<()> {
        self.set_active(id, true).await
    }
}
