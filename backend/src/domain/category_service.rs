use std::sync::Arc;

use shared::{Category, CategoryNode, CategoryType, CreateCategoryDto, UpdateCategoryDto};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::category_tree::CategoryTree;
use crate::error::{Error, Result, ValidationError};
use crate::storage::CategoryStorage;

/// Service for the two-level category catalog.
///
/// Nesting rules: a parent must exist and be active, must itself be a root,
/// and must have the same type as the child. A category that has children
/// cannot be nested. `update_category` can move a category under a parent
/// but never back to the root level.
///
/// The active tree is loaded on first read and then kept current by this
/// service's own writes. Call [`CategoryService::invalidate`] after changing
/// categories through the repository directly.
#[derive(Clone)]
pub struct CategoryService {
    categories: Arc<dyn CategoryStorage>,
    tree: Arc<RwLock<Option<CategoryTree>>>,
}

impl CategoryService {
    pub fn new(categories: Arc<dyn CategoryStorage>) -> Self {
        Self {
            categories,
            tree: Arc::new(RwLock::new(None)),
        }
    }

    /// Drop the cached tree; the next read reloads it
    pub async fn invalidate(&self) {
        *self.tree.write().await = None;
    }

    async fn with_cached_tree(&self, f: impl FnOnce(&mut CategoryTree)) {
        if let Some(tree) = self.tree.write().await.as_mut() {
            f(tree);
        }
    }

    pub async fn get_all_categories(&self) -> Result<Vec<Category>> {
        self.categories.find_active().await
    }

    pub async fn get_categories_by_type(&self, category_type: CategoryType) -> Result<Vec<Category>> {
        let categories = self.categories.find_by_type(category_type).await?;
        Ok(categories.into_iter().filter(|c| c.is_active).collect())
    }

    /// Active roots with their active direct children
    pub async fn get_category_tree(&self) -> Result<Vec<CategoryNode>> {
        if let Some(tree) = self.tree.read().await.as_ref() {
            return Ok(tree.to_nodes());
        }

        let mut cached = self.tree.write().await;
        if cached.is_none() {
            let tree = CategoryTree::build(self.categories.find_active().await?);
            debug!("Loaded category tree with {} categories", tree.len());
            *cached = Some(tree);
        }
        Ok(cached.as_ref().map(CategoryTree::to_nodes).unwrap_or_default())
    }

    pub async fn get_category_by_id(&self, id: &str) -> Result<Option<Category>> {
        let category = self.categories.find_by_id(id).await?;
        if category.is_none() {
            warn!("Category not found: {}", id);
        }
        Ok(category)
    }

    pub async fn create_category(&self, dto: CreateCategoryDto) -> Result<Category> {
        info!("Creating category: name={}, type={}", dto.name, dto.category_type);

        if dto.name.trim().is_empty() {
            return Err(ValidationError::EmptyName("category").into());
        }
        if let Some(ref parent_id) = dto.parent_id {
            self.check_parent(parent_id, dto.category_type).await?;
        }

        let category = self.categories.create(dto).await?;
        let cached = category.clone();
        self.with_cached_tree(|tree| tree.insert(cached)).await;
        info!("Created category: {} with ID: {}", category.name, category.id);
        Ok(category)
    }

    pub async fn update_category(&self, id: &str, dto: UpdateCategoryDto) -> Result<Category> {
        info!("Updating category: {}", id);

        let current = self
            .categories
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found("category", id))?;

        if let Some(ref name) = dto.name {
            if name.trim().is_empty() {
                return Err(ValidationError::EmptyName("category").into());
            }
        }

        if let Some(ref parent_id) = dto.parent_id {
            if current.parent_id.as_ref() != Some(parent_id) {
                if parent_id == id {
                    return Err(ValidationError::SelfParent.into());
                }
                self.check_parent(parent_id, current.category_type).await?;
                let children = self.categories.find_by_parent_id(Some(id)).await?;
                if !children.is_empty() {
                    return Err(ValidationError::ParentHasChildren(id.to_string()).into());
                }
            }
        }

        let category = self.categories.update(id, dto).await?;
        let cached = category.clone();
        self.with_cached_tree(|tree| {
            if cached.is_active {
                tree.insert(cached);
            } else {
                tree.remove(&cached.id);
            }
        })
        .await;
        Ok(category)
    }

    /// Soft-delete the category and its direct children
    pub async fn delete_category(&self, id: &str) -> Result<()> {
        info!("Deactivating category: {}", id);

        self.categories.soft_delete(id).await?;
        let children = self.categories.find_by_parent_id(Some(id)).await?;
        for child in children.iter().filter(|c| c.is_active) {
            self.categories.soft_delete(&child.id).await?;
        }
        self.with_cached_tree(|tree| {
            tree.remove(id);
            for child in &children {
                tree.remove(&child.id);
            }
        })
        .await;

        info!("Deactivated category {} and {} children", id, children.len());
        Ok(())
    }

    pub async fn restore_category(&self, id: &str) -> Result<()> {
        info!("Restoring category: {}", id);
        self.categories.restore(id).await?;
        if let Some(category) = self.categories.find_by_id(id).await? {
            self.with_cached_tree(|tree| tree.insert(category)).await;
        }
        Ok(())
    }

    async fn check_parent(&self, parent_id: &str, child_type: CategoryType) -> Result<()> {
        let parent = self
            .categories
            .find_by_id(parent_id)
            .await?
            .ok_or_else(|| ValidationError::UnknownParent(parent_id.to_string()))?;

        if !parent.is_active {
            return Err(ValidationError::InactiveParent(parent.id).into());
        }
        if !parent.is_root() {
            return Err(ValidationError::NestingTooDeep(parent.id).into());
        }
        if parent.category_type != child_type {
            return Err(ValidationError::ParentTypeMismatch {
                parent: parent.category_type,
                child: child_type,
            }
            .into());
        }
        Ok(())
    }
}
