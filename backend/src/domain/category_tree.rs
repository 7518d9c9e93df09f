//! Two-level category hierarchy.
//!
//! Categories live in an arena keyed by id, with a root list and a children
//! index per parent id. Both lists stay sorted by `sort_order, id` as nodes
//! are inserted and removed. A child whose parent is not in the arena is kept
//! in the index but not rendered until the parent appears.

use std::cmp::Ordering;
use std::collections::HashMap;

use shared::{Category, CategoryNode};

use crate::storage::records::cmp_categories;

#[derive(Debug, Clone, Default)]
pub struct CategoryTree {
    nodes: HashMap<String, Category>,
    roots: Vec<String>,
    children: HashMap<String, Vec<String>>,
}

impl CategoryTree {
    pub fn build(categories: Vec<Category>) -> Self {
        let mut tree = Self::default();
        for category in categories {
            tree.insert(category);
        }
        tree
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Category> {
        self.nodes.get(id)
    }

    /// Add or replace a category, moving it if its parent or order changed
    pub fn insert(&mut self, category: Category) {
        self.remove(&category.id);

        let nodes = &self.nodes;
        let siblings = match category.parent_id {
            None => &mut self.roots,
            Some(ref parent_id) => self.children.entry(parent_id.clone()).or_default(),
        };
        let position = siblings
            .partition_point(|id| cmp_categories(&nodes[id], &category) == Ordering::Less);
        siblings.insert(position, category.id.clone());

        self.nodes.insert(category.id.clone(), category);
    }

    /// Remove one category. Its children stay indexed under its id.
    pub fn remove(&mut self, id: &str) -> Option<Category> {
        let category = self.nodes.remove(id)?;
        let siblings = match category.parent_id {
            None => Some(&mut self.roots),
            Some(ref parent_id) => self.children.get_mut(parent_id),
        };
        if let Some(siblings) = siblings {
            siblings.retain(|sibling| sibling != id);
        }
        Some(category)
    }

    pub fn roots(&self) -> impl Iterator<Item = &Category> {
        self.roots.iter().map(move |id| &self.nodes[id])
    }

    pub fn children_of(&self, id: &str) -> Vec<&Category> {
        self.children
            .get(id)
            .map(|ids| ids.iter().map(|child| &self.nodes[child]).collect())
            .unwrap_or_default()
    }

    pub fn has_children(&self, id: &str) -> bool {
        self.children.get(id).map_or(false, |ids| !ids.is_empty())
    }

    /// Roots in order, each carrying its direct children in order
    pub fn to_nodes(&self) -> Vec<CategoryNode> {
        self.roots()
            .map(|root| CategoryNode {
                category: root.clone(),
                children: self.children_of(&root.id).into_iter().cloned().collect(),
            })
            .collect()
    }
}
