use async_trait::async_trait;
use shared::{Budget, BudgetPeriod, CreateBudgetDto, UpdateBudgetDto};
use tracing::debug;

use super::connection::{ObjectStoreConnection, StoreName};
use crate::error::{Error, Result};
use crate::storage::records::{cmp_budgets, merge_budget, new_budget};
use crate::storage::traits::BudgetStorage;

const ENTITY: &str = "budget";

#[derive(Clone)]
pub struct ObjectBudgetRepository {
    connection: ObjectStoreConnection,
}

impl ObjectBudgetRepository {
    pub fn new(connection: ObjectStoreConnection) -> Self {
        Self { connection }
    }
}

fn sorted<'a>(budgets: impl IntoIterator<Item = &'a Budget>) -> Vec<Budget> {
    let mut list: Vec<Budget> = budgets.into_iter().cloned().collect();
    list.sort_by(cmp_budgets);
    list
}

#[async_trait]
impl BudgetStorage for ObjectBudgetRepository {
    async fn find_all(&self) -> Result<Vec<Budget>> {
        Ok(self
            .connection
            .read(|stores| sorted(stores.budgets.values()))
            .await)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Budget>> {
        Ok(self
            .connection
            .read(|stores| stores.budgets.get(id).cloned())
            .await)
    }

    async fn find_by_category_id(&self, category_id: &str) -> Result<Vec<Budget>> {
        Ok(self
            .connection
            .read(|stores| sorted(stores.budgets.get_all_from_index("category_id", category_id)))
            .await)
    }

    async fn find_by_period(
        &self,
        period: BudgetPeriod,
        year: i32,
        month: Option<u32>,
    ) -> Result<Vec<Budget>> {
        Ok(self
            .connection
            .read(|stores| {
                sorted(stores.budgets.values().filter(|b| {
                    b.period == period && b.year == year && month.map_or(true, |m| b.month == Some(m))
                }))
            })
            .await)
    }

    async fn create(&self, dto: CreateBudgetDto) -> Result<Budget> {
        let budget = new_budget(dto);
        let stored = budget.clone();
        self.connection
            .write(&[StoreName::Budgets], move |stores| {
                stores.budgets.put(stored);
                Ok(())
            })
            .await?;
        debug!(id = %budget.id, period = %budget.period, "Created budget");
        Ok(budget)
    }

    async fn update(&self, id: &str, dto: UpdateBudgetDto) -> Result<Budget> {
        let id = id.to_string();
        self.connection
            .write(&[StoreName::Budgets], move |stores| {
                let mut budget = stores
                    .budgets
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| Error::not_found(ENTITY, id.clone()))?;
                merge_budget(&mut budget, dto);
                stores.budgets.put(budget.clone());
                Ok(budget)
            })
            .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.connection
            .write(&[StoreName::Budgets], move |stores| {
                stores
                    .budgets
                    .remove(&id)
                    .map(|_| ())
                    .ok_or_else(|| Error::not_found(ENTITY, id.clone()))
            })
            .await
    }
}
