use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate};
use shared::{
    Budget, BudgetPeriod, BudgetProgress, CreateBudgetDto, TransactionFilter, TransactionType,
    UpdateBudgetDto,
};
use tracing::{debug, info};

use super::clock::{Clock, SystemClock};
use crate::error::{Error, Result, ValidationError};
use crate::storage::{BudgetStorage, TransactionStorage};

/// Service for spending limits and their progress
#[derive(Clone)]
pub struct BudgetService {
    budgets: Arc<dyn BudgetStorage>,
    transactions: Arc<dyn TransactionStorage>,
    clock: Arc<dyn Clock>,
}

impl BudgetService {
    pub fn new(budgets: Arc<dyn BudgetStorage>, transactions: Arc<dyn TransactionStorage>) -> Self {
        Self::with_clock(budgets, transactions, Arc::new(SystemClock))
    }

    pub fn with_clock(
        budgets: Arc<dyn BudgetStorage>,
        transactions: Arc<dyn TransactionStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            budgets,
            transactions,
            clock,
        }
    }

    pub async fn get_all_budgets(&self) -> Result<Vec<Budget>> {
        self.budgets.find_all().await
    }

    pub async fn get_budget_by_id(&self, id: &str) -> Result<Option<Budget>> {
        self.budgets.find_by_id(id).await
    }

    pub async fn create_budget(&self, dto: CreateBudgetDto) -> Result<Budget> {
        info!("Creating {} budget: limit={}", dto.period, dto.limit_amount);

        check_limit(dto.limit_amount)?;
        if dto.period == BudgetPeriod::Monthly {
            if let Some(month) = dto.month {
                if !(1..=12).contains(&month) {
                    return Err(ValidationError::InvalidMonth(month).into());
                }
            }
        }

        let budget = self.budgets.create(dto).await?;
        info!("Created budget: {}", budget.id);
        Ok(budget)
    }

    pub async fn update_budget(&self, id: &str, dto: UpdateBudgetDto) -> Result<Budget> {
        info!("Updating budget: {}", id);
        if let Some(limit) = dto.limit_amount {
            check_limit(limit)?;
        }
        self.budgets.update(id, dto).await
    }

    pub async fn delete_budget(&self, id: &str) -> Result<()> {
        info!("Deleting budget: {}", id);
        self.budgets.delete(id).await
    }

    /// Expense spent against the budget over its current window
    pub async fn get_budget_progress(&self, id: &str) -> Result<BudgetProgress> {
        let budget = self
            .budgets
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found("budget", id))?;

        let (start, end) = self.window(&budget)?;
        let filter = TransactionFilter {
            start_date: Some(start),
            end_date: Some(end),
            transaction_type: Some(TransactionType::Expense),
            category_id: budget.category_id.clone(),
            ..TransactionFilter::default()
        };
        let spent: f64 = self
            .transactions
            .find_all(&filter)
            .await?
            .iter()
            .map(|t| t.amount)
            .sum();

        debug!(budget = %budget.id, %start, %end, spent, "Computed budget progress");
        Ok(progress(spent, budget.limit_amount))
    }

    /// Inclusive date window the budget currently covers
    pub fn window(&self, budget: &Budget) -> Result<(NaiveDate, NaiveDate)> {
        match budget.period {
            BudgetPeriod::Monthly => {
                let month = budget.month.unwrap_or_else(|| self.clock.today().month());
                month_window(budget.year, month)
                    .ok_or_else(|| Error::Corrupt(format!("budget {} has month {}", budget.id, month)))
            }
            BudgetPeriod::Yearly => {
                let start = NaiveDate::from_ymd_opt(budget.year, 1, 1);
                let end = NaiveDate::from_ymd_opt(budget.year, 12, 31);
                start
                    .zip(end)
                    .ok_or_else(|| Error::Corrupt(format!("budget {} has year {}", budget.id, budget.year)))
            }
            BudgetPeriod::Weekly => Ok(week_window(self.clock.today())),
        }
    }
}

fn check_limit(limit: f64) -> std::result::Result<(), ValidationError> {
    if !(limit.is_finite() && limit > 0.0) {
        return Err(ValidationError::NonPositiveLimit);
    }
    Ok(())
}

fn progress(spent: f64, limit: f64) -> BudgetProgress {
    let percentage = if limit == 0.0 { 0.0 } else { spent / limit * 100.0 };
    BudgetProgress {
        spent,
        remaining: (limit - spent).max(0.0),
        percentage,
    }
}

fn month_window(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let end = start.checked_add_months(chrono::Months::new(1))?.pred_opt()?;
    Some((start, end))
}

/// Monday to Sunday around `today`
fn week_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let offset = today.weekday().num_days_from_monday() as u64;
    let start = today - Days::new(offset);
    (start, start + Days::new(6))
}
