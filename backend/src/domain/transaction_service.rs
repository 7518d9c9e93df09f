//! Transaction validation and queries.
//!
//! Balance bookkeeping lives in the repositories; this service only decides
//! whether a transaction is acceptable before anything is written.

use std::sync::Arc;

use chrono::NaiveDate;
use shared::{
    CategoryStats, CategoryType, CreateTransactionDto, Transaction, TransactionFilter,
    TransactionStats, TransactionType, UpdateTransactionDto,
};
use tracing::{info, warn};

use crate::error::{Error, Result, ValidationError};
use crate::storage::{CategoryStorage, TransactionStorage};

/// Service for recording income, expenses and transfers
#[derive(Clone)]
pub struct TransactionService {
    transactions: Arc<dyn TransactionStorage>,
    categories: Arc<dyn CategoryStorage>,
}

impl TransactionService {
    pub fn new(transactions: Arc<dyn TransactionStorage>, categories: Arc<dyn CategoryStorage>) -> Self {
        Self {
            transactions,
            categories,
        }
    }

    pub async fn get_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        self.transactions.find_all(filter).await
    }

    pub async fn get_transaction_by_id(&self, id: &str) -> Result<Option<Transaction>> {
        let transaction = self.transactions.find_by_id(id).await?;
        if transaction.is_none() {
            warn!("Transaction not found: {}", id);
        }
        Ok(transaction)
    }

    /// The newest `limit` transactions, newest first
    pub async fn get_recent_transactions(&self, limit: u32) -> Result<Vec<Transaction>> {
        let filter = TransactionFilter {
            limit: Some(limit),
            ..TransactionFilter::default()
        };
        self.transactions.find_all(&filter).await
    }

    pub async fn get_transaction_stats(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<TransactionStats> {
        self.transactions.get_stats(start, end).await
    }

    pub async fn get_category_stats(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<CategoryStats>> {
        self.transactions.get_stats_by_category(start, end).await
    }

    pub async fn create_transaction(&self, dto: CreateTransactionDto) -> Result<Transaction> {
        info!(
            "Creating transaction: type={}, amount={}, account={}",
            dto.transaction_type, dto.amount, dto.account_id
        );

        validate(
            dto.amount,
            dto.transaction_type,
            &dto.account_id,
            dto.category_id.as_deref(),
            dto.to_account_id.as_deref(),
        )?;
        self.check_category(dto.transaction_type, dto.category_id.as_deref())
            .await?;

        let transaction = self.transactions.create(dto).await?;
        info!("Created transaction: {}", transaction.id);
        Ok(transaction)
    }

    /// Applies the changes to the stored record and re-checks the result with
    /// the create rules before writing
    pub async fn update_transaction(&self, id: &str, dto: UpdateTransactionDto) -> Result<Transaction> {
        info!("Updating transaction: {}", id);

        let current = self
            .transactions
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found("transaction", id))?;

        let merged = current.merged(&dto);
        validate(
            merged.amount,
            merged.transaction_type,
            &merged.account_id,
            merged.category_id.as_deref(),
            merged.to_account_id.as_deref(),
        )?;
        self.check_category(merged.transaction_type, merged.category_id.as_deref())
            .await?;

        self.transactions.update(id, dto).await
    }

    pub async fn delete_transaction(&self, id: &str) -> Result<()> {
        info!("Deleting transaction: {}", id);
        self.transactions.delete(id).await
    }

    /// Income and expenses must point at an existing category of their own
    /// type. Soft-deleted categories still count as existing.
    async fn check_category(&self, transaction_type: TransactionType, category_id: Option<&str>) -> Result<()> {
        let expected = match transaction_type {
            TransactionType::Income => CategoryType::Income,
            TransactionType::Expense => CategoryType::Expense,
            TransactionType::Transfer => return Ok(()),
        };
        let Some(category_id) = category_id else {
            return Ok(());
        };

        let category = self
            .categories
            .find_by_id(category_id)
            .await?
            .ok_or_else(|| ValidationError::UnknownCategory(category_id.to_string()))?;
        if category.category_type != expected {
            return Err(ValidationError::CategoryTypeMismatch {
                category: category.category_type,
                transaction: transaction_type,
            }
            .into());
        }
        Ok(())
    }
}

fn validate(
    amount: f64,
    transaction_type: TransactionType,
    account_id: &str,
    category_id: Option<&str>,
    to_account_id: Option<&str>,
) -> std::result::Result<(), ValidationError> {
    if !(amount.is_finite() && amount > 0.0) {
        return Err(ValidationError::NonPositiveAmount);
    }

    match transaction_type {
        TransactionType::Transfer => match to_account_id.filter(|id| !id.is_empty()) {
            None => Err(ValidationError::MissingDestination),
            Some(destination) if destination == account_id => Err(ValidationError::SameAccountTransfer),
            Some(_) => Ok(()),
        },
        TransactionType::Income | TransactionType::Expense => {
            if category_id.map_or(true, str::is_empty) {
                return Err(ValidationError::MissingCategory);
            }
            Ok(())
        }
    }
}
