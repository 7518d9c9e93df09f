use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::{
    CategoryStats, CreateTransactionDto, Transaction, TransactionFilter, TransactionStats,
    TransactionType, UpdateTransactionDto,
};
use tracing::{debug, info};

use super::connection::{ObjectStoreConnection, ObjectStores, StoreName};
use crate::error::{Error, Result};
use crate::storage::balance::{net_changes, touched_accounts};
use crate::storage::records::{cmp_transactions, format_date, new_transaction, now_timestamp};
use crate::storage::stats::{rank_categories, summarize, to_minor, CategoryTotal};
use crate::storage::traits::TransactionStorage;

const ENTITY: &str = "transaction";
const TOUCHED: [StoreName; 2] = [StoreName::Accounts, StoreName::Transactions];

/// Transaction repository over the object store.
///
/// Each write runs as a single closure under the store lock: the account
/// checks happen first, then the balances and the row change together.
#[derive(Clone)]
pub struct ObjectTransactionRepository {
    connection: ObjectStoreConnection,
}

impl ObjectTransactionRepository {
    pub fn new(connection: ObjectStoreConnection) -> Self {
        Self { connection }
    }
}

fn sorted<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Vec<Transaction> {
    let mut list: Vec<Transaction> = transactions.into_iter().cloned().collect();
    list.sort_by(cmp_transactions);
    list
}

fn in_window(transaction: &Transaction, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    start.map_or(true, |s| transaction.transaction_date >= s)
        && end.map_or(true, |e| transaction.transaction_date <= e)
}

/// Fail with `NotFound` unless every account in `ids` exists
fn ensure_accounts<'a>(stores: &ObjectStores, ids: impl IntoIterator<Item = &'a String>) -> Result<()> {
    for id in ids {
        if !stores.accounts.contains(id) {
            return Err(Error::not_found("account", id.clone()));
        }
    }
    Ok(())
}

/// Add each delta to its account. Callers have already checked existence.
fn apply_changes(stores: &mut ObjectStores, changes: BTreeMap<String, f64>) {
    if changes.is_empty() {
        return;
    }
    let now = now_timestamp();
    for (account_id, delta) in changes {
        if let Some(mut account) = stores.accounts.get(&account_id).cloned() {
            account.balance += delta;
            account.updated_at = now.clone();
            stores.accounts.put(account);
        }
    }
}

/// Index-backed candidate set for a filter, before predicate matching
fn candidates<'a>(stores: &'a ObjectStores, filter: &TransactionFilter) -> Vec<&'a Transaction> {
    let transactions = &stores.transactions;
    if let Some(ref account_id) = filter.account_id {
        transactions.get_all_from_index("account_id", account_id)
    } else if let Some(ref category_id) = filter.category_id {
        transactions.get_all_from_index("category_id", category_id)
    } else if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
        transactions.get_range_from_index("transaction_date", &format_date(start), &format_date(end))
    } else {
        transactions.values().collect()
    }
}

#[async_trait]
impl TransactionStorage for ObjectTransactionRepository {
    async fn find_all(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        Ok(self
            .connection
            .read(|stores| {
                let matching = candidates(stores, filter)
                    .into_iter()
                    .filter(|t| filter.matches(t));
                let offset = filter.offset.unwrap_or(0) as usize;
                let limit = filter.limit.map_or(usize::MAX, |l| l as usize);
                sorted(matching).into_iter().skip(offset).take(limit).collect()
            })
            .await)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Transaction>> {
        Ok(self
            .connection
            .read(|stores| stores.transactions.get(id).cloned())
            .await)
    }

    async fn find_by_account_id(&self, account_id: &str) -> Result<Vec<Transaction>> {
        Ok(self
            .connection
            .read(|stores| {
                let mut seen = BTreeSet::new();
                let rows = stores
                    .transactions
                    .get_all_from_index("account_id", account_id)
                    .into_iter()
                    .chain(stores.transactions.get_all_from_index("to_account_id", account_id))
                    .filter(|t| seen.insert(t.id.clone()));
                sorted(rows)
            })
            .await)
    }

    async fn find_by_category_id(&self, category_id: &str) -> Result<Vec<Transaction>> {
        Ok(self
            .connection
            .read(|stores| sorted(stores.transactions.get_all_from_index("category_id", category_id)))
            .await)
    }

    async fn find_by_date_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Transaction>> {
        let (from, to) = (format_date(start), format_date(end));
        Ok(self
            .connection
            .read(|stores| {
                sorted(
                    stores
                        .transactions
                        .get_range_from_index("transaction_date", &from, &to),
                )
            })
            .await)
    }

    async fn create(&self, dto: CreateTransactionDto) -> Result<Transaction> {
        let transaction = new_transaction(dto);
        let stored = transaction.clone();
        self.connection
            .write(&TOUCHED, move |stores| {
                let changes = net_changes(None, Some(&stored));
                ensure_accounts(stores, &touched_accounts(&stored))?;
                apply_changes(stores, changes);
                stores.transactions.put(stored);
                Ok(())
            })
            .await?;
        info!(
            id = %transaction.id,
            kind = %transaction.transaction_type,
            amount = transaction.amount,
            "Created transaction"
        );
        Ok(transaction)
    }

    async fn update(&self, id: &str, dto: UpdateTransactionDto) -> Result<Transaction> {
        let id = id.to_string();
        let updated = self
            .connection
            .write(&TOUCHED, move |stores| {
                let existing = stores
                    .transactions
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| Error::not_found(ENTITY, id.clone()))?;
                let mut next = existing.merged(&dto);
                next.updated_at = now_timestamp();

                let changes = net_changes(Some(&existing), Some(&next));
                ensure_accounts(stores, &touched_accounts(&next))?;
                ensure_accounts(stores, changes.keys())?;
                apply_changes(stores, changes);
                stores.transactions.put(next.clone());
                Ok(next)
            })
            .await?;
        debug!(id = %updated.id, "Updated transaction");
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.connection
            .write(&TOUCHED, move |stores| {
                let existing = stores
                    .transactions
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| Error::not_found(ENTITY, id.clone()))?;
                let changes = net_changes(Some(&existing), None);
                ensure_accounts(stores, changes.keys())?;
                apply_changes(stores, changes);
                stores.transactions.remove(&id);
                debug!(id = %id, "Deleted transaction");
                Ok(())
            })
            .await
    }

    async fn get_stats(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<TransactionStats> {
        Ok(self
            .connection
            .read(|stores| {
                let mut income = 0i64;
                let mut expense = 0i64;
                let mut count = 0u64;
                for transaction in stores.transactions.values() {
                    if !in_window(transaction, start, end) {
                        continue;
                    }
                    count += 1;
                    match transaction.transaction_type {
                        TransactionType::Income => income += to_minor(transaction.amount),
                        TransactionType::Expense => expense += to_minor(transaction.amount),
                        TransactionType::Transfer => {}
                    }
                }
                summarize(income, expense, count)
            })
            .await)
    }

    async fn get_stats_by_category(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<CategoryStats>> {
        Ok(self
            .connection
            .read(|stores| {
                let mut grouped: BTreeMap<String, (i64, u64)> = BTreeMap::new();
                for transaction in stores
                    .transactions
                    .get_all_from_index("type", TransactionType::Expense.as_str())
                {
                    let Some(ref category_id) = transaction.category_id else {
                        continue;
                    };
                    if !in_window(transaction, start, end) {
                        continue;
                    }
                    let entry = grouped.entry(category_id.clone()).or_insert((0, 0));
                    entry.0 += to_minor(transaction.amount);
                    entry.1 += 1;
                }

                let totals = grouped
                    .into_iter()
                    .map(|(category_id, (total, count))| CategoryTotal {
                        category_name: stores.categories.get(&category_id).map(|c| c.name.clone()),
                        category_id,
                        total,
                        count,
                    })
                    .collect();
                rank_categories(totals)
            })
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_utils::TestEnvironment;
    use crate::storage::traits::{AccountStorage, Connection};
    use shared::{Account, AccountType, CreateAccountDto};
    use std::sync::Arc;

    struct Fixture {
        accounts: Arc<dyn AccountStorage>,
        transactions: Arc<dyn TransactionStorage>,
        cash: Account,
        bank: Account,
    }

    async fn setup_test() -> Fixture {
        let connection = ObjectStoreConnection::in_memory();
        let accounts = connection.create_account_repository();
        let transactions = connection.create_transaction_repository();
        let cash = accounts
            .create(CreateAccountDto::new("Cash", AccountType::Cash))
            .await
            .unwrap();
        let bank = accounts
            .create(CreateAccountDto::new("Bank", AccountType::Bank))
            .await
            .unwrap();
        Fixture {
            accounts,
            transactions,
            cash,
            bank,
        }
    }

    async fn balance(fixture: &Fixture, id: &str) -> f64 {
        fixture.accounts.find_by_id(id).await.unwrap().unwrap().balance
    }

    #[tokio::test]
    async fn test_create_and_delete_adjust_balances() {
        let fx = setup_test().await;

        let transfer = fx
            .transactions
            .create(CreateTransactionDto::transfer(250.0, &fx.cash.id, &fx.bank.id))
            .await
            .unwrap();
        assert_eq!(balance(&fx, &fx.cash.id).await, -250.0);
        assert_eq!(balance(&fx, &fx.bank.id).await, 250.0);

        fx.transactions.delete(&transfer.id).await.unwrap();
        assert_eq!(balance(&fx, &fx.cash.id).await, 0.0);
        assert_eq!(balance(&fx, &fx.bank.id).await, 0.0);
        assert!(fx.transactions.find_by_id(&transfer.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_account_writes_nothing() {
        let fx = setup_test().await;

        let err = fx
            .transactions
            .create(CreateTransactionDto::transfer(100.0, &fx.cash.id, "ghost"))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(balance(&fx, &fx.cash.id).await, 0.0);
        let all = fx
            .transactions
            .find_all(&TransactionFilter::default())
            .await
            .unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn test_update_amount_reapplies_balance() {
        let fx = setup_test().await;
        let expense = fx
            .transactions
            .create(CreateTransactionDto::expense(100.0, &fx.cash.id, "food"))
            .await
            .unwrap();

        let updated = fx
            .transactions
            .update(
                &expense.id,
                UpdateTransactionDto {
                    amount: Some(40.0),
                    transaction_type: Some(TransactionType::Income),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.amount, 40.0);
        assert_eq!(balance(&fx, &fx.cash.id).await, 40.0);
    }

    #[tokio::test]
    async fn test_find_by_account_includes_destination() {
        let fx = setup_test().await;
        fx.transactions
            .create(CreateTransactionDto::transfer(10.0, &fx.cash.id, &fx.bank.id))
            .await
            .unwrap();
        fx.transactions
            .create(CreateTransactionDto::income(20.0, &fx.bank.id, "salary"))
            .await
            .unwrap();

        assert_eq!(fx.transactions.find_by_account_id(&fx.bank.id).await.unwrap().len(), 2);
        assert_eq!(fx.transactions.find_by_account_id(&fx.cash.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_snapshot_leaves_balances_untouched() {
        let env = TestEnvironment::new().unwrap();
        let config = env.object_store_config();
        let connection = ObjectStoreConnection::initialize(&config).await.unwrap();
        let accounts = connection.create_account_repository();
        let transactions = connection.create_transaction_repository();
        let cash = accounts
            .create(CreateAccountDto::new("Cash", AccountType::Cash))
            .await
            .unwrap();

        // A directory in the temp file's place makes the transactions snapshot fail
        let blocker = env.base_directory().join("transactions.yaml.tmp");
        std::fs::create_dir(&blocker).unwrap();

        let result = transactions
            .create(CreateTransactionDto::expense(50_000.0, &cash.id, "food"))
            .await;

        assert!(result.is_err());
        let current = accounts.find_by_id(&cash.id).await.unwrap().unwrap();
        assert_eq!(current.balance, 0.0);
        assert!(transactions
            .find_all(&TransactionFilter::default())
            .await
            .unwrap()
            .is_empty());
        assert!(!env.base_directory().join("accounts.yaml.tmp").exists());

        std::fs::remove_dir(&blocker).unwrap();
        let reopened = ObjectStoreConnection::initialize(&config).await.unwrap();
        let on_disk = reopened
            .create_account_repository()
            .find_by_id(&cash.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(on_disk.balance, 0.0);
    }

    #[tokio::test]
    async fn test_fractional_totals() {
        let fx = setup_test().await;
        for amount in [0.1, 0.2, 0.3] {
            fx.transactions
                .create(CreateTransactionDto::expense(amount, &fx.cash.id, "food"))
                .await
                .unwrap();
        }

        let stats = fx.transactions.get_stats(None, None).await.unwrap();
        assert_eq!(stats.total_expense, 0.6);
        let by_category = fx.transactions.get_stats_by_category(None, None).await.unwrap();
        assert_eq!(by_category[0].total, 0.6);
    }

    #[tokio::test]
    async fn test_stats_by_category() {
        let fx = setup_test().await;
        for (amount, category) in [(300.0, "food"), (100.0, "food"), (100.0, "bills")] {
            fx.transactions
                .create(CreateTransactionDto::expense(amount, &fx.cash.id, category))
                .await
                .unwrap();
        }
        fx.transactions
            .create(CreateTransactionDto::income(1000.0, &fx.cash.id, "salary"))
            .await
            .unwrap();

        let stats = fx.transactions.get_stats(None, None).await.unwrap();
        assert_eq!(stats.total_expense, 500.0);
        assert_eq!(stats.balance, 500.0);
        assert_eq!(stats.transaction_count, 4);

        let by_category = fx.transactions.get_stats_by_category(None, None).await.unwrap();
        assert_eq!(by_category[0].category_id, "food");
        assert_eq!(by_category[0].percentage, 80.0);
        assert_eq!(by_category[0].category_name, "Unknown");
        assert_eq!(by_category[1].transaction_count, 1);
    }
}
