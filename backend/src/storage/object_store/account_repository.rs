use async_trait::async_trait;
use shared::{Account, AccountType, CreateAccountDto, UpdateAccountDto};
use tracing::debug;

use super::connection::{ObjectStoreConnection, StoreName};
use crate::error::{Error, Result};
use crate::storage::records::{cmp_accounts, merge_account, new_account, now_timestamp};
use crate::storage::traits::AccountStorage;

const ENTITY: &str = "account";

/// Account repository over the object store
#[derive(Clone)]
pub struct ObjectAccountRepository {
    connection: ObjectStoreConnection,
}

impl ObjectAccountRepository {
    pub fn new(connection: ObjectStoreConnection) -> Self {
        Self { connection }
    }

    fn sorted<'a>(accounts: impl IntoIterator<Item = &'a Account>) -> Vec<Account> {
        let mut list: Vec<Account> = accounts.into_iter().cloned().collect();
        list.sort_by(cmp_accounts);
        list
    }

    async fn set_active(&self, id: &str, active: bool) -> Result<()> {
        let id = id.to_string();
        self.connection
            .write(&[StoreName::Accounts], move |stores| {
                let mut account = stores
                    .accounts
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| Error::not_found(ENTITY, id.clone()))?;
                account.is_active = active;
                account.updated_at = now_timestamp();
                stores.accounts.put(account);
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl AccountStorage for ObjectAccountRepository {
    async fn find_all(&self) -> Result<Vec<Account>> {
        Ok(self
            .connection
            .read(|stores| Self::sorted(stores.accounts.values()))
            .await)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>> {
        Ok(self
            .connection
            .read(|stores| stores.accounts.get(id).cloned())
            .await)
    }

    async fn find_by_type(&self, account_type: AccountType) -> Result<Vec<Account>> {
        Ok(self
            .connection
            .read(|stores| {
                Self::sorted(stores.accounts.get_all_from_index("type", account_type.as_str()))
            })
            .await)
    }

    async fn find_active(&self) -> Result<Vec<Account>> {
        Ok(self
            .connection
            .read(|stores| Self::sorted(stores.accounts.get_all_from_index("is_active", "1")))
            .await)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self
            .connection
            .read(|stores| stores.accounts.len() as u64)
            .await)
    }

    async fn create(&self, dto: CreateAccountDto) -> Result<Account> {
        let account = new_account(dto);
        let stored = account.clone();
        self.connection
            .write(&[StoreName::Accounts], move |stores| {
                stores.accounts.put(stored);
                Ok(())
            })
            .await?;
        debug!(id = %account.id, name = %account.name, "Created account");
        Ok(account)
    }

    async fn update(&self, id: &str, dto: UpdateAccountDto) -> Result<Account> {
        let id = id.to_string();
        self.connection
            .write(&[StoreName::Accounts], move |stores| {
                let mut account = stores
                    .accounts
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| Error::not_found(ENTITY, id.clone()))?;
                merge_account(&mut account, dto);
                stores.accounts.put(account.clone());
                Ok(account)
            })
            .await
    }

    async fn update_balance(&self, id: &str, delta: f64) -> Result<Account> {
        let id = id.to_string();
        self.connection
            .write(&[StoreName::Accounts], move |stores| {
                let mut account = stores
                    .accounts
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| Error::not_found(ENTITY, id.clone()))?;
                account.balance += delta;
                account.updated_at = now_timestamp();
                stores.accounts.put(account.clone());
                Ok(account)
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
