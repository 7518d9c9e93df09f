use std::sync::Arc;

use shared::{Account, AccountType, CreateAccountDto, UpdateAccountDto};
use tracing::{info, warn};

use crate::error::{Result, ValidationError};
use crate::storage::AccountStorage;

/// Service for managing money accounts
#[derive(Clone)]
pub struct AccountService {
    accounts: Arc<dyn AccountStorage>,
}

impl AccountService {
    pub fn new(accounts: Arc<dyn AccountStorage>) -> Self {
        Self { accounts }
    }

    /// Active accounts in creation order
    pub async fn get_all_accounts(&self) -> Result<Vec<Account>> {
        self.accounts.find_active().await
    }

    pub async fn get_account_by_id(&self, id: &str) -> Result<Option<Account>> {
        let account = self.accounts.find_by_id(id).await?;
        if account.is_none() {
            warn!("Account not found: {}", id);
        }
        Ok(account)
    }

    /// Active accounts of one type
    pub async fn get_accounts_by_type(&self, account_type: AccountType) -> Result<Vec<Account>> {
        let accounts = self.accounts.find_by_type(account_type).await?;
        Ok(accounts.into_iter().filter(|a| a.is_active).collect())
    }

    /// Sum of balances over active accounts
    pub async fn get_total_balance(&self) -> Result<f64> {
        let accounts = self.accounts.find_active().await?;
        Ok(accounts.iter().map(|a| a.balance).sum())
    }

    pub async fn create_account(&self, dto: CreateAccountDto) -> Result<Account> {
        info!("Creating account: name={}, type={}", dto.name, dto.account_type);

        if dto.name.trim().is_empty() {
            return Err(ValidationError::EmptyName("account").into());
        }

        let account = self.accounts.create(dto).await?;
        info!("Created account: {} with ID: {}", account.name, account.id);
        Ok(account)
    }

    pub async fn update_account(&self, id: &str, dto: UpdateAccountDto) -> Result<Account> {
        info!("Updating account: {}", id);

        if let Some(ref name) = dto.name {
            if name.trim().is_empty() {
                return Err(ValidationError::EmptyName("account").into());
            }
        }

        self.accounts.update(id, dto).await
    }

    /// Accounts are never hard-deleted; their transactions keep referencing them
    pub async fn delete_account(&self, id: &str) -> Result<()> {
        info!("Deactivating account: {}", id);
        self.accounts.soft_delete(id).await
    }

    pub async fn restore_account(&self, id: &str) -> Result<()> {
        info!("Restoring account: {}", id);
        self.accounts.restore(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendKind, StorageConfig};
    use crate::error::Error;
    use crate::storage::Database;

    async fn setup_test() -> AccountService {
        let db = Database::open(&StorageConfig::in_memory(BackendKind::ObjectStore))
            .await
            .expect("Failed to open test database");
        AccountService::new(db.accounts())
    }

    #[tokio::test]
    async fn test_seeded_accounts() {
        let service = setup_test().await;

        let accounts = service.get_all_accounts().await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(service.get_total_balance().await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_total_balance_skips_inactive() {
        let service = setup_test().await;
        let mut dto = CreateAccountDto::new("Savings", AccountType::Fund);
        dto.balance = Some(500_000.0);
        let savings = service.create_account(dto).await.unwrap();

        let mut dto = CreateAccountDto::new("Old wallet", AccountType::EWallet);
        dto.balance = Some(20_000.0);
        let wallet = service.create_account(dto).await.unwrap();
        assert_eq!(service.get_total_balance().await.unwrap(), 520_000.0);

        service.delete_account(&wallet.id).await.unwrap();
        assert_eq!(service.get_total_balance().await.unwrap(), 500_000.0);
        assert!(service
            .get_accounts_by_type(AccountType::EWallet)
            .await
            .unwrap()
            .is_empty());

        let stored = service.get_account_by_id(&wallet.id).await.unwrap().unwrap();
        assert!(!stored.is_active);

        service.restore_account(&wallet.id).await.unwrap();
        assert_eq!(service.get_total_balance().await.unwrap(), 520_000.0);
        assert_eq!(savings.account_type, AccountType::Fund);
    }

    #[tokio::test]
    async fn test_create_account_validation() {
        let service = setup_test().await;

        let err = service
            .create_account(CreateAccountDto::new("   ", AccountType::Cash))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::EmptyName("account"))
        ));
        assert_eq!(service.get_all_accounts().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_unknown_account() {
        let service = setup_test().await;

        let err = service
            .update_account(
                "missing",
                UpdateAccountDto {
                    name: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
