use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raised when a stored or user supplied enum name is not recognised
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Implements the text form used by both storage backends for a wire enum.
macro_rules! wire_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Canonical text stored in every backend
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn all() -> &'static [$name] {
                &[$($name::$variant),+]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Kind of wallet an account represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Cash,
    Bank,
    Credit,
    EWallet,
    Fund,
}

wire_enum!(AccountType, "account type", {
    Cash => "CASH",
    Bank => "BANK",
    Credit => "CREDIT",
    EWallet => "E_WALLET",
    Fund => "FUND",
});

/// A wallet holding money. Never hard-deleted; removal clears `is_active`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    /// Opening balance plus the net effect of every surviving transaction
    pub balance: f64,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub is_active: bool,
    /// RFC 3339 timestamp
    pub created_at: String,
    /// RFC 3339 timestamp, refreshed on every mutation
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountDto {
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    /// Opening balance, zero when absent
    pub balance: Option<f64>,
    pub icon: Option<String>,
    pub color: Option<String>,
}

impl CreateAccountDto {
    pub fn new(name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            name: name.into(),
            account_type,
            balance: None,
            icon: None,
            color: None,
        }
    }
}

/// Partial account update; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountDto {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub account_type: Option<AccountType>,
    pub icon: Option<String>,
    pub color: Option<String>,
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategoryType {
    Expense,
    Income,
}

wire_enum!(CategoryType, "category type", {
    Expense => "EXPENSE",
    Income => "INCOME",
});

/// A spending or income category. Nesting is limited to one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    #[serde(rename = "type")]
    pub category_type: CategoryType,
    pub parent_id: Option<String>,
    pub sort_order: i64,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Category {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryDto {
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    #[serde(rename = "type")]
    pub category_type: CategoryType,
    pub parent_id: Option<String>,
    pub sort_order: Option<i64>,
}

impl CreateCategoryDto {
    pub fn new(name: impl Into<String>, category_type: CategoryType) -> Self {
        Self {
            name: name.into(),
            icon: None,
            color: None,
            category_type,
            parent_id: None,
            sort_order: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryDto {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub parent_id: Option<String>,
    pub sort_order: Option<i64>,
}

/// A root category with its direct children, as returned by the tree view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<Category>,
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Expense,
    Income,
    Transfer,
}

wire_enum!(TransactionType, "transaction type", {
    Expense => "EXPENSE",
    Income => "INCOME",
    Transfer => "TRANSFER",
});

/// A single money movement. `amount` is always positive; the sign comes from
/// `transaction_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub note: Option<String>,
    /// Calendar date the money moved, distinct from `created_at`
    pub transaction_date: NaiveDate,
    pub account_id: String,
    pub category_id: Option<String>,
    /// Destination account, only set for transfers
    pub to_account_id: Option<String>,
    pub location: Option<String>,
    pub attachment: Option<String>,
    pub is_recurring: bool,
    pub recurring_rule: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Transaction {
    /// Returns a copy with `changes` applied. A non-transfer never keeps a
    /// destination account.
    pub fn merged(&self, changes: &UpdateTransactionDto) -> Transaction {
        let mut next = self.clone();
        if let Some(amount) = changes.amount {
            next.amount = amount;
        }
        if let Some(transaction_type) = changes.transaction_type {
            next.transaction_type = transaction_type;
        }
        if let Some(ref note) = changes.note {
            next.note = Some(note.clone());
        }
        if let Some(date) = changes.transaction_date {
            next.transaction_date = date;
        }
        if let Some(ref account_id) = changes.account_id {
            next.account_id = account_id.clone();
        }
        if let Some(ref category_id) = changes.category_id {
            next.category_id = Some(category_id.clone());
        }
        if let Some(ref to_account_id) = changes.to_account_id {
            next.to_account_id = Some(to_account_id.clone());
        }
        if let Some(ref location) = changes.location {
            next.location = Some(location.clone());
        }
        if next.transaction_type != TransactionType::Transfer {
            next.to_account_id = None;
        }
        next
    }

    /// Whether `other` moves money differently from `self`
    pub fn balance_differs(&self, other: &Transaction) -> bool {
        self.amount != other.amount
            || self.transaction_type != other.transaction_type
            || self.account_id != other.account_id
            || self.to_account_id != other.to_account_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionDto {
    pub amount: f64,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub note: Option<String>,
    /// Defaults to today when absent
    pub transaction_date: Option<NaiveDate>,
    pub account_id: String,
    pub category_id: Option<String>,
    pub to_account_id: Option<String>,
    pub location: Option<String>,
    pub attachment: Option<String>,
}

impl CreateTransactionDto {
    pub fn expense(amount: f64, account_id: impl Into<String>, category_id: impl Into<String>) -> Self {
        Self::base(amount, TransactionType::Expense, account_id.into(), Some(category_id.into()))
    }

    pub fn income(amount: f64, account_id: impl Into<String>, category_id: impl Into<String>) -> Self {
        Self::base(amount, TransactionType::Income, account_id.into(), Some(category_id.into()))
    }

    pub fn transfer(amount: f64, account_id: impl Into<String>, to_account_id: impl Into<String>) -> Self {
        let mut dto = Self::base(amount, TransactionType::Transfer, account_id.into(), None);
        dto.to_account_id = Some(to_account_id.into());
        dto
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.transaction_date = Some(date);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    fn base(
        amount: f64,
        transaction_type: TransactionType,
        account_id: String,
        category_id: Option<String>,
    ) -> Self {
        Self {
            amount,
            transaction_type,
            note: None,
            transaction_date: None,
            account_id,
            category_id,
            to_account_id: None,
            location: None,
            attachment: None,
        }
    }
}

/// Partial transaction update. Balance-relevant fields (amount, type,
/// accounts) are re-applied to the affected balances by the repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransactionDto {
    pub amount: Option<f64>,
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    pub note: Option<String>,
    pub transaction_date: Option<NaiveDate>,
    pub account_id: Option<String>,
    pub category_id: Option<String>,
    pub to_account_id: Option<String>,
    pub location: Option<String>,
}

/// Query filter for transaction listings. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    pub account_id: Option<String>,
    pub category_id: Option<String>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl TransactionFilter {
    pub fn between(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self {
            start_date: start,
            end_date: end,
            ..Self::default()
        }
    }

    /// True when `transaction` passes every predicate (limit/offset excluded)
    pub fn matches(&self, transaction: &Transaction) -> bool {
        if let Some(start) = self.start_date {
            if transaction.transaction_date < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if transaction.transaction_date > end {
                return false;
            }
        }
        if let Some(kind) = self.transaction_type {
            if transaction.transaction_type != kind {
                return false;
            }
        }
        if let Some(ref account_id) = self.account_id {
            if &transaction.account_id != account_id {
                return false;
            }
        }
        if let Some(ref category_id) = self.category_id {
            if transaction.category_id.as_ref() != Some(category_id) {
                return false;
            }
        }
        if let Some(min) = self.min_amount {
            if transaction.amount < min {
                return false;
            }
        }
        if let Some(max) = self.max_amount {
            if transaction.amount > max {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStats {
    pub total_income: f64,
    pub total_expense: f64,
    /// Income minus expense over the window
    pub balance: f64,
    /// Every transaction in the window, transfers included
    pub transaction_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub category_id: String,
    pub category_name: String,
    pub total: f64,
    /// Share of total expense in the window, 0-100
    pub percentage: f64,
    pub transaction_count: u64,
}

// ---------------------------------------------------------------------------
// Budgets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetPeriod {
    Weekly,
    Monthly,
    Yearly,
}

wire_enum!(BudgetPeriod, "budget period", {
    Weekly => "WEEKLY",
    Monthly => "MONTHLY",
    Yearly => "YEARLY",
});

/// Spending limit for a period, optionally scoped to one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub id: String,
    /// `None` means the budget covers the whole wallet
    pub category_id: Option<String>,
    pub limit_amount: f64,
    pub period: BudgetPeriod,
    pub year: i32,
    /// 1-12, only meaningful for monthly budgets
    pub month: Option<u32>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBudgetDto {
    pub category_id: Option<String>,
    pub limit_amount: f64,
    pub period: BudgetPeriod,
    pub year: i32,
    pub month: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBudgetDto {
    pub limit_amount: Option<f64>,
}

/// Computed, never stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetProgress {
    pub spent: f64,
    pub remaining: f64,
    pub percentage: f64,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    /// Replies produced by the completion model
    Model,
    System,
}

wire_enum!(MessageRole, "message role", {
    User => "user",
    Model => "model",
    System => "system",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    /// Opaque to the storage layer
    pub metadata: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatMessageDto {
    pub role: MessageRole,
    pub content: String,
    pub metadata: Option<String>,
}

impl CreateChatMessageDto {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            metadata: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// One persisted setting. `value` holds JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_transaction() -> Transaction {
        Transaction {
            id: "t1".to_string(),
            amount: 50_000.0,
            transaction_type: TransactionType::Transfer,
            note: None,
            transaction_date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            account_id: "cash".to_string(),
            category_id: None,
            to_account_id: Some("bank".to_string()),
            location: None,
            attachment: None,
            is_recurring: false,
            recurring_rule: None,
            created_at: "2025-03-14T08:00:00.000Z".to_string(),
            updated_at: "2025-03-14T08:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(AccountType::EWallet.as_str(), "E_WALLET");
        assert_eq!("E_WALLET".parse::<AccountType>().unwrap(), AccountType::EWallet);
        assert_eq!(
            serde_json::to_string(&AccountType::EWallet).unwrap(),
            "\"E_WALLET\""
        );
        assert_eq!(serde_json::to_string(&MessageRole::Model).unwrap(), "\"model\"");

        let err = "LOAN".parse::<AccountType>().unwrap_err();
        assert_eq!(err.to_string(), "unknown account type 'LOAN'");
    }

    #[test]
    fn test_merged_drops_destination_for_non_transfer() {
        let original = sample_transaction();
        let changes = UpdateTransactionDto {
            transaction_type: Some(TransactionType::Expense),
            category_id: Some("food".to_string()),
            ..Default::default()
        };

        let merged = original.merged(&changes);

        assert_eq!(merged.transaction_type, TransactionType::Expense);
        assert_eq!(merged.to_account_id, None);
        assert_eq!(merged.category_id.as_deref(), Some("food"));
        assert!(original.balance_differs(&merged));
    }

    #[test]
    fn test_note_change_keeps_balance() {
        let original = sample_transaction();
        let changes = UpdateTransactionDto {
            note: Some("rent share".to_string()),
            ..Default::default()
        };

        let merged = original.merged(&changes);

        assert_eq!(merged.note.as_deref(), Some("rent share"));
        assert!(!original.balance_differs(&merged));
    }

    #[test]
    fn test_filter_matches_inclusive_dates() {
        let transaction = sample_transaction();
        let day = transaction.transaction_date;

        assert!(TransactionFilter::between(Some(day), Some(day)).matches(&transaction));
        assert!(!TransactionFilter::between(day.succ_opt(), None).matches(&transaction));

        let filter = TransactionFilter {
            transaction_type: Some(TransactionType::Expense),
            ..Default::default()
        };
        assert!(!filter.matches(&transaction));
    }

    #[test]
    fn test_transaction_serializes_camel_case() {
        let json = serde_json::to_value(sample_transaction()).unwrap();
        assert_eq!(json["type"], "TRANSFER");
        assert_eq!(json["transactionDate"], "2025-03-14");
        assert_eq!(json["toAccountId"], "bank");
    }
}
