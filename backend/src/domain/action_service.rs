//! Structured actions proposed by the assistant model.
//!
//! The model only proposes; this service checks the proposal against a fixed
//! vocabulary and performs it through the other services. Replies are free
//! text with at most one JSON object such as
//! `{"action": "add_expense", "params": {"amount": "40k", "category": "cà phê"}}`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared::{Category, CategoryType, CreateTransactionDto, TransactionFilter, TransactionType};
use tracing::{debug, info};

use super::account_service::AccountService;
use super::category_service::CategoryService;
use super::clock::{Clock, SystemClock};
use super::transaction_service::TransactionService;
use crate::error::{Error, Result};
use crate::storage::seed::{FALLBACK_EXPENSE_CATEGORY, FALLBACK_INCOME_CATEGORY};

const DEFAULT_LIST_LIMIT: u32 = 5;

static AMOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:[.,]\d+)?)\s*(k|tr|triệu|m)?$").expect("valid amount pattern"));

/// The whitelisted vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    AddExpense,
    AddIncome,
    GetTotalExpense,
    GetTotalIncome,
    GetBalance,
    ListTransactions,
    GetCategoryExpense,
    Chat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiAction {
    pub action: ActionKind,
    #[serde(default)]
    pub params: Value,
}

impl AiAction {
    fn param_str(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub data: Value,
    pub message: String,
}

impl ActionResult {
    fn ok(data: Value, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            message: message.into(),
        }
    }
}

/// Reporting windows understood by the query actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Today,
    ThisWeek,
    ThisMonth,
    ThisYear,
    All,
}

impl Period {
    /// Missing means this month; anything unrecognised means all time
    fn from_param(value: Option<&str>) -> Self {
        match value {
            None => Period::ThisMonth,
            Some("today") => Period::Today,
            Some("this_week") => Period::ThisWeek,
            Some("this_month") => Period::ThisMonth,
            Some("this_year") => Period::ThisYear,
            Some(_) => Period::All,
        }
    }

    /// Inclusive window ending today. The week starts on Monday.
    pub fn range(self, today: NaiveDate) -> (Option<NaiveDate>, Option<NaiveDate>) {
        let start = match self {
            Period::Today => today,
            Period::ThisWeek => {
                today - Days::new(today.weekday().num_days_from_monday() as u64)
            }
            Period::ThisMonth => today.with_day(1).unwrap_or(today),
            Period::ThisYear => today.with_ordinal(1).unwrap_or(today),
            Period::All => return (None, None),
        };
        (Some(start), Some(today))
    }

    fn label(self) -> &'static str {
        match self {
            Period::Today => "hôm nay",
            Period::ThisWeek => "tuần này",
            Period::ThisMonth => "tháng này",
            Period::ThisYear => "năm nay",
            Period::All => "từ trước đến nay",
        }
    }
}

/// Find the first JSON object in `reply` that names a known action
pub fn parse_action(reply: &str) -> Option<AiAction> {
    for (start, _) in reply.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&reply[start..]).into_iter::<Value>();
        let value = match stream.next() {
            Some(Ok(value)) => value,
            _ => continue,
        };
        if value.get("action").is_none() {
            continue;
        }
        match serde_json::from_value::<AiAction>(value) {
            Ok(action) => return Some(action),
            Err(e) => {
                debug!("Rejected action object: {}", e);
                return None;
            }
        }
    }
    None
}

/// Amounts like `40k`, `1tr`, `2m`, `1,5tr` or `50000`.
///
/// A bare string number below 1000 means thousands. JSON numbers are taken as
/// written. Returns 0 for anything unreadable.
pub fn parse_amount(input: &Value) -> f64 {
    let text = match input {
        Value::Number(n) => return n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().to_lowercase(),
        _ => return 0.0,
    };

    let Some(caps) = AMOUNT_RE.captures(&text) else {
        let digits: String = text.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
        return digits.parse().unwrap_or(0.0);
    };

    let mut amount: f64 = caps[1].replace(',', ".").parse().unwrap_or(0.0);
    match caps.get(2).map(|m| m.as_str()) {
        Some("k") => amount *= 1_000.0,
        Some("tr") | Some("triệu") | Some("m") => amount *= 1_000_000.0,
        _ if amount > 0.0 && amount < 1_000.0 => amount *= 1_000.0,
        _ => {}
    }
    amount.round()
}

/// `1234567` as `1.234.567`
fn format_amount(amount: f64) -> String {
    let digits = (amount.round() as i64).unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    if amount < 0.0 {
        out.insert(0, '-');
    }
    out
}

/// Exact name first, then containment either way, case-insensitive
fn match_category<'a>(categories: &'a [Category], query: &str) -> Option<&'a Category> {
    let query = query.to_lowercase();
    categories
        .iter()
        .find(|c| c.name.to_lowercase() == query)
        .or_else(|| {
            categories.iter().find(|c| {
                let name = c.name.to_lowercase();
                name.contains(&query) || query.contains(&name)
            })
        })
}

/// Executes assistant actions against the live services
#[derive(Clone)]
pub struct ActionService {
    transactions: TransactionService,
    accounts: AccountService,
    categories: CategoryService,
    clock: Arc<dyn Clock>,
}

impl ActionService {
    pub fn new(transactions: TransactionService, accounts: AccountService, categories: CategoryService) -> Self {
        Self::with_clock(transactions, accounts, categories, Arc::new(SystemClock))
    }

    pub fn with_clock(
        transactions: TransactionService,
        accounts: AccountService,
        categories: CategoryService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transactions,
            accounts,
            categories,
            clock,
        }
    }

    /// Parse `reply` and run the action it carries, if any
    pub async fn handle_reply(&self, reply: &str) -> Result<Option<ActionResult>> {
        match parse_action(reply) {
            Some(action) => self.execute(&action).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn execute(&self, action: &AiAction) -> Result<ActionResult> {
        info!("Executing action: {:?}", action.action);
        match action.action {
            ActionKind::AddExpense => self.add(action, TransactionType::Expense).await,
            ActionKind::AddIncome => self.add(action, TransactionType::Income).await,
            ActionKind::GetTotalExpense => self.total_expense(action, false).await,
            ActionKind::GetCategoryExpense => self.total_expense(action, true).await,
            ActionKind::GetTotalIncome => self.total_income(action).await,
            ActionKind::GetBalance => {
                let balance = self.accounts.get_total_balance().await?;
                Ok(ActionResult::ok(
                    json!({ "balance": balance }),
                    format!("Số dư hiện tại: {}đ 💳", format_amount(balance)),
                ))
            }
            ActionKind::ListTransactions => self.list(action).await,
            ActionKind::Chat => {
                let message = action
                    .param_str("message")
                    .unwrap_or("Xin chào! Tôi có thể giúp gì cho bạn? 😊");
                Ok(ActionResult::ok(Value::Null, message))
            }
        }
    }

    async fn add(&self, action: &AiAction, kind: TransactionType) -> Result<ActionResult> {
        let amount = action.params.get("amount").map(parse_amount).unwrap_or(0.0);
        if amount <= 0.0 {
            return Ok(ActionResult::failed("Số tiền không hợp lệ"));
        }

        let query = action.param_str("category");
        let (category_type, fallback) = match kind {
            TransactionType::Income => (CategoryType::Income, FALLBACK_INCOME_CATEGORY),
            _ => {
                if query.is_none() {
                    return Ok(ActionResult::failed("Thiếu danh mục"));
                }
                (CategoryType::Expense, FALLBACK_EXPENSE_CATEGORY)
            }
        };

        let candidates = self.categories.get_categories_by_type(category_type).await?;
        let matched = query.and_then(|q| match_category(&candidates, q));
        let category_id = matched.map_or(fallback, |c| c.id.as_str()).to_string();
        let category_name = match (matched, query) {
            (Some(c), _) => c.name.clone(),
            (None, Some(q)) => q.to_string(),
            (None, None) => "Thu nhập".to_string(),
        };

        let Some(account) = self.accounts.get_all_accounts().await?.into_iter().next() else {
            return Ok(ActionResult::failed("Chưa có tài khoản nào"));
        };

        let dto = CreateTransactionDto {
            amount,
            transaction_type: kind,
            note: action.param_str("note").map(str::to_string),
            transaction_date: Some(self.clock.today()),
            account_id: account.id.clone(),
            category_id: Some(category_id.clone()),
            to_account_id: None,
            location: None,
            attachment: None,
        };
        let transaction = match self.transactions.create_transaction(dto).await {
            Ok(transaction) => transaction,
            Err(Error::Validation(e)) => return Ok(ActionResult::failed(e.to_string())),
            Err(e) => return Err(e),
        };

        let message = match kind {
            TransactionType::Income => format!("Đã ghi thu {}đ 💰", format_amount(amount)),
            _ => format!("Đã ghi chi {}đ vào {} 💸", format_amount(amount), category_name),
        };
        Ok(ActionResult::ok(
            json!({
                "amount": amount,
                "category": category_name,
                "categoryId": category_id,
                "transactionId": transaction.id,
                "accountId": account.id,
            }),
            message,
        ))
    }

    async fn total_expense(&self, action: &AiAction, require_category: bool) -> Result<ActionResult> {
        let period = Period::from_param(action.param_str("period"));
        let (start, end) = period.range(self.clock.today());

        let Some(query) = action.param_str("category") else {
            if require_category {
                return Ok(ActionResult::failed("Thiếu tên danh mục"));
            }
            let stats = self.transactions.get_transaction_stats(start, end).await?;
            return Ok(ActionResult::ok(
                json!({ "total": stats.total_expense, "stats": stats }),
                format!("Bạn đã chi {}đ {} 📊", format_amount(stats.total_expense), period.label()),
            ));
        };

        let needle = query.to_lowercase();
        let rows: Vec<_> = self
            .transactions
            .get_category_stats(start, end)
            .await?
            .into_iter()
            .filter(|row| row.category_name.to_lowercase().contains(&needle))
            .collect();
        let total: f64 = rows.iter().map(|row| row.total).sum();
        let count: u64 = rows.iter().map(|row| row.transaction_count).sum();

        Ok(ActionResult::ok(
            json!({ "total": total, "count": count, "category": query, "categories": rows }),
            format!(
                "Chi tiêu {}: {}đ ({} giao dịch) {} 📈",
                query,
                format_amount(total),
                count,
                period.label()
            ),
        ))
    }

    async fn total_income(&self, action: &AiAction) -> Result<ActionResult> {
        let period = Period::from_param(action.param_str("period"));
        let (start, end) = period.range(self.clock.today());
        let stats = self.transactions.get_transaction_stats(start, end).await?;

        Ok(ActionResult::ok(
            json!({ "total": stats.total_income, "stats": stats }),
            format!("Bạn đã thu {}đ {} 💵", format_amount(stats.total_income), period.label()),
        ))
    }

    async fn list(&self, action: &AiAction) -> Result<ActionResult> {
        let period = Period::from_param(action.param_str("period"));
        let (start, end) = period.range(self.clock.today());
        let limit = action
            .params
            .get("limit")
            .and_then(Value::as_u64)
            .filter(|n| *n > 0)
            .map_or(DEFAULT_LIST_LIMIT, |n| n.min(u32::MAX as u64) as u32);

        let mut filter = TransactionFilter::between(start, end);
        filter.transaction_type = match action.param_str("type") {
            Some("expense") => Some(TransactionType::Expense),
            Some("income") => Some(TransactionType::Income),
            _ => None,
        };

        let categories = self.categories.get_all_categories().await?;
        let names: HashMap<&str, &str> = categories
            .iter()
            .map(|c| (c.id.as_str(), c.name.as_str()))
            .collect();

        let wanted: Option<HashSet<&str>> = action.param_str("category").map(|query| {
            let needle = query.to_lowercase();
            categories
                .iter()
                .filter(|c| c.name.to_lowercase().contains(&needle))
                .map(|c| c.id.as_str())
                .collect()
        });

        if wanted.is_none() {
            filter.limit = Some(limit);
        }
        let transactions: Vec<_> = self
            .transactions
            .get_transactions(&filter)
            .await?
            .into_iter()
            .filter(|t| match (&wanted, t.category_id.as_deref()) {
                (None, _) => true,
                (Some(ids), Some(id)) => ids.contains(id),
                (Some(_), None) => false,
            })
            .take(limit as usize)
            .collect();

        if transactions.is_empty() {
            return Ok(ActionResult::ok(
                json!({ "transactions": [], "count": 0 }),
                "Không có giao dịch nào 📭",
            ));
        }

        let lines: Vec<String> = transactions
            .iter()
            .map(|t| {
                let sign = if t.transaction_type == TransactionType::Income { '+' } else { '-' };
                let name = t
                    .category_id
                    .as_deref()
                    .map(|id| names.get(id).copied().unwrap_or(id))
                    .unwrap_or("Chuyển khoản");
                format!("• {}{}đ ({})", sign, format_amount(t.amount), name)
            })
            .collect();

        Ok(ActionResult::ok(
            json!({ "count": transactions.len(), "transactions": transactions }),
            format!("📋 {} giao dịch gần nhất:\n{}", transactions.len(), lines.join("\n")),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendKind, StorageConfig};
    use crate::domain::clock::FixedClock;
    use crate::storage::{AccountStorage, Database, TransactionStorage};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()
    }

    async fn setup_test() -> (ActionService, Database) {
        let db = Database::open(&StorageConfig::in_memory(BackendKind::ObjectStore))
            .await
            .expect("Failed to open test database");
        let service = ActionService::with_clock(
            TransactionService::new(db.transactions(), db.categories()),
            AccountService::new(db.accounts()),
            CategoryService::new(db.categories()),
            Arc::new(FixedClock(today())),
        );
        (service, db)
    }

    fn action(kind: ActionKind, params: Value) -> AiAction {
        AiAction { action: kind, params }
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(&json!("40k")), 40_000.0);
        assert_eq!(parse_amount(&json!("1tr")), 1_000_000.0);
        assert_eq!(parse_amount(&json!("1,5 triệu")), 1_500_000.0);
        assert_eq!(parse_amount(&json!("2M")), 2_000_000.0);
        assert_eq!(parse_amount(&json!("50000")), 50_000.0);
        assert_eq!(parse_amount(&json!("40")), 40_000.0);
        assert_eq!(parse_amount(&json!(40)), 40.0);
        assert_eq!(parse_amount(&json!("abc")), 0.0);
        assert_eq!(parse_amount(&Value::Null), 0.0);
    }

    #[test]
    fn test_parse_action_from_prose() {
        let reply = r#"Ok nhé! {"action": "add_expense", "params": {"amount": "40k", "category": "cà phê"}} xong"#;
        let parsed = parse_action(reply).unwrap();
        assert_eq!(parsed.action, ActionKind::AddExpense);
        assert_eq!(parsed.param_str("category"), Some("cà phê"));

        let nested = r#"{"note": {"x": 1}, "action": "get_balance"}"#;
        assert_eq!(parse_action(nested).unwrap().action, ActionKind::GetBalance);

        assert!(parse_action("just text").is_none());
        assert!(parse_action(r#"{"action": "drop_tables"}"#).is_none());
    }

    #[test]
    fn test_period_ranges() {
        let d = |m, day| NaiveDate::from_ymd_opt(2024, m, day);
        assert_eq!(Period::Today.range(today()), (d(6, 12), d(6, 12)));
        assert_eq!(Period::ThisWeek.range(today()), (d(6, 10), d(6, 12)));
        assert_eq!(Period::ThisMonth.range(today()), (d(6, 1), d(6, 12)));
        assert_eq!(Period::ThisYear.range(today()), (d(1, 1), d(6, 12)));
        assert_eq!(Period::All.range(today()), (None, None));
        assert_eq!(Period::from_param(None), Period::ThisMonth);
        assert_eq!(Period::from_param(Some("decade")), Period::All);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(40_000.0), "40.000");
        assert_eq!(format_amount(1_234_567.0), "1.234.567");
        assert_eq!(format_amount(-950.0), "-950");
    }

    #[tokio::test]
    async fn test_add_expense_matches_category() {
        let (service, db) = setup_test().await;

        let result = service
            .execute(&action(
                ActionKind::AddExpense,
                json!({"amount": "40k", "category": "cà phê", "note": "sáng"}),
            ))
            .await
            .unwrap();

        assert!(result.success, "{}", result.message);
        assert_eq!(result.data["categoryId"], json!("food_coffee"));
        let cash = db.accounts().find_active().await.unwrap()[0].clone();
        assert_eq!(cash.balance, -40_000.0);

        let stored = db
            .transactions()
            .find_by_id(result.data["transactionId"].as_str().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.transaction_date, today());
        assert_eq!(stored.note.as_deref(), Some("sáng"));
    }

    #[tokio::test]
    async fn test_add_falls_back_and_rejects() {
        let (service, _) = setup_test().await;

        let result = service
            .execute(&action(ActionKind::AddExpense, json!({"amount": 15, "category": "vé số"})))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.data["categoryId"], json!(FALLBACK_EXPENSE_CATEGORY));

        let result = service
            .execute(&action(ActionKind::AddIncome, json!({"amount": "10tr"})))
            .await
            .unwrap();
        assert_eq!(result.data["categoryId"], json!(FALLBACK_INCOME_CATEGORY));

        let result = service
            .execute(&action(ActionKind::AddExpense, json!({"amount": "0", "category": "food"})))
            .await
            .unwrap();
        assert!(!result.success);

        let result = service
            .execute(&action(ActionKind::AddExpense, json!({"amount": "5k"})))
            .await
            .unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_queries() {
        let (service, _) = setup_test().await;
        for params in [
            json!({"amount": "40k", "category": "Cà phê"}),
            json!({"amount": "100k", "category": "Xăng xe"}),
        ] {
            service.execute(&action(ActionKind::AddExpense, params)).await.unwrap();
        }
        service
            .execute(&action(ActionKind::AddIncome, json!({"amount": "2tr", "category": "Lương"})))
            .await
            .unwrap();

        let result = service
            .execute(&action(ActionKind::GetTotalExpense, json!({"period": "today"})))
            .await
            .unwrap();
        assert_eq!(result.data["total"], json!(140_000.0));

        let result = service
            .execute(&action(ActionKind::GetCategoryExpense, json!({"category": "xăng"})))
            .await
            .unwrap();
        assert_eq!(result.data["total"], json!(100_000.0));
        assert_eq!(result.data["count"], json!(1));

        let result = service
            .execute(&action(ActionKind::GetCategoryExpense, json!({})))
            .await
            .unwrap();
        assert!(!result.success);

        let result = service
            .execute(&action(ActionKind::GetTotalIncome, Value::Null))
            .await
            .unwrap();
        assert_eq!(result.data["total"], json!(2_000_000.0));

        let result = service
            .execute(&action(ActionKind::GetBalance, Value::Null))
            .await
            .unwrap();
        assert_eq!(result.data["balance"], json!(1_860_000.0));

        let result = service
            .execute(&action(ActionKind::ListTransactions, json!({"type": "expense", "limit": 1})))
            .await
            .unwrap();
        assert_eq!(result.data["count"], json!(1));
        assert!(result.message.contains("Xăng xe"));
    }

    #[tokio::test]
    async fn test_handle_reply_without_action() {
        let (service, _) = setup_test().await;
        assert!(service.handle_reply("chỉ là lời chào").await.unwrap().is_none());

        let result = service
            .handle_reply(r#"{"action": "chat", "params": {"message": "Chào bạn"}}"#)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.message, "Chào bạn");
    }
}
