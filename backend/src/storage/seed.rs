//! Default data written into empty tables on first start.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde_json::{json, Value};
use shared::{AccountType, Category, CategoryType, CreateAccountDto};
use tracing::info;

use crate::error::Result;
use crate::storage::records::now_timestamp;
use crate::storage::traits::{AccountStorage, CategoryStorage, SettingsStorage};

/// One entry of the built-in category catalog
#[derive(Debug, Clone, Copy)]
pub struct SeedCategory {
    pub id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
    pub category_type: CategoryType,
    pub parent_id: Option<&'static str>,
    pub sort_order: i64,
}

const fn expense(
    id: &'static str,
    name: &'static str,
    icon: &'static str,
    color: &'static str,
    parent_id: Option<&'static str>,
    sort_order: i64,
) -> SeedCategory {
    SeedCategory {
        id,
        name,
        icon,
        color,
        category_type: CategoryType::Expense,
        parent_id,
        sort_order,
    }
}

const fn income(id: &'static str, name: &'static str, icon: &'static str, sort_order: i64) -> SeedCategory {
    SeedCategory {
        id,
        name,
        icon,
        color: "#10b981",
        category_type: CategoryType::Income,
        parent_id: None,
        sort_order,
    }
}

pub const DEFAULT_CATEGORIES: [SeedCategory; 29] = [
    expense("food", "Ăn uống", "🍔", "#ef4444", None, 1),
    expense("food_market", "Đi chợ", "🛒", "#ef4444", Some("food"), 1),
    expense("food_restaurant", "Nhà hàng", "🍽️", "#ef4444", Some("food"), 2),
    expense("food_coffee", "Cà phê/Trà", "☕", "#ef4444", Some("food"), 3),
    expense("transport", "Di chuyển", "🚗", "#f59e0b", None, 2),
    expense("transport_gas", "Xăng xe", "⛽", "#f59e0b", Some("transport"), 1),
    expense("transport_grab", "Grab/Taxi", "🚕", "#f59e0b", Some("transport"), 2),
    expense("transport_parking", "Gửi xe", "🅿️", "#f59e0b", Some("transport"), 3),
    expense("shopping", "Mua sắm", "🛍️", "#3b82f6", None, 3),
    expense("shopping_clothes", "Quần áo", "👕", "#3b82f6", Some("shopping"), 1),
    expense("shopping_electronics", "Điện tử", "📱", "#3b82f6", Some("shopping"), 2),
    expense("bills", "Hoá đơn", "🧾", "#8b5cf6", None, 4),
    expense("bills_electric", "Tiền điện", "⚡", "#8b5cf6", Some("bills"), 1),
    expense("bills_water", "Tiền nước", "💧", "#8b5cf6", Some("bills"), 2),
    expense("bills_internet", "Internet", "📶", "#8b5cf6", Some("bills"), 3),
    expense("bills_phone", "Điện thoại", "📞", "#8b5cf6", Some("bills"), 4),
    expense("entertainment", "Giải trí", "🎬", "#ec4899", None, 5),
    expense("health", "Sức khoẻ", "💊", "#14b8a6", None, 6),
    expense("education", "Giáo dục", "📚", "#6366f1", None, 7),
    expense("home", "Nhà cửa", "🏠", "#84cc16", None, 8),
    expense("personal", "Cá nhân", "👤", "#f97316", None, 9),
    expense("other_expense", "Khác", "📦", "#64748b", None, 99),
    income("salary", "Lương", "💰", 1),
    income("bonus", "Thưởng", "🎁", 2),
    income("investment", "Đầu tư", "📈", 3),
    income("freelance", "Freelance", "💻", 4),
    income("gift", "Quà tặng", "🎀", 5),
    income("refund", "Hoàn tiền", "↩️", 6),
    income("other_income", "Khác", "💵", 99),
];

/// Fallback categories for uncategorised expense and income
pub const FALLBACK_EXPENSE_CATEGORY: &str = "other_expense";
pub const FALLBACK_INCOME_CATEGORY: &str = "salary";

/// Display defaults for each account type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountTypeConfig {
    pub name: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
}

pub fn account_type_config(account_type: AccountType) -> AccountTypeConfig {
    let (name, icon, color) = match account_type {
        AccountType::Cash => ("Tiền mặt", "💵", "#10b981"),
        AccountType::Bank => ("Ngân hàng", "🏦", "#3b82f6"),
        AccountType::Credit => ("Thẻ tín dụng", "💳", "#8b5cf6"),
        AccountType::EWallet => ("Ví điện tử", "📱", "#f59e0b"),
        AccountType::Fund => ("Quỹ tiết kiệm", "🐷", "#ec4899"),
    };
    AccountTypeConfig { name, icon, color }
}

/// Account types created on first start, each at zero balance
pub const DEFAULT_ACCOUNT_TYPES: [AccountType; 2] = [AccountType::Cash, AccountType::Bank];

/// Compiled-in settings, merged under whatever the user has stored
pub static DEFAULT_SETTINGS: Lazy<BTreeMap<&'static str, Value>> = Lazy::new(|| {
    BTreeMap::from([
        ("persona", json!("friendly")),
        ("monthlyLimit", json!(15_000_000)),
        ("currency", json!("VND")),
        ("language", json!("vi")),
        ("theme", json!("system")),
        ("firstDayOfWeek", json!(1)),
        ("firstDayOfMonth", json!(1)),
    ])
});

/// Number of rows written per table by one [`seed_defaults`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub categories: usize,
    pub accounts: usize,
    pub settings: usize,
}

pub fn default_categories() -> Vec<Category> {
    let now = now_timestamp();
    DEFAULT_CATEGORIES
        .iter()
        .map(|seed| Category {
            id: seed.id.to_string(),
            name: seed.name.to_string(),
            icon: Some(seed.icon.to_string()),
            color: Some(seed.color.to_string()),
            category_type: seed.category_type,
            parent_id: seed.parent_id.map(str::to_string),
            sort_order: seed.sort_order,
            is_active: true,
            created_at: now.clone(),
            updated_at: now.clone(),
        })
        .collect()
}

/// Populate each empty table. Tables are checked independently, so a
/// database with accounts but no categories still gets the catalog.
pub async fn seed_defaults(
    accounts: &dyn AccountStorage,
    categories: &dyn CategoryStorage,
    settings: &dyn SettingsStorage,
) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    if categories.count().await? == 0 {
        let catalog = default_categories();
        report.categories = catalog.len();
        categories.insert_many(catalog).await?;
    }

    if accounts.count().await? == 0 {
        for account_type in DEFAULT_ACCOUNT_TYPES {
            let config = account_type_config(account_type);
            accounts
                .create(CreateAccountDto {
                    name: config.name.to_string(),
                    account_type,
                    balance: Some(0.0),
                    icon: Some(config.icon.to_string()),
                    color: Some(config.color.to_string()),
                })
                .await?;
            report.accounts += 1;
        }
    }

    if settings.count().await? == 0 {
        for (key, value) in DEFAULT_SETTINGS.iter() {
            settings.set(key, &serde_json::to_string(value)?).await?;
            report.settings += 1;
        }
    }

    if report != SeedReport::default() {
        info!(
            categories = report.categories,
            accounts = report.accounts,
            settings = report.settings,
            "Seeded default data"
        );
    }
    Ok(report)
}
