//! Record construction and merge rules shared by both backends.
//!
//! Both backends build new rows and apply partial updates through these
//! helpers, so ids, defaults, timestamps and orderings never diverge.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{Local, NaiveDate, SecondsFormat, TimeZone, Utc};
use shared::{
    Account, Budget, Category, ChatMessage, CreateAccountDto, CreateBudgetDto,
    CreateCategoryDto, CreateChatMessageDto, CreateTransactionDto, Transaction, TransactionType,
    UpdateAccountDto, UpdateBudgetDto, UpdateCategoryDto,
};
use uuid::Uuid;

/// Last timestamp handed out, in Unix milliseconds
static LAST_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Wire format of every stored `transaction_date`
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// RFC 3339 UTC timestamp with millisecond precision.
///
/// Strictly increasing within the process: two calls in the same millisecond
/// get consecutive values, so `created_at` ordering matches insertion order.
pub fn now_timestamp() -> String {
    let wall = Utc::now().timestamp_millis();
    let mut last = LAST_MILLIS.load(Ordering::Relaxed);
    loop {
        let next = if wall > last { wall } else { last + 1 };
        match LAST_MILLIS.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return format_millis(next),
            Err(actual) => last = actual,
        }
    }
}

fn format_millis(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Local calendar date, used when a transaction has no explicit date
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn new_account(dto: CreateAccountDto) -> Account {
    let now = now_timestamp();
    Account {
        id: new_id(),
        name: dto.name,
        account_type: dto.account_type,
        balance: dto.balance.unwrap_or(0.0),
        icon: dto.icon,
        color: dto.color,
        is_active: true,
        created_at: now.clone(),
        updated_at: now,
    }
}

pub fn merge_account(account: &mut Account, dto: UpdateAccountDto) {
    if let Some(name) = dto.name {
        account.name = name;
    }
    if let Some(account_type) = dto.account_type {
        account.account_type = account_type;
    }
    if let Some(icon) = dto.icon {
        account.icon = Some(icon);
    }
    if let Some(color) = dto.color {
        account.color = Some(color);
    }
    account.updated_at = now_timestamp();
}

pub fn new_category(dto: CreateCategoryDto) -> Category {
    let now = now_timestamp();
    Category {
        id: new_id(),
        name: dto.name,
        icon: dto.icon,
        color: dto.color,
        category_type: dto.category_type,
        parent_id: dto.parent_id,
        sort_order: dto.sort_order.unwrap_or(0),
        is_active: true,
        created_at: now.clone(),
        updated_at: now,
    }
}

pub fn merge_category(category: &mut Category, dto: UpdateCategoryDto) {
    if let Some(name) = dto.name {
        category.name = name;
    }
    if let Some(icon) = dto.icon {
        category.icon = Some(icon);
    }
    if let Some(color) = dto.color {
        category.color = Some(color);
    }
    if let Some(parent_id) = dto.parent_id {
        category.parent_id = Some(parent_id);
    }
    if let Some(sort_order) = dto.sort_order {
        category.sort_order = sort_order;
    }
    category.updated_at = now_timestamp();
}

pub fn new_transaction(dto: CreateTransactionDto) -> Transaction {
    let now = now_timestamp();
    let to_account_id = match dto.transaction_type {
        TransactionType::Transfer => dto.to_account_id,
        _ => None,
    };
    Transaction {
        id: new_id(),
        amount: dto.amount,
        transaction_type: dto.transaction_type,
        note: dto.note,
        transaction_date: dto.transaction_date.unwrap_or_else(today),
        account_id: dto.account_id,
        category_id: dto.category_id,
        to_account_id,
        location: dto.location,
        attachment: dto.attachment,
        is_recurring: false,
        recurring_rule: None,
        created_at: now.clone(),
        updated_at: now,
    }
}

pub fn new_budget(dto: CreateBudgetDto) -> Budget {
    let now = now_timestamp();
    Budget {
        id: new_id(),
        category_id: dto.category_id,
        limit_amount: dto.limit_amount,
        period: dto.period,
        year: dto.year,
        month: dto.month,
        created_at: now.clone(),
        updated_at: now,
    }
}

pub fn merge_budget(budget: &mut Budget, dto: UpdateBudgetDto) {
    if let Some(limit_amount) = dto.limit_amount {
        budget.limit_amount = limit_amount;
    }
    budget.updated_at = now_timestamp();
}

pub fn new_chat_message(dto: CreateChatMessageDto) -> ChatMessage {
    ChatMessage {
        id: new_id(),
        role: dto.role,
        content: dto.content,
        metadata: dto.metadata,
        created_at: now_timestamp(),
    }
}

pub fn cmp_accounts(a: &Account, b: &Account) -> CmpOrdering {
    a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
}

pub fn cmp_categories(a: &Category, b: &Category) -> CmpOrdering {
    a.sort_order.cmp(&b.sort_order).then_with(|| a.id.cmp(&b.id))
}

/// Newest first
pub fn cmp_transactions(a: &Transaction, b: &Transaction) -> CmpOrdering {
    b.transaction_date
        .cmp(&a.transaction_date)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| b.id.cmp(&a.id))
}

pub fn cmp_budgets(a: &Budget, b: &Budget) -> CmpOrdering {
    a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
}

pub fn cmp_chat_messages(a: &ChatMessage, b: &ChatMessage) -> CmpOrdering {
    a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
}
