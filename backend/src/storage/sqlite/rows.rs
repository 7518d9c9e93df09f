//! Row to entity mapping for the SQLite backend.

use chrono::NaiveDate;
use shared::{Account, Budget, Category, ChatMessage, Setting, Transaction};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::error::{Error, Result};
use crate::storage::records::DATE_FORMAT;

pub const ACCOUNT_COLUMNS: &str =
    "id, name, type, balance, icon, color, is_active, created_at, updated_at";

pub const CATEGORY_COLUMNS: &str =
    "id, name, icon, color, type, parent_id, sort_order, is_active, created_at, updated_at";

pub const TRANSACTION_COLUMNS: &str = "id, amount, type, note, transaction_date, account_id, \
     category_id, to_account_id, location, attachment, is_recurring, recurring_rule, \
     created_at, updated_at";

pub const BUDGET_COLUMNS: &str =
    "id, category_id, limit_amount, period, year, month, created_at, updated_at";

pub const CHAT_COLUMNS: &str = "id, role, content, metadata, created_at";

pub fn parse_date(text: &str) -> Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(text, DATE_FORMAT)?)
}

pub fn account_from_row(row: &SqliteRow) -> Result<Account> {
    Ok(Account {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        account_type: row.try_get::<String, _>("type")?.parse()?,
        balance: row.try_get("balance")?,
        icon: row.try_get("icon")?,
        color: row.try_get("color")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub fn category_from_row(row: &SqliteRow) -> Result<Category> {
    Ok(Category {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        icon: row.try_get("icon")?,
        color: row.try_get("color")?,
        category_type: row.try_get::<String, _>("type")?.parse()?,
        parent_id: row.try_get("parent_id")?,
        sort_order: row.try_get("sort_order")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub fn transaction_from_row(row: &SqliteRow) -> Result<Transaction> {
    Ok(Transaction {
        id: row.try_get("id")?,
        amount: row.try_get("amount")?,
        transaction_type: row.try_get::<String, _>("type")?.parse()?,
        note: row.try_get("note")?,
        transaction_date: parse_date(&row.try_get::<String, _>("transaction_date")?)?,
        account_id: row.try_get("account_id")?,
        category_id: row.try_get("category_id")?,
        to_account_id: row.try_get("to_account_id")?,
        location: row.try_get("location")?,
        attachment: row.try_get("attachment")?,
        is_recurring: row.try_get("is_recurring")?,
        recurring_rule: row.try_get("recurring_rule")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub fn budget_from_row(row: &SqliteRow) -> Result<Budget> {
    let year: i64 = row.try_get("year")?;
    let month: Option<i64> = row.try_get("month")?;
    Ok(Budget {
        id: row.try_get("id")?,
        category_id: row.try_get("category_id")?,
        limit_amount: row.try_get("limit_amount")?,
        period: row.try_get::<String, _>("period")?.parse()?,
        year: i32::try_from(year).map_err(|_| Error::Corrupt(format!("year {}", year)))?,
        month: month
            .map(|m| u32::try_from(m).map_err(|_| Error::Corrupt(format!("month {}", m))))
            .transpose()?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub fn chat_message_from_row(row: &SqliteRow) -> Result<ChatMessage> {
    Ok(ChatMessage {
        id: row.try_get("id")?,
        role: row.try_get::<String, _>("role")?.parse()?,
        content: row.try_get("content")?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
    })
}

pub fn setting_from_row(row: &SqliteRow) -> Result<Setting> {
    Ok(Setting {
        key: row.try_get("key")?,
        value: row.try_get("value")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Map every row, stopping at the first undecodable one
pub fn map_rows<T>(rows: &[SqliteRow], f: fn(&SqliteRow) -> Result<T>) -> Result<Vec<T>> {
    rows.iter().map(f).collect()
}
