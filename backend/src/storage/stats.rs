use shared::{CategoryStats, TransactionStats};

const UNKNOWN_CATEGORY: &str = "Unknown";

/// Totals are accumulated in hundredths as integers, so they do not depend
/// on the order rows are visited in.
const MINOR_PER_UNIT: f64 = 100.0;

/// SQL expression for `column` in minor units, rounded the same way as
/// [`to_minor`]
pub fn sql_minor(column: &str) -> String {
    format!("CAST(ROUND({} * 100) AS INTEGER)", column)
}

pub fn to_minor(amount: f64) -> i64 {
    (amount * MINOR_PER_UNIT).round() as i64
}

pub fn from_minor(minor: i64) -> f64 {
    minor as f64 / MINOR_PER_UNIT
}

/// Expense total for one category before ranking
#[derive(Debug, Clone)]
pub struct CategoryTotal {
    pub category_id: String,
    /// `None` when the category row no longer exists
    pub category_name: Option<String>,
    /// Minor units
    pub total: i64,
    pub count: u64,
}

/// Build the stats from income and expense totals in minor units
pub fn summarize(income_minor: i64, expense_minor: i64, transaction_count: u64) -> TransactionStats {
    TransactionStats {
        total_income: from_minor(income_minor),
        total_expense: from_minor(expense_minor),
        balance: from_minor(income_minor - expense_minor),
        transaction_count,
    }
}

/// Attach percentages of the grand total and order largest first, ties by id
pub fn rank_categories(mut totals: Vec<CategoryTotal>) -> Vec<CategoryStats> {
    let grand_total: i64 = totals.iter().map(|t| t.total).sum();

    totals.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.category_id.cmp(&b.category_id))
    });

    totals
        .into_iter()
        .map(|t| CategoryStats {
            percentage: if grand_total > 0 {
                t.total as f64 / grand_total as f64 * 100.0
            } else {
                0.0
            },
            category_name: t.category_name.unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
            category_id: t.category_id,
            total: from_minor(t.total),
            transaction_count: t.count,
        })
        .collect()
}
