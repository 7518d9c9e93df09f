//! Signed balance effects of transactions on accounts.

use std::collections::BTreeMap;

use shared::{Transaction, TransactionType};

/// The per-account deltas a transaction applies when it exists.
///
/// Expense debits the source, income credits it, a transfer moves the amount
/// from the source to the destination.
pub fn effects(transaction: &Transaction) -> Vec<(String, f64)> {
    let amount = transaction.amount;
    match transaction.transaction_type {
        TransactionType::Expense => vec![(transaction.account_id.clone(), -amount)],
        TransactionType::Income => vec![(transaction.account_id.clone(), amount)],
        TransactionType::Transfer => {
            let mut deltas = vec![(transaction.account_id.clone(), -amount)];
            if let Some(ref destination) = transaction.to_account_id {
                deltas.push((destination.clone(), amount));
            }
            deltas
        }
    }
}

/// Net balance change for moving from `before` to `after`.
///
/// `(None, Some(t))` is a create, `(Some(t), None)` a delete and both an
/// update. Accounts whose net change is zero are left out.
pub fn net_changes(before: Option<&Transaction>, after: Option<&Transaction>) -> BTreeMap<String, f64> {
    let mut changes: BTreeMap<String, f64> = BTreeMap::new();

    if let Some(old) = before {
        for (account_id, delta) in effects(old) {
            *changes.entry(account_id).or_insert(0.0) -= delta;
        }
    }
    if let Some(new) = after {
        for (account_id, delta) in effects(new) {
            *changes.entry(account_id).or_insert(0.0) += delta;
        }
    }

    changes.retain(|_, delta| *delta != 0.0);
    changes
}

/// Every account id a transaction touches
pub fn touched_accounts(transaction: &Transaction) -> Vec<String> {
    effects(transaction).into_iter().map(|(id, _)| id).collect()
}
