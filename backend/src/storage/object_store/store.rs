//! Generic keyed object store with secondary indexes.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::{Account, Budget, Category, ChatMessage, Setting, Transaction};
use tracing::debug;

use crate::error::Result;
use crate::storage::records::format_date;

/// Index value used for an absent optional field
pub const NONE_KEY: &str = "";

/// A record that can live in an [`ObjectStore`]
pub trait StoredObject: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Snapshot file stem
    const STORE: &'static str;

    fn key(&self) -> &str;

    /// `(index name, value)` pairs maintained for this record
    fn index_entries(&self) -> Vec<(&'static str, String)>;
}

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

fn optional(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| NONE_KEY.to_string())
}

impl StoredObject for Account {
    const STORE: &'static str = "accounts";

    fn key(&self) -> &str {
        &self.id
    }

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("type", self.account_type.as_str().to_string()),
            ("is_active", flag(self.is_active)),
        ]
    }
}

impl StoredObject for Category {
    const STORE: &'static str = "categories";

    fn key(&self) -> &str {
        &self.id
    }

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("type", self.category_type.as_str().to_string()),
            ("parent_id", optional(&self.parent_id)),
            ("is_active", flag(self.is_active)),
        ]
    }
}

impl StoredObject for Transaction {
    const STORE: &'static str = "transactions";

    fn key(&self) -> &str {
        &self.id
    }

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = vec![
            ("transaction_date", format_date(self.transaction_date)),
            ("account_id", self.account_id.clone()),
            ("type", self.transaction_type.as_str().to_string()),
        ];
        if let Some(ref category_id) = self.category_id {
            entries.push(("category_id", category_id.clone()));
        }
        if let Some(ref to_account_id) = self.to_account_id {
            entries.push(("to_account_id", to_account_id.clone()));
        }
        entries
    }
}

impl StoredObject for Budget {
    const STORE: &'static str = "budgets";

    fn key(&self) -> &str {
        &self.id
    }

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        vec![("category_id", optional(&self.category_id))]
    }
}

impl StoredObject for ChatMessage {
    const STORE: &'static str = "chat_messages";

    fn key(&self) -> &str {
        &self.id
    }

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        vec![("created_at", self.created_at.clone())]
    }
}

impl StoredObject for Setting {
    const STORE: &'static str = "settings";

    fn key(&self) -> &str {
        &self.key
    }

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

type Index = BTreeMap<String, BTreeSet<String>>;

/// Rows keyed by primary key, plus one index per name mapping value to keys.
#[derive(Debug, Clone)]
pub struct ObjectStore<T: StoredObject> {
    rows: BTreeMap<String, T>,
    indexes: BTreeMap<&'static str, Index>,
}

impl<T: StoredObject> Default for ObjectStore<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            indexes: BTreeMap::new(),
        }
    }
}

impl<T: StoredObject> ObjectStore<T> {
    pub fn from_rows(rows: Vec<T>) -> Self {
        let mut store = Self::default();
        for row in rows {
            store.put(row);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.rows.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.rows.contains_key(key)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    /// Insert or replace, keeping every index in step
    pub fn put(&mut self, row: T) {
        let key = row.key().to_string();
        self.unindex(&key);
        for (name, value) in row.index_entries() {
            self.indexes
                .entry(name)
                .or_default()
                .entry(value)
                .or_default()
                .insert(key.clone());
        }
        self.rows.insert(key, row);
    }

    pub fn remove(&mut self, key: &str) -> Option<T> {
        self.unindex(key);
        self.rows.remove(key)
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.indexes.clear();
    }

    /// Records whose `index` equals `value`
    pub fn get_all_from_index(&self, index: &str, value: &str) -> Vec<&T> {
        self.indexes
            .get(index)
            .and_then(|idx| idx.get(value))
            .map(|keys| keys.iter().filter_map(|k| self.rows.get(k)).collect())
            .unwrap_or_default()
    }

    /// Records whose `index` falls in `[from, to]`
    pub fn get_range_from_index(&self, index: &str, from: &str, to: &str) -> Vec<&T> {
        if from > to {
            return Vec::new();
        }
        self.indexes
            .get(index)
            .map(|idx| {
                idx.range(from.to_string()..=to.to_string())
                    .flat_map(|(_, keys)| keys.iter())
                    .filter_map(|k| self.rows.get(k))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn unindex(&mut self, key: &str) {
        let Some(existing) = self.rows.get(key) else {
            return;
        };
        for (name, value) in existing.index_entries() {
            if let Some(idx) = self.indexes.get_mut(name) {
                if let Some(keys) = idx.get_mut(&value) {
                    keys.remove(key);
                    if keys.is_empty() {
                        idx.remove(&value);
                    }
                }
            }
        }
    }

    fn snapshot_path(dir: &Path) -> PathBuf {
        dir.join(format!("{}.yaml", T::STORE))
    }

    /// Load `<dir>/<store>.yaml`, or an empty store when the file is missing
    pub fn load(dir: &Path) -> Result<Self> {
        let path = Self::snapshot_path(dir);
        if !path.exists() {
            debug!(store = T::STORE, "No snapshot found, starting empty");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let rows: Vec<T> = if content.trim().is_empty() {
            Vec::new()
        } else {
            serde_yaml::from_str(&content)?
        };
        debug!(store = T::STORE, rows = rows.len(), "Loaded snapshot");
        Ok(Self::from_rows(rows))
    }

    /// Write the snapshot atomically through a temp file
    pub fn save(&self, dir: &Path) -> Result<()> {
        self.stage(dir)?.commit()
    }

    /// Write the snapshot to its temp file without replacing the current one
    pub fn stage(&self, dir: &Path) -> Result<StagedSnapshot> {
        let path = Self::snapshot_path(dir);
        let rows: Vec<&T> = self.rows.values().collect();
        let content = serde_yaml::to_string(&rows)?;

        let temp_path = path.with_extension("yaml.tmp");
        fs::write(&temp_path, content)?;
        Ok(StagedSnapshot { temp_path, path })
    }
}

/// A snapshot written next to its file but not yet moved into place
#[derive(Debug)]
pub struct StagedSnapshot {
    temp_path: PathBuf,
    path: PathBuf,
}

impl StagedSnapshot {
    pub fn commit(self) -> Result<()> {
        fs::rename(&self.temp_path, &self.path)?;
        Ok(())
    }

    pub fn discard(self) {
        if let Err(e) = fs::remove_file(&self.temp_path) {
            debug!(path = %self.temp_path.display(), error = %e, "Could not remove staged snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::records::new_account;
    use shared::{AccountType, CreateAccountDto};
    use tempfile::TempDir;

    #[test]
    fn test_index_follows_updates() {
        let mut store = ObjectStore::default();
        let mut account = new_account(CreateAccountDto::new("Wallet", AccountType::Cash));
        store.put(account.clone());
        assert_eq!(store.get_all_from_index("is_active", "1").len(), 1);

        account.is_active = false;
        store.put(account.clone());
        assert!(store.get_all_from_index("is_active", "1").is_empty());
        assert_eq!(store.get_all_from_index("is_active", "0").len(), 1);

        store.remove(&account.id);
        assert!(store.get_all_from_index("is_active", "0").is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut store = ObjectStore::default();
        let account = new_account(CreateAccountDto::new("Bank", AccountType::Bank));
        store.put(account.clone());

        store.save(dir.path()).unwrap();
        let loaded: ObjectStore<Account> = ObjectStore::load(dir.path()).unwrap();

        assert_eq!(loaded.get(&account.id), Some(&account));
        assert_eq!(loaded.get_all_from_index("type", "BANK").len(), 1);
        assert!(!dir.path().join("accounts.yaml.tmp").exists());
    }

    #[test]
    fn test_discarded_stage_keeps_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let mut store = ObjectStore::default();
        store.put(new_account(CreateAccountDto::new("Bank", AccountType::Bank)));
        store.save(dir.path()).unwrap();

        store.put(new_account(CreateAccountDto::new("Cash", AccountType::Cash)));
        store.stage(dir.path()).unwrap().discard();

        let loaded: ObjectStore<Account> = ObjectStore::load(dir.path()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(!dir.path().join("accounts.yaml.tmp").exists());
    }

    #[test]
    fn test_missing_snapshot_is_empty() {
        let dir = TempDir::new().unwrap();
        let loaded: ObjectStore<Account> = ObjectStore::load(dir.path()).unwrap();
        assert!(loaded.is_empty());
    }
}
