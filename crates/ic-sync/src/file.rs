//! JSON-file stores
//!
//! Stand-ins for the browser's storage areas when running outside a
//! browser. A missing file reads as the empty/default state.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ic_core::rule::{NativeRule, RuleUpdate};
use ic_core::types::{Profile, ProfileSet};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::store::{apply_update, ProfileStore, RuleStore};

async fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) if text.trim().is_empty() => Ok(T::default()),
        Ok(text) => Ok(serde_json::from_str(&text)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let text = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, text).await?;
    Ok(())
}

// =============================================================================
// Rule file
// =============================================================================

/// Dynamic rules persisted as a JSON array of native rules.
#[derive(Debug)]
pub struct FileRuleStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileRuleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RuleStore for FileRuleStore {
    async fn dynamic_rules(&self) -> Result<Vec<NativeRule>, StoreError> {
        let _guard = self.lock.lock().await;
        read_json(&self.path).await
    }

    async fn update_dynamic_rules(&self, update: RuleUpdate) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let current: Vec<NativeRule> = read_json(&self.path).await?;
        let next = apply_update(&current, &update)?;
        write_json(&self.path, &next).await
    }
}

// =============================================================================
// Profile file
// =============================================================================

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileDocument {
    #[serde(flatten)]
    set: ProfileSet,
    #[serde(default = "default_true")]
    global_enabled: bool,
}

impl Default for ProfileDocument {
    fn default() -> Self {
        Self {
            set: ProfileSet::default(),
            global_enabled: true,
        }
    }
}

/// Profiles, the active id and the global switch in one JSON document.
#[derive(Debug)]
pub struct FileProfileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Read the whole document as a profile set.
    pub async fn load_set(&self) -> Result<ProfileSet, StoreError> {
        let _guard = self.lock.lock().await;
        let doc: ProfileDocument = read_json(&self.path).await?;
        Ok(doc.set)
    }

    /// Replace the profile set, keeping the global switch.
    pub async fn save_set(&self, set: ProfileSet) -> Result<(), StoreError> {
        self.modify(|doc| doc.set = set).await
    }

    async fn modify(&self, change: impl FnOnce(&mut ProfileDocument) + Send) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut doc: ProfileDocument = read_json(&self.path).await?;
        change(&mut doc);
        write_json(&self.path, &doc).await
    }

    async fn read(&self) -> Result<ProfileDocument, StoreError> {
        let _guard = self.lock.lock().await;
        read_json(&self.path).await
    }
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    async fn load_all_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        Ok(self.read().await?.set.profiles)
    }

    async fn save_all_profiles(&self, profiles: Vec<Profile>) -> Result<(), StoreError> {
        self.modify(|doc| doc.set.profiles = profiles).await
    }

    async fn active_profile_id(&self) -> Result<Option<String>, StoreError> {
        Ok(self.read().await?.set.active_profile_id)
    }

    async fn set_active_profile_id(&self, id: Option<String>) -> Result<(), StoreError> {
        self.modify(|doc| doc.set.active_profile_id = id).await
    }

    async fn global_enabled(&self) -> Result<bool, StoreError> {
        Ok(self.read().await?.global_enabled)
    }

    async fn set_global_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        self.modify(|doc| doc.global_enabled = enabled).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ic_core::rule::{ResourceTypes, RuleAction, RuleCondition};

    fn block(id: i32) -> NativeRule {
        NativeRule {
            id,
            priority: 3,
            action: RuleAction::Block,
            condition: RuleCondition::url_filter("ads.js", ResourceTypes::ALL),
        }
    }

    #[tokio::test]
    async fn rule_file_starts_empty_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRuleStore::new(dir.path().join("rules.json"));
        assert!(store.dynamic_rules().await.unwrap().is_empty());

        store.update_dynamic_rules(RuleUpdate::add(vec![block(10), block(11)])).await.unwrap();
        store.update_dynamic_rules(RuleUpdate::remove(vec![10])).await.unwrap();

        let reopened = FileRuleStore::new(store.path());
        let rules = reopened.dynamic_rules().await.unwrap();
        assert_eq!(rules, vec![block(11)]);
    }

    #[tokio::test]
    async fn rejected_batch_does_not_touch_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRuleStore::new(dir.path().join("rules.json"));
        store.update_dynamic_rules(RuleUpdate::add(vec![block(1)])).await.unwrap();

        assert!(store.update_dynamic_rules(RuleUpdate::add(vec![block(1)])).await.is_err());
        assert_eq!(store.dynamic_rules().await.unwrap(), vec![block(1)]);
    }

    #[tokio::test]
    async fn profile_file_keeps_switch_and_active_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProfileStore::new(dir.path().join("profiles.json"));

        assert!(store.global_enabled().await.unwrap());
        let set = store.load_set().await.unwrap();
        assert_eq!(set.profiles.len(), 1);

        store.set_global_enabled(false).await.unwrap();
        let mut updated = set.clone();
        updated.add(Profile::new("Second"));
        store.save_set(updated.clone()).await.unwrap();

        assert!(!store.global_enabled().await.unwrap());
        assert_eq!(store.load_all_profiles().await.unwrap().len(), 2);
        assert_eq!(store.active_profile_id().await.unwrap(), updated.active_profile_id);
    }

    #[tokio::test]
    async fn corrupt_profile_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let store = FileProfileStore::new(&path);
        assert!(matches!(store.load_all_profiles().await, Err(StoreError::Json(_))));
    }
}
