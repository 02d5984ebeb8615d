//! Collaborator interfaces
//!
//! The synchronizer talks to three external parties: the live rule store,
//! the persisted profile store, and the UI notification channel. Each is a
//! trait so hosts can plug in their own backend; the in-memory versions
//! here back the tests and can simulate a store that applies removals late.

use std::collections::HashSet;

use async_trait::async_trait;
use ic_core::rule::{NativeRule, RuleUpdate};
use ic_core::types::{Profile, ProfileSet};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::StoreError;

// =============================================================================
// Traits
// =============================================================================

/// The host's live declarative rule store.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Currently installed dynamic rules.
    async fn dynamic_rules(&self) -> Result<Vec<NativeRule>, StoreError>;

    /// Apply `update` atomically: either every removal and addition lands or
    /// none does.
    async fn update_dynamic_rules(&self, update: RuleUpdate) -> Result<(), StoreError>;
}

/// Persistent profile storage.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn load_all_profiles(&self) -> Result<Vec<Profile>, StoreError>;
    async fn save_all_profiles(&self, profiles: Vec<Profile>) -> Result<(), StoreError>;
    async fn active_profile_id(&self) -> Result<Option<String>, StoreError>;
    async fn set_active_profile_id(&self, id: Option<String>) -> Result<(), StoreError>;
    async fn global_enabled(&self) -> Result<bool, StoreError>;
    async fn set_global_enabled(&self, enabled: bool) -> Result<(), StoreError>;
}

/// Outbound channel to the user interface. Delivery is best effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: Message);
}

/// Messages exchanged between the UI and the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    /// Request a fresh synchronization
    UpdateRules,
    /// A synchronization failed; the store has been emptied
    RuleError { error: String },
}

// =============================================================================
// Update semantics
// =============================================================================

/// Apply `update` to `current` the way the native engine does, returning the
/// resulting rule set.
///
/// Removals of unknown ids are ignored. Additions are checked as one batch:
/// a single bad rule rejects the whole update and `current` is unchanged.
pub fn apply_update(current: &[NativeRule], update: &RuleUpdate) -> Result<Vec<NativeRule>, StoreError> {
    let removed: HashSet<i32> = update.remove_rule_ids.iter().copied().collect();
    let mut next: Vec<NativeRule> = current.iter().filter(|r| !removed.contains(&r.id)).cloned().collect();

    let mut ids: HashSet<i32> = next.iter().map(|r| r.id).collect();
    for rule in &update.add_rules {
        check_rule(rule)?;
        if !ids.insert(rule.id) {
            return Err(StoreError::Rejected {
                id: rule.id,
                reason: "duplicate rule id".to_string(),
            });
        }
    }

    next.extend(update.add_rules.iter().cloned());
    Ok(next)
}

fn check_rule(rule: &NativeRule) -> Result<(), StoreError> {
    let reject = |reason: String| StoreError::Rejected { id: rule.id, reason };

    if rule.id < 1 {
        return Err(reject("rule id must be positive".to_string()));
    }

    let condition = &rule.condition;
    if condition.url_filter.is_some() && condition.regex_filter.is_some() {
        return Err(reject("urlFilter and regexFilter are mutually exclusive".to_string()));
    }
    if condition.resource_types.is_empty() {
        return Err(reject("resourceTypes must not be empty".to_string()));
    }
    if let Some(pattern) = &condition.regex_filter {
        Regex::new(pattern).map_err(|e| reject(format!("invalid regexFilter: {e}")))?;
    }

    Ok(())
}

// =============================================================================
// In-memory rule store
// =============================================================================

#[derive(Debug, Default)]
struct RuleStoreState {
    rules: Vec<NativeRule>,
    /// Snapshot still served to readers while a removal "propagates"
    stale: Option<Vec<NativeRule>>,
    stale_reads_left: u32,
    removal_lag: u32,
    removals_to_ignore: u32,
    update_calls: usize,
}

/// Rule store held in memory.
///
/// `with_removal_lag` and `ignoring_removals` reproduce the two ways a real
/// host misbehaves after a removal: reads that lag behind, and removals
/// that silently do nothing.
#[derive(Debug, Default)]
pub struct MemoryRuleStore {
    state: Mutex<RuleStoreState>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `rules` already installed.
    pub fn with_rules(rules: Vec<NativeRule>) -> Self {
        Self {
            state: Mutex::new(RuleStoreState {
                rules,
                ..RuleStoreState::default()
            }),
        }
    }

    /// Serve the pre-removal rule set for the next `reads` reads after every
    /// update that removes rules.
    pub fn with_removal_lag(self, reads: u32) -> Self {
        let mut state = self.state.into_inner();
        state.removal_lag = reads;
        Self { state: Mutex::new(state) }
    }

    /// Silently drop the removals of the next `count` updates.
    pub fn ignoring_removals(self, count: u32) -> Self {
        let mut state = self.state.into_inner();
        state.removals_to_ignore = count;
        Self { state: Mutex::new(state) }
    }

    /// Installed rules, ignoring any simulated lag.
    pub async fn snapshot(&self) -> Vec<NativeRule> {
        self.state.lock().await.rules.clone()
    }

    /// Number of `update_dynamic_rules` calls seen so far.
    pub async fn update_calls(&self) -> usize {
        self.state.lock().await.update_calls
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn dynamic_rules(&self) -> Result<Vec<NativeRule>, StoreError> {
        let mut state = self.state.lock().await;
        if state.stale_reads_left > 0 {
            state.stale_reads_left -= 1;
            if let Some(stale) = &state.stale {
                return Ok(stale.clone());
            }
        }
        state.stale = None;
        Ok(state.rules.clone())
    }

    async fn update_dynamic_rules(&self, mut update: RuleUpdate) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.update_calls += 1;

        let removes = !update.remove_rule_ids.is_empty();
        if removes && state.removals_to_ignore > 0 {
            state.removals_to_ignore -= 1;
            update.remove_rule_ids.clear();
        }

        let next = apply_update(&state.rules, &update)?;
        if removes && state.removal_lag > 0 {
            state.stale = Some(std::mem::replace(&mut state.rules, next));
            state.stale_reads_left = state.removal_lag;
        } else {
            state.rules = next;
        }
        Ok(())
    }
}

// =============================================================================
// In-memory profile store
// =============================================================================

#[derive(Debug)]
struct ProfileStoreState {
    set: ProfileSet,
    global_enabled: bool,
}

/// Profile store held in memory. Enforcement starts enabled.
#[derive(Debug)]
pub struct MemoryProfileStore {
    state: Mutex<ProfileStoreState>,
}

impl MemoryProfileStore {
    pub fn new(set: ProfileSet) -> Self {
        Self {
            state: Mutex::new(ProfileStoreState {
                set,
                global_enabled: true,
            }),
        }
    }

    /// Single profile, made active.
    pub fn with_profile(profile: Profile) -> Self {
        let id = profile.id.clone();
        Self::new(ProfileSet {
            profiles: vec![profile],
            active_profile_id: Some(id),
        })
    }
}

impl Default for MemoryProfileStore {
    fn default() -> Self {
        Self::new(ProfileSet::default())
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn load_all_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        Ok(self.state.lock().await.set.profiles.clone())
    }

    async fn save_all_profiles(&self, profiles: Vec<Profile>) -> Result<(), StoreError> {
        self.state.lock().await.set.profiles = profiles;
        Ok(())
    }

    async fn active_profile_id(&self) -> Result<Option<String>, StoreError> {
        Ok(self.state.lock().await.set.active_profile_id.clone())
    }

    async fn set_active_profile_id(&self, id: Option<String>) -> Result<(), StoreError> {
        self.state.lock().await.set.active_profile_id = id;
        Ok(())
    }

    async fn global_enabled(&self) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.global_enabled)
    }

    async fn set_global_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        self.state.lock().await.global_enabled = enabled;
        Ok(())
    }
}

// =============================================================================
// In-memory notifier
// =============================================================================

/// Records every message it is asked to deliver.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Message>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Message> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&self, message: Message) {
        self.sent.lock().await.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ic_core::rule::{ResourceTypes, RuleAction, RuleCondition};

    fn block(id: i32, pattern: &str) -> NativeRule {
        NativeRule {
            id,
            priority: 3,
            action: RuleAction::Block,
            condition: RuleCondition::url_filter(pattern, ResourceTypes::ALL),
        }
    }

    #[test]
    fn apply_update_removes_then_adds() {
        let current = vec![block(1, "a"), block(2, "b")];
        let update = RuleUpdate {
            remove_rule_ids: vec![1, 99],
            add_rules: vec![block(1, "c")],
        };

        let next = apply_update(&current, &update).unwrap();
        let ids: Vec<i32> = next.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn apply_update_rejects_bad_batches() {
        let current = vec![block(5, "a")];

        let duplicate = RuleUpdate::add(vec![block(5, "b")]);
        assert!(matches!(
            apply_update(&current, &duplicate),
            Err(StoreError::Rejected { id: 5, .. })
        ));

        let non_positive = RuleUpdate::add(vec![block(0, "b")]);
        assert!(apply_update(&current, &non_positive).is_err());

        let mut bad_regex = block(7, "x");
        bad_regex.condition = RuleCondition::regex_filter("^(unclosed", ResourceTypes::ALL);
        let err = apply_update(&current, &RuleUpdate::add(vec![block(6, "ok"), bad_regex])).unwrap_err();
        assert!(err.to_string().contains("regexFilter"));

        let mut both = block(8, "x");
        both.condition.regex_filter = Some("x+".to_string());
        assert!(apply_update(&current, &RuleUpdate::add(vec![both])).is_err());
    }

    #[tokio::test]
    async fn lagging_store_serves_stale_reads() {
        let store = MemoryRuleStore::with_rules(vec![block(1, "a")]).with_removal_lag(2);
        store.update_dynamic_rules(RuleUpdate::remove(vec![1])).await.unwrap();

        assert_eq!(store.dynamic_rules().await.unwrap().len(), 1);
        assert_eq!(store.dynamic_rules().await.unwrap().len(), 1);
        assert!(store.dynamic_rules().await.unwrap().is_empty());
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn stubborn_store_ignores_first_removal() {
        let store = MemoryRuleStore::with_rules(vec![block(1, "a")]).ignoring_removals(1);
        store.update_dynamic_rules(RuleUpdate::remove(vec![1])).await.unwrap();
        assert_eq!(store.dynamic_rules().await.unwrap().len(), 1);

        store.update_dynamic_rules(RuleUpdate::remove(vec![1])).await.unwrap();
        assert!(store.dynamic_rules().await.unwrap().is_empty());
        assert_eq!(store.update_calls().await, 2);
    }

    #[tokio::test]
    async fn rejected_update_leaves_rules_untouched() {
        let store = MemoryRuleStore::with_rules(vec![block(1, "a")]);
        let result = store.update_dynamic_rules(RuleUpdate::add(vec![block(1, "b")])).await;
        assert!(result.is_err());
        assert_eq!(store.snapshot().await, vec![block(1, "a")]);
    }

    #[tokio::test]
    async fn profile_store_round_trip() {
        let store = MemoryProfileStore::default();
        assert!(store.global_enabled().await.unwrap());
        assert_eq!(store.load_all_profiles().await.unwrap().len(), 1);

        store.set_global_enabled(false).await.unwrap();
        store.set_active_profile_id(None).await.unwrap();
        assert!(!store.global_enabled().await.unwrap());
        assert_eq!(store.active_profile_id().await.unwrap(), None);
    }

    #[test]
    fn message_wire_format() {
        let json = serde_json::to_value(Message::UpdateRules).unwrap();
        assert_eq!(json, serde_json::json!({"action": "updateRules"}));

        let parsed: Message = serde_json::from_str(r#"{"action": "ruleError", "error": "boom"}"#).unwrap();
        assert_eq!(parsed, Message::RuleError { error: "boom".to_string() });
    }
}
