//! Profile data model
//!
//! These types map directly to the profile JSON the editing UI stores and
//! exports, so field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_PROFILE_NAME: &str = "Default Profile";

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_enabled() -> bool {
    true
}

// =============================================================================
// Rule Items
// =============================================================================

/// A header to force-set on matching requests or responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderRule {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub comment: String,
}

impl HeaderRule {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            enabled: true,
            name: name.into(),
            value: value.into(),
            comment: String::new(),
        }
    }

    /// Header is compiled into a native rule only with both name and value.
    pub fn is_effective(&self) -> bool {
        self.enabled && !self.name.is_empty() && !self.value.is_empty()
    }
}

/// Regex-sourced redirect. `to` may reference capture groups as `$1`..`$9`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub comment: String,
}

impl Redirect {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            enabled: true,
            from: from.into(),
            to: to.into(),
            comment: String::new(),
        }
    }

    pub fn is_effective(&self) -> bool {
        self.enabled && !self.from.is_empty() && !self.to.is_empty()
    }
}

/// Requests matching `pattern` (glob or regex) are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub comment: String,
}

impl Block {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            enabled: true,
            pattern: pattern.into(),
            comment: String::new(),
        }
    }

    pub fn is_effective(&self) -> bool {
        self.enabled && !self.pattern.is_empty()
    }
}

/// URL scope for header rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub comment: String,
}

impl Filter {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            enabled: true,
            value: value.into(),
            comment: String::new(),
        }
    }

    pub fn is_effective(&self) -> bool {
        self.enabled && !self.value.is_empty()
    }
}

// =============================================================================
// Profile
// =============================================================================

/// A named, user-editable bundle of rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub request_headers: Vec<HeaderRule>,
    #[serde(default)]
    pub response_headers: Vec<HeaderRule>,
    #[serde(default)]
    pub redirects: Vec<Redirect>,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            request_headers: Vec::new(),
            response_headers: Vec::new(),
            redirects: Vec::new(),
            blocks: Vec::new(),
            filters: Vec::new(),
        }
    }

    /// Number of enabled items across every rule list.
    pub fn active_rule_count(&self) -> usize {
        self.request_headers.iter().filter(|h| h.enabled).count()
            + self.response_headers.iter().filter(|h| h.enabled).count()
            + self.redirects.iter().filter(|r| r.enabled).count()
            + self.blocks.iter().filter(|b| b.enabled).count()
            + self.filters.iter().filter(|f| f.enabled).count()
    }

    /// Copy with a fresh profile id and fresh item ids.
    pub fn duplicate(&self, name: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.id = new_id();
        copy.name = name.into();
        for header in copy.request_headers.iter_mut().chain(copy.response_headers.iter_mut()) {
            header.id = new_id();
        }
        for redirect in &mut copy.redirects {
            redirect.id = new_id();
        }
        for block in &mut copy.blocks {
            block.id = new_id();
        }
        for filter in &mut copy.filters {
            filter.id = new_id();
        }
        copy
    }
}

// =============================================================================
// Profile Set
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileSetError {
    #[error("profile '{0}' not found")]
    NotFound(String),
    #[error("cannot delete the last profile")]
    LastProfile,
}

/// Every stored profile plus the id of the active one.
///
/// This is also the JSON export shape: `{ "profiles": [...], "activeProfileId": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSet {
    pub profiles: Vec<Profile>,
    #[serde(default)]
    pub active_profile_id: Option<String>,
}

impl Default for ProfileSet {
    fn default() -> Self {
        let profile = Profile::new(DEFAULT_PROFILE_NAME);
        Self {
            active_profile_id: Some(profile.id.clone()),
            profiles: vec![profile],
        }
    }
}

impl ProfileSet {
    pub fn get(&self, id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Profile> {
        self.profiles.iter_mut().find(|p| p.id == id)
    }

    /// The active profile, if the stored id still refers to one.
    pub fn active(&self) -> Option<&Profile> {
        self.active_profile_id.as_deref().and_then(|id| self.get(id))
    }

    pub fn activate(&mut self, id: &str) -> Result<(), ProfileSetError> {
        if self.get(id).is_none() {
            return Err(ProfileSetError::NotFound(id.to_string()));
        }
        self.active_profile_id = Some(id.to_string());
        Ok(())
    }

    pub fn add(&mut self, profile: Profile) {
        if self.active_profile_id.is_none() {
            self.active_profile_id = Some(profile.id.clone());
        }
        self.profiles.push(profile);
    }

    /// Remove a profile. The last remaining profile can never be removed; if
    /// the active one goes away the first remaining profile becomes active.
    pub fn remove(&mut self, id: &str) -> Result<Profile, ProfileSetError> {
        let pos = self
            .profiles
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| ProfileSetError::NotFound(id.to_string()))?;

        if self.profiles.len() == 1 {
            return Err(ProfileSetError::LastProfile);
        }

        let removed = self.profiles.remove(pos);
        if self.active_profile_id.as_deref() == Some(id) {
            self.active_profile_id = self.profiles.first().map(|p| p.id.clone());
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factories_assign_unique_ids() {
        let a = HeaderRule::new("X-A", "1");
        let b = HeaderRule::new("X-A", "1");
        assert_ne!(a.id, b.id);
        assert!(a.enabled);

        let profile = Profile::new("Work");
        assert!(profile.request_headers.is_empty());
        assert!(profile.filters.is_empty());
        assert_eq!(profile.name, "Work");
    }

    #[test]
    fn legacy_profile_json_fills_missing_lists() {
        let json = r#"{
            "id": "default",
            "name": "Default Profile",
            "active": true,
            "requestHeaders": [{"id": "h1", "enabled": true, "name": "X-Test", "value": "1"}],
            "redirects": [],
            "filters": []
        }"#;

        let profile: Profile = serde_json::from_str(json).expect("profile should parse");
        assert_eq!(profile.id, "default");
        assert!(profile.response_headers.is_empty());
        assert!(profile.blocks.is_empty());
        assert_eq!(profile.request_headers[0].comment, "");
    }

    #[test]
    fn missing_enabled_defaults_to_true() {
        let filter: Filter = serde_json::from_str(r#"{"id": "f", "value": "*"}"#).unwrap();
        assert!(filter.enabled);
    }

    #[test]
    fn counts_enabled_items() {
        let mut profile = Profile::new("p");
        profile.request_headers.push(HeaderRule::new("X-A", "1"));
        let mut disabled = HeaderRule::new("X-B", "2");
        disabled.enabled = false;
        profile.request_headers.push(disabled);
        profile.blocks.push(Block::new("ads"));
        profile.filters.push(Filter::new("*://*/*"));

        assert_eq!(profile.active_rule_count(), 3);
    }

    #[test]
    fn duplicate_refreshes_ids() {
        let mut profile = Profile::new("p");
        profile.redirects.push(Redirect::new("^a$", "b"));
        let copy = profile.duplicate("p (copy)");
        assert_ne!(copy.id, profile.id);
        assert_ne!(copy.redirects[0].id, profile.redirects[0].id);
        assert_eq!(copy.redirects[0].from, "^a$");
    }

    #[test]
    fn cannot_remove_last_profile() {
        let mut set = ProfileSet::default();
        let id = set.profiles[0].id.clone();
        assert_eq!(set.remove(&id), Err(ProfileSetError::LastProfile));
        assert_eq!(set.active().map(|p| p.name.as_str()), Some(DEFAULT_PROFILE_NAME));
    }

    #[test]
    fn removing_active_profile_activates_first_remaining() {
        let mut set = ProfileSet::default();
        let first = set.profiles[0].id.clone();
        let second = Profile::new("Second");
        let second_id = second.id.clone();
        set.add(second);
        set.activate(&second_id).unwrap();

        set.remove(&second_id).unwrap();
        assert_eq!(set.active_profile_id.as_deref(), Some(first.as_str()));
    }

    #[test]
    fn activate_unknown_profile_fails() {
        let mut set = ProfileSet::default();
        assert!(matches!(set.activate("nope"), Err(ProfileSetError::NotFound(_))));
    }
}
