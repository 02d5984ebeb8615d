//! Filter scoping
//!
//! Header rules only apply inside the URL scope defined by a profile's
//! filters. The compiler and the simulator both resolve that scope here.

use serde::{Deserialize, Serialize};

use crate::types::Profile;

/// Native glob matching every URL.
pub const MATCH_ALL_URLS: &str = "*://*/*";

/// What to do when a profile has filters but none of them is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DisabledFiltersPolicy {
    /// Behave as if there were no filters: header rules apply everywhere.
    #[default]
    MatchAll,
    /// Generate no header rules at all.
    SkipHeaders,
}

/// Options shared by every consumer of the scoping rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    pub disabled_filters: DisabledFiltersPolicy,
}

/// Resolved URL scope for header rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope<'a> {
    /// No filter in effect; header rules match every URL.
    Everywhere,
    /// Header rules match URLs covered by at least one of these patterns.
    Filters(Vec<&'a str>),
    /// Header rules are suppressed entirely.
    Suppressed,
}

impl<'a> Scope<'a> {
    /// One native pattern per header rule copy.
    pub fn patterns(&self) -> Vec<&'a str> {
        match self {
            Scope::Everywhere => vec![MATCH_ALL_URLS],
            Scope::Filters(filters) => filters.clone(),
            Scope::Suppressed => Vec::new(),
        }
    }
}

/// Resolve the header scope of `profile`.
///
/// Active filters are the enabled ones with a non-empty value.
pub fn resolve_scope<'a>(profile: &'a Profile, options: &CompileOptions) -> Scope<'a> {
    let active: Vec<&str> = profile
        .filters
        .iter()
        .filter(|f| f.is_effective())
        .map(|f| f.value.as_str())
        .collect();

    if !active.is_empty() {
        return Scope::Filters(active);
    }

    match options.disabled_filters {
        DisabledFiltersPolicy::SkipHeaders if !profile.filters.is_empty() => {
            log::warn!(
                "profile '{}' has filters but none enabled; skipping header rules",
                profile.name
            );
            Scope::Suppressed
        }
        _ => Scope::Everywhere,
    }
}
