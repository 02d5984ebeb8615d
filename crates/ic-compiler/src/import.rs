//! Profile import and export
//!
//! Two shapes are accepted on import: the native export
//! (`{ "profiles": [...], "activeProfileId": "..." }`) and the array export of
//! a third-party header editor, which is converted field for field.

use ic_core::types::{Filter, HeaderRule, Profile, ProfileSet, Redirect};
use serde::Deserialize;
use thiserror::Error;

const IMPORTED_PROFILE_NAME: &str = "Imported Profile";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unrecognized import format")]
    Unrecognized,
    #[error("import contains no profiles")]
    Empty,
}

// =============================================================================
// Header editor format
// =============================================================================

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForeignProfile {
    #[serde(default)]
    title: String,
    #[serde(default)]
    headers: Vec<ForeignPair>,
    #[serde(default)]
    url_replacements: Vec<ForeignPair>,
    #[serde(default)]
    url_filters: Vec<ForeignFilter>,
}

#[derive(Debug, Deserialize)]
struct ForeignPair {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: String,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    comment: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForeignFilter {
    #[serde(default)]
    url_regex: String,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    comment: String,
}

impl From<ForeignProfile> for Profile {
    fn from(foreign: ForeignProfile) -> Self {
        let name = if foreign.title.trim().is_empty() {
            IMPORTED_PROFILE_NAME.to_string()
        } else {
            foreign.title
        };
        let mut profile = Profile::new(name);

        profile.request_headers = foreign
            .headers
            .into_iter()
            .map(|h| {
                let mut header = HeaderRule::new(h.name, h.value);
                header.enabled = h.enabled;
                header.comment = h.comment;
                header
            })
            .collect();

        profile.redirects = foreign
            .url_replacements
            .into_iter()
            .map(|r| {
                let mut redirect = Redirect::new(r.name, r.value);
                redirect.enabled = r.enabled;
                redirect.comment = r.comment;
                redirect
            })
            .collect();

        profile.filters = foreign
            .url_filters
            .into_iter()
            .map(|f| {
                let mut filter = Filter::new(f.url_regex);
                filter.enabled = f.enabled;
                filter.comment = f.comment;
                filter
            })
            .collect();

        profile
    }
}

// =============================================================================
// Entry points
// =============================================================================

/// Parse an import file in either accepted format.
///
/// A missing or dangling `activeProfileId` falls back to the first profile.
pub fn parse_import(text: &str) -> Result<ProfileSet, ImportError> {
    let value: serde_json::Value = serde_json::from_str(text)?;

    let mut set = if value.is_array() {
        let foreign: Vec<ForeignProfile> =
            serde_json::from_value(value).map_err(|_| ImportError::Unrecognized)?;
        log::debug!("importing {} header editor profiles", foreign.len());
        ProfileSet {
            profiles: foreign.into_iter().map(Profile::from).collect(),
            active_profile_id: None,
        }
    } else if value.get("profiles").is_some() {
        serde_json::from_value::<ProfileSet>(value).map_err(|_| ImportError::Unrecognized)?
    } else {
        return Err(ImportError::Unrecognized);
    };

    let first_id = set.profiles.first().map(|p| p.id.clone()).ok_or(ImportError::Empty)?;
    if set.active().is_none() {
        set.active_profile_id = Some(first_id);
    }

    Ok(set)
}

/// Serialize profiles in the native export format.
pub fn export_profiles(set: &ProfileSet) -> Result<String, ImportError> {
    Ok(serde_json::to_string_pretty(set)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_native_export() {
        let text = r#"{
            "profiles": [
                {"id": "a", "name": "A", "requestHeaders": [{"id": "h", "enabled": true, "name": "X", "value": "1", "comment": ""}]},
                {"id": "b", "name": "B"}
            ],
            "activeProfileId": "b"
        }"#;

        let set = parse_import(text).unwrap();
        assert_eq!(set.profiles.len(), 2);
        assert_eq!(set.active().map(|p| p.name.as_str()), Some("B"));
        assert_eq!(set.profiles[0].request_headers[0].id, "h");
    }

    #[test]
    fn dangling_active_id_falls_back_to_first() {
        let text = r#"{"profiles": [{"id": "a", "name": "A"}], "activeProfileId": "gone"}"#;
        let set = parse_import(text).unwrap();
        assert_eq!(set.active_profile_id.as_deref(), Some("a"));
    }

    #[test]
    fn converts_header_editor_export() {
        let text = r#"[{
            "title": "Staging",
            "headers": [{"name": "X-Env", "value": "staging", "enabled": true, "comment": "env"}],
            "urlReplacements": [{"name": "^https://prod\\.", "value": "https://staging.", "enabled": false}],
            "urlFilters": [{"urlRegex": ".*://staging\\..*", "enabled": true}]
        }, {
            "headers": []
        }]"#;

        let set = parse_import(text).unwrap();
        assert_eq!(set.profiles.len(), 2);

        let staging = &set.profiles[0];
        assert_eq!(staging.name, "Staging");
        assert_eq!(staging.request_headers[0].name, "X-Env");
        assert_eq!(staging.request_headers[0].comment, "env");
        assert_eq!(staging.redirects[0].from, "^https://prod\\.");
        assert_eq!(staging.redirects[0].to, "https://staging.");
        assert!(!staging.redirects[0].enabled);
        assert_eq!(staging.filters[0].value, ".*://staging\\..*");
        assert!(!staging.filters[0].id.is_empty());

        assert_eq!(set.profiles[1].name, IMPORTED_PROFILE_NAME);
        assert_eq!(set.active_profile_id.as_deref(), Some(staging.id.as_str()));
    }

    #[test]
    fn rejects_unknown_and_empty_imports() {
        assert!(matches!(parse_import("not json"), Err(ImportError::Json(_))));
        assert!(matches!(parse_import(r#"{"foo": 1}"#), Err(ImportError::Unrecognized)));
        assert!(matches!(parse_import("[1, 2]"), Err(ImportError::Unrecognized)));
        assert!(matches!(parse_import("[]"), Err(ImportError::Empty)));
        assert!(matches!(parse_import(r#"{"profiles": []}"#), Err(ImportError::Empty)));
    }

    #[test]
    fn export_round_trips_through_import() {
        let set = ProfileSet::default();
        let text = export_profiles(&set).unwrap();
        assert!(text.contains("\"activeProfileId\""));
        assert_eq!(parse_import(&text).unwrap(), set);
    }
}
