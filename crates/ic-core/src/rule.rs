//! Native declarative rule model
//!
//! These types serialize to the JSON shape the host's declarative
//! request-matching engine accepts (`declarativeNetRequest` dynamic rules).

use std::fmt;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

// =============================================================================
// Priorities
// =============================================================================

/// Header overrides.
pub const HEADER_PRIORITY: u32 = 1;
/// Redirects, above header rules.
pub const REDIRECT_PRIORITY: u32 = 2;
/// Blocks outrank everything.
pub const BLOCK_PRIORITY: u32 = 3;

/// The host platform's own sign-in and update infrastructure. Header rules,
/// redirects and blocks never apply to these.
pub const EXCLUDED_DOMAINS: [&str; 6] = [
    "microsoft.com",
    "www.microsoft.com",
    "edge.microsoft.com",
    "login.microsoftonline.com",
    "msedge.net",
    "msedge.api.cdp.microsoft.com",
];

// =============================================================================
// Resource Types
// =============================================================================

bitflags::bitflags! {
    /// Resource type scope of a rule condition.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceTypes: u16 {
        const MAIN_FRAME = 1 << 0;
        const SUB_FRAME = 1 << 1;
        const STYLESHEET = 1 << 2;
        const SCRIPT = 1 << 3;
        const IMAGE = 1 << 4;
        const FONT = 1 << 5;
        const OBJECT = 1 << 6;
        const XMLHTTPREQUEST = 1 << 7;
        const PING = 1 << 8;
        const CSP_REPORT = 1 << 9;
        const MEDIA = 1 << 10;
        const WEBSOCKET = 1 << 11;
        const OTHER = 1 << 12;

        /// Documents and XHR, the scope of header rules and redirects
        const DOCUMENT_AND_XHR = Self::MAIN_FRAME.bits()
            | Self::SUB_FRAME.bits()
            | Self::XMLHTTPREQUEST.bits();
        /// All request types
        const ALL = 0x1FFF;
    }
}

const RESOURCE_TYPE_NAMES: [(ResourceTypes, &str); 13] = [
    (ResourceTypes::MAIN_FRAME, "main_frame"),
    (ResourceTypes::SUB_FRAME, "sub_frame"),
    (ResourceTypes::STYLESHEET, "stylesheet"),
    (ResourceTypes::SCRIPT, "script"),
    (ResourceTypes::IMAGE, "image"),
    (ResourceTypes::FONT, "font"),
    (ResourceTypes::OBJECT, "object"),
    (ResourceTypes::XMLHTTPREQUEST, "xmlhttprequest"),
    (ResourceTypes::PING, "ping"),
    (ResourceTypes::CSP_REPORT, "csp_report"),
    (ResourceTypes::MEDIA, "media"),
    (ResourceTypes::WEBSOCKET, "websocket"),
    (ResourceTypes::OTHER, "other"),
];

impl ResourceTypes {
    /// Parse a single platform resource type name.
    pub fn from_platform_name(name: &str) -> Option<Self> {
        RESOURCE_TYPE_NAMES
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(flag, _)| *flag)
    }

    /// Platform names of every set flag, in platform order.
    pub fn names(&self) -> Vec<&'static str> {
        RESOURCE_TYPE_NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl Serialize for ResourceTypes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let names = self.names();
        let mut seq = serializer.serialize_seq(Some(names.len()))?;
        for name in names {
            seq.serialize_element(name)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for ResourceTypes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NamesVisitor;

        impl<'de> Visitor<'de> for NamesVisitor {
            type Value = ResourceTypes;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a list of resource type names")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut types = ResourceTypes::empty();
                while let Some(name) = seq.next_element::<String>()? {
                    let flag = ResourceTypes::from_platform_name(&name).ok_or_else(|| {
                        de::Error::custom(format!("unknown resource type '{name}'"))
                    })?;
                    types |= flag;
                }
                Ok(types)
            }
        }

        deserializer.deserialize_seq(NamesVisitor)
    }
}

// =============================================================================
// Actions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderOperation {
    Set,
    Append,
    Remove,
}

/// One header modification inside a `modifyHeaders` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderModification {
    pub header: String,
    pub operation: HeaderOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl HeaderModification {
    /// Overwrite (not append) `header` with `value`.
    pub fn set(header: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            operation: HeaderOperation::Set,
            value: Some(value.into()),
        }
    }
}

/// Where a redirect sends the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RedirectTarget {
    /// Fixed destination URL
    Url(String),
    /// Destination built from the `regexFilter` captures (`\1`..`\9`)
    RegexSubstitution(String),
}

/// Action taken when a rule's condition matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuleAction {
    ModifyHeaders {
        #[serde(rename = "requestHeaders", default, skip_serializing_if = "Vec::is_empty")]
        request_headers: Vec<HeaderModification>,
        #[serde(rename = "responseHeaders", default, skip_serializing_if = "Vec::is_empty")]
        response_headers: Vec<HeaderModification>,
    },
    Redirect {
        redirect: RedirectTarget,
    },
    Block,
}

// =============================================================================
// Conditions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex_filter: Option<String>,
    pub resource_types: ResourceTypes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_domains: Vec<String>,
}

impl RuleCondition {
    pub fn url_filter(filter: impl Into<String>, resource_types: ResourceTypes) -> Self {
        Self {
            url_filter: Some(filter.into()),
            regex_filter: None,
            resource_types,
            excluded_domains: excluded_domains(),
        }
    }

    pub fn regex_filter(filter: impl Into<String>, resource_types: ResourceTypes) -> Self {
        Self {
            url_filter: None,
            regex_filter: Some(filter.into()),
            resource_types,
            excluded_domains: excluded_domains(),
        }
    }

    /// The pattern this condition matches on, whichever field carries it.
    pub fn pattern(&self) -> Option<&str> {
        self.regex_filter.as_deref().or(self.url_filter.as_deref())
    }
}

pub fn excluded_domains() -> Vec<String> {
    EXCLUDED_DOMAINS.iter().map(|d| d.to_string()).collect()
}

// =============================================================================
// Rules
// =============================================================================

/// A declarative matcher/action record installed in the live rule store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeRule {
    pub id: i32,
    pub priority: u32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

/// Batched change to the dynamic rule set, applied atomically by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUpdate {
    #[serde(default)]
    pub remove_rule_ids: Vec<i32>,
    #[serde(default)]
    pub add_rules: Vec<NativeRule>,
}

impl RuleUpdate {
    pub fn remove(ids: Vec<i32>) -> Self {
        Self {
            remove_rule_ids: ids,
            add_rules: Vec::new(),
        }
    }

    pub fn add(rules: Vec<NativeRule>) -> Self {
        Self {
            remove_rule_ids: Vec::new(),
            add_rules: rules,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.remove_rule_ids.is_empty() && self.add_rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_header_rule_in_platform_shape() {
        let rule = NativeRule {
            id: 7,
            priority: HEADER_PRIORITY,
            action: RuleAction::ModifyHeaders {
                request_headers: vec![HeaderModification::set("X-Test", "1")],
                response_headers: Vec::new(),
            },
            condition: RuleCondition::url_filter("*://*/*", ResourceTypes::DOCUMENT_AND_XHR),
        };

        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["action"]["type"], "modifyHeaders");
        assert_eq!(json["action"]["requestHeaders"][0]["operation"], "set");
        assert!(json["action"].get("responseHeaders").is_none());
        assert_eq!(json["condition"]["urlFilter"], "*://*/*");
        assert!(json["condition"].get("regexFilter").is_none());
        assert_eq!(
            json["condition"]["resourceTypes"],
            serde_json::json!(["main_frame", "sub_frame", "xmlhttprequest"])
        );
        assert_eq!(json["condition"]["excludedDomains"].as_array().unwrap().len(), 6);
    }

    #[test]
    fn serializes_redirect_targets() {
        let action = RuleAction::Redirect {
            redirect: RedirectTarget::RegexSubstitution("https://x/\\1".into()),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "redirect");
        assert_eq!(json["redirect"]["regexSubstitution"], "https://x/\\1");

        let action = RuleAction::Redirect {
            redirect: RedirectTarget::Url("https://x/".into()),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["redirect"]["url"], "https://x/");

        let json = serde_json::to_value(&RuleAction::Block).unwrap();
        assert_eq!(json, serde_json::json!({"type": "block"}));
    }

    #[test]
    fn parses_rules_read_back_from_store() {
        let json = r#"{
            "id": 1700000000,
            "priority": 2,
            "action": {"type": "redirect", "redirect": {"url": "https://new.com/"}},
            "condition": {"regexFilter": "^https://old\\.com/", "resourceTypes": ["main_frame"]}
        }"#;
        let rule: NativeRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.condition.resource_types, ResourceTypes::MAIN_FRAME);
        assert!(rule.condition.excluded_domains.is_empty());
        assert_eq!(rule.condition.pattern(), Some("^https://old\\.com/"));
    }

    #[test]
    fn rejects_unknown_resource_type() {
        let result: Result<ResourceTypes, _> = serde_json::from_str(r#"["main_frame", "bogus"]"#);
        assert!(result.is_err());
    }

    #[test]
    fn parses_platform_names() {
        assert_eq!(ResourceTypes::from_platform_name("xmlhttprequest"), Some(ResourceTypes::XMLHTTPREQUEST));
        assert_eq!(ResourceTypes::from_platform_name("csp_report"), Some(ResourceTypes::CSP_REPORT));
        assert_eq!(ResourceTypes::from_platform_name("XMLHTTPREQUEST"), None);

        let parsed: ResourceTypes = serde_json::from_str(r#"["main_frame", "sub_frame", "xmlhttprequest"]"#).unwrap();
        assert_eq!(parsed, ResourceTypes::DOCUMENT_AND_XHR);
    }

    #[test]
    fn all_covers_every_named_type() {
        assert_eq!(ResourceTypes::ALL.names().len(), RESOURCE_TYPE_NAMES.len());
    }
}
