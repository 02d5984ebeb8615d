//! Rule simulation
//!
//! Predicts, for one concrete URL, which rules of a profile would fire once
//! compiled. Nothing here touches the live rule store.
//!
//! Scoping goes through [`resolve_scope`] and eligibility through the same
//! `is_effective` checks the compiler uses. Literal globs are evaluated by
//! translating them to regexes, since the native glob matcher is not available
//! outside the host. All URL matching is case-insensitive, as it is natively.
//!
//! A redirect target without `$N` is installed as a plain URL, so its preview
//! is the target itself rather than a substitution into the request URL.

use serde::{Deserialize, Serialize};

use crate::pattern::{compile_pattern, compile_url_regex, has_backreference, to_regex_replacement};
use crate::rule::EXCLUDED_DOMAINS;
use crate::scope::{resolve_scope, CompileOptions, Scope};
use crate::types::{HeaderRule, Profile};
use crate::url::{extract_host, is_excluded_host};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedHeader {
    pub name: String,
    pub value: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedRedirect {
    pub from: String,
    pub to: String,
    /// URL the request would be redirected to
    pub result: String,
    pub comment: String,
}

/// A matched block or filter pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedPattern {
    pub pattern: String,
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub url: String,
    pub matched_headers: Vec<MatchedHeader>,
    pub matched_response_headers: Vec<MatchedHeader>,
    pub matched_redirects: Vec<MatchedRedirect>,
    pub matched_blocks: Vec<MatchedPattern>,
    pub matched_filters: Vec<MatchedPattern>,
    /// The URL's host is on the fixed exclusion list, so the host would not
    /// apply any of these rules.
    pub excluded_host: bool,
}

impl SimulationReport {
    pub fn is_empty(&self) -> bool {
        self.matched_headers.is_empty()
            && self.matched_response_headers.is_empty()
            && self.matched_redirects.is_empty()
            && self.matched_blocks.is_empty()
    }
}

/// Report every rule in `profile` that would fire for `url`.
///
/// Patterns that fail to compile are skipped silently; surfacing them is the
/// validator's job.
pub fn simulate(profile: &Profile, url: &str, options: &CompileOptions) -> SimulationReport {
    let mut report = SimulationReport {
        url: url.to_string(),
        excluded_host: extract_host(url)
            .map(|host| is_excluded_host(host, &EXCLUDED_DOMAINS))
            .unwrap_or(false),
        ..SimulationReport::default()
    };

    for filter in profile.filters.iter().filter(|f| f.is_effective()) {
        if pattern_matches(&filter.value, url) {
            report.matched_filters.push(MatchedPattern {
                pattern: filter.value.clone(),
                comment: filter.comment.clone(),
            });
        }
    }

    let headers_apply = match resolve_scope(profile, options) {
        Scope::Everywhere => true,
        Scope::Filters(_) => !report.matched_filters.is_empty(),
        Scope::Suppressed => false,
    };

    if headers_apply {
        report.matched_headers = matched_headers(&profile.request_headers);
        report.matched_response_headers = matched_headers(&profile.response_headers);
    }

    for redirect in profile.redirects.iter().filter(|r| r.is_effective()) {
        let Ok(regex) = compile_url_regex(&redirect.from) else {
            continue;
        };
        if regex.is_match(url) {
            let result = if has_backreference(&redirect.to) {
                regex
                    .replace(url, to_regex_replacement(&redirect.to).as_str())
                    .into_owned()
            } else {
                redirect.to.clone()
            };
            report.matched_redirects.push(MatchedRedirect {
                from: redirect.from.clone(),
                to: redirect.to.clone(),
                result,
                comment: redirect.comment.clone(),
            });
        }
    }

    for block in profile.blocks.iter().filter(|b| b.is_effective()) {
        if pattern_matches(&block.pattern, url) {
            report.matched_blocks.push(MatchedPattern {
                pattern: block.pattern.clone(),
                comment: block.comment.clone(),
            });
        }
    }

    log::debug!(
        "simulated '{}': {} headers, {} redirects, {} blocks",
        url,
        report.matched_headers.len() + report.matched_response_headers.len(),
        report.matched_redirects.len(),
        report.matched_blocks.len()
    );

    report
}

fn pattern_matches(pattern: &str, url: &str) -> bool {
    compile_pattern(pattern)
        .map(|re| re.is_match(url))
        .unwrap_or(false)
}

fn matched_headers(headers: &[HeaderRule]) -> Vec<MatchedHeader> {
    headers
        .iter()
        .filter(|h| h.is_effective())
        .map(|h| MatchedHeader {
            name: h.name.clone(),
            value: h.value.clone(),
            comment: h.comment.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::DisabledFiltersPolicy;
    use crate::types::{Block, Filter, Redirect};

    fn opts() -> CompileOptions {
        CompileOptions::default()
    }

    #[test]
    fn glob_filter_scopes_headers() {
        let mut profile = Profile::new("p");
        profile.filters.push(Filter::new("*://*.example.com/*"));
        profile.request_headers.push(HeaderRule::new("X-Test", "1"));

        let report = simulate(&profile, "https://api.example.com/data", &opts());
        assert_eq!(report.matched_filters.len(), 1);
        assert_eq!(report.matched_headers.len(), 1);
        assert_eq!(report.matched_headers[0].name, "X-Test");
        assert_eq!(report.matched_headers[0].value, "1");

        let report = simulate(&profile, "https://example.org/data", &opts());
        assert!(report.matched_filters.is_empty());
        assert!(report.matched_headers.is_empty());
    }

    #[test]
    fn no_filters_matches_every_url() {
        let mut profile = Profile::new("p");
        profile.request_headers.push(HeaderRule::new("X-A", "1"));
        profile.response_headers.push(HeaderRule::new("X-B", "2"));
        let mut off = HeaderRule::new("X-C", "3");
        off.enabled = false;
        profile.request_headers.push(off);

        let report = simulate(&profile, "http://anything.test/", &opts());
        assert_eq!(report.matched_headers.len(), 1);
        assert_eq!(report.matched_response_headers.len(), 1);
        assert!(report.matched_filters.is_empty());
    }

    #[test]
    fn regex_filter_scopes_headers() {
        let mut profile = Profile::new("p");
        profile.filters.push(Filter::new("^https://api\\."));
        profile.request_headers.push(HeaderRule::new("X-A", "1"));

        assert_eq!(simulate(&profile, "https://api.x.com/", &opts()).matched_headers.len(), 1);
        assert!(simulate(&profile, "https://www.x.com/", &opts()).matched_headers.is_empty());
    }

    #[test]
    fn disabled_filters_follow_policy() {
        let mut profile = Profile::new("p");
        let mut filter = Filter::new("*://only.this/*");
        filter.enabled = false;
        profile.filters.push(filter);
        profile.request_headers.push(HeaderRule::new("X-A", "1"));

        let report = simulate(&profile, "https://other.site/", &opts());
        assert_eq!(report.matched_headers.len(), 1);

        let strict = CompileOptions {
            disabled_filters: DisabledFiltersPolicy::SkipHeaders,
        };
        let report = simulate(&profile, "https://other.site/", &strict);
        assert!(report.matched_headers.is_empty());
    }

    #[test]
    fn redirect_preview_substitutes_captures() {
        let mut profile = Profile::new("p");
        profile
            .redirects
            .push(Redirect::new("^https://old\\.com/(.*)$", "https://new.com/$1"));

        let report = simulate(&profile, "https://old.com/path", &opts());
        assert_eq!(report.matched_redirects.len(), 1);
        assert_eq!(report.matched_redirects[0].result, "https://new.com/path");
    }

    #[test]
    fn redirects_ignore_filter_scope() {
        let mut profile = Profile::new("p");
        profile.filters.push(Filter::new("*://elsewhere.com/*"));
        profile.redirects.push(Redirect::new("^http://a\\.com/", "https://a.com/"));

        let report = simulate(&profile, "http://a.com/x", &opts());
        assert!(report.matched_headers.is_empty());
        assert_eq!(report.matched_redirects[0].result, "https://a.com/");
    }

    #[test]
    fn literal_redirect_target_is_the_result() {
        let mut profile = Profile::new("p");
        profile.redirects.push(Redirect::new("old\\.com", "https://new.com/"));
        profile.redirects.push(Redirect::new("^https://old\\.com/", "https://new.com/cost$"));

        let report = simulate(&profile, "https://old.com/path", &opts());
        assert_eq!(report.matched_redirects.len(), 2);
        assert_eq!(report.matched_redirects[0].result, "https://new.com/");
        assert_eq!(report.matched_redirects[1].result, "https://new.com/cost$");
    }

    #[test]
    fn matching_ignores_case() {
        let mut profile = Profile::new("p");
        profile.filters.push(Filter::new("*://*.Example.com/*"));
        profile.request_headers.push(HeaderRule::new("X-A", "1"));
        profile.redirects.push(Redirect::new("^https://OLD\\.com/(.*)$", "https://new.com/$1"));
        profile.blocks.push(Block::new("Tracker.js"));

        let report = simulate(&profile, "https://api.example.com/", &opts());
        assert_eq!(report.matched_headers.len(), 1);

        let report = simulate(&profile, "https://old.com/Tracker.JS", &opts());
        assert_eq!(report.matched_redirects[0].result, "https://new.com/Tracker.JS");
        assert_eq!(report.matched_blocks.len(), 1);
    }

    #[test]
    fn blocks_use_classifier() {
        let mut profile = Profile::new("p");
        profile.blocks.push(Block::new("doubleclick.net"));
        profile.blocks.push(Block::new("^https://ads\\."));
        profile.blocks.push(Block::new("*/pixel.gif"));

        let report = simulate(&profile, "https://ads.doubleclick.net/pixel.gif", &opts());
        assert_eq!(report.matched_blocks.len(), 3);

        let report = simulate(&profile, "https://cdn.example.com/app.js", &opts());
        assert!(report.matched_blocks.is_empty());
    }

    #[test]
    fn invalid_patterns_are_skipped() {
        let mut profile = Profile::new("p");
        profile.blocks.push(Block::new("(broken"));
        profile.redirects.push(Redirect::new("[", "https://x/"));
        profile.filters.push(Filter::new("(also broken"));
        profile.request_headers.push(HeaderRule::new("X-A", "1"));

        let report = simulate(&profile, "https://example.com/", &opts());
        assert!(report.matched_blocks.is_empty());
        assert!(report.matched_redirects.is_empty());
        assert!(report.matched_filters.is_empty());
        assert!(report.matched_headers.is_empty());
    }

    #[test]
    fn flags_excluded_hosts() {
        let profile = Profile::new("p");
        assert!(simulate(&profile, "https://login.microsoftonline.com/", &opts()).excluded_host);
        assert!(!simulate(&profile, "https://example.com/", &opts()).excluded_host);
    }
}
