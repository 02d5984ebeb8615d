//! Static profile validation
//!
//! Pure checks suitable for running on every keystroke. Pattern validity uses
//! the same classifier as the compiler.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::pattern::{classify, PatternKind};
use crate::types::{Block, Filter, HeaderRule, Profile, Redirect};

/// Pattern that matches every URL; blocking it blocks everything.
const UNIVERSAL_REGEX: &str = ".*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Profile,
    Header,
    Redirect,
    Block,
    Filter,
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    /// `Request Header` or `Response Header` for header issues
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Zero-based position in the item's list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub message: String,
}

impl Issue {
    fn new(kind: IssueKind, index: Option<usize>, message: String) -> Self {
        Self {
            kind,
            category: None,
            index,
            message,
        }
    }

    fn in_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
    pub valid: bool,
}

impl ValidationReport {
    /// Structural problems block only when the item is enabled; on disabled
    /// items they are downgraded to warnings.
    fn problem(&mut self, enabled: bool, issue: Issue) {
        if enabled {
            self.errors.push(issue);
        } else {
            self.warnings.push(issue);
        }
    }

    fn warn(&mut self, issue: Issue) {
        self.warnings.push(issue);
    }

    pub fn errors_for(&self, kind: IssueKind, index: usize) -> impl Iterator<Item = &Issue> {
        self.errors
            .iter()
            .filter(move |i| i.kind == kind && i.index == Some(index))
    }
}

/// Check a profile for structural errors and suspicious rules.
pub fn validate(profile: &Profile) -> ValidationReport {
    let mut report = ValidationReport::default();

    validate_headers(&profile.request_headers, "Request Header", &mut report);
    validate_headers(&profile.response_headers, "Response Header", &mut report);
    validate_redirects(&profile.redirects, &mut report);
    validate_blocks(&profile.blocks, &mut report);
    validate_filters(&profile.filters, &mut report);

    report.valid = report.errors.is_empty();
    report
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn is_token_name(name: &str) -> bool {
    name.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn validate_headers(headers: &[HeaderRule], category: &str, report: &mut ValidationReport) {
    let mut enabled_names: Vec<(&str, usize)> = Vec::new();

    for (index, header) in headers.iter().enumerate() {
        if is_blank(&header.name) {
            report.problem(
                header.enabled,
                Issue::new(
                    IssueKind::Header,
                    Some(index),
                    format!("{category} #{}: Name is required", index + 1),
                )
                .in_category(category),
            );
        }

        if header.enabled && !header.name.is_empty() {
            match enabled_names.iter_mut().find(|(n, _)| *n == header.name) {
                Some((_, count)) => *count += 1,
                None => enabled_names.push((header.name.as_str(), 1)),
            }
        }

        if !header.name.is_empty() && !is_token_name(&header.name) {
            report.warn(
                Issue::new(
                    IssueKind::Header,
                    Some(index),
                    format!("{category} \"{}\": Contains unusual characters", header.name),
                )
                .in_category(category),
            );
        }

        if is_blank(&header.value) {
            let name = if header.name.is_empty() { "Unnamed" } else { header.name.as_str() };
            report.warn(
                Issue::new(
                    IssueKind::Header,
                    Some(index),
                    format!("{category} \"{name}\": Value is empty"),
                )
                .in_category(category),
            );
        }
    }

    for (name, count) in enabled_names {
        if count > 1 {
            report.warn(
                Issue::new(
                    IssueKind::Header,
                    None,
                    format!(
                        "{category} \"{name}\": Appears {count} times enabled (will send multiple headers)"
                    ),
                )
                .in_category(category),
            );
        }
    }
}

fn validate_redirects(redirects: &[Redirect], report: &mut ValidationReport) {
    for (index, redirect) in redirects.iter().enumerate() {
        let n = index + 1;

        if is_blank(&redirect.from) {
            report.problem(
                redirect.enabled,
                Issue::new(
                    IssueKind::Redirect,
                    Some(index),
                    format!("Redirect #{n}: \"From\" pattern is required"),
                ),
            );
        } else if let Err(e) = Regex::new(&redirect.from) {
            report.problem(
                redirect.enabled,
                Issue::new(
                    IssueKind::Redirect,
                    Some(index),
                    format!("Redirect #{n}: Invalid regex in \"From\" pattern: {e}"),
                ),
            );
        }

        if is_blank(&redirect.to) {
            report.problem(
                redirect.enabled,
                Issue::new(
                    IssueKind::Redirect,
                    Some(index),
                    format!("Redirect #{n}: \"To\" URL is required"),
                ),
            );
        }

        if !redirect.from.is_empty() && redirect.from == redirect.to {
            report.warn(Issue::new(
                IssueKind::Redirect,
                Some(index),
                format!("Redirect #{n}: \"From\" and \"To\" are identical (infinite loop risk)"),
            ));
        }
    }
}

fn validate_blocks(blocks: &[Block], report: &mut ValidationReport) {
    for (index, block) in blocks.iter().enumerate() {
        let n = index + 1;

        if is_blank(&block.pattern) {
            report.problem(
                block.enabled,
                Issue::new(
                    IssueKind::Block,
                    Some(index),
                    format!("Block #{n}: Pattern is required"),
                ),
            );
        } else if classify(&block.pattern) == PatternKind::Regex {
            if let Err(e) = Regex::new(&block.pattern) {
                report.problem(
                    block.enabled,
                    Issue::new(
                        IssueKind::Block,
                        Some(index),
                        format!("Block #{n}: Invalid regex pattern: {e}"),
                    ),
                );
            }
        }

        if block.pattern == UNIVERSAL_REGEX {
            report.warn(Issue::new(
                IssueKind::Block,
                Some(index),
                format!("Block #{n}: Pattern \".*\" will block ALL requests"),
            ));
        }
    }
}

fn validate_filters(filters: &[Filter], report: &mut ValidationReport) {
    for (index, filter) in filters.iter().enumerate() {
        let n = index + 1;

        if is_blank(&filter.value) {
            report.problem(
                filter.enabled,
                Issue::new(
                    IssueKind::Filter,
                    Some(index),
                    format!("Filter #{n}: Pattern is required"),
                ),
            );
        } else if classify(&filter.value) == PatternKind::Regex {
            if let Err(e) = Regex::new(&filter.value) {
                report.problem(
                    filter.enabled,
                    Issue::new(
                        IssueKind::Filter,
                        Some(index),
                        format!("Filter #{n}: Invalid regex pattern: {e}"),
                    ),
                );
            }
        }
    }

    if !filters.is_empty() && filters.iter().all(|f| !f.enabled) {
        report.warn(Issue::new(
            IssueKind::Profile,
            None,
            "All filters are disabled: header rules fall back to the configured policy".to_string(),
        ));
    }
}
