use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

use ic_core::pattern::{classify, has_backreference, to_native_substitution, PatternKind};
use ic_core::rule::{
    HeaderModification, NativeRule, RedirectTarget, ResourceTypes, RuleAction, RuleCondition,
    BLOCK_PRIORITY, HEADER_PRIORITY, REDIRECT_PRIORITY,
};
use ic_core::scope::{resolve_scope, CompileOptions};
use ic_core::types::{HeaderRule, Profile};

// =============================================================================
// Rule Ids
// =============================================================================

/// Hands out native rule ids for one compilation pass.
///
/// Seeding from the clock keeps ids clear of anything a previous, failed
/// synchronization may have left in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleIdAllocator {
    next: i32,
    reserved: BTreeSet<i32>,
}

impl RuleIdAllocator {
    /// Start at `seed`. Native ids must be positive.
    pub fn starting_at(seed: i32) -> Self {
        Self {
            next: seed.max(1),
            reserved: BTreeSet::new(),
        }
    }

    /// Never hand out any of `ids`, even after wrapping past `i32::MAX`.
    pub fn skipping(mut self, ids: impl IntoIterator<Item = i32>) -> Self {
        self.reserved.extend(ids);
        self.skip_reserved();
        self
    }

    /// Start at the current Unix time in seconds.
    pub fn from_clock() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(1);
        Self::starting_at(i32::try_from(secs).unwrap_or(1))
    }

    pub fn peek(&self) -> i32 {
        self.next
    }

    pub fn next_id(&mut self) -> i32 {
        let id = self.next;
        self.advance();
        self.skip_reserved();
        id
    }

    fn advance(&mut self) {
        self.next = self.next.checked_add(1).unwrap_or(1);
    }

    fn skip_reserved(&mut self) {
        // Bounded so a reservation covering every positive id cannot spin.
        for _ in 0..=self.reserved.len() {
            if !self.reserved.contains(&self.next) {
                return;
            }
            self.advance();
        }
    }
}

// =============================================================================
// Compilation
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileStats {
    pub request_header_rules: usize,
    pub response_header_rules: usize,
    pub redirect_rules: usize,
    pub block_rules: usize,
    /// Header copies per header (one per active filter)
    pub scope_patterns: usize,
    /// Enabled items left out because a required field is empty
    pub skipped_items: usize,
}

impl CompileStats {
    pub fn total(&self) -> usize {
        self.request_header_rules + self.response_header_rules + self.redirect_rules + self.block_rules
    }
}

/// Compile `profile` into native rules, drawing ids from `ids`.
pub fn compile(profile: &Profile, options: &CompileOptions, ids: &mut RuleIdAllocator) -> Vec<NativeRule> {
    compile_with_stats(profile, options, ids).0
}

/// Compile and report per-kind counts.
///
/// Emission order is request headers, response headers, redirects, blocks.
/// Malformed user patterns are passed through untouched; the native store is
/// the final judge.
pub fn compile_with_stats(
    profile: &Profile,
    options: &CompileOptions,
    ids: &mut RuleIdAllocator,
) -> (Vec<NativeRule>, CompileStats) {
    let mut rules = Vec::new();
    let mut stats = CompileStats::default();

    let scope = resolve_scope(profile, options).patterns();
    stats.scope_patterns = scope.len();

    stats.request_header_rules = emit_header_rules(
        &profile.request_headers,
        HeaderPhase::Request,
        &scope,
        ids,
        &mut rules,
        &mut stats.skipped_items,
    );
    stats.response_header_rules = emit_header_rules(
        &profile.response_headers,
        HeaderPhase::Response,
        &scope,
        ids,
        &mut rules,
        &mut stats.skipped_items,
    );
    stats.redirect_rules = emit_redirect_rules(profile, ids, &mut rules, &mut stats.skipped_items);
    stats.block_rules = emit_block_rules(profile, ids, &mut rules, &mut stats.skipped_items);

    log::debug!(
        "compiled profile '{}': {} rules ({} request headers, {} response headers, {} redirects, {} blocks, {} skipped)",
        profile.name,
        rules.len(),
        stats.request_header_rules,
        stats.response_header_rules,
        stats.redirect_rules,
        stats.block_rules,
        stats.skipped_items
    );

    (rules, stats)
}

#[derive(Clone, Copy)]
enum HeaderPhase {
    Request,
    Response,
}

fn condition_for(pattern: &str, resource_types: ResourceTypes) -> RuleCondition {
    match classify(pattern) {
        PatternKind::Regex => RuleCondition::regex_filter(pattern, resource_types),
        PatternKind::Literal => RuleCondition::url_filter(pattern, resource_types),
    }
}

/// One rule per (header, scope pattern) pair: the native matcher takes a
/// single URL filter per rule.
fn emit_header_rules(
    headers: &[HeaderRule],
    phase: HeaderPhase,
    scope: &[&str],
    ids: &mut RuleIdAllocator,
    rules: &mut Vec<NativeRule>,
    skipped: &mut usize,
) -> usize {
    let before = rules.len();

    for header in headers.iter().filter(|h| h.enabled) {
        if !header.is_effective() {
            *skipped += 1;
            continue;
        }

        for pattern in scope {
            let modification = vec![HeaderModification::set(&header.name, &header.value)];
            let action = match phase {
                HeaderPhase::Request => RuleAction::ModifyHeaders {
                    request_headers: modification,
                    response_headers: Vec::new(),
                },
                HeaderPhase::Response => RuleAction::ModifyHeaders {
                    request_headers: Vec::new(),
                    response_headers: modification,
                },
            };

            rules.push(NativeRule {
                id: ids.next_id(),
                priority: HEADER_PRIORITY,
                action,
                condition: condition_for(pattern, ResourceTypes::DOCUMENT_AND_XHR),
            });
        }
    }

    rules.len() - before
}

fn emit_redirect_rules(
    profile: &Profile,
    ids: &mut RuleIdAllocator,
    rules: &mut Vec<NativeRule>,
    skipped: &mut usize,
) -> usize {
    let before = rules.len();

    for redirect in profile.redirects.iter().filter(|r| r.enabled) {
        if !redirect.is_effective() {
            *skipped += 1;
            continue;
        }

        let target = if has_backreference(&redirect.to) {
            RedirectTarget::RegexSubstitution(to_native_substitution(&redirect.to))
        } else {
            RedirectTarget::Url(redirect.to.clone())
        };

        rules.push(NativeRule {
            id: ids.next_id(),
            priority: REDIRECT_PRIORITY,
            action: RuleAction::Redirect { redirect: target },
            condition: RuleCondition::regex_filter(&redirect.from, ResourceTypes::DOCUMENT_AND_XHR),
        });
    }

    rules.len() - before
}

fn emit_block_rules(
    profile: &Profile,
    ids: &mut RuleIdAllocator,
    rules: &mut Vec<NativeRule>,
    skipped: &mut usize,
) -> usize {
    let before = rules.len();

    for block in profile.blocks.iter().filter(|b| b.enabled) {
        if !block.is_effective() {
            *skipped += 1;
            continue;
        }

        rules.push(NativeRule {
            id: ids.next_id(),
            priority: BLOCK_PRIORITY,
            action: RuleAction::Block,
            condition: condition_for(&block.pattern, ResourceTypes::ALL),
        });
    }

    rules.len() - before
}
