//! Pattern classification
//!
//! User patterns are either platform URL globs (`*` is the only wildcard) or
//! regular expressions. The classifier is a cheap character scan, and every
//! consumer (compiler, validator, simulator) must go through it.

use regex::{Regex, RegexBuilder};

/// How a user pattern is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    /// URL glob handed to the native `urlFilter`
    Literal,
    /// Regular expression handed to the native `regexFilter`
    Regex,
}

const REGEX_TRIGGERS: &[char] = &['[', ']', '(', ')', '{', '}', '^', '$', '+', '?', '|', '\\'];

/// Classify a pattern as a literal glob or a regex.
#[inline]
pub fn classify(pattern: &str) -> PatternKind {
    if pattern.contains(REGEX_TRIGGERS) || pattern.contains(".*") {
        PatternKind::Regex
    } else {
        PatternKind::Literal
    }
}

#[inline]
pub fn is_regex(pattern: &str) -> bool {
    classify(pattern) == PatternKind::Regex
}

/// Translate a URL glob into an unanchored regex with the same meaning.
///
/// Without a `*` the result is a plain substring test.
pub fn glob_to_regex(glob: &str) -> String {
    glob.split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*")
}

/// Compile a pattern for matching against a concrete URL, honouring its kind.
///
/// Matching is case-insensitive, like the native `urlFilter` and
/// `regexFilter` with their default `isUrlFilterCaseSensitive: false`.
pub fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    match classify(pattern) {
        PatternKind::Regex => compile_url_regex(pattern),
        PatternKind::Literal => compile_url_regex(&glob_to_regex(pattern)),
    }
}

/// Compile a regex for matching URLs, case-insensitively.
pub fn compile_url_regex(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

// =============================================================================
// Redirect Substitution
// =============================================================================

/// True if `to` contains a `$<digit>` capture reference.
pub fn has_backreference(to: &str) -> bool {
    let bytes = to.as_bytes();
    bytes
        .windows(2)
        .any(|w| w[0] == b'$' && w[1].is_ascii_digit())
}

/// Rewrite every `$N` into the native engine's `\N` substitution escape.
pub fn to_native_substitution(to: &str) -> String {
    rewrite_backreferences(
        to,
        |out, digits| {
            out.push('\\');
            out.push_str(digits);
        },
        |out| out.push('$'),
    )
}

/// Rewrite `$N` into `regex` replacement syntax (`${N}`), keeping any other
/// `$` literal so previews match what the native engine produces.
pub fn to_regex_replacement(to: &str) -> String {
    rewrite_backreferences(
        to,
        |out, digits| {
            out.push_str("${");
            out.push_str(digits);
            out.push('}');
        },
        |out| out.push_str("$$"),
    )
}

fn rewrite_backreferences(
    to: &str,
    mut on_group: impl FnMut(&mut String, &str),
    mut on_dollar: impl FnMut(&mut String),
) -> String {
    let mut out = String::with_capacity(to.len() + 4);
    let mut rest = to;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let digits_len = after.bytes().take_while(u8::is_ascii_digit).count();
        if digits_len > 0 {
            on_group(&mut out, &after[..digits_len]);
            rest = &after[digits_len..];
        } else {
            on_dollar(&mut out);
            rest = after;
        }
    }

    out.push_str(rest);
    out
}
