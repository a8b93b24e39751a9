//! Filter Expression Compiler
//!
//! Merges a tree-navigation prefix with a free-text glob filter into the single
//! filter expression understood by the data source. The output string shapes are
//! part of the backend contract and must stay byte-for-byte stable.

use regex::Regex;

/// Immutable compiler input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub prefix: Option<String>,
    pub raw_filter: String,
}

impl FilterSpec {
    pub fn new(prefix: Option<&str>, raw_filter: &str) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            raw_filter: raw_filter.to_string(),
        }
    }

    pub fn compile(&self) -> String {
        compile(self.prefix.as_deref(), &self.raw_filter)
    }
}

/// Collapse every run of `*` into a single `*`.
pub fn normalize(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut previous_star = false;
    for c in pattern.chars() {
        if c == '*' {
            if !previous_star {
                out.push(c);
            }
            previous_star = true;
        } else {
            out.push(c);
            previous_star = false;
        }
    }
    out
}

/// Replace every run of `*` with `.*`.
fn glob_to_regex(pattern: &str) -> String {
    normalize(pattern).replace('*', ".*")
}

/// Unanchored regex test; a pattern that does not compile never matches.
fn regex_matches(pattern: &str, haystack: &str) -> bool {
    match Regex::new(pattern) {
        Ok(re) => re.is_match(haystack),
        Err(e) => {
            tracing::debug!(pattern, error = %e, "Filter pattern is not a valid regex");
            false
        }
    }
}

/// Compile a prefix and a free-text filter into one server-side filter.
///
/// Without prefix the result is the normalized `*filter*` glob. With a prefix:
/// - the filter already matches `prefix:*`: descend with `prefix:*` alone;
/// - the prefix matches the filter's literal core: keep the global glob;
/// - otherwise request both, comma-joined: `*filter*,prefix:.*`.
pub fn compile(prefix: Option<&str>, raw_filter: &str) -> String {
    let overall = normalize(&format!("*{}*", raw_filter));

    let prefix = match prefix {
        Some(p) if !p.is_empty() => p,
        _ => return overall,
    };

    let candidate = format!("{}:*", prefix);
    let core = overall.trim_matches('*');

    if regex_matches(&glob_to_regex(core), &candidate) {
        candidate
    } else if regex_matches(prefix, core) {
        overall
    } else {
        format!("{},{}", overall, glob_to_regex(&candidate))
    }
}
