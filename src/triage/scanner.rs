use glob::Pattern;

use crate::platform::types::Repo;
use crate::platform::Platform;

/// Include pattern that selects every branch.
pub const FULL_SCAN: &str = "*";

const PROTECTED_DEFAULTS: &[&str] = &["main", "master"];

/// Resolve the branches to evaluate, in discovery order.
///
/// A listing failure yields an empty set rather than an error.
pub async fn resolve_branches(
    platform: &dyn Platform,
    repo: &Repo,
    patterns: &[String],
) -> Vec<String> {
    let branches = match platform.list_branches(repo).await {
        Ok(branches) => branches,
        Err(e) => {
            tracing::error!(repo = %repo, stage = "list_branches", error = %e, "Failed to list branches");
            return Vec::new();
        }
    };

    let selected = filter_branches(branches, patterns);
    tracing::info!(repo = %repo, count = selected.len(), "Resolved branches to scan");
    selected
}

/// Apply include patterns to a branch list.
///
/// - any `"*"` pattern keeps everything
/// - no patterns keeps only `main` and `master`
/// - otherwise a branch is kept if any pattern matches it exactly or as a glob
pub fn filter_branches(branches: Vec<String>, patterns: &[String]) -> Vec<String> {
    if patterns.iter().any(|p| p == FULL_SCAN) {
        return branches;
    }

    if patterns.is_empty() {
        return branches
            .into_iter()
            .filter(|b| PROTECTED_DEFAULTS.contains(&b.as_str()))
            .collect();
    }

    let compiled: Vec<(&str, Option<Pattern>)> = patterns
        .iter()
        .map(|p| (p.as_str(), compile(p)))
        .collect();

    branches
        .into_iter()
        .filter(|branch| {
            compiled.iter().any(|(raw, glob)| {
                *raw == branch.as_str() || glob.as_ref().is_some_and(|g| g.matches(branch))
            })
        })
        .collect()
}

/// Check one branch against one include pattern.
pub fn branch_matches(branch: &str, pattern: &str) -> bool {
    pattern == branch || compile(pattern).is_some_and(|g| g.matches(branch))
}

/// Compile an include pattern where only `*` and `?` are special.
///
/// Brackets are escaped and `*` runs collapsed, since `glob` gives both
/// extra meaning. Invalid patterns never match.
fn compile(pattern: &str) -> Option<Pattern> {
    let mut escaped = String::with_capacity(pattern.len());
    let mut previous_star = false;

    for c in pattern.chars() {
        match c {
            '*' if previous_star => continue,
            '[' => escaped.push_str("[[]"),
            ']' => escaped.push_str("[]]"),
            _ => escaped.push(c),
        }
        previous_star = c == '*';
    }

    match Pattern::new(&escaped) {
        Ok(p) => Some(p),
        Err(e) => {
            tracing::warn!(pattern = pattern, error = %e, "Ignoring invalid branch pattern");
            None
        }
    }
}
