//! Relative markdown link validation for compiled output.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

static MARKDOWN_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([^\]]*)\]\(([^)\s]+)\)").unwrap_or_else(|err| {
        // The pattern is a literal; a failure here is a programming error.
        panic!("invalid markdown link regex: {err}")
    })
});

/// Scan assembled content for relative markdown links and verify each target
/// exists under the project root. Returns one message per broken link;
/// callers report them as warnings, never errors.
pub fn validate_link_targets(content: &str, base_dir: &Path) -> Vec<String> {
    let mut problems = Vec::new();
    for capture in MARKDOWN_LINK.captures_iter(content) {
        let Some(target) = capture.get(2).map(|m| m.as_str()) else {
            continue;
        };
        if is_external(target) {
            continue;
        }
        // Drop fragments and queries before resolving.
        let path_part = target
            .split(['#', '?'])
            .next()
            .unwrap_or(target);
        if path_part.is_empty() {
            continue;
        }
        if !base_dir.join(path_part).exists() {
            problems.push(format!("Broken link: {path_part} does not exist"));
        }
    }
    problems
}

fn is_external(target: &str) -> bool {
    target.starts_with("http://")
        || target.starts_with("https://")
        || target.starts_with("mailto:")
        || target.starts_with('#')
        || target.starts_with('/')
}
