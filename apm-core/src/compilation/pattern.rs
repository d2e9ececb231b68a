//! Glob matching for `applyTo` patterns.
//!
//! Patterns support `*`, `?`, `**`, and brace alternation
//! (`**/*.{ts,tsx}`), which is expanded into plain globs before matching.

use std::path::Path;

use glob::{MatchOptions, Pattern, PatternError};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: true,
};

/// A compiled `applyTo` pattern.
#[derive(Debug, Clone)]
pub struct PatternSet {
    raw: String,
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn new(raw: &str) -> Result<Self, PatternError> {
        let trimmed = raw.trim();
        let mut patterns = Vec::new();
        for expanded in expand_braces(trimmed) {
            patterns.push(Pattern::new(&expanded)?);
            // `**/x` should also match `x` at the top level of the tree.
            if let Some(stripped) = expanded.strip_prefix("**/") {
                patterns.push(Pattern::new(stripped)?);
            }
        }
        Ok(Self {
            raw: trimmed.to_string(),
            patterns,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether the pattern is blank (no `applyTo` restriction).
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Match a path relative to the project root.
    pub fn matches_path(&self, relative: &Path) -> bool {
        if self.is_empty() {
            return false;
        }
        let text = relative.to_string_lossy().replace('\\', "/");
        self.patterns
            .iter()
            .any(|pattern| pattern.matches_with(&text, MATCH_OPTIONS))
    }
}

/// Expand brace alternation into plain glob patterns, one per alternative
/// combination. A pattern without braces expands to itself.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };
    let Some(close_offset) = pattern[open..].find('}') else {
        // Unbalanced brace: treat literally.
        return vec![pattern.to_string()];
    };
    let close = open + close_offset;

    let prefix = &pattern[..open];
    let alternatives = &pattern[open + 1..close];
    let suffix = &pattern[close + 1..];

    let mut expanded = Vec::new();
    for alternative in alternatives.split(',') {
        let candidate = format!("{prefix}{}{suffix}", alternative.trim());
        expanded.extend(expand_braces(&candidate));
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, path: &str) -> bool {
        PatternSet::new(pattern).unwrap().matches_path(Path::new(path))
    }

    #[test]
    fn expands_single_brace_group() {
        assert_eq!(
            expand_braces("**/*.{ts,tsx}"),
            vec!["**/*.ts".to_string(), "**/*.tsx".to_string()]
        );
    }

    #[test]
    fn expands_nested_groups() {
        let expanded = expand_braces("{a,b}/{c,d}.rs");
        assert_eq!(
            expanded,
            vec!["a/c.rs", "a/d.rs", "b/c.rs", "b/d.rs"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn plain_pattern_expands_to_itself() {
        assert_eq!(expand_braces("**/*.py"), vec!["**/*.py".to_string()]);
    }

    #[test]
    fn matches_nested_and_top_level_paths() {
        assert!(matches("**/*.py", "server/api.py"));
        assert!(matches("**/*.py", "a/b/c/deep.py"));
        assert!(matches("**/*.py", "top.py"));
        assert!(!matches("**/*.py", "styles/main.css"));
    }

    #[test]
    fn matches_brace_alternatives() {
        assert!(matches("**/*.{css,scss}", "styles/main.css"));
        assert!(matches("**/*.{css,scss}", "styles/tokens.scss"));
        assert!(!matches("**/*.{css,scss}", "server/api.py"));
        assert!(matches("**/*.{tsx,jsx}", "frontend/components/Header.tsx"));
    }

    #[test]
    fn matches_named_files() {
        assert!(matches("**/README.md", "docs/README.md"));
        assert!(matches("**/README.md", "README.md"));
        assert!(!matches("**/README.md", "docs/CHANGELOG.md"));
    }

    #[test]
    fn hidden_files_require_literal_dot() {
        assert!(!matches("**/*.py", "server/.hidden.py"));
    }

    #[test]
    fn empty_pattern_matches_nothing() {
        let set = PatternSet::new("").unwrap();
        assert!(set.is_empty());
        assert!(!set.matches_path(Path::new("anything.py")));
    }
}
