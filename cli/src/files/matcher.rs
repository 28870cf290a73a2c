//! Ignore rules for manifests

use globset::GlobMatcher;

use crate::errors::CliError;
use crate::files::compile_matcher;

/// Directories that never belong in a manifest
pub const ALWAYS_IGNORED: [&str; 2] = [".git", ".buildship"];

struct Rule {
    pattern: String,
    /// `pattern/`, or the pattern itself when it already ends in `/`
    dir_prefix: String,
    glob: GlobMatcher,
}

/// Ordered ignore patterns plus the always-ignored directories
pub struct IgnoreRuleSet {
    rules: Vec<Rule>,
}

impl IgnoreRuleSet {
    /// Compile `patterns`. An invalid glob is an error rather than a silent non-match.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, CliError> {
        let rules = patterns
            .iter()
            .map(|p| p.as_ref())
            .filter(|p| !p.is_empty())
            .map(|pattern| {
                let dir_prefix = if pattern.ends_with('/') {
                    pattern.to_string()
                } else {
                    format!("{pattern}/")
                };
                Ok(Rule {
                    pattern: pattern.to_string(),
                    dir_prefix,
                    glob: compile_matcher(pattern.trim_end_matches('/'))?,
                })
            })
            .collect::<Result<Vec<_>, CliError>>()?;
        Ok(Self { rules })
    }

    /// Whether `path` (relative, `/`-separated) should be left out
    pub fn should_ignore(&self, path: &str) -> bool {
        let always = ALWAYS_IGNORED
            .iter()
            .any(|dir| path == *dir || path.strip_prefix(dir).is_some_and(|rest| rest.starts_with('/')));
        if always {
            return true;
        }

        self.rules.iter().any(|rule| {
            path == rule.pattern
                || rule.glob.is_match(path)
                || path.starts_with(&rule.dir_prefix)
                || path
                    .split('/')
                    .filter(|segment| !segment.is_empty())
                    .any(|segment| rule.glob.is_match(segment))
        })
    }
}
