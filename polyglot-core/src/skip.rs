// Repository skip list: names, `owner/name` slugs, or glob patterns,
// matched case-insensitively.

use crate::error::ConfigError;
use crate::types::RepoRef;

#[derive(Debug, Clone, Default)]
pub struct SkipList {
    patterns: Vec<glob::Pattern>,
}

impl SkipList {
    pub fn new<I, S>(entries: I) -> crate::error::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns = Vec::new();
        for entry in entries {
            let entry = entry.as_ref().trim().to_lowercase();
            if entry.is_empty() {
                continue;
            }
            let pattern = glob::Pattern::new(&entry)
                .map_err(|e| ConfigError::Invalid(format!("skip pattern {entry:?}: {e}")))?;
            patterns.push(pattern);
        }
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether `repo` is skipped, by bare name or by `owner/name`.
    pub fn matches(&self, repo: &RepoRef) -> bool {
        let name = repo.name.to_lowercase();
        let slug = repo.slug().to_lowercase();
        let options = glob::MatchOptions {
            case_sensitive: false,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        self.patterns.iter().any(|pattern| {
            pattern.matches_with(&name, options) || pattern.matches_with(&slug, options)
        })
    }
}
