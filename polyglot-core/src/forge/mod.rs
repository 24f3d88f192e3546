//! Remote data sources: repository lists, recent activity, and the
//! language-override files used when rebuilding synthetic repositories.

pub mod github;

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::skip::SkipList;
use crate::types::{AuthorFilter, PatchFragment, RepoRef, origin_tag};

pub use github::GitHubClient;

/// Lists repositories owned by an account.
#[async_trait::async_trait]
pub trait RepositorySource: Send + Sync {
    async fn list_repositories(&self, login: &str) -> crate::error::Result<Vec<RepoRef>>;
}

/// Loads an account's recent authored patches.
#[async_trait::async_trait]
pub trait ActivitySource: Send + Sync {
    /// Best-effort: individual fetch failures are logged and excluded.
    async fn recent_activity(&self, query: &ActivityQuery<'_>) -> RecentActivity;
}

/// Fetches `.gitattributes` language overrides for a repository.
#[async_trait::async_trait]
pub trait OverrideSource: Send + Sync {
    /// `None` when the file is absent or cannot be fetched.
    async fn language_overrides(&self, origin: &RepoRef, branch: &str) -> Option<String>;
}

/// Parameters of a recent-activity query.
#[derive(Debug, Clone, Copy)]
pub struct ActivityQuery<'a> {
    pub login: &'a str,
    pub authors: &'a AuthorFilter,
    /// Window in days (0 = unlimited).
    pub days: u32,
    /// Number of events to load.
    pub load: u32,
    /// Accept pushes from any actor (organization accounts).
    pub organization: bool,
    pub skip: &'a SkipList,
}

/// A real commit whose patches were turned into fragments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceCommit {
    pub origin: RepoRef,
    pub sha: String,
}

/// Authored commits and their fragments, ready for reconstruction.
#[derive(Debug, Clone, Default)]
pub struct RecentActivity {
    pub commits: Vec<SourceCommit>,
    pub fragments: Vec<PatchFragment>,
    /// Creation time of the oldest push event loaded.
    pub oldest_event: Option<DateTime<Utc>>,
}

impl RecentActivity {
    /// Source commit count per origin tag.
    pub fn commit_counts(&self) -> HashMap<String, u64> {
        let mut counts: HashMap<String, u64> = HashMap::new();
        for commit in &self.commits {
            *counts.entry(origin_tag(&commit.origin.slug())).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_counts_group_by_origin() {
        let activity = RecentActivity {
            commits: vec![
                SourceCommit {
                    origin: RepoRef::new("octo", "a"),
                    sha: "1".into(),
                },
                SourceCommit {
                    origin: RepoRef::new("octo", "a"),
                    sha: "2".into(),
                },
                SourceCommit {
                    origin: RepoRef::new("octo", "b"),
                    sha: "3".into(),
                },
            ],
            ..RecentActivity::default()
        };
        let counts = activity.commit_counts();
        assert_eq!(counts["octo@a"], 2);
        assert_eq!(counts["octo@b"], 1);
    }
}
