//! Synthetic repository reconstruction.
//!
//! Scattered patch fragments are regrouped by origin repository and written
//! out as one single-commit repository per origin, so the attribution
//! engine can walk them exactly like a real checkout.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tracing::{debug, info, instrument, warn};

use crate::error::ReconstructError;
use crate::forge::OverrideSource;
use crate::git;
use crate::types::{PatchFragment, RepoRef, UNKNOWN_ORIGIN, WorkingTree, origin_slug};

/// Message of the single synthetic commit.
const SYNTHETIC_COMMIT_MESSAGE: &str = "linguist";

/// Rebuilds patch fragments into per-origin single-commit repositories.
pub struct Reconstructor<'a> {
    overrides: &'a dyn OverrideSource,
    branches: &'a [String],
    author: &'a str,
}

impl std::fmt::Debug for Reconstructor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconstructor")
            .field("branches", &self.branches)
            .field("author", &self.author)
            .finish_non_exhaustive()
    }
}

impl<'a> Reconstructor<'a> {
    /// `author` is the identity the synthetic commits are authored as; it
    /// must match the author filter later used to walk them.
    pub fn new(overrides: &'a dyn OverrideSource, branches: &'a [String], author: &'a str) -> Self {
        Self {
            overrides,
            branches,
            author,
        }
    }

    /// Write `fragments` under `root` and commit one repository per origin.
    ///
    /// `commit_counts` maps origin tags to the number of real commits the
    /// fragments were taken from. Origins whose files cannot be written or
    /// committed are skipped with a warning.
    #[instrument(skip_all, fields(root = %root.display(), fragments = fragments.len()))]
    pub async fn build(
        &self,
        root: &Path,
        fragments: &[PatchFragment],
        commit_counts: &HashMap<String, u64>,
    ) -> crate::error::Result<Vec<WorkingTree>> {
        let groups = group_by_origin(fragments);
        let mut trees = Vec::with_capacity(groups.len());

        for (tag, group) in groups {
            let dir = root.join(tag);
            match self.build_origin(&dir, tag, &group).await {
                Ok(0) => debug!(origin = tag, "No retained lines, skipping origin"),
                Ok(files) => {
                    debug!(origin = tag, files, "Synthetic repository created");
                    trees.push(WorkingTree::Synthetic {
                        path: dir,
                        origin: tag.to_string(),
                        source_commits: commit_counts.get(tag).copied().unwrap_or(0),
                    });
                }
                Err(e) => warn!(origin = tag, error = %e, "Cannot rebuild origin, skipping"),
            }
        }

        info!(trees = trees.len(), "Synthetic repositories ready");
        Ok(trees)
    }

    /// Build one origin's tree; returns the number of files written.
    async fn build_origin(
        &self,
        dir: &Path,
        tag: &str,
        fragments: &[&PatchFragment],
    ) -> crate::error::Result<usize> {
        let mut written = 0usize;
        for fragment in fragments {
            if fragment.is_empty() {
                continue;
            }
            let Some(relative) = fragment.relative_path() else {
                warn!(directory = %fragment.directory, name = %fragment.name, "Unsafe fragment path, skipping");
                continue;
            };
            let path = dir.join(relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(ReconstructError::Io)?;
            }
            std::fs::write(&path, &fragment.patch).map_err(ReconstructError::Io)?;
            written += 1;
        }
        if written == 0 {
            return Ok(0);
        }

        git::init_with_single_commit(dir, self.author, SYNTHETIC_COMMIT_MESSAGE)
            .await
            .map_err(ReconstructError::from)?;

        if tag != UNKNOWN_ORIGIN {
            self.seed_overrides(dir, tag).await?;
        }
        Ok(written)
    }

    /// Install the origin's `.gitattributes` from the first branch that has
    /// one. They go to `.git/info/attributes`, which the classifier honors
    /// but the synthetic commit never touches.
    async fn seed_overrides(&self, dir: &Path, tag: &str) -> crate::error::Result<()> {
        let Some(origin) = RepoRef::parse(&origin_slug(tag)) else {
            return Ok(());
        };
        for branch in self.branches {
            if let Some(attributes) = self.overrides.language_overrides(&origin, branch).await {
                let info = dir.join(".git").join("info");
                std::fs::create_dir_all(&info).map_err(ReconstructError::Io)?;
                std::fs::write(info.join("attributes"), attributes)
                    .map_err(ReconstructError::Io)?;
                debug!(%origin, branch = %branch, "Seeded .gitattributes");
                return Ok(());
            }
            debug!(%origin, branch = %branch, "No .gitattributes on branch");
        }
        Ok(())
    }
}

/// Group fragments by origin tag, in tag order.
pub fn group_by_origin(fragments: &[PatchFragment]) -> BTreeMap<&str, Vec<&PatchFragment>> {
    let mut groups: BTreeMap<&str, Vec<&PatchFragment>> = BTreeMap::new();
    for fragment in fragments {
        groups.entry(fragment.origin_tag()).or_default().push(fragment);
    }
    groups
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    struct RecordingOverrides {
        available: HashMap<(String, String), String>,
        requests: Mutex<Vec<(String, String)>>,
    }

    #[async_trait::async_trait]
    impl OverrideSource for RecordingOverrides {
        async fn language_overrides(&self, origin: &RepoRef, branch: &str) -> Option<String> {
            let key = (origin.slug(), branch.to_string());
            self.requests.lock().unwrap().push(key.clone());
            self.available.get(&key).cloned()
        }
    }

    fn branches() -> Vec<String> {
        vec!["main".to_string(), "master".to_string()]
    }

    #[test]
    fn groups_by_origin_tag() {
        let fragments = vec![
            PatchFragment::from_patch(Some("octo/a"), "x.py", "+1"),
            PatchFragment::from_patch(Some("octo/b"), "y.py", "+2"),
            PatchFragment::from_patch(Some("octo/a"), "lib/z.py", "+3"),
        ];
        let groups = group_by_origin(&fragments);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["octo@a"].len(), 2);
        assert_eq!(groups["octo@b"].len(), 1);
    }

    #[tokio::test]
    async fn builds_one_repository_per_origin() {
        let root = tempfile::tempdir().unwrap();
        let fragments = vec![
            PatchFragment::from_patch(Some("octo/a"), "src/x.py", "+x=1"),
            PatchFragment::from_patch(Some("octo/b"), "y.rs", "+fn y() {}"),
            PatchFragment::from_patch(Some("octo/b"), "gone.rs", "-removed only"),
        ];
        let counts = HashMap::from([("octo@a".to_string(), 3), ("octo@b".to_string(), 1)]);
        let overrides = RecordingOverrides {
            available: HashMap::from([(
                ("octo/b".to_string(), "master".to_string()),
                "*.rs linguist-language=Rust\n".to_string(),
            )]),
            ..RecordingOverrides::default()
        };
        let branches = branches();
        let reconstructor = Reconstructor::new(&overrides, &branches, "octo");

        let trees = reconstructor
            .build(root.path(), &fragments, &counts)
            .await
            .unwrap();

        assert_eq!(trees.len(), 2);
        assert_eq!(trees[0].path(), root.path().join("octo@a"));
        assert_eq!(trees[0].commit_override(), Some(3));
        assert_eq!(trees[1].commit_override(), Some(1));
        assert_eq!(
            std::fs::read_to_string(root.path().join("octo@a/src/x.py")).unwrap(),
            "x=1"
        );
        assert!(!root.path().join("octo@b/gone.rs").exists());
        assert!(!root.path().join("octo@a/.git/info/attributes").exists());
        assert_eq!(
            std::fs::read_to_string(root.path().join("octo@b/.git/info/attributes")).unwrap(),
            "*.rs linguist-language=Rust\n"
        );
        assert!(!root.path().join("octo@b/.gitattributes").exists());
        assert!(git::is_repository(trees[0].path()));

        let requests = overrides.requests.lock().unwrap();
        assert!(requests.contains(&("octo/a".to_string(), "main".to_string())));
        assert!(requests.contains(&("octo/a".to_string(), "master".to_string())));
        assert!(requests.contains(&("octo/b".to_string(), "master".to_string())));
    }

    #[tokio::test]
    async fn origin_without_retained_lines_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        let fragments = vec![PatchFragment::from_patch(Some("octo/a"), "x.py", "-only")];
        let overrides = RecordingOverrides::default();
        let branches = branches();
        let trees = Reconstructor::new(&overrides, &branches, "octo")
            .build(root.path(), &fragments, &HashMap::new())
            .await
            .unwrap();
        assert!(trees.is_empty());
        assert!(overrides.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_origin_skips_override_fetch() {
        let root = tempfile::tempdir().unwrap();
        let fragments = vec![PatchFragment::from_patch(None, "x.py", "+x")];
        let overrides = RecordingOverrides::default();
        let branches = branches();
        let trees = Reconstructor::new(&overrides, &branches, "octo")
            .build(root.path(), &fragments, &HashMap::new())
            .await
            .unwrap();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].commit_override(), Some(0));
        assert!(overrides.requests.lock().unwrap().is_empty());
    }
}
