// Recent-activity flow: rebuild the author's recent patches into synthetic
// repositories and attribute each one.

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use super::{FlowContext, analyze_tree};
use crate::error::{ConfigError, ReconstructError};
use crate::forge::{ActivityQuery, ActivitySource, OverrideSource};
use crate::reconstruct::Reconstructor;
use crate::skip::SkipList;
use crate::types::{AttributionResult, RecentAttribution};

const SECONDS_PER_DAY: i64 = 86_400;

/// Attribute the patches `login` pushed recently.
///
/// Activity loading is best-effort; trees that cannot be classified are
/// logged and left out. The synthetic repositories live in one temporary
/// directory that is removed before returning.
#[instrument(skip_all, name = "recent", fields(login = %login))]
pub async fn recent(
    ctx: &FlowContext<'_>,
    activity_source: &dyn ActivitySource,
    overrides: &dyn OverrideSource,
    login: &str,
    skip: &SkipList,
    now: DateTime<Utc>,
) -> crate::error::Result<RecentAttribution> {
    ctx.classifier.ensure_available()?;
    let author = ctx
        .authors
        .primary()
        .ok_or_else(|| ConfigError::Invalid("at least one author identity is required".into()))?;

    let settings = &ctx.config.recent;
    let query = ActivityQuery {
        login,
        authors: ctx.authors,
        days: settings.days,
        load: settings.load,
        organization: settings.organization,
        skip,
    };
    let activity = activity_source.recent_activity(&query).await;
    let latest = activity.oldest_event.map(|oldest| age_in_days(oldest, now));

    let root_parent = ctx.config.workdir.resolve_root();
    std::fs::create_dir_all(&root_parent).map_err(ReconstructError::Io)?;
    let root = tempfile::Builder::new()
        .prefix(&format!("{}-", settings.tempdir_prefix))
        .tempdir_in(&root_parent)
        .map_err(ReconstructError::Io)?;

    let outcome = attribute_fragments(ctx, overrides, author, &activity, root.path()).await;

    let path = root.path().to_path_buf();
    if let Err(e) = root.close() {
        warn!(dir = %path.display(), error = %e, "Cannot remove synthetic repositories");
    }

    let result = outcome?;
    info!(
        total = result.total(),
        commits = result.commits(),
        latest,
        "Recent analysis complete"
    );
    Ok(RecentAttribution {
        result,
        days: settings.days,
        latest,
    })
}

async fn attribute_fragments(
    ctx: &FlowContext<'_>,
    overrides: &dyn OverrideSource,
    author: &str,
    activity: &crate::forge::RecentActivity,
    root: &std::path::Path,
) -> crate::error::Result<AttributionResult> {
    let branches = &ctx.config.forge.override_branches;
    let counts = activity.commit_counts();
    let trees = Reconstructor::new(overrides, branches, author)
        .build(root, &activity.fragments, &counts)
        .await?;

    let mut merged = AttributionResult::new();
    for tree in &trees {
        match analyze_tree(ctx, tree).await {
            Ok(result) => merged.merge(&result),
            Err(e) => warn!(tree = %tree.path().display(), error = %e, "Cannot analyze synthetic repository"),
        }
    }
    // Origins left without a tree still contributed their commits.
    merged.override_commits(counts.values().sum());
    Ok(merged)
}

/// Whole days between `then` and `now`, rounded to the nearest day.
pub fn age_in_days(then: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (now - then).num_seconds();
    (seconds + SECONDS_PER_DAY / 2).div_euclid(SECONDS_PER_DAY)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::classify::Classifier;
    use crate::config::PolyglotConfig;
    use crate::error::ClassifyError;
    use crate::flows::testing::ExtensionClassifier;
    use crate::forge::{RecentActivity, SourceCommit};
    use crate::history::GitLogSource;
    use crate::types::{AuthorFilter, PatchFragment, RepoRef};

    #[derive(Debug, Default)]
    struct CannedActivity {
        activity: RecentActivity,
        queries: Mutex<Vec<(String, u32, u32)>>,
    }

    #[async_trait::async_trait]
    impl ActivitySource for CannedActivity {
        async fn recent_activity(&self, query: &ActivityQuery<'_>) -> RecentActivity {
            self.queries
                .lock()
                .unwrap()
                .push((query.login.to_string(), query.days, query.load));
            self.activity.clone()
        }
    }

    #[derive(Debug, Default)]
    struct NoOverrides;

    #[async_trait::async_trait]
    impl OverrideSource for NoOverrides {
        async fn language_overrides(&self, _origin: &RepoRef, _branch: &str) -> Option<String> {
            None
        }
    }

    /// Available, but fails on every tree.
    #[derive(Debug)]
    struct FailingClassifier;

    #[async_trait::async_trait]
    impl Classifier for FailingClassifier {
        fn name(&self) -> &str {
            "failing"
        }

        fn ensure_available(&self) -> crate::error::Result<()> {
            Ok(())
        }

        async fn classify(&self, _dir: &Path) -> crate::error::Result<HashMap<String, Vec<String>>> {
            Err(ClassifyError::Parse("not json".into()).into())
        }
    }

    fn commit(slug: &str, sha: &str) -> SourceCommit {
        SourceCommit {
            origin: RepoRef::parse(slug).unwrap(),
            sha: sha.into(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap()
    }

    fn config_in(root: &Path) -> PolyglotConfig {
        let mut config = PolyglotConfig::default();
        config.workdir.root = Some(root.to_path_buf());
        config
    }

    #[test]
    fn age_rounds_to_nearest_day() {
        let now = now();
        assert_eq!(age_in_days(now, now), 0);
        assert_eq!(age_in_days(now - Duration::hours(11), now), 0);
        assert_eq!(age_in_days(now - Duration::hours(13), now), 1);
        assert_eq!(age_in_days(now - Duration::days(3), now), 3);
    }

    #[tokio::test]
    async fn two_origins_are_attributed_separately() {
        let root = tempfile::tempdir().unwrap();
        let config = config_in(root.path());
        let authors = AuthorFilter::new(["octo"]);
        let ctx = FlowContext {
            classifier: &ExtensionClassifier::default(),
            history: &GitLogSource,
            config: &config,
            authors: &authors,
        };
        let source = CannedActivity {
            activity: RecentActivity {
                commits: vec![
                    commit("octo/a", "1"),
                    commit("octo/a", "2"),
                    commit("octo/b", "3"),
                ],
                fragments: vec![
                    PatchFragment::from_patch(Some("octo/a"), "src/x.py", "@@ -0,0 +1 @@\n+x=1"),
                    PatchFragment::from_patch(Some("octo/a"), "y.py", "+y=22"),
                    PatchFragment::from_patch(Some("octo/b"), "x.py", "+x=1\n-old"),
                ],
                oldest_event: Some(now() - Duration::days(2)),
            },
            ..CannedActivity::default()
        };

        let recent = recent(&ctx, &source, &NoOverrides, "octo", &SkipList::default(), now())
            .await
            .unwrap();

        assert_eq!(recent.result.commits(), 3);
        assert_eq!(recent.result.files(), 3);
        assert_eq!(recent.result.stats()["Python"], 3 + 4 + 3);
        assert_eq!(recent.result.lines()["Python"], 3);
        assert_eq!(recent.days, 14);
        assert_eq!(recent.latest, Some(2));
        assert_eq!(
            source.queries.lock().unwrap().as_slice(),
            &[("octo".to_string(), 14, 300)]
        );
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn removal_only_origin_still_counts_commits() {
        let root = tempfile::tempdir().unwrap();
        let config = config_in(root.path());
        let authors = AuthorFilter::new(["octo"]);
        let ctx = FlowContext {
            classifier: &ExtensionClassifier::default(),
            history: &GitLogSource,
            config: &config,
            authors: &authors,
        };
        let source = CannedActivity {
            activity: RecentActivity {
                commits: vec![commit("octo/a", "1"), commit("octo/b", "2")],
                fragments: vec![
                    PatchFragment::from_patch(Some("octo/a"), "x.py", "+x=1"),
                    PatchFragment::from_patch(Some("octo/b"), "y.py", "-removed"),
                ],
                oldest_event: Some(now()),
            },
            ..CannedActivity::default()
        };

        let recent = recent(&ctx, &source, &NoOverrides, "octo", &SkipList::default(), now())
            .await
            .unwrap();

        assert_eq!(recent.result.commits(), 2);
        assert_eq!(recent.result.files(), 1);
        assert_eq!(recent.result.total(), 3);
    }

    #[tokio::test]
    async fn unclassifiable_trees_keep_their_commits() {
        let root = tempfile::tempdir().unwrap();
        let config = config_in(root.path());
        let authors = AuthorFilter::new(["octo"]);
        let ctx = FlowContext {
            classifier: &FailingClassifier,
            history: &GitLogSource,
            config: &config,
            authors: &authors,
        };
        let source = CannedActivity {
            activity: RecentActivity {
                commits: vec![commit("octo/a", "1"), commit("octo/a", "2")],
                fragments: vec![PatchFragment::from_patch(Some("octo/a"), "x.py", "+x=1")],
                oldest_event: None,
            },
            ..CannedActivity::default()
        };

        let recent = recent(&ctx, &source, &NoOverrides, "octo", &SkipList::default(), now())
            .await
            .unwrap();

        assert_eq!(recent.result.commits(), 2);
        assert_eq!(recent.result.total(), 0);
    }

    #[tokio::test]
    async fn no_activity_yields_empty_result() {
        let root = tempfile::tempdir().unwrap();
        let config = config_in(root.path());
        let authors = AuthorFilter::new(["octo"]);
        let ctx = FlowContext {
            classifier: &ExtensionClassifier::default(),
            history: &GitLogSource,
            config: &config,
            authors: &authors,
        };
        let recent = recent(
            &ctx,
            &CannedActivity::default(),
            &NoOverrides,
            "octo",
            &SkipList::default(),
            now(),
        )
        .await
        .unwrap();

        assert_eq!(recent.result, AttributionResult::default());
        assert_eq!(recent.latest, None);
    }

    #[tokio::test]
    async fn empty_identities_are_rejected() {
        let root = tempfile::tempdir().unwrap();
        let config = config_in(root.path());
        let authors = AuthorFilter::default();
        let ctx = FlowContext {
            classifier: &ExtensionClassifier::default(),
            history: &GitLogSource,
            config: &config,
            authors: &authors,
        };
        let err = recent(
            &ctx,
            &CannedActivity::default(),
            &NoOverrides,
            "octo",
            &SkipList::default(),
            now(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("author identity"));
    }

    #[test]
    fn commit_counts_feed_reconstruction() {
        let activity = RecentActivity {
            commits: vec![commit("octo/a", "1")],
            ..RecentActivity::default()
        };
        assert_eq!(activity.commit_counts(), HashMap::from([("octo@a".to_string(), 1)]));
    }
}
