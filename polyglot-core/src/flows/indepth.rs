// Direct-repository flow: clone each repository into its own temporary
// directory, attribute its history, and remove the clone.

use tracing::{info, instrument, warn};

use super::{FlowContext, analyze_tree};
use crate::error::MaterializeError;
use crate::materialize::Materializer;
use crate::progress::ProgressReporter;
use crate::skip::SkipList;
use crate::types::{AttributionResult, RepoRef, WorkingTree};

/// Outcome of an indepth run.
#[derive(Debug, Clone, Default)]
pub struct IndepthReport {
    /// Merged attribution over every analyzed repository.
    pub result: AttributionResult,
    pub analyzed: Vec<RepoRef>,
    pub skipped: Vec<RepoRef>,
    /// Repositories that could not be cloned or classified.
    pub failed: Vec<RepoRef>,
}

/// Attribute the history of every repository in `repos` not matched by `skip`.
///
/// Per-repository failures are logged and the repository is left out; only
/// a missing classifier or an unusable work directory abort the run.
#[instrument(skip_all, name = "indepth", fields(login = %login, repos = repos.len()))]
pub async fn indepth(
    ctx: &FlowContext<'_>,
    materializer: &dyn Materializer,
    login: &str,
    repos: &[RepoRef],
    skip: &SkipList,
    progress: &dyn ProgressReporter,
) -> crate::error::Result<IndepthReport> {
    ctx.classifier.ensure_available()?;

    let root = ctx.config.workdir.resolve_root();
    std::fs::create_dir_all(&root).map_err(MaterializeError::Io)?;

    let mut report = IndepthReport::default();
    progress.start(login, Some(repos.len() as u64));

    for repo in repos {
        if skip.matches(repo) {
            info!(%repo, "Skipping repository");
            report.skipped.push(repo.clone());
            progress.advance(1);
            continue;
        }

        match analyze_clone(ctx, materializer, login, repo, &root).await {
            Ok(result) => {
                info!(
                    %repo,
                    total = result.total(),
                    commits = result.commits(),
                    "Repository analyzed"
                );
                report.result.merge(&result);
                report.analyzed.push(repo.clone());
            }
            Err(e) => {
                warn!(%repo, error = %e, "Cannot analyze repository, skipping");
                progress.message(&format!("{repo}: {e}"));
                report.failed.push(repo.clone());
            }
        }
        progress.advance(1);
    }

    progress.finish();
    info!(
        analyzed = report.analyzed.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Indepth run complete"
    );
    Ok(report)
}

async fn analyze_clone(
    ctx: &FlowContext<'_>,
    materializer: &dyn Materializer,
    login: &str,
    repo: &RepoRef,
    root: &std::path::Path,
) -> crate::error::Result<AttributionResult> {
    let workdir = tempfile::Builder::new()
        .prefix(&format!("{login}-{}-", repo.dir_name()))
        .tempdir_in(root)
        .map_err(MaterializeError::Io)?;

    let outcome = match materializer.materialize(repo, workdir.path()).await {
        Ok(()) => analyze_tree(ctx, &WorkingTree::Real(workdir.path().to_path_buf())).await,
        Err(e) => Err(e),
    };

    let path = workdir.path().to_path_buf();
    if let Err(e) = workdir.close() {
        warn!(dir = %path.display(), error = %e, "Cannot remove working directory");
    }
    outcome
}
