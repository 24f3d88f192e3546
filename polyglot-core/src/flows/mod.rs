//! Entry flows over the attribution engine.
//!
//! Every flow reduces to the same step: take a [`WorkingTree`], snapshot it
//! with the classifier, and walk its history. The flows differ only in
//! where the working trees come from:
//!
//! - [`analyze_local`]: a repository already on disk.
//! - [`indepth::indepth`]: one fresh clone per remote repository.
//! - [`recent::recent`]: synthetic repositories rebuilt from recent patches.

pub mod indepth;
pub mod recent;

use std::path::Path;

use tracing::{info, instrument};

use crate::attribution::AttributionEngine;
use crate::classify::{Classifier, build_snapshot};
use crate::config::PolyglotConfig;
use crate::error::HistoryError;
use crate::git;
use crate::history::HistorySource;
use crate::types::{AttributionResult, AuthorFilter, WorkingTree};

pub use indepth::{IndepthReport, indepth};
pub use recent::recent;

/// Collaborators shared by every flow.
#[derive(Clone, Copy)]
pub struct FlowContext<'a> {
    pub classifier: &'a dyn Classifier,
    pub history: &'a dyn HistorySource,
    pub config: &'a PolyglotConfig,
    pub authors: &'a AuthorFilter,
}

impl std::fmt::Debug for FlowContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowContext")
            .field("classifier", &self.classifier.name())
            .field("authors", &self.authors)
            .finish_non_exhaustive()
    }
}

/// Snapshot and walk one working tree into a fresh result.
///
/// Synthetic trees have their commit count replaced by the number of real
/// commits their fragments came from.
#[instrument(skip_all, fields(tree = %tree.path().display()))]
pub async fn analyze_tree(
    ctx: &FlowContext<'_>,
    tree: &WorkingTree,
) -> crate::error::Result<AttributionResult> {
    let snapshot = build_snapshot(ctx.classifier, tree.path()).await?;
    let mut result = AttributionResult::new();
    AttributionEngine::new(ctx.history, &ctx.config.history)
        .analyze(tree.path(), &snapshot, ctx.authors, &mut result)
        .await;
    if let Some(commits) = tree.commit_override() {
        result.override_commits(commits);
    }
    Ok(result)
}

/// Attribute the history of a repository that is already checked out.
///
/// The directory belongs to the caller and is never modified.
pub async fn analyze_local(
    ctx: &FlowContext<'_>,
    path: &Path,
) -> crate::error::Result<AttributionResult> {
    ctx.classifier.ensure_available()?;
    if !git::is_repository(path) {
        return Err(HistoryError::NotARepository(path.display().to_string()).into());
    }
    let result = analyze_tree(ctx, &WorkingTree::Real(path.to_path_buf())).await?;
    info!(
        total = result.total(),
        commits = result.commits(),
        files = result.files(),
        "Local analysis complete"
    );
    Ok(result)
}
