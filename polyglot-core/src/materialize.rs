// Repository materialization: produce a local working copy of a remote
// repository for the direct-repository flow.

use std::path::Path;

use tracing::{debug, instrument};

use crate::error::MaterializeError;
use crate::git;
use crate::types::RepoRef;

/// Produces a working directory holding a repository's full history.
#[async_trait::async_trait]
pub trait Materializer: Send + Sync {
    /// Materialize `repo` into the existing, empty directory `dest`.
    async fn materialize(&self, repo: &RepoRef, dest: &Path) -> crate::error::Result<()>;
}

/// Materializer backed by `git clone`.
#[derive(Debug, Clone)]
pub struct GitCloneMaterializer {
    base_url: String,
}

impl GitCloneMaterializer {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn remote_url(&self, repo: &RepoRef) -> String {
        format!("{}/{}/{}", self.base_url, repo.owner, repo.name)
    }
}

#[async_trait::async_trait]
impl Materializer for GitCloneMaterializer {
    #[instrument(skip_all, fields(repo = %repo))]
    async fn materialize(&self, repo: &RepoRef, dest: &Path) -> crate::error::Result<()> {
        let url = self.remote_url(repo);
        debug!(url = %url, dest = %dest.display(), "Cloning");
        git::run(dest, ["clone", "--quiet", url.as_str(), "."])
            .await
            .map_err(|e| MaterializeError::Clone {
                remote: repo.slug(),
                message: e.to_string(),
            })?;

        if !git::is_repository(dest) {
            return Err(MaterializeError::Clone {
                remote: repo.slug(),
                message: "clone did not produce a repository".into(),
            }
            .into());
        }
        Ok(())
    }
}
