// Paginated commit-history retrieval.

use std::path::Path;

use crate::error::HistoryError;
use crate::git;
use crate::types::AuthorFilter;

/// One page of history: `span` commits starting `index * span` commits
/// from the head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub index: u64,
    pub span: u64,
}

impl PageRequest {
    /// Number of matching commits to skip from the head.
    pub fn skip(&self) -> u64 {
        self.index * self.span
    }
}

/// A source of unified-diff history pages.
#[async_trait::async_trait]
pub trait HistorySource: Send + Sync {
    /// Return the diff text of one page of commits authored by `authors`.
    ///
    /// An empty (or whitespace-only) page means history is exhausted.
    async fn page(
        &self,
        dir: &Path,
        authors: &AuthorFilter,
        request: PageRequest,
    ) -> Result<String, HistoryError>;
}

/// History source backed by `git log --patch`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitLogSource;

impl GitLogSource {
    /// Arguments for one page, after `git -C <dir>`.
    pub fn log_args(authors: &AuthorFilter, request: PageRequest) -> Vec<String> {
        let mut args = vec![
            "log".to_string(),
            "--no-color".to_string(),
            "--no-decorate".to_string(),
            "--no-ext-diff".to_string(),
            "--src-prefix=a/".to_string(),
            "--dst-prefix=b/".to_string(),
            "--regexp-ignore-case".to_string(),
            "--fixed-strings".to_string(),
        ];
        args.extend(
            authors
                .identities()
                .iter()
                .map(|identity| format!("--author={identity}")),
        );
        args.push("--format=short".to_string());
        args.push("--patch".to_string());
        args.push(format!("--max-count={}", request.span));
        args.push(format!("--skip={}", request.skip()));
        args
    }
}

#[async_trait::async_trait]
impl HistorySource for GitLogSource {
    async fn page(
        &self,
        dir: &Path,
        authors: &AuthorFilter,
        request: PageRequest,
    ) -> Result<String, HistoryError> {
        match git::run(dir, Self::log_args(authors, request)).await {
            Ok(output) => Ok(String::from_utf8_lossy(&output.stdout).into_owned()),
            // git log refuses to run before the first commit.
            Err(_) if git::is_unborn(dir) => Ok(String::new()),
            Err(e) => Err(HistoryError::Page {
                index: request.index,
                message: e.to_string(),
            }),
        }
    }
}
