//! Thin wrappers over the `git` binary and `gix` used by the history
//! source, the materializer, and the reconstructor.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Output;

use tokio::process::Command;
use tracing::debug;

use crate::error::GitError;
use crate::types::RepoRef;

/// Create a `git` command isolated from the caller's environment.
///
/// Strips `GIT_DIR` and `GIT_WORK_TREE` so inherited variables cannot
/// override the explicit `-C` path, and disables interactive prompts.
pub fn git_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE")
        .env("GIT_TERMINAL_PROMPT", "0")
        .arg("-C")
        .arg(dir);
    cmd.kill_on_drop(true);
    cmd
}

/// Run a git command to completion, failing on a non-zero exit status.
pub async fn run<I, S>(dir: &Path, args: I) -> Result<Output, GitError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = git_cmd(dir);
    cmd.args(args);
    debug!(dir = %dir.display(), "Running git");
    checked(cmd.output().await?)
}

fn checked(output: Output) -> Result<Output, GitError> {
    if output.status.success() {
        Ok(output)
    } else {
        Err(GitError::Failed {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Initialize a repository in `dir` and commit the whole tree once, authored
/// as `author`.
pub async fn init_with_single_commit(
    dir: &Path,
    author: &str,
    message: &str,
) -> Result<(), GitError> {
    run(dir, ["-c", "init.defaultBranch=main", "init", "--quiet"]).await?;
    run(dir, ["add", "--all", "."]).await?;

    let mut cmd = git_cmd(dir);
    cmd.env("GIT_AUTHOR_NAME", author)
        .env("GIT_AUTHOR_EMAIL", "polyglot@localhost")
        .env("GIT_COMMITTER_NAME", author)
        .env("GIT_COMMITTER_EMAIL", "polyglot@localhost")
        .args([
            "-c",
            "commit.gpgsign=false",
            "commit",
            "--quiet",
            "--no-verify",
            "--allow-empty",
            "-m",
            message,
        ]);
    checked(cmd.output().await?)?;
    Ok(())
}

/// Whether `path` opens as a git repository.
pub fn is_repository(path: &Path) -> bool {
    gix::open(path).is_ok()
}

/// Whether `path` is a repository whose `HEAD` has no commit yet, as in a
/// fresh `git init` or a clone of an empty remote.
pub fn is_unborn(path: &Path) -> bool {
    gix::open(path).is_ok_and(|repo| repo.head_id().is_err())
}

/// Detect the GitHub `owner/name` of a local repository from its push remote.
pub fn detect_github_origin(repo_path: &Path) -> Option<RepoRef> {
    let repo = gix::open(repo_path).ok()?;
    let remote = repo
        .find_default_remote(gix::remote::Direction::Push)?
        .ok()?;
    let url = remote.url(gix::remote::Direction::Push)?;
    parse_github_url(&url.to_bstring().to_string())
}

/// Parse `owner/name` from a GitHub URL (SSH or HTTPS).
pub fn parse_github_url(url: &str) -> Option<RepoRef> {
    // SSH: git@github.com:owner/repo.git
    if let Some(rest) = url.strip_prefix("git@github.com:") {
        let rest = rest.strip_suffix(".git").unwrap_or(rest);
        let (owner, repo) = rest.split_once('/')?;
        return Some(RepoRef::new(owner, repo));
    }

    // HTTPS: https://github.com/owner/repo.git
    if let Some((_, after)) = url.split_once("github.com/") {
        let after = after.strip_suffix(".git").unwrap_or(after);
        let (owner, repo) = after.split_once('/')?;
        return Some(RepoRef::new(owner, repo));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ssh_github_url() {
        let repo = parse_github_url("git@github.com:octo/hello.git").unwrap();
        assert_eq!(repo.owner, "octo");
        assert_eq!(repo.name, "hello");
    }

    #[test]
    fn parse_https_github_url() {
        let repo = parse_github_url("https://github.com/rust-lang/cargo.git").unwrap();
        assert_eq!(repo.slug(), "rust-lang/cargo");
    }

    #[test]
    fn parse_https_no_git_suffix() {
        let repo = parse_github_url("https://github.com/foo/bar").unwrap();
        assert_eq!(repo.slug(), "foo/bar");
    }

    #[test]
    fn non_github_url_returns_none() {
        assert!(parse_github_url("https://gitlab.com/foo/bar").is_none());
    }

    #[test]
    fn plain_directory_is_not_repository() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(!is_repository(tmp.path()));
        assert!(detect_github_origin(tmp.path()).is_none());
    }

    #[tokio::test]
    async fn failed_command_carries_stderr() {
        let tmp = tempfile::tempdir().unwrap();
        let err = run(tmp.path(), ["log"]).await.unwrap_err();
        match err {
            GitError::Failed { status, stderr } => {
                assert!(!status.success());
                assert!(!stderr.is_empty());
            }
            GitError::Spawn(e) => panic!("git not runnable: {e}"),
        }
    }

    #[tokio::test]
    async fn fresh_repository_is_unborn() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(!is_unborn(tmp.path()));
        run(tmp.path(), ["init", "--quiet"]).await.unwrap();
        assert!(is_unborn(tmp.path()));

        std::fs::write(tmp.path().join("a.py"), "x=1\n").unwrap();
        init_with_single_commit(tmp.path(), "octo", "first").await.unwrap();
        assert!(!is_unborn(tmp.path()));
    }

    #[tokio::test]
    async fn single_commit_tree() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.py"), "x=1\n").unwrap();
        init_with_single_commit(tmp.path(), "octo", "linguist")
            .await
            .unwrap();
        assert!(is_repository(tmp.path()));

        let log = run(tmp.path(), ["log", "--format=%an|%s"]).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&log.stdout).trim(), "octo|linguist");
    }
}
