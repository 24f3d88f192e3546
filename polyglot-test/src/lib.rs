// Integration test utilities and git fixtures for polyglot.

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use std::sync::Mutex;

use polyglot_core::classify::Classifier;
use polyglot_core::config::PolyglotConfig;
use polyglot_core::error::{ClassifyError, HistoryError};
use polyglot_core::flows::{FlowContext, analyze_local};
use polyglot_core::history::{GitLogSource, HistorySource, PageRequest};
use polyglot_core::types::{AttributionResult, AuthorFilter};

pub const OCTO: (&str, &str) = ("Octo Cat", "octo@example.com");
pub const HUBOT: (&str, &str) = ("Hubot", "hubot@example.com");

/// A test fixture with a temporary git repository.
#[derive(Debug)]
pub struct TestRepo {
    pub dir: tempfile::TempDir,
}

impl TestRepo {
    /// An empty, initialized repository.
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().expect("create tempdir");
        git(dir.path(), &["-c", "init.defaultBranch=main", "init", "--quiet"]);
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `files` and commit them as `author`.
    pub fn commit(&self, author: (&str, &str), files: &[(&str, &str)], message: &str) -> &Self {
        for (rel, content) in files {
            let path = self.path().join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, content).unwrap();
        }
        git(self.path(), &["add", "--all", "."]);
        git_as(
            self.path(),
            author,
            &["-c", "commit.gpgsign=false", "commit", "--quiet", "-m", message],
        );
        self
    }

    /// Remove `rel` and commit the deletion as `author`.
    pub fn delete(&self, author: (&str, &str), rel: &str, message: &str) -> &Self {
        std::fs::remove_file(self.path().join(rel)).unwrap();
        git(self.path(), &["add", "--all", "."]);
        git_as(
            self.path(),
            author,
            &["-c", "commit.gpgsign=false", "commit", "--quiet", "-m", message],
        );
        self
    }

    /// One commit adding `a.py` with two lines.
    pub fn single_python() -> Self {
        let repo = Self::empty();
        repo.commit(OCTO, &[("a.py", "x=1\ny=2\n")], "Add a.py");
        repo
    }

    /// Two authors editing Python, Rust, JavaScript and Markdown.
    ///
    /// Octo's share: Python "x=1", "z=3"; JavaScript "let c;"; plus an
    /// unclassified README. Hubot only touches Rust.
    pub fn multi_author() -> Self {
        let repo = Self::empty();
        repo.commit(
            OCTO,
            &[("a.py", "x=1\n"), ("README.md", "# Demo\n")],
            "Start",
        )
        .commit(HUBOT, &[("src/b.rs", "fn b() {}\n")], "Add b.rs")
        .commit(
            OCTO,
            &[("a.py", "x=1\nz=3\n"), ("web/c.js", "let c;\n\n   \n")],
            "Add z and c.js",
        );
        repo
    }
}

fn git(dir: &Path, args: &[&str]) {
    git_as(dir, ("Fixture", "fixture@example.com"), args);
}

fn git_as(dir: &Path, author: (&str, &str), args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE")
        .env("GIT_AUTHOR_NAME", author.0)
        .env("GIT_AUTHOR_EMAIL", author.1)
        .env("GIT_COMMITTER_NAME", author.0)
        .env("GIT_COMMITTER_EMAIL", author.1)
        .env("GIT_AUTHOR_DATE", "2025-01-15T10:00:00+00:00")
        .env("GIT_COMMITTER_DATE", "2025-01-15T10:00:00+00:00")
        .output()
        .unwrap_or_else(|e| panic!("git {}: {e}", args.join(" ")));
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!("git {} failed: {stderr}", args.join(" "));
    }
}

/// Classifier assigning languages by file extension, so tests do not need
/// linguist installed.
#[derive(Debug, Clone)]
pub struct ExtensionClassifier {
    extensions: HashMap<String, String>,
}

impl Default for ExtensionClassifier {
    fn default() -> Self {
        Self::new([("py", "Python"), ("rs", "Rust"), ("js", "JavaScript")])
    }
}

impl ExtensionClassifier {
    pub fn new<'a>(extensions: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            extensions: extensions
                .into_iter()
                .map(|(ext, lang)| (ext.to_string(), lang.to_string()))
                .collect(),
        }
    }

    fn collect(
        &self,
        root: &Path,
        dir: &Path,
        grouped: &mut HashMap<String, Vec<String>>,
    ) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.file_name().is_some_and(|n| n == ".git") {
                continue;
            }
            if path.is_dir() {
                self.collect(root, &path, grouped)?;
                continue;
            }
            let Some(language) = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(|e| self.extensions.get(e))
            else {
                continue;
            };
            let relative = path
                .strip_prefix(root)
                .map_err(std::io::Error::other)?
                .to_string_lossy()
                .replace('\\', "/");
            grouped.entry(language.clone()).or_default().push(relative);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Classifier for ExtensionClassifier {
    fn name(&self) -> &str {
        "extension"
    }

    fn ensure_available(&self) -> polyglot_core::error::Result<()> {
        Ok(())
    }

    async fn classify(&self, dir: &Path) -> polyglot_core::error::Result<HashMap<String, Vec<String>>> {
        let mut grouped = HashMap::new();
        self.collect(dir, dir, &mut grouped)
            .map_err(ClassifyError::Io)?;
        Ok(grouped)
    }
}

/// Wraps `git log`, failing the listed page indices and recording every
/// request.
#[derive(Debug, Default)]
pub struct FlakyHistory {
    failing: Vec<u64>,
    requests: Mutex<Vec<PageRequest>>,
}

impl FlakyHistory {
    pub fn failing(pages: impl IntoIterator<Item = u64>) -> Self {
        Self {
            failing: pages.into_iter().collect(),
            requests: Mutex::default(),
        }
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl HistorySource for FlakyHistory {
    async fn page(
        &self,
        dir: &Path,
        authors: &AuthorFilter,
        request: PageRequest,
    ) -> Result<String, HistoryError> {
        self.requests.lock().unwrap().push(request);
        if self.failing.contains(&request.index) {
            return Err(HistoryError::Page {
                index: request.index,
                message: "injected failure".into(),
            });
        }
        GitLogSource.page(dir, authors, request).await
    }
}

/// Attribute `repo_path` for `identities` with the extension classifier and
/// real `git log`.
pub async fn analyze(repo_path: &Path, identities: &[&str]) -> AttributionResult {
    analyze_with(repo_path, identities, &GitLogSource, &PolyglotConfig::default()).await
}

pub async fn analyze_with(
    repo_path: &Path,
    identities: &[&str],
    history: &dyn HistorySource,
    config: &PolyglotConfig,
) -> AttributionResult {
    let authors = AuthorFilter::new(identities);
    let ctx = FlowContext {
        classifier: &ExtensionClassifier::default(),
        history,
        config,
        authors: &authors,
    };
    analyze_local(&ctx, repo_path).await.unwrap()
}
