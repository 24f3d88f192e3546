use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

// ── Classification snapshot ────────────────────────────────────────

/// Point-in-time mapping from repository-relative file path to language.
///
/// Only valid for the working-tree state it was computed from. Built once
/// per analysis run and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationSnapshot {
    files: HashMap<String, String>,
}

impl ClassificationSnapshot {
    /// Invert the classifier's native language → files grouping.
    ///
    /// If a file appears under several languages the lexicographically
    /// smallest language wins, so the result does not depend on map order.
    pub fn from_grouped(grouped: HashMap<String, Vec<String>>) -> Self {
        let mut files: HashMap<String, String> = HashMap::new();
        for (language, paths) in grouped {
            for path in paths {
                files
                    .entry(path)
                    .and_modify(|existing| {
                        if language < *existing {
                            existing.clone_from(&language);
                        }
                    })
                    .or_insert_with(|| language.clone());
            }
        }
        Self { files }
    }

    pub fn language_of(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl<P: Into<String>, L: Into<String>> FromIterator<(P, L)> for ClassificationSnapshot {
    fn from_iter<T: IntoIterator<Item = (P, L)>>(iter: T) -> Self {
        Self {
            files: iter
                .into_iter()
                .map(|(path, language)| (path.into(), language.into()))
                .collect(),
        }
    }
}

// ── Attribution accumulator ────────────────────────────────────────

/// Per-language added-line totals for one or more analysis runs.
///
/// Fields are private so that `lines` and `stats` always share a key set
/// and `total` always equals the sum of `stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttributionResult {
    total: u64,
    lines: BTreeMap<String, u64>,
    stats: BTreeMap<String, u64>,
    commits: u64,
    files: u64,
    missed: u64,
}

impl AttributionResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute one added line of `bytes` UTF-8 bytes to `language`.
    pub fn record_line(&mut self, language: &str, bytes: u64) {
        *self.stats.entry(language.to_string()).or_insert(0) += bytes;
        *self.lines.entry(language.to_string()).or_insert(0) += 1;
        self.total += bytes;
    }

    pub fn record_commit(&mut self) {
        self.commits += 1;
    }

    /// Count `pages` history pages as skipped.
    pub fn record_missed(&mut self, pages: u64) {
        self.missed += pages;
    }

    pub fn add_files(&mut self, files: u64) {
        self.files += files;
    }

    /// Replace the walker's commit counter with a count known to the caller.
    ///
    /// Synthetic repositories hold one constructed commit regardless of how
    /// many source commits their fragments came from.
    pub fn override_commits(&mut self, commits: u64) {
        self.commits = commits;
    }

    /// Fold another result slice into this one.
    pub fn merge(&mut self, other: &AttributionResult) {
        for (language, bytes) in &other.stats {
            *self.stats.entry(language.clone()).or_insert(0) += bytes;
        }
        for (language, count) in &other.lines {
            *self.lines.entry(language.clone()).or_insert(0) += count;
        }
        self.total += other.total;
        self.commits += other.commits;
        self.files += other.files;
        self.missed += other.missed;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn lines(&self) -> &BTreeMap<String, u64> {
        &self.lines
    }

    pub fn stats(&self) -> &BTreeMap<String, u64> {
        &self.stats
    }

    pub fn commits(&self) -> u64 {
        self.commits
    }

    pub fn files(&self) -> u64 {
        self.files
    }

    pub fn missed(&self) -> u64 {
        self.missed
    }

    /// Check both accumulator invariants.
    pub fn is_consistent(&self) -> bool {
        self.total == self.stats.values().sum::<u64>()
            && self.lines.keys().eq(self.stats.keys())
    }
}

/// Outcome of the recent-activity flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecentAttribution {
    #[serde(flatten)]
    pub result: AttributionResult,
    /// Activity window the events were filtered to (0 = unlimited).
    pub days: u32,
    /// Age in days of the oldest push event loaded.
    pub latest: Option<i64>,
}

// ── Author identities ──────────────────────────────────────────────

/// Case-insensitive substring filter over commit author name and email.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorFilter {
    identities: Vec<String>,
}

impl AuthorFilter {
    pub fn new<I, S>(identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for identity in identities {
            let identity = identity.as_ref().trim().to_lowercase();
            if !identity.is_empty() && !normalized.contains(&identity) {
                normalized.push(identity);
            }
        }
        Self {
            identities: normalized,
        }
    }

    pub fn identities(&self) -> &[String] {
        &self.identities
    }

    /// Identity used when authoring synthetic commits.
    pub fn primary(&self) -> Option<&str> {
        self.identities.first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn matches(&self, name: Option<&str>, email: Option<&str>) -> bool {
        let name = name.map(str::to_lowercase);
        let email = email.map(str::to_lowercase);
        self.identities.iter().any(|identity| {
            email.as_deref().is_some_and(|e| e.contains(identity.as_str()))
                || name.as_deref().is_some_and(|n| n.contains(identity.as_str()))
        })
    }
}

// ── Repositories ───────────────────────────────────────────────────

/// A remote repository identified by `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse an `owner/name` slug.
    pub fn parse(slug: &str) -> Option<Self> {
        let slug = slug.trim().trim_matches('/');
        let (owner, name) = slug.split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(owner, name))
    }

    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Directory-safe rendering of the slug (non-word characters become `_`).
    pub fn dir_name(&self) -> String {
        self.slug()
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
            .collect()
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

// ── Patch fragments ────────────────────────────────────────────────

/// Tag used for fragments whose origin repository is unknown.
pub const UNKNOWN_ORIGIN: &str = "_";

/// Directory tag for an origin slug: `owner/name` becomes `owner@name`.
pub fn origin_tag(slug: &str) -> String {
    slug.replace('/', "@")
}

/// Inverse of [`origin_tag`].
pub fn origin_slug(tag: &str) -> String {
    tag.replacen('@', "/", 1)
}

/// One file's worth of lines added by the target author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchFragment {
    /// File name without directory.
    pub name: String,
    /// `<origin-tag>/<original-directory>`, or just `<origin-tag>` for
    /// files at the repository root.
    pub directory: String,
    /// Added lines with their `+` marker removed, newline-joined.
    pub patch: String,
}

impl PatchFragment {
    /// Build a fragment from a unified-diff patch body, keeping only added lines.
    pub fn from_patch(origin: Option<&str>, filename: &str, patch: &str) -> Self {
        let tag = origin.map_or_else(|| UNKNOWN_ORIGIN.to_string(), origin_tag);
        let path = Path::new(filename);
        let name = path
            .file_name()
            .map_or_else(|| filename.to_string(), |n| n.to_string_lossy().to_string());
        let directory = match path.parent().map(|p| p.to_string_lossy().to_string()) {
            Some(parent) if !parent.is_empty() => format!("{tag}/{parent}"),
            _ => tag,
        };
        let retained: Vec<&str> = patch
            .lines()
            .filter_map(|line| line.strip_prefix('+'))
            .collect();
        Self {
            name,
            directory,
            patch: retained.join("\n"),
        }
    }

    /// Origin tag embedded in the synthetic directory.
    pub fn origin_tag(&self) -> &str {
        self.directory
            .split('/')
            .next()
            .filter(|tag| !tag.is_empty())
            .unwrap_or(UNKNOWN_ORIGIN)
    }

    /// Path of the fragment inside its origin's synthetic tree.
    ///
    /// Returns `None` when the path would escape the tree (`..`, absolute
    /// components) or has no file name.
    pub fn relative_path(&self) -> Option<PathBuf> {
        let mut relative = PathBuf::new();
        if let Some((_, rest)) = self.directory.split_once('/') {
            relative.push(rest);
        }
        relative.push(&self.name);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        (safe && !self.name.is_empty()).then_some(relative)
    }

    pub fn is_empty(&self) -> bool {
        self.patch.trim().is_empty()
    }
}

// ── Working trees ──────────────────────────────────────────────────

/// A directory the attribution engine can run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkingTree {
    /// A real repository checkout with genuine history.
    Real(PathBuf),
    /// A single-commit tree rebuilt from patch fragments.
    Synthetic {
        path: PathBuf,
        /// Origin tag the fragments came from.
        origin: String,
        /// Number of real commits the fragments were taken from.
        source_commits: u64,
    },
}

impl WorkingTree {
    pub fn path(&self) -> &Path {
        match self {
            Self::Real(path) | Self::Synthetic { path, .. } => path,
        }
    }

    /// Commit count that must replace the walker's own counter, if any.
    pub fn commit_override(&self) -> Option<u64> {
        match self {
            Self::Real(_) => None,
            Self::Synthetic { source_commits, .. } => Some(*source_commits),
        }
    }
}
