//! Attribution engine: walks an author's commit history page by page and
//! attributes the bytes of every added line to the language of its file.
//!
//! Diff text is consumed by [`DiffWalker`], a small state machine over three
//! sections of `git log --patch` output:
//!
//! * preamble — commit header and message, up to the first `diff ` line;
//! * file header — `diff`, `index`, `---` and `+++` lines of one file;
//! * hunk — everything after an `@@` line, until the next file or commit.
//!
//! Commit boundaries are recognized in any section. `+++` lines are file
//! headers only inside a file header section and added content only inside
//! a hunk, so the two can never be confused whatever their text.

use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::config::HistorySection;
use crate::history::{HistorySource, PageRequest};
use crate::types::{AttributionResult, AuthorFilter, ClassificationSnapshot};

/// Section of diff text the walker is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Preamble,
    FileHeader,
    Hunk,
}

/// Classification of one line of diff text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLine<'a> {
    /// `commit <sha>`: start of a new commit.
    CommitBoundary,
    /// `+++ <path>`: new-side path of the current file (raw, possibly quoted).
    FileHeader(&'a str),
    /// Added content with the `+` marker removed.
    Added(&'a str),
    /// `diff ...`: start of a new file's header.
    FileStart,
    /// `@@ ... @@`: start of a hunk.
    HunkStart,
    /// Anything else (context, removals, messages, extended headers).
    Other,
}

/// Classify `line` given the section it appears in.
pub fn classify_line(line: &str, section: Section) -> DiffLine<'_> {
    if is_commit_boundary(line) {
        return DiffLine::CommitBoundary;
    }
    match section {
        Section::Preamble => {
            if line.starts_with("diff ") {
                DiffLine::FileStart
            } else {
                DiffLine::Other
            }
        }
        Section::FileHeader => {
            if let Some(path) = line.strip_prefix("+++ ") {
                DiffLine::FileHeader(path)
            } else if line.starts_with("@@") {
                DiffLine::HunkStart
            } else if line.starts_with("diff ") {
                DiffLine::FileStart
            } else {
                DiffLine::Other
            }
        }
        Section::Hunk => {
            if let Some(content) = line.strip_prefix('+') {
                DiffLine::Added(content)
            } else if line.starts_with("@@") {
                DiffLine::HunkStart
            } else if line.starts_with("diff ") {
                DiffLine::FileStart
            } else {
                DiffLine::Other
            }
        }
    }
}

fn is_commit_boundary(line: &str) -> bool {
    let Some(rest) = line.strip_prefix("commit ") else {
        return false;
    };
    let sha = rest.split_whitespace().next().unwrap_or_default();
    sha.len() >= 40 && sha.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Extract the repository-relative path from the text after `+++ `.
///
/// Returns `None` for `/dev/null` (deleted file) or unrecognized prefixes.
pub fn parse_new_path(raw: &str) -> Option<String> {
    let raw = raw.trim_end_matches(['\t', '\r']);
    if raw == "/dev/null" {
        return None;
    }
    let path = if raw.starts_with('"') {
        unquote_c_style(raw)?
    } else {
        raw.to_string()
    };
    path.strip_prefix("b/").map(str::to_string)
}

/// Undo git's C-style quoting of paths with special characters
/// (`"b/caf\303\251.py"` → `b/café.py`).
fn unquote_c_style(quoted: &str) -> Option<String> {
    let inner = quoted.strip_prefix('"')?.strip_suffix('"')?;
    let mut bytes = Vec::with_capacity(inner.len());
    let mut chars = inner.bytes().peekable();
    while let Some(b) = chars.next() {
        if b != b'\\' {
            bytes.push(b);
            continue;
        }
        match chars.next()? {
            b'n' => bytes.push(b'\n'),
            b't' => bytes.push(b'\t'),
            b'r' => bytes.push(b'\r'),
            b'a' => bytes.push(0x07),
            b'b' => bytes.push(0x08),
            b'f' => bytes.push(0x0c),
            b'v' => bytes.push(0x0b),
            d @ b'0'..=b'7' => {
                let mut value = u32::from(d - b'0');
                for _ in 0..2 {
                    match chars.peek() {
                        Some(&o @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(o - b'0');
                            chars.next();
                        }
                        _ => break,
                    }
                }
                bytes.push(u8::try_from(value).ok()?);
            }
            other => bytes.push(other),
        }
    }
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Size in bytes of an added line's content, or `None` if blank.
pub fn added_size(content: &str) -> Option<u64> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(u64::try_from(trimmed.len()).unwrap_or(u64::MAX))
    }
}

/// File currently described by the diff text.
#[derive(Debug, Clone, Copy)]
struct CurrentFile<'s> {
    language: Option<&'s str>,
}

/// Consumes diff pages and accumulates attribution into a result.
///
/// Touched files are collected across every page fed, so a file edited in
/// several commits counts once when [`DiffWalker::finish`] is called.
#[derive(Debug)]
pub struct DiffWalker<'s> {
    snapshot: &'s ClassificationSnapshot,
    touched: HashSet<String>,
}

impl<'s> DiffWalker<'s> {
    pub fn new(snapshot: &'s ClassificationSnapshot) -> Self {
        Self {
            snapshot,
            touched: HashSet::new(),
        }
    }

    /// Attribute one page of diff text. File and section state start fresh
    /// for every page.
    pub fn feed_page(&mut self, text: &str, result: &mut AttributionResult) {
        let snapshot: &'s ClassificationSnapshot = self.snapshot;
        let mut section = Section::Preamble;
        let mut current: Option<CurrentFile<'s>> = None;

        for line in text.lines() {
            match classify_line(line, section) {
                DiffLine::CommitBoundary => {
                    result.record_commit();
                    section = Section::Preamble;
                    current = None;
                }
                DiffLine::FileStart => {
                    section = Section::FileHeader;
                    current = None;
                }
                DiffLine::FileHeader(raw) => {
                    current = parse_new_path(raw).map(|path| {
                        let language = snapshot.language_of(&path);
                        self.touched.insert(path);
                        CurrentFile { language }
                    });
                }
                DiffLine::HunkStart => section = Section::Hunk,
                DiffLine::Added(content) => {
                    let Some(language) = current.and_then(|file| file.language) else {
                        continue;
                    };
                    if let Some(bytes) = added_size(content) {
                        result.record_line(language, bytes);
                    }
                }
                DiffLine::Other => {}
            }
        }
    }

    /// Number of distinct files seen so far.
    pub fn touched_files(&self) -> usize {
        self.touched.len()
    }

    /// Add the touched-file count to `result`.
    pub fn finish(self, result: &mut AttributionResult) {
        result.add_files(u64::try_from(self.touched.len()).unwrap_or(u64::MAX));
    }
}

/// Statistics from one history walk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WalkStats {
    pub pages_read: u64,
    pub pages_missed: u64,
    pub files_touched: u64,
    pub duration: Duration,
}

/// Walks history pages from a [`HistorySource`] into an [`AttributionResult`].
#[derive(Debug)]
pub struct AttributionEngine<'a, H: HistorySource + ?Sized> {
    history: &'a H,
    settings: HistorySection,
}

impl<'a, H: HistorySource + ?Sized> AttributionEngine<'a, H> {
    pub fn new(history: &'a H, settings: &HistorySection) -> Self {
        let mut settings = settings.clone();
        settings.page_span = settings.page_span.max(1);
        Self { history, settings }
    }

    /// Attribute every commit of `dir` authored by `authors` into `result`.
    ///
    /// Never fails: unreadable pages are counted in `missed` and skipped.
    #[instrument(skip_all, name = "attribution_walk", fields(dir = %dir.display()))]
    pub async fn analyze(
        &self,
        dir: &Path,
        snapshot: &ClassificationSnapshot,
        authors: &AuthorFilter,
        result: &mut AttributionResult,
    ) -> WalkStats {
        let start = Instant::now();
        let span = self.settings.page_span;
        let mut stats = WalkStats::default();
        let mut walker = DiffWalker::new(snapshot);
        let mut consecutive_misses = 0u64;

        for index in 0.. {
            let request = PageRequest { index, span };
            if self.settings.max_commits > 0 && request.skip() >= self.settings.max_commits {
                debug!(max_commits = self.settings.max_commits, "Commit limit reached");
                break;
            }

            match self.history.page(dir, authors, request).await {
                Ok(text) if text.trim().is_empty() => {
                    debug!(page = index, "No more commits");
                    break;
                }
                Ok(text) => {
                    debug!(
                        from = request.skip(),
                        to = request.skip() + span,
                        "Processing commits"
                    );
                    walker.feed_page(&text, result);
                    stats.pages_read += 1;
                    consecutive_misses = 0;
                }
                Err(e) => {
                    debug!(page = index, error = %e, "Page failed, skipping");
                    result.record_missed(span);
                    stats.pages_missed += 1;
                    consecutive_misses += 1;
                    if self.settings.max_consecutive_misses > 0
                        && consecutive_misses >= self.settings.max_consecutive_misses
                    {
                        warn!(
                            misses = consecutive_misses,
                            "Too many consecutive page failures, abandoning walk"
                        );
                        break;
                    }
                }
            }
        }

        stats.files_touched = u64::try_from(walker.touched_files()).unwrap_or(u64::MAX);
        walker.finish(result);
        stats.duration = start.elapsed();
        info!(
            pages = stats.pages_read,
            missed = stats.pages_missed,
            files = stats.files_touched,
            duration = ?stats.duration,
            "History walk complete"
        );
        stats
    }
}
