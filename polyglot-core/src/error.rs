/// Top-level polyglot error type.
///
/// All fallible operations in `polyglot-core` return [`Result<T, PolyglotError>`](Result).
/// Each variant wraps a domain-specific error enum, allowing callers to
/// match on the error source without losing type information.
#[derive(thiserror::Error, Debug)]
pub enum PolyglotError {
    /// Error from the external language classifier.
    #[error("Classifier error: {0}")]
    Classify(#[from] ClassifyError),

    /// Error retrieving a page of commit history.
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    /// Error producing a local working copy of a remote repository.
    #[error("Materialization error: {0}")]
    Materialize(#[from] MaterializeError),

    /// Error rebuilding a synthetic repository from patch fragments.
    #[error("Reconstruction error: {0}")]
    Reconstruct(#[from] ReconstructError),

    /// Error communicating with the GitHub API.
    #[error("Forge error: {0}")]
    Forge(#[from] ForgeError),

    /// Error in configuration parsing or validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors from the external file-to-language classifier.
#[derive(thiserror::Error, Debug)]
pub enum ClassifyError {
    /// The classifier binary is not installed. Fatal: checked once per run.
    #[error("Feature requires {0}, which was not found on PATH")]
    ToolMissing(String),

    /// The classifier ran but exited unsuccessfully.
    #[error("{command} failed in {directory}: {stderr}")]
    Failed {
        /// Command that was run.
        command: String,
        /// Directory the classifier was run against.
        directory: String,
        /// Captured standard error.
        stderr: String,
    },

    /// Classifier output was not the expected language → files mapping.
    #[error("Cannot parse classifier output: {0}")]
    Parse(String),

    /// Filesystem or process I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors retrieving commit history pages.
#[derive(thiserror::Error, Debug)]
pub enum HistoryError {
    /// A single page could not be retrieved. Recoverable: counted as missed.
    #[error("Page {index} unavailable: {message}")]
    Page {
        /// Zero-based page index.
        index: u64,
        /// Description of the failure.
        message: String,
    },

    /// The directory holds no repository to walk.
    #[error("Not a git repository: {0}")]
    NotARepository(String),

    /// Process spawn or pipe failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors materializing a repository onto local storage.
#[derive(thiserror::Error, Debug)]
pub enum MaterializeError {
    /// Remote unreachable, clone refused, or result not a repository.
    #[error("Cannot clone {remote}: {message}")]
    Clone {
        /// Remote identifier that was cloned.
        remote: String,
        /// Description of the failure.
        message: String,
    },

    /// Destination could not be prepared.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors running the `git` binary.
#[derive(thiserror::Error, Debug)]
pub enum GitError {
    /// The process could not be started.
    #[error("Cannot spawn git: {0}")]
    Spawn(#[from] std::io::Error),

    /// git ran and exited unsuccessfully.
    #[error("git exited with {status}: {stderr}")]
    Failed {
        /// Exit status as reported by the OS.
        status: std::process::ExitStatus,
        /// Captured standard error, trimmed.
        stderr: String,
    },
}

/// Errors rebuilding synthetic repositories.
#[derive(thiserror::Error, Debug)]
pub enum ReconstructError {
    /// Git plumbing (init, add, commit) failed.
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    /// Filesystem I/O error writing fragments.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the GitHub REST client.
#[derive(thiserror::Error, Debug)]
pub enum ForgeError {
    /// Network-level failure.
    #[error("GitHub API network error: {0}")]
    Network(String),

    /// API returned a non-success HTTP status.
    #[error("GitHub API error (HTTP {status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// Response body could not be decoded.
    #[error("GitHub API response parse error: {0}")]
    Parse(String),
}

/// Errors in polyglot configuration parsing and validation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist at the expected path.
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Configuration values are present but semantically invalid.
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Configuration file syntax could not be parsed (TOML error).
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Convenience alias for `Result<T, PolyglotError>`.
pub type Result<T> = std::result::Result<T, PolyglotError>;
