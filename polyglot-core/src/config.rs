use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, PolyglotError};

/// Default config file name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "polyglot.toml";

/// Top-level polyglot configuration, matching `polyglot.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolyglotConfig {
    #[serde(default)]
    pub authoring: AuthoringSection,
    #[serde(default)]
    pub classifier: ClassifierSection,
    #[serde(default)]
    pub history: HistorySection,
    #[serde(default)]
    pub indepth: IndepthSection,
    #[serde(default)]
    pub recent: RecentSection,
    #[serde(default)]
    pub forge: ForgeSection,
    #[serde(default)]
    pub workdir: WorkdirSection,
}

impl PolyglotConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()).into());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_toml(&raw)
    }

    /// Parse a config from TOML text. Identities are normalized to lowercase.
    pub fn from_toml(raw: &str) -> crate::error::Result<Self> {
        let mut config: Self =
            toml::from_str(raw).map_err(|e| ConfigError::Parse(e.message().to_string()))?;
        config.authoring.normalize();
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.history.page_span == 0 {
            return Err(invalid("history.page_span must be at least 1"));
        }
        if self.authoring.identities.is_empty() {
            return Err(invalid(
                "authoring.identities is empty; pass --author or set it in polyglot.toml",
            ));
        }
        if self.classifier.command.trim().is_empty() {
            return Err(invalid("classifier.command must not be empty"));
        }
        if self.forge.override_branches.is_empty() {
            return Err(invalid("forge.override_branches must list at least one branch"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> PolyglotError {
    ConfigError::Invalid(message.to_string()).into()
}

/// Author identities whose commits are attributed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthoringSection {
    /// Case-insensitive substrings matched against author name or email.
    pub identities: Vec<String>,
}

impl AuthoringSection {
    fn normalize(&mut self) {
        let mut normalized: Vec<String> = Vec::with_capacity(self.identities.len());
        for identity in &self.identities {
            let identity = identity.trim().to_lowercase();
            if !identity.is_empty() && !normalized.contains(&identity) {
                normalized.push(identity);
            }
        }
        self.identities = normalized;
    }

    /// Append identities from the command line, keeping the list normalized.
    pub fn extend<I: IntoIterator<Item = String>>(&mut self, identities: I) {
        self.identities.extend(identities);
        self.normalize();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSection {
    /// Classifier executable, resolved on `PATH` unless it contains a separator.
    pub command: String,
    /// Arguments producing language → files JSON on stdout.
    pub args: Vec<String>,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            command: "github-linguist".into(),
            args: vec!["--breakdown".into(), "--json".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySection {
    /// Commits requested per history page.
    pub page_span: u64,
    /// Stop a walk after this many failed pages in a row (0 = never).
    pub max_consecutive_misses: u64,
    /// Upper bound on commits requested per repository (0 = unlimited).
    pub max_commits: u64,
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            page_span: 1,
            max_consecutive_misses: 16,
            max_commits: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndepthSection {
    /// Repository names, `owner/name` slugs, or glob patterns to skip.
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentSection {
    /// Activity window in days (0 = no window).
    pub days: u32,
    /// Number of activity events to load, fetched in pages of 100.
    pub load: u32,
    /// Prefix of the temporary directory holding synthetic repositories.
    pub tempdir_prefix: String,
    /// Organization accounts accept pushes from any actor.
    pub organization: bool,
}

impl Default for RecentSection {
    fn default() -> Self {
        Self {
            days: 14,
            load: 300,
            tempdir_prefix: "recent".into(),
            organization: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeSection {
    /// Environment variable holding the GitHub token.
    pub token_env: String,
    pub api_base: String,
    /// Base URL for raw file downloads (`.gitattributes`).
    pub raw_base: String,
    /// Base URL repositories are cloned from.
    pub clone_base: String,
    /// Branches tried, in order, when fetching language overrides.
    pub override_branches: Vec<String>,
}

impl Default for ForgeSection {
    fn default() -> Self {
        Self {
            token_env: "GITHUB_TOKEN".into(),
            api_base: "https://api.github.com".into(),
            raw_base: "https://raw.githubusercontent.com".into(),
            clone_base: "https://github.com".into(),
            override_branches: vec!["main".into(), "master".into()],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkdirSection {
    /// Parent directory for ephemeral working trees (default: system temp dir).
    pub root: Option<PathBuf>,
}

impl WorkdirSection {
    pub fn resolve_root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_linguist_walk() {
        let config = PolyglotConfig::default();
        assert_eq!(config.history.page_span, 1);
        assert_eq!(config.classifier.command, "github-linguist");
        assert_eq!(config.classifier.args, vec!["--breakdown", "--json"]);
        assert_eq!(config.forge.override_branches, vec!["main", "master"]);
        assert_eq!(config.recent.days, 14);
        assert!(config.authoring.identities.is_empty());
    }

    #[test]
    fn parse_partial_toml_keeps_defaults() {
        let config = PolyglotConfig::from_toml(
            r#"
            [authoring]
            identities = ["Octocat", " octocat ", "me@example.com"]

            [history]
            page_span = 5
            max_consecutive_misses = 2
            max_commits = 100
            "#,
        )
        .unwrap();
        assert_eq!(config.authoring.identities, vec!["octocat", "me@example.com"]);
        assert_eq!(config.history.page_span, 5);
        assert_eq!(config.recent.load, 300);
        assert_eq!(config.forge.token_env, "GITHUB_TOKEN");
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_span() {
        let mut config = PolyglotConfig::default();
        config.authoring.extend(["someone".to_string()]);
        config.history.page_span = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("page_span"));
    }

    #[test]
    fn validate_requires_identity() {
        let config = PolyglotConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("identities"));
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let err = PolyglotConfig::from_toml("[history\npage_span = ").unwrap_err();
        assert!(matches!(
            err,
            PolyglotError::Config(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = PolyglotConfig::load(Path::new("/nonexistent/polyglot.toml")).unwrap_err();
        assert!(matches!(
            err,
            PolyglotError::Config(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn extend_dedups_case_insensitively() {
        let mut section = AuthoringSection::default();
        section.extend(["Alice".to_string(), "ALICE".to_string(), String::new()]);
        assert_eq!(section.identities, vec!["alice"]);
    }
}
