// Classification snapshot builder: runs the external file → language
// classifier against a working tree and inverts its output.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::config::ClassifierSection;
use crate::error::ClassifyError;
use crate::types::ClassificationSnapshot;

/// An external tool mapping languages to the files written in them.
#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    /// Human-readable name, used in logs and the missing-tool error.
    fn name(&self) -> &str;

    /// Precondition checked once per run, before any repository is touched.
    fn ensure_available(&self) -> crate::error::Result<()>;

    /// Classify every file under `dir`, grouped by language.
    async fn classify(&self, dir: &Path) -> crate::error::Result<HashMap<String, Vec<String>>>;
}

/// Build a file → language snapshot of `dir`.
#[instrument(skip_all, fields(classifier = classifier.name(), dir = %dir.display()))]
pub async fn build_snapshot(
    classifier: &dyn Classifier,
    dir: &Path,
) -> crate::error::Result<ClassificationSnapshot> {
    let grouped = classifier.classify(dir).await?;
    let snapshot = ClassificationSnapshot::from_grouped(grouped);
    debug!(files = snapshot.len(), "Classification snapshot built");
    Ok(snapshot)
}

/// Classifier backed by `github-linguist` (or any tool with the same output).
#[derive(Debug, Clone)]
pub struct LinguistClassifier {
    command: String,
    args: Vec<String>,
}

impl LinguistClassifier {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub fn from_config(config: &ClassifierSection) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }
}

#[async_trait::async_trait]
impl Classifier for LinguistClassifier {
    fn name(&self) -> &str {
        &self.command
    }

    fn ensure_available(&self) -> crate::error::Result<()> {
        if resolve_command(&self.command).is_some() {
            Ok(())
        } else {
            Err(ClassifyError::ToolMissing(self.command.clone()).into())
        }
    }

    async fn classify(&self, dir: &Path) -> crate::error::Result<HashMap<String, Vec<String>>> {
        let output = Command::new(&self.command)
            .args(&self.args)
            .current_dir(dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ClassifyError::ToolMissing(self.command.clone())
                } else {
                    ClassifyError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(ClassifyError::Failed {
                command: self.command.clone(),
                directory: dir.display().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        Ok(parse_linguist_json(&output.stdout)?)
    }
}

/// A language entry as printed by linguist: either a bare file list, or a
/// breakdown object carrying one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LanguageEntry {
    Files(Vec<String>),
    Breakdown {
        #[serde(default)]
        files: Vec<String>,
    },
}

/// Parse linguist's JSON output into language → files.
pub fn parse_linguist_json(stdout: &[u8]) -> Result<HashMap<String, Vec<String>>, ClassifyError> {
    let entries: HashMap<String, LanguageEntry> =
        serde_json::from_slice(stdout).map_err(|e| ClassifyError::Parse(e.to_string()))?;
    Ok(entries
        .into_iter()
        .map(|(language, entry)| {
            let files = match entry {
                LanguageEntry::Files(files) | LanguageEntry::Breakdown { files } => files,
            };
            (language, files)
        })
        .collect())
}

/// Locate an executable: explicit paths are checked directly, bare names
/// are searched on `PATH`.
pub fn resolve_command(command: &str) -> Option<PathBuf> {
    let candidate = Path::new(command);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(command))
        .find(|full| full.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_file_lists() {
        let json = br#"{"Python": ["a.py", "lib/b.py"], "Shell": ["run.sh"]}"#;
        let grouped = parse_linguist_json(json).unwrap();
        assert_eq!(grouped["Python"], vec!["a.py", "lib/b.py"]);
        assert_eq!(grouped["Shell"], vec!["run.sh"]);
    }

    #[test]
    fn parse_breakdown_objects() {
        let json = br#"{"Rust": {"size": 120, "percentage": "100.00", "files": ["src/main.rs"]},
                        "Markdown": {"size": 3, "percentage": "0.00"}}"#;
        let grouped = parse_linguist_json(json).unwrap();
        assert_eq!(grouped["Rust"], vec!["src/main.rs"]);
        assert!(grouped["Markdown"].is_empty());
    }

    #[test]
    fn parse_garbage_is_error() {
        let err = parse_linguist_json(b"not json").unwrap_err();
        assert!(matches!(err, ClassifyError::Parse(_)));
    }

    #[test]
    fn missing_tool_fails_precondition() {
        let classifier = LinguistClassifier::new("polyglot-no-such-classifier", vec![]);
        let err = classifier.ensure_available().unwrap_err();
        assert!(err.to_string().contains("polyglot-no-such-classifier"));
    }

    #[test]
    fn resolve_explicit_path() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = tmp.path().join("tool");
        std::fs::write(&tool, "").unwrap();
        assert_eq!(resolve_command(tool.to_str().unwrap()), Some(tool));
        assert!(resolve_command(tmp.path().join("absent").to_str().unwrap()).is_none());
    }

    #[tokio::test]
    async fn missing_tool_on_classify_is_tool_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let classifier = LinguistClassifier::new("polyglot-no-such-classifier", vec![]);
        let err = classifier.classify(tmp.path()).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::PolyglotError::Classify(ClassifyError::ToolMissing(_))
        ));
    }

    #[derive(Debug)]
    struct Fixed;

    #[async_trait::async_trait]
    impl Classifier for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn ensure_available(&self) -> crate::error::Result<()> {
            Ok(())
        }

        async fn classify(
            &self,
            _dir: &Path,
        ) -> crate::error::Result<HashMap<String, Vec<String>>> {
            Ok(HashMap::from([(
                "Python".to_string(),
                vec!["a.py".to_string()],
            )]))
        }
    }

    #[tokio::test]
    async fn build_snapshot_inverts() {
        let snapshot = build_snapshot(&Fixed, Path::new(".")).await.unwrap();
        assert_eq!(snapshot.language_of("a.py"), Some("Python"));
    }
}
