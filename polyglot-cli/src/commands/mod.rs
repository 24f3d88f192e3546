pub mod analyze;
pub mod indepth;
pub mod recent;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Subcommand, ValueEnum};

use polyglot_core::config::{CONFIG_FILE_NAME, PolyglotConfig};
use polyglot_core::types::AttributionResult;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Attribute the history of a local repository
    Analyze(analyze::AnalyzeArgs),
    /// Clone and attribute every repository of a GitHub account
    Indepth(indepth::IndepthArgs),
    /// Attribute the patches an account pushed recently
    Recent(recent::RecentArgs),
}

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct Globals {
    pub config: Option<PathBuf>,
    pub quiet: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub async fn run(cmd: Command, globals: &Globals) -> anyhow::Result<()> {
    match cmd {
        Command::Analyze(args) => analyze::run(args, globals).await,
        Command::Indepth(args) => indepth::run(args, globals).await,
        Command::Recent(args) => recent::run(args, globals).await,
    }
}

/// Load the explicit config file, `./polyglot.toml` when present, or defaults.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<PolyglotConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => Some(PathBuf::from(CONFIG_FILE_NAME)).filter(|p| p.exists()),
    };
    match path {
        Some(path) => PolyglotConfig::load(&path)
            .with_context(|| format!("Cannot load config: {}", path.display())),
        None => Ok(PolyglotConfig::default()),
    }
}

/// Merge command-line identities into the config, falling back to `login`,
/// then validate.
pub fn finish_config(
    config: &mut PolyglotConfig,
    authors: &[String],
    login: Option<&str>,
) -> anyhow::Result<()> {
    config.authoring.extend(authors.iter().cloned());
    if let Some(login) = login.filter(|_| config.authoring.identities.is_empty()) {
        config.authoring.extend([login.to_string()]);
    }
    config.validate().context("Invalid config")?;
    Ok(())
}

pub fn render_text(heading: &str, result: &AttributionResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{heading}");
    let _ = writeln!(out);
    let _ = writeln!(out, "  Bytes added:   {}", result.total());
    let _ = writeln!(out, "  Commits:       {}", result.commits());
    let _ = writeln!(out, "  Files touched: {}", result.files());
    if result.missed() > 0 {
        let _ = writeln!(out, "  Missed:        {}", result.missed());
    }

    if !result.stats().is_empty() {
        let _ = writeln!(out);
        let mut languages: Vec<(&String, &u64)> = result.stats().iter().collect();
        languages.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        let width = languages.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
        for (language, bytes) in languages {
            let lines = result.lines().get(language).copied().unwrap_or(0);
            let share = percent(*bytes, result.total());
            let _ = writeln!(
                out,
                "  {language:<width$}  {bytes:>10} bytes  {lines:>8} lines  {share:>5.1}%"
            );
        }
    }
    out
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("Cannot serialize result")?;
    println!("{json}");
    Ok(())
}
