use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use polyglot_core::classify::LinguistClassifier;
use polyglot_core::flows::{FlowContext, analyze_local};
use polyglot_core::git;
use polyglot_core::history::GitLogSource;
use polyglot_core::types::AuthorFilter;

use super::{Globals, OutputFormat};

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Path to git repository (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Author name or email fragment to attribute (repeatable)
    #[arg(short, long = "author")]
    pub authors: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

pub async fn run(args: AnalyzeArgs, globals: &Globals) -> anyhow::Result<()> {
    let repo_path = std::fs::canonicalize(&args.path)
        .with_context(|| format!("Cannot resolve path: {}", args.path.display()))?;

    let mut config = super::load_config(globals.config.as_deref())?;
    super::finish_config(&mut config, &args.authors, None)?;

    let classifier = LinguistClassifier::from_config(&config.classifier);
    let authors = AuthorFilter::new(&config.authoring.identities);
    let ctx = FlowContext {
        classifier: &classifier,
        history: &GitLogSource,
        config: &config,
        authors: &authors,
    };
    let result = analyze_local(&ctx, &repo_path)
        .await
        .with_context(|| format!("Cannot analyze {}", repo_path.display()))?;

    match args.format {
        OutputFormat::Json => super::print_json(&result)?,
        OutputFormat::Text => {
            let heading = match git::detect_github_origin(&repo_path) {
                Some(origin) => format!("Attribution for {} ({origin})", repo_path.display()),
                None => format!("Attribution for {}", repo_path.display()),
            };
            print!("{}", super::render_text(&heading, &result));
        }
    }
    Ok(())
}
