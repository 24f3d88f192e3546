use anyhow::Context;
use clap::Args;
use tracing::info;

use polyglot_core::classify::LinguistClassifier;
use polyglot_core::flows::{FlowContext, indepth};
use polyglot_core::forge::{GitHubClient, RepositorySource};
use polyglot_core::history::GitLogSource;
use polyglot_core::materialize::GitCloneMaterializer;
use polyglot_core::progress::{IndicatifReporter, NoopReporter, ProgressReporter};
use polyglot_core::skip::SkipList;
use polyglot_core::types::{AuthorFilter, RepoRef};

use super::{Globals, OutputFormat};

#[derive(Args, Debug)]
pub struct IndepthArgs {
    /// GitHub account whose repositories are analyzed
    pub login: String,

    /// Author name or email fragment to attribute (repeatable, default: login)
    #[arg(short, long = "author")]
    pub authors: Vec<String>,

    /// Analyze only these `owner/name` repositories instead of listing the account's
    #[arg(long = "repo")]
    pub repos: Vec<String>,

    /// Repository name, `owner/name`, or glob pattern to skip (repeatable)
    #[arg(long = "skip")]
    pub skipped: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

pub async fn run(args: IndepthArgs, globals: &Globals) -> anyhow::Result<()> {
    let mut config = super::load_config(globals.config.as_deref())?;
    super::finish_config(&mut config, &args.authors, Some(&args.login))?;

    let skip = SkipList::new(config.indepth.skipped.iter().chain(&args.skipped))
        .context("Invalid config: skip list")?;

    let repos = if args.repos.is_empty() {
        let client = GitHubClient::from_config(&config.forge)?;
        client
            .list_repositories(&args.login)
            .await
            .with_context(|| format!("Cannot list repositories of {}", args.login))?
    } else {
        args.repos
            .iter()
            .map(|slug| {
                RepoRef::parse(slug)
                    .with_context(|| format!("Invalid repository {slug:?}, expected owner/name"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?
    };
    info!(count = repos.len(), "Repositories to analyze");

    let classifier = LinguistClassifier::from_config(&config.classifier);
    let authors = AuthorFilter::new(&config.authoring.identities);
    let materializer = GitCloneMaterializer::new(config.forge.clone_base.as_str());
    let ctx = FlowContext {
        classifier: &classifier,
        history: &GitLogSource,
        config: &config,
        authors: &authors,
    };

    let progress: Box<dyn ProgressReporter> = if globals.quiet {
        Box::new(NoopReporter)
    } else {
        Box::new(IndicatifReporter::stderr())
    };
    let report = indepth(&ctx, &materializer, &args.login, &repos, &skip, progress.as_ref())
        .await
        .context("Indepth analysis failed")?;

    match args.format {
        OutputFormat::Json => super::print_json(&report.result)?,
        OutputFormat::Text => {
            print!(
                "{}",
                super::render_text(
                    &format!(
                        "Attribution for {} ({} repositories)",
                        args.login,
                        report.analyzed.len()
                    ),
                    &report.result
                )
            );
            if !report.skipped.is_empty() {
                println!();
                println!("  Skipped ({}):", report.skipped.len());
                for repo in &report.skipped {
                    println!("    - {repo}");
                }
            }
            if !report.failed.is_empty() {
                println!();
                println!("  Failed ({}):", report.failed.len());
                for repo in &report.failed {
                    println!("    - {repo}");
                }
            }
        }
    }
    Ok(())
}
