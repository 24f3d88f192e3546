use anyhow::Context;
use clap::Args;

use polyglot_core::classify::LinguistClassifier;
use polyglot_core::flows::{FlowContext, recent};
use polyglot_core::forge::GitHubClient;
use polyglot_core::history::GitLogSource;
use polyglot_core::skip::SkipList;
use polyglot_core::types::AuthorFilter;

use super::{Globals, OutputFormat};

#[derive(Args, Debug)]
pub struct RecentArgs {
    /// GitHub account whose recent pushes are analyzed
    pub login: String,

    /// Author name or email fragment to attribute (repeatable, default: login)
    #[arg(short, long = "author")]
    pub authors: Vec<String>,

    /// Activity window in days (0 = no window)
    #[arg(long)]
    pub days: Option<u32>,

    /// Number of activity events to load
    #[arg(long)]
    pub load: Option<u32>,

    /// Treat the account as an organization (accept pushes from any actor)
    #[arg(long)]
    pub organization: bool,

    /// Repository name, `owner/name`, or glob pattern to skip (repeatable)
    #[arg(long = "skip")]
    pub skipped: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

pub async fn run(args: RecentArgs, globals: &Globals) -> anyhow::Result<()> {
    let mut config = super::load_config(globals.config.as_deref())?;
    if let Some(days) = args.days {
        config.recent.days = days;
    }
    if let Some(load) = args.load {
        config.recent.load = load;
    }
    config.recent.organization |= args.organization;
    super::finish_config(&mut config, &args.authors, Some(&args.login))?;

    let skip = SkipList::new(config.indepth.skipped.iter().chain(&args.skipped))
        .context("Invalid config: skip list")?;

    let classifier = LinguistClassifier::from_config(&config.classifier);
    let authors = AuthorFilter::new(&config.authoring.identities);
    let client = GitHubClient::from_config(&config.forge)?;
    let ctx = FlowContext {
        classifier: &classifier,
        history: &GitLogSource,
        config: &config,
        authors: &authors,
    };

    let attribution = recent(&ctx, &client, &client, &args.login, &skip, chrono::Utc::now())
        .await
        .context("Recent analysis failed")?;

    match args.format {
        OutputFormat::Json => super::print_json(&attribution)?,
        OutputFormat::Text => {
            let window = match attribution.days {
                0 => "all loaded activity".to_string(),
                days => format!("last {days} days"),
            };
            print!(
                "{}",
                super::render_text(
                    &format!("Recent attribution for {} ({window})", args.login),
                    &attribution.result
                )
            );
            if let Some(latest) = attribution.latest {
                println!();
                println!("  Oldest event:  {latest} days ago");
            }
        }
    }
    Ok(())
}
