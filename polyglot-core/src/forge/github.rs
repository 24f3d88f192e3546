// GitHub REST client: repository lists, push-event activity, commit
// patches, and raw `.gitattributes` downloads.

use std::collections::HashSet;
use std::sync::Once;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::config::ForgeSection;
use crate::error::ForgeError;
use crate::types::{AuthorFilter, PatchFragment, RepoRef};

use super::{
    ActivityQuery, ActivitySource, OverrideSource, RecentActivity, RepositorySource, SourceCommit,
};

/// Maximum retry attempts for rate-limited requests.
const MAX_RETRIES: u32 = 5;
/// Pause and wait for reset when remaining drops below this threshold.
const RATE_LIMIT_PAUSE_THRESHOLD: u32 = 5;
/// Events and repositories are requested in pages of this size.
const PER_PAGE: u32 = 100;

const USER_AGENT: &str = concat!("polyglot/", env!("CARGO_PKG_VERSION"));

/// GitHub REST API client.
#[derive(Debug)]
pub struct GitHubClient {
    api_base: String,
    raw_base: String,
    token: Option<String>,
    client: Client,
    /// Remaining API calls before rate limit resets.
    rate_remaining: AtomicU32,
    /// Unix timestamp when the rate limit window resets.
    rate_reset: AtomicU64,
}

impl GitHubClient {
    /// Create a client from the forge config, reading the token from the
    /// configured environment variable.
    pub fn from_config(config: &ForgeSection) -> crate::error::Result<Self> {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.is_empty());
        Self::new(&config.api_base, &config.raw_base, token)
    }

    pub fn new(api_base: &str, raw_base: &str, token: Option<String>) -> crate::error::Result<Self> {
        install_crypto_provider();
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ForgeError::Network(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            raw_base: raw_base.trim_end_matches('/').to_string(),
            token,
            client,
            rate_remaining: AtomicU32::new(u32::MAX),
            rate_reset: AtomicU64::new(0),
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    // ── Activity ────────────────────────────────────────────────────

    async fn load_push_events(&self, query: &ActivityQuery<'_>) -> Vec<GhEvent> {
        let now = Utc::now();
        let mut events = Vec::new();
        for page in 1..=event_pages(query.load) {
            debug!(page, "Loading activity page");
            let url = format!(
                "{}/users/{}/events?per_page={PER_PAGE}&page={page}",
                self.api_base, query.login
            );
            match self.api_get::<Vec<GhEvent>>(&url).await {
                Ok(batch) if batch.is_empty() => break,
                Ok(batch) => events.extend(select_push_events(batch, query, now)),
                Err(e) => {
                    debug!(page, error = %e, "No more activity pages to load");
                    break;
                }
            }
        }
        events
    }

    async fn fetch_commit_files(&self, url: &str) -> crate::error::Result<Vec<GhFile>> {
        let detail = self.api_get::<GhCommitDetail>(url).await?;
        Ok(detail.files)
    }

    // ── HTTP Client ─────────────────────────────────────────────────

    async fn api_get<T: serde::de::DeserializeOwned>(&self, url: &str) -> crate::error::Result<T> {
        // Pre-check: if remaining is low, wait for reset
        self.wait_for_rate_reset().await;

        let mut delay = Duration::from_secs(1);

        for attempt in 0..=MAX_RETRIES {
            let mut req = self
                .client
                .get(url)
                .header("Accept", "application/vnd.github+json");

            if let Some(token) = &self.token {
                req = req.header("Authorization", format!("Bearer {token}"));
            }

            debug!(url = %url, attempt, "GitHub API request");

            let resp = req
                .send()
                .await
                .map_err(|e| ForgeError::Network(e.to_string()))?;

            self.update_rate_limit(&resp);

            if resp.status().is_success() {
                return Ok(resp
                    .json()
                    .await
                    .map_err(|e| ForgeError::Parse(e.to_string()))?);
            }

            // Rate limited — retry with backoff
            let status = resp.status().as_u16();
            if (status == 403 || status == 429) && attempt < MAX_RETRIES {
                let wait = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map_or(delay, Duration::from_secs);
                warn!(
                    attempt,
                    status,
                    wait_secs = wait.as_secs(),
                    "Rate limited, backing off"
                );
                tokio::time::sleep(wait).await;
                delay = (delay * 2).min(Duration::from_secs(60));
                continue;
            }

            let body = resp.text().await.unwrap_or_default();
            return Err(ForgeError::Api { status, body }.into());
        }

        Err(ForgeError::Network(format!("max retries exceeded for {url}")).into())
    }

    fn update_rate_limit(&self, resp: &reqwest::Response) {
        if let Some(remaining) = resp
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u32>().ok())
        {
            self.rate_remaining.store(remaining, Ordering::Relaxed);
            if remaining < 10 {
                warn!(remaining, "GitHub API rate limit low");
            }
        }
        if let Some(reset) = resp
            .headers()
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
        {
            self.rate_reset.store(reset, Ordering::Relaxed);
        }
    }

    async fn wait_for_rate_reset(&self) {
        let remaining = self.rate_remaining.load(Ordering::Relaxed);
        if remaining > RATE_LIMIT_PAUSE_THRESHOLD {
            return;
        }
        let reset_at = self.rate_reset.load(Ordering::Relaxed);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        if reset_at > now {
            let wait = reset_at - now + 1;
            warn!(remaining, wait_secs = wait, "Rate limit low, waiting for reset");
            tokio::time::sleep(Duration::from_secs(wait)).await;
        }
    }
}

#[async_trait::async_trait]
impl RepositorySource for GitHubClient {
    #[instrument(skip(self))]
    async fn list_repositories(&self, login: &str) -> crate::error::Result<Vec<RepoRef>> {
        let mut repositories = Vec::new();
        let mut page = 1u32;
        loop {
            let url = format!(
                "{}/users/{login}/repos?type=owner&per_page={PER_PAGE}&page={page}",
                self.api_base
            );
            let batch = self.api_get::<Vec<GhRepo>>(&url).await?;
            let fetched = batch.len();
            repositories.extend(
                batch
                    .into_iter()
                    .filter(|repo| !repo.fork)
                    .map(|repo| RepoRef::new(repo.owner.login, repo.name)),
            );
            if fetched < PER_PAGE as usize {
                break;
            }
            page += 1;
        }
        info!(count = repositories.len(), "Repositories listed");
        Ok(repositories)
    }
}

#[async_trait::async_trait]
impl ActivitySource for GitHubClient {
    #[instrument(skip_all, name = "github_activity", fields(login = query.login))]
    async fn recent_activity(&self, query: &ActivityQuery<'_>) -> RecentActivity {
        let events = self.load_push_events(query).await;
        info!(events = events.len(), "Push events loaded");

        let mut activity = RecentActivity {
            oldest_event: events.last().map(|event| event.created_at),
            ..RecentActivity::default()
        };

        for (origin, commit) in authored_commits(events, query.authors) {
            let files = match self.fetch_commit_files(&commit.url).await {
                Ok(files) => files,
                Err(e) => {
                    debug!(sha = %commit.sha, error = %e, "Cannot load commit patches, skipping");
                    continue;
                }
            };
            let slug = origin.slug();
            for file in files {
                if let Some(patch) = file.patch {
                    activity
                        .fragments
                        .push(PatchFragment::from_patch(Some(&slug), &file.filename, &patch));
                }
            }
            activity.commits.push(SourceCommit {
                origin,
                sha: commit.sha,
            });
        }

        info!(
            commits = activity.commits.len(),
            fragments = activity.fragments.len(),
            "Recent patches loaded"
        );
        activity
    }
}

#[async_trait::async_trait]
impl OverrideSource for GitHubClient {
    async fn language_overrides(&self, origin: &RepoRef, branch: &str) -> Option<String> {
        let url = format!(
            "{}/{}/{}/{branch}/.gitattributes",
            self.raw_base, origin.owner, origin.name
        );
        let mut req = self.client.get(&url);
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => {
                debug!(%origin, branch, error = %e, "Cannot load .gitattributes");
                return None;
            }
        };
        if resp.status() != StatusCode::OK {
            debug!(%origin, branch, status = resp.status().as_u16(), "No .gitattributes");
            return None;
        }
        resp.text().await.ok()
    }
}

/// Install the aws-lc-rs crypto provider for rustls once per process.
fn install_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        // Fails only if another provider is already installed.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

/// Number of 100-event pages needed to load `load` events.
fn event_pages(load: u32) -> u32 {
    load.div_ceil(PER_PAGE)
}

/// Keep push events by the account, outside the skip list, inside the window.
fn select_push_events(
    events: Vec<GhEvent>,
    query: &ActivityQuery<'_>,
    now: DateTime<Utc>,
) -> Vec<GhEvent> {
    let since = (query.days > 0).then(|| now - chrono::Duration::days(i64::from(query.days)));
    events
        .into_iter()
        .filter(|event| event.kind == "PushEvent")
        .filter(|event| query.organization || event.actor.login.eq_ignore_ascii_case(query.login))
        .filter(|event| {
            RepoRef::parse(&event.repo.name).is_some_and(|repo| !query.skip.matches(&repo))
        })
        .filter(|event| since.is_none_or(|since| event.created_at > since))
        .collect()
}

/// Commits of the given push events authored by `authors`, deduplicated
/// by repository and sha, in event order.
fn authored_commits(events: Vec<GhEvent>, authors: &AuthorFilter) -> Vec<(RepoRef, GhPushCommit)> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut commits = Vec::new();
    for event in events {
        let Some(origin) = RepoRef::parse(&event.repo.name) else {
            continue;
        };
        let Ok(payload) = serde_json::from_value::<GhPushPayload>(event.payload) else {
            continue;
        };
        for commit in payload.commits {
            let author = commit.author.as_ref();
            let matches = authors.matches(
                author.and_then(|a| a.name.as_deref()),
                author.and_then(|a| a.email.as_deref()),
            );
            if matches && seen.insert((origin.slug(), commit.sha.clone())) {
                commits.push((origin.clone(), commit));
            }
        }
    }
    commits
}

// ── API types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GhRepo {
    name: String,
    owner: GhUser,
    #[serde(default)]
    fork: bool,
}

#[derive(Debug, Deserialize)]
struct GhUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GhEvent {
    #[serde(rename = "type")]
    kind: String,
    actor: GhUser,
    repo: GhEventRepo,
    created_at: DateTime<Utc>,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GhEventRepo {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct GhPushPayload {
    #[serde(default)]
    commits: Vec<GhPushCommit>,
}

#[derive(Debug, Deserialize)]
struct GhPushCommit {
    sha: String,
    url: String,
    #[serde(default)]
    author: Option<GhCommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct GhCommitAuthor {
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GhCommitDetail {
    #[serde(default)]
    files: Vec<GhFile>,
}

#[derive(Debug, Deserialize)]
struct GhFile {
    filename: String,
    #[serde(default)]
    patch: Option<String>,
}

// ── Tests ───────────────────────────────────────────────────────────
