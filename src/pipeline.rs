//! One digest run, end to end.
//!
//! 1. **Fetch**: every source through the web-search backend ([`crate::sources`])
//! 2. **History**: earlier digests become a dedup block ([`crate::history`])
//! 3. **Compose**: bounded retries until the markup is long enough ([`crate::compose`])
//! 4. **Normalize**: ordered rewrite rules over the HTML ([`crate::normalize`])
//! 5. **Persist**: date-keyed markdown and HTML ([`crate::outputs`])
//! 6. **Publish**: cover, upload, draft, submit ([`crate::publisher`]), only when
//!    credentials are present and the markup passed validation

use crate::api::{AnthropicClient, AskAsync, Completion, WebSearch, http_client, with_backoff};
use crate::compose::{Composer, generate_with_retries};
use crate::config::{Config, DigestConfig};
use crate::cover::CoverSpec;
use crate::error::{DigestError, Result};
use crate::history::{load_history, render_history_context};
use crate::keywords::extract_keywords;
use crate::models::{DigestDocument, DigestPaths, PublishRecord};
use crate::normalize::normalize;
use crate::outputs::{cover_path, write_digest};
use crate::prompt::PromptContext;
use crate::publisher::{DigestPost, WeChatPublisher};
use crate::sources::fetch_all;
use crate::utils::{date_compact, date_long, date_short};
use chrono::NaiveDate;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Whether a run ends at the files or goes on to publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Publish,
    /// Generate and persist only.
    GenerateOnly,
}

/// Generated and persisted digest.
#[derive(Debug, Clone)]
pub struct GeneratedDigest {
    pub document: DigestDocument,
    pub paths: DigestPaths,
    pub attempts: usize,
    pub markup_valid: bool,
}

/// Everything a caller learns from one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub digest: GeneratedDigest,
    /// `None` when publishing was skipped.
    pub record: Option<PublishRecord>,
}

/// Steps 1 to 5 over any search and completion backends.
#[instrument(level = "info", skip_all, fields(%date))]
pub async fn generate_digest<S, W>(
    searcher: &S,
    writer: &W,
    config: &DigestConfig,
    date: NaiveDate,
) -> Result<GeneratedDigest>
where
    S: AskAsync<Response = String>,
    W: AskAsync<Response = String>,
{
    let sources = fetch_all(searcher, date).await;

    let history = load_history(&config.output_dir, date, config.history_days).await;
    let history = render_history_context(&history);

    let date_long = date_long(date);
    let date_short = date_short(date);
    let ctx = PromptContext {
        date_long: &date_long,
        date_short: &date_short,
        sources: &sources,
        history: &history,
    };

    let composer = Composer::new(writer, config.two_stage);
    let generation = generate_with_retries(config.max_attempts, config.min_markup_chars, |attempt| {
        info!(attempt, max = config.max_attempts, "Composing digest");
        composer.compose(&ctx)
    })
    .await?;

    let markdown = generation.digest.markdown;
    let html = generation.digest.html.as_deref().map(normalize);
    let keywords = extract_keywords(&markdown);
    info!(?keywords, "Extracted cover keywords");

    let document = DigestDocument {
        date,
        markdown,
        html,
        keywords,
    };
    let paths = write_digest(&config.output_dir, &document).await?;

    Ok(GeneratedDigest {
        document,
        paths,
        attempts: generation.attempts,
        markup_valid: generation.markup_valid,
    })
}

/// Article title: `<prefix> MM.DD`.
pub fn article_title(prefix: &str, date: NaiveDate) -> String {
    format!("{prefix} {}", date_compact(date))
}

/// Step 6, with the skip rules applied.
async fn publish_generated(
    config: &Config,
    http: reqwest::Client,
    digest: &GeneratedDigest,
) -> Result<Option<PublishRecord>> {
    let Some(html) = digest.document.html.as_deref().filter(|_| digest.markup_valid) else {
        error!(
            attempts = digest.attempts,
            "Markup failed validation; skipping publishing (markdown was saved)"
        );
        return Ok(None);
    };

    let publisher = match WeChatPublisher::with_http(http, &config.wechat) {
        Ok(publisher) => publisher,
        Err(DigestError::MissingCredential(name)) => {
            warn!(missing = name, "WeChat credentials not configured; skipping publishing");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let date = digest.document.date;
    let title = article_title(&config.wechat.title_prefix, date);
    let cover = CoverSpec::new(&title, date_long(date), &digest.document.keywords);
    let cover_path = cover_path(&config.digest.output_dir);
    let post = DigestPost {
        title: &title,
        html,
        cover: &cover,
        cover_path: &cover_path,
    };
    let record = publisher.publish_digest(&post, &config.cover).await?;
    Ok(Some(record))
}

/// Run the whole pipeline once for `date` with the given HTTP client.
#[instrument(level = "info", skip(config, http), fields(%date))]
pub async fn run_with_http(
    config: &Config,
    http: reqwest::Client,
    date: NaiveDate,
    mode: RunMode,
) -> Result<RunReport> {
    let t0 = Instant::now();
    let client = AnthropicClient::with_http(http.clone(), &config.llm)?;
    let retries = config.llm.transport_retries;
    let searcher = with_backoff(WebSearch::new(&client, config.llm.search_max_tokens), retries);
    let writer = with_backoff(Completion::new(&client, config.llm.compose_max_tokens), retries);

    let digest = generate_digest(&searcher, &writer, &config.digest, date).await?;
    info!(
        attempts = digest.attempts,
        markup_valid = digest.markup_valid,
        markdown = %digest.paths.markdown.display(),
        "Digest generated"
    );

    let record = match mode {
        RunMode::GenerateOnly => None,
        RunMode::Publish => publish_generated(config, http, &digest).await?,
    };
    if let Some(record) = &record {
        info!(
            status = %record.status,
            draft_media_id = %record.draft_media_id,
            publish_id = record.publish_id.as_deref().unwrap_or("-"),
            "Publish outcome"
        );
    }
    info!(elapsed_ms = t0.elapsed().as_millis(), "Run complete");
    Ok(RunReport { digest, record })
}

/// Run once for `date` with a fresh HTTP client.
pub async fn run_once(config: &Config, date: NaiveDate, mode: RunMode) -> Result<RunReport> {
    run_with_http(config, http_client()?, date, mode).await
}
