//! LLM API interaction with exponential backoff retry logic.
//!
//! This module talks to the Anthropic Messages API. Everything that needs
//! text from the model goes through the [`AskAsync`] trait so the pipeline can
//! be exercised with in-memory fakes.
//!
//! # Architecture
//!
//! - [`AskAsync`]: core trait defining async LLM interaction
//! - [`AnthropicClient`]: HTTP client for `/v1/messages`
//! - [`WebSearch`]: asks the model to search the web (`web_search` tool) and summarize
//! - [`Completion`]: plain text completion used by the composer
//! - [`RetryAsk`]: decorator that adds retry logic to any `AskAsync` implementation
//!
//! # Retry Strategy
//!
//! `RetryAsk` only reacts to transport and API errors. Output quality is the
//! composer's concern (see [`crate::compose::generate_with_retries`]).
//!
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::config::LlmConfig;
use crate::error::{DigestError, Result};
use crate::utils::truncate_for_log;
use rand::{Rng, rng};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const WEB_SEARCH_TOOL: &str = "web_search_20250305";

/// Trait for async LLM interaction.
///
/// Implementors send text to an LLM and receive a response. Decorators such
/// as [`RetryAsk`] wrap another implementor.
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send text to the LLM and receive a response.
    async fn ask(&self, text: &str) -> Result<Self::Response>;
}

impl<T: AskAsync> AskAsync for &T {
    type Response = T::Response;

    async fn ask(&self, text: &str) -> Result<Self::Response> {
        (**self).ask(text).await
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    /// The underlying LLM client to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Create a new retry wrapper around an existing [`AskAsync`] implementation.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let search = WebSearch::new(&client, 4096);
    /// let retrying = RetryAsk::new(search, 2, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync + fmt::Debug,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => {
                    return Ok(resp);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis(),
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    // backoff calc
                    let exponent = (attempt - 1).min(16) as u32;
                    let mut delay = self.base_delay.saturating_mul(1u32 << exponent);
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Wrap `inner` with the default one-second backoff.
pub fn with_backoff<T: AskAsync>(inner: T, max_retries: usize) -> RetryAsk<T> {
    RetryAsk::new(inner, max_retries, StdDuration::from_secs(1))
}

/// Shared HTTP client: 10s connect timeout, per-request timeouts set by callers.
pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(StdDuration::from_secs(10))
        .build()?)
}

/// HTTP client for the Anthropic Messages API.
pub struct AnthropicClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
    model: String,
    timeout: StdDuration,
}

impl fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<RequestMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolSpec>,
}

#[derive(Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ToolSpec {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'static str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

impl AnthropicClient {
    /// Build a client from the LLM section; fails when the API key is missing.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Self::with_http(http_client()?, config)
    }

    /// Same as [`AnthropicClient::new`] over a caller-supplied HTTP client.
    pub fn with_http(http: reqwest::Client, config: &LlmConfig) -> Result<Self> {
        let api_key = config.api_key()?.to_string();
        let endpoint = Url::parse(&config.base_url)?.join("v1/messages")?;
        Ok(Self {
            http,
            endpoint,
            api_key,
            model: config.model.clone(),
            timeout: StdDuration::from_secs(config.timeout_secs),
        })
    }

    /// Send one user message and return the concatenated text blocks.
    ///
    /// With `web_search` set, the server-side search tool is enabled and the
    /// tool-use blocks in the answer are skipped.
    #[instrument(level = "info", skip(self, prompt), fields(model = %self.model, prompt_chars = prompt.chars().count()))]
    pub async fn messages(&self, prompt: &str, max_tokens: u32, web_search: bool) -> Result<String> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(self.api_key.trim()).map_err(|e| DigestError::InvalidConfig {
                field: "ANTHROPIC_API_KEY".to_string(),
                reason: e.to_string(),
            })?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let tools = if web_search {
            vec![ToolSpec {
                kind: WEB_SEARCH_TOOL,
                name: "web_search",
            }]
        } else {
            Vec::new()
        };
        let body = MessagesRequest {
            model: &self.model,
            max_tokens,
            messages: vec![RequestMessage {
                role: "user",
                content: prompt,
            }],
            tools,
        };

        let resp = self
            .http
            .post(self.endpoint.clone())
            .headers(headers)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let raw = resp.text().await?;
        if !status.is_success() {
            return Err(DigestError::api(
                format!("anthropic messages ({status})"),
                truncate_for_log(&raw, 2000),
            ));
        }
        collect_text(&raw)
    }
}

/// Concatenate the text blocks of a Messages API response body.
fn collect_text(raw: &str) -> Result<String> {
    let parsed: MessagesResponse = serde_json::from_str(raw)?;
    if parsed.stop_reason.as_deref() == Some("max_tokens") {
        warn!("Model stopped at max_tokens; output is likely truncated");
    }
    let text: String = parsed
        .content
        .into_iter()
        .filter_map(|block| match block {
            ResponseBlock::Text { text } => Some(text),
            ResponseBlock::Other => None,
        })
        .collect();
    if text.trim().is_empty() {
        return Err(DigestError::api(
            "anthropic messages",
            format!("response missing text content: {}", truncate_for_log(raw, 500)),
        ));
    }
    Ok(text)
}

/// Web search through the model's server-side search tool.
#[derive(Debug)]
pub struct WebSearch<'a> {
    client: &'a AnthropicClient,
    max_tokens: u32,
}

impl<'a> WebSearch<'a> {
    pub fn new(client: &'a AnthropicClient, max_tokens: u32) -> Self {
        Self { client, max_tokens }
    }
}

impl AskAsync for WebSearch<'_> {
    type Response = String;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, query: &str) -> Result<Self::Response> {
        let t0 = Instant::now();
        let prompt = format!("搜索以下内容并返回结果摘要：{query}");
        let res = self.client.messages(&prompt, self.max_tokens, true).await;
        let dt = t0.elapsed();

        match &res {
            Ok(text) => debug!(elapsed_ms = dt.as_millis(), chars = text.chars().count(), "Search call succeeded"),
            Err(e) => warn!(elapsed_ms = dt.as_millis(), error = %e, "Search call failed"),
        }
        res
    }
}

/// Plain completion without tools.
#[derive(Debug)]
pub struct Completion<'a> {
    client: &'a AnthropicClient,
    max_tokens: u32,
}

impl<'a> Completion<'a> {
    pub fn new(client: &'a AnthropicClient, max_tokens: u32) -> Self {
        Self { client, max_tokens }
    }
}

impl AskAsync for Completion<'_> {
    type Response = String;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, prompt: &str) -> Result<Self::Response> {
        let t0 = Instant::now();
        let res = self.client.messages(prompt, self.max_tokens, false).await;
        let dt = t0.elapsed();

        match &res {
            Ok(text) => info!(elapsed_ms = dt.as_millis(), chars = text.chars().count(), "Completion succeeded"),
            Err(e) => warn!(elapsed_ms = dt.as_millis(), error = %e, "Completion failed"),
        }
        res
    }
}
