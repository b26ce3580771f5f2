//! WeChat Official Account publishing client.
//!
//! Publishing is three remote calls after authentication:
//!
//! | Step | Endpoint | Timeout | Success field |
//! |------|----------|---------|---------------|
//! | token | `GET cgi-bin/token` | 10s | `access_token` |
//! | cover upload | `POST cgi-bin/material/add_material?type=image` | 30s | `media_id` |
//! | body image upload | `POST cgi-bin/media/uploadimg` | 60s | `url` |
//! | draft | `POST cgi-bin/draft/add` | 30s | `media_id` |
//! | submit | `POST cgi-bin/freepublish/submit` | 30s | `publish_id` |
//!
//! The token is fetched once per [`WeChatPublisher`] and never refreshed;
//! every run builds a fresh client. Any response missing its success field is
//! a fatal [`DigestError::Api`] carrying the raw body, with one exception:
//! submit answering errcode `48001` (account not authorized to publish) is a
//! soft failure that leaves the draft in place.

use crate::config::{CoverConfig, WeChatConfig, WeChatCredentials};
use crate::cover::{CoverSpec, save_cover};
use crate::error::{DigestError, Result};
use crate::models::PublishRecord;
use crate::utils::truncate_for_log;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};
use url::Url;

/// errcode returned by `freepublish/submit` for accounts without publish rights.
pub const ERRCODE_UNAUTHORIZED_PUBLISH: i64 = 48001;

const TOKEN_TIMEOUT: Duration = Duration::from_secs(10);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const CONTENT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const DRAFT_TIMEOUT: Duration = Duration::from_secs(30);
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// One article inside a `draft/add` request.
#[derive(Debug, Clone, Serialize)]
pub struct DraftArticle {
    pub title: String,
    pub author: String,
    /// Summary line shown in the article list.
    pub digest: String,
    pub content: String,
    pub thumb_media_id: String,
    pub need_open_comment: u8,
    pub only_fans_can_comment: u8,
}

impl DraftArticle {
    /// Comments open to everyone.
    pub fn new(title: &str, author: &str, digest: &str, content: &str, thumb_media_id: &str) -> Self {
        Self {
            title: title.to_string(),
            author: author.to_string(),
            digest: digest.to_string(),
            content: content.to_string(),
            thumb_media_id: thumb_media_id.to_string(),
            need_open_comment: 1,
            only_fans_can_comment: 0,
        }
    }
}

/// What [`WeChatPublisher::publish_digest`] needs from the pipeline.
#[derive(Debug, Clone)]
pub struct DigestPost<'a> {
    pub title: &'a str,
    pub html: &'a str,
    pub cover: &'a CoverSpec,
    /// Where the rendered cover is written before upload.
    pub cover_path: &'a Path,
}

/// Authenticated client for the publishing API.
pub struct WeChatPublisher {
    http: reqwest::Client,
    base_url: Url,
    credentials: WeChatCredentials,
    author: String,
    summary: String,
    token: OnceCell<String>,
}

impl fmt::Debug for WeChatPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeChatPublisher")
            .field("base_url", &self.base_url.as_str())
            .field("credentials", &self.credentials)
            .field("token_cached", &self.token.initialized())
            .finish()
    }
}

/// `value[field]` as a string, or an `Api` error carrying the whole payload.
pub fn required_field(value: &Value, field: &str, context: &str) -> Result<String> {
    match value.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(DigestError::api(context, value)),
    }
}

/// Map a `freepublish/submit` response to a publish id.
///
/// errcode 0 (or absent) yields the id, 48001 yields `None` after a warning,
/// any other errcode is an error.
pub fn interpret_submit(value: &Value) -> Result<Option<String>> {
    let errcode = value.get("errcode").and_then(Value::as_i64).unwrap_or(0);
    match errcode {
        0 => required_field(value, "publish_id", "publish submit").map(Some),
        ERRCODE_UNAUTHORIZED_PUBLISH => {
            let errmsg = value.get("errmsg").and_then(serde_json::Value::as_str).unwrap_or_default();
            warn!(
                errcode,
                errmsg,
                "Account lacks publish permission; draft created but not published"
            );
            Ok(None)
        }
        _ => Err(DigestError::api("publish submit", value)),
    }
}

fn image_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

async fn read_json(resp: reqwest::Response) -> Result<Value> {
    let raw = resp.text().await?;
    serde_json::from_str(&raw).map_err(|_| DigestError::api("decode response", truncate_for_log(&raw, 500)))
}

impl WeChatPublisher {
    /// Fails with `MissingCredential` when either credential is absent.
    pub fn new(config: &WeChatConfig) -> Result<Self> {
        Self::with_http(crate::api::http_client()?, config)
    }

    pub fn with_http(http: reqwest::Client, config: &WeChatConfig) -> Result<Self> {
        let credentials = config.credentials().ok_or_else(|| {
            let missing = if config.app_id.is_none() {
                crate::config::WECHAT_APP_ID
            } else {
                crate::config::WECHAT_APP_SECRET
            };
            DigestError::MissingCredential(missing)
        })?;
        Ok(Self {
            http,
            base_url: Url::parse(&config.base_url)?,
            credentials,
            author: config.author.clone(),
            summary: config.summary.clone(),
            token: OnceCell::new(),
        })
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base_url.join(path)?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    async fn authed_endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let token = self.access_token().await?;
        let mut all = vec![("access_token", token)];
        all.extend_from_slice(params);
        self.endpoint(path, &all)
    }

    /// Cached access token; the first call fetches it.
    #[instrument(level = "info", skip_all)]
    pub async fn access_token(&self) -> Result<&str> {
        let token = self
            .token
            .get_or_try_init(|| async {
                let url = self.endpoint(
                    "cgi-bin/token",
                    &[
                        ("grant_type", "client_credential"),
                        ("appid", self.credentials.app_id.as_str()),
                        ("secret", self.credentials.app_secret.as_str()),
                    ],
                )?;
                let resp = self.http.get(url).timeout(TOKEN_TIMEOUT).send().await?;
                let body = read_json(resp).await?;
                let token = required_field(&body, "access_token", "access token")?;
                info!("Obtained access token");
                Ok::<_, DigestError>(token)
            })
            .await?;
        Ok(token.as_str())
    }

    async fn upload(&self, path: &Path, endpoint: Url, timeout: Duration) -> Result<Value> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image.jpg")
            .to_string();
        let part = Part::bytes(bytes).file_name(file_name).mime_str(image_mime(path))?;
        let form = Form::new().part("media", part);
        let resp = self
            .http
            .post(endpoint)
            .multipart(form)
            .timeout(timeout)
            .send()
            .await?;
        read_json(resp).await
    }

    /// Upload a permanent image (used as cover); returns its `media_id`.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn upload_image(&self, path: &Path) -> Result<String> {
        let endpoint = self
            .authed_endpoint("cgi-bin/material/add_material", &[("type", "image")])
            .await?;
        let body = self.upload(path, endpoint, UPLOAD_TIMEOUT).await?;
        let media_id = required_field(&body, "media_id", "image upload")?;
        info!(%media_id, "Uploaded cover image");
        Ok(media_id)
    }

    /// Upload an image referenced from article content; returns its hosted URL.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn upload_content_image(&self, path: &Path) -> Result<String> {
        let endpoint = self.authed_endpoint("cgi-bin/media/uploadimg", &[]).await?;
        let body = self.upload(path, endpoint, CONTENT_UPLOAD_TIMEOUT).await?;
        let url = required_field(&body, "url", "content image upload")?;
        info!(%url, "Uploaded content image");
        Ok(url)
    }

    /// Create a draft holding one article; returns the draft `media_id`.
    #[instrument(level = "info", skip_all, fields(title = %article.title, content_chars = article.content.chars().count()))]
    pub async fn create_draft(&self, article: &DraftArticle) -> Result<String> {
        let endpoint = self.authed_endpoint("cgi-bin/draft/add", &[]).await?;
        let payload = serde_json::to_vec(&json!({ "articles": [article] }))?;
        let resp = self
            .http
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .body(payload)
            .timeout(DRAFT_TIMEOUT)
            .send()
            .await?;
        let body = read_json(resp).await?;
        let media_id = required_field(&body, "media_id", "draft creation")?;
        info!(%media_id, "Draft created");
        Ok(media_id)
    }

    /// Submit a draft; `Ok(None)` when the account cannot publish.
    #[instrument(level = "info", skip(self))]
    pub async fn publish(&self, draft_media_id: &str) -> Result<Option<String>> {
        let endpoint = self.authed_endpoint("cgi-bin/freepublish/submit", &[]).await?;
        let resp = self
            .http
            .post(endpoint)
            .json(&json!({ "media_id": draft_media_id }))
            .timeout(SUBMIT_TIMEOUT)
            .send()
            .await?;
        let body = read_json(resp).await?;
        let publish_id = interpret_submit(&body)?;
        if let Some(id) = &publish_id {
            info!(publish_id = %id, "Publish submitted");
        }
        Ok(publish_id)
    }

    /// Render the cover, upload it, create the draft and submit it.
    #[instrument(level = "info", skip_all, fields(title = %post.title))]
    pub async fn publish_digest(&self, post: &DigestPost<'_>, cover: &CoverConfig) -> Result<PublishRecord> {
        save_cover(post.cover, &cover.font_paths, post.cover_path).await?;
        let thumb_media_id = self.upload_image(post.cover_path).await?;

        let article = DraftArticle::new(post.title, &self.author, &self.summary, post.html, &thumb_media_id);
        let draft_media_id = self.create_draft(&article).await?;
        let publish_id = self.publish(&draft_media_id).await?;

        let record = PublishRecord::new(thumb_media_id, draft_media_id, publish_id);
        info!(status = %record.status, "Digest publishing finished");
        Ok(record)
    }
}
