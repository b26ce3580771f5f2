//! Digest composition and the bounded generation loop.
//!
//! The model answers with tagged blocks:
//!
//! ```text
//! [MARKDOWN]
//! # Tech老兵日记 | 2026-01-16：...
//! [/MARKDOWN]
//!
//! [WECHAT_HTML]
//! <div style="...">...</div>
//! [/WECHAT_HTML]
//! ```
//!
//! In two-stage mode the markdown comes from one call and the HTML from a
//! second call that only sees the markdown. Either way the result is checked
//! by [`generate_with_retries`], which accepts the first attempt whose HTML is
//! long enough.

use crate::api::AskAsync;
use crate::error::Result;
use crate::prompt::{self, HTML_TAG, MARKDOWN_TAG, PromptContext};
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use regex::Regex;
use std::future::Future;
use tracing::{debug, error, info, instrument, warn};

static MARKDOWN_BLOCK: Lazy<Regex> = Lazy::new(|| tagged_block(MARKDOWN_TAG));
static HTML_BLOCK: Lazy<Regex> = Lazy::new(|| tagged_block(HTML_TAG));
static HTML_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```html\s*(.*?)```").unwrap());
static BARE_DIV: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<div\b.*</div>").unwrap());

fn tagged_block(tag: &str) -> Regex {
    let tag = regex::escape(tag);
    Regex::new(&format!(r"(?s)\[{tag}\](.*?)\[/{tag}\]")).unwrap()
}

/// One composed answer, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposedDigest {
    pub markdown: String,
    pub html: Option<String>,
}

impl ComposedDigest {
    /// Character count of the HTML, zero when absent.
    pub fn markup_chars(&self) -> usize {
        self.html.as_deref().map_or(0, |h| h.chars().count())
    }
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Markdown block; the whole answer when the tags are missing.
pub fn parse_markdown(text: &str) -> String {
    capture(&MARKDOWN_BLOCK, text).unwrap_or_else(|| {
        debug!("No markdown tags in answer; using the whole text");
        text.trim().to_string()
    })
}

/// HTML block; falls back to an ```html fence, then to a bare `<div>...</div>` span.
pub fn parse_html(text: &str) -> Option<String> {
    capture(&HTML_BLOCK, text)
        .or_else(|| capture(&HTML_FENCE, text))
        .or_else(|| BARE_DIV.find(text).map(|m| m.as_str().trim().to_string()))
}

/// Writes the digest through an [`AskAsync`] completion backend.
#[derive(Debug)]
pub struct Composer<A> {
    writer: A,
    two_stage: bool,
}

impl<A> Composer<A>
where
    A: AskAsync<Response = String>,
{
    pub fn new(writer: A, two_stage: bool) -> Self {
        Self { writer, two_stage }
    }

    /// One composition attempt.
    #[instrument(level = "info", skip_all, fields(two_stage = self.two_stage))]
    pub async fn compose(&self, ctx: &PromptContext<'_>) -> Result<ComposedDigest> {
        if !self.two_stage {
            let answer = self.writer.ask(&prompt::combined_prompt(ctx)).await?;
            return Ok(ComposedDigest {
                markdown: parse_markdown(&answer),
                html: parse_html(&answer),
            });
        }

        let answer = self.writer.ask(&prompt::markdown_prompt(ctx)).await?;
        let markdown = parse_markdown(&answer);
        info!(markdown_chars = markdown.chars().count(), "Markdown stage done");

        let answer = self.writer.ask(&prompt::html_prompt(&markdown)).await?;
        let html = parse_html(&answer);
        if html.is_none() {
            warn!(answer = %truncate_for_log(&answer, 200), "HTML stage returned no markup");
        }
        Ok(ComposedDigest { markdown, html })
    }
}

/// Outcome of [`generate_with_retries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub digest: ComposedDigest,
    /// Attempts consumed, including failed ones.
    pub attempts: usize,
    /// `false` when no attempt produced enough markup; `digest.html` is then `None`.
    pub markup_valid: bool,
}

/// Run `attempt` until its HTML reaches `min_markup_chars`, at most `max_attempts` times.
///
/// An attempt that errors still counts. When no attempt produced output at all
/// the last error is returned; otherwise the last output is kept with its HTML
/// cleared.
pub async fn generate_with_retries<F, Fut>(
    max_attempts: usize,
    min_markup_chars: usize,
    mut attempt: F,
) -> Result<Generation>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<ComposedDigest>>,
{
    let max_attempts = max_attempts.max(1);
    let mut last_output: Option<ComposedDigest> = None;
    let mut last_error = None;

    for n in 1..=max_attempts {
        match attempt(n).await {
            Ok(digest) => {
                let chars = digest.markup_chars();
                if chars >= min_markup_chars {
                    info!(attempt = n, markup_chars = chars, "Generation accepted");
                    return Ok(Generation {
                        digest,
                        attempts: n,
                        markup_valid: true,
                    });
                }
                warn!(
                    attempt = n,
                    max = max_attempts,
                    markup_chars = chars,
                    min = min_markup_chars,
                    "Markup too short; regenerating"
                );
                last_output = Some(digest);
            }
            Err(e) => {
                warn!(attempt = n, max = max_attempts, error = %e, "Generation attempt failed");
                last_error = Some(e);
            }
        }
    }

    match (last_output, last_error) {
        (Some(mut digest), _) => {
            error!(
                attempts = max_attempts,
                min = min_markup_chars,
                "No attempt produced enough markup; keeping markdown only"
            );
            digest.html = None;
            Ok(Generation {
                digest,
                attempts: max_attempts,
                markup_valid: false,
            })
        }
        (None, Some(e)) => Err(e),
        (None, None) => unreachable!("at least one attempt always runs"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DigestError;
    use crate::models::SourceSnapshot;
    use std::cell::{Cell, RefCell};

    fn digest(html_len: usize) -> ComposedDigest {
        ComposedDigest {
            markdown: "# t".to_string(),
            html: Some("x".repeat(html_len)),
        }
    }

    #[test]
    fn parses_tagged_blocks() {
        let answer = "preamble\n[MARKDOWN]\n# 标题\n正文\n[/MARKDOWN]\n\n[WECHAT_HTML]\n<div>hi</div>\n[/WECHAT_HTML]";
        assert_eq!(parse_markdown(answer), "# 标题\n正文");
        assert_eq!(parse_html(answer).as_deref(), Some("<div>hi</div>"));
    }

    #[test]
    fn markdown_falls_back_to_whole_answer() {
        assert_eq!(parse_markdown("  # 只有正文\n"), "# 只有正文");
    }

    #[test]
    fn html_fallbacks() {
        assert_eq!(
            parse_html("text\n```html\n<div>a</div>\n```\nmore").as_deref(),
            Some("<div>a</div>")
        );
        assert_eq!(
            parse_html("好的，下面是 HTML：<div><p>a</p></div> 完成").as_deref(),
            Some("<div><p>a</p></div>")
        );
        assert_eq!(parse_html("no markup here"), None);
        assert_eq!(parse_html("[WECHAT_HTML]   [/WECHAT_HTML]"), None);
    }

    #[tokio::test]
    async fn accepts_third_attempt() {
        let calls = Cell::new(0);
        let generation = generate_with_retries(3, 500, |n| {
            calls.set(calls.get() + 1);
            async move { Ok(digest(if n == 3 { 600 } else { 100 })) }
        })
        .await
        .unwrap();
        assert_eq!(calls.get(), 3);
        assert_eq!(generation.attempts, 3);
        assert!(generation.markup_valid);
        assert_eq!(generation.digest.markup_chars(), 600);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let generation = generate_with_retries(3, 500, |_| {
            calls.set(calls.get() + 1);
            async { Ok(digest(10)) }
        })
        .await
        .unwrap();
        assert_eq!(calls.get(), 3);
        assert!(!generation.markup_valid);
        assert_eq!(generation.digest.html, None);
        assert_eq!(generation.digest.markdown, "# t");
    }

    #[tokio::test]
    async fn errors_count_as_attempts() {
        let calls = Cell::new(0);
        let generation = generate_with_retries(3, 5, |n| {
            calls.set(calls.get() + 1);
            async move {
                if n < 3 {
                    Err(DigestError::api("compose", "overloaded"))
                } else {
                    Ok(digest(5))
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(calls.get(), 3);
        assert!(generation.markup_valid);
    }

    #[tokio::test]
    async fn all_errors_propagate_last() {
        let result = generate_with_retries(2, 5, |n| async move {
            Err::<ComposedDigest, _>(DigestError::api("compose", format!("fail {n}")))
        })
        .await;
        assert_eq!(result.unwrap_err().to_string(), "compose failed: fail 2");
    }

    /// Replies in order and records every prompt.
    #[derive(Debug, Default)]
    struct Scripted {
        replies: RefCell<Vec<String>>,
        prompts: RefCell<Vec<String>>,
    }

    impl AskAsync for Scripted {
        type Response = String;

        async fn ask(&self, text: &str) -> Result<String> {
            self.prompts.borrow_mut().push(text.to_string());
            Ok(self.replies.borrow_mut().remove(0))
        }
    }

    fn ctx(sources: &[SourceSnapshot]) -> PromptContext<'_> {
        PromptContext {
            date_long: "2026年01月16日",
            date_short: "2026-01-16",
            sources,
            history: "",
        }
    }

    #[tokio::test]
    async fn two_stage_feeds_markdown_into_html_prompt() {
        let writer = Scripted {
            replies: RefCell::new(vec![
                "[MARKDOWN]# 今日\n内容[/MARKDOWN]".to_string(),
                "[WECHAT_HTML]<div>内容</div>[/WECHAT_HTML]".to_string(),
            ]),
            ..Default::default()
        };
        let composer = Composer::new(&writer, true);
        let composed = composer.compose(&ctx(&[])).await.unwrap();

        assert_eq!(composed.markdown, "# 今日\n内容");
        assert_eq!(composed.html.as_deref(), Some("<div>内容</div>"));
        let prompts = writer.prompts.borrow();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("# 今日\n内容"));
    }

    #[tokio::test]
    async fn single_stage_makes_one_call() {
        let writer = Scripted {
            replies: RefCell::new(vec![
                "[MARKDOWN]md[/MARKDOWN][WECHAT_HTML]<div>h</div>[/WECHAT_HTML]".to_string(),
            ]),
            ..Default::default()
        };
        let composed = Composer::new(&writer, false).compose(&ctx(&[])).await.unwrap();
        assert_eq!(composed.markdown, "md");
        assert_eq!(composed.html.as_deref(), Some("<div>h</div>"));
        assert_eq!(writer.prompts.borrow().len(), 1);
    }
}
