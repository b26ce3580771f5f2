//! Source fetching through the model's web-search tool.
//!
//! Each run searches, in order:
//!
//! | Source | Query |
//! |--------|-------|
//! | Hacker News | top stories today on news.ycombinator.com |
//! | Product Hunt | top products of the run date |
//! | AI Twitter | five keyword dimensions, `site:x.com OR site:twitter.com` |
//! | GitHub Trending | trending repositories today |
//! | Reddit | hot posts in the AI and programming subreddits |
//!
//! Fetches are sequential. A failing source is logged and replaced by a
//! placeholder so the composer still receives one snapshot per source.

use crate::api::AskAsync;
use crate::models::SourceSnapshot;
use crate::utils::date_short;
use chrono::{Datelike, NaiveDate};
use futures::stream::{self, StreamExt};
use tracing::{info, instrument, warn};

/// Keywords used to build the AI Twitter searches.
pub mod ai_keywords {
    pub const COMPANIES: &[&str] = &[
        "OpenAI", "Anthropic", "Claude", "DeepMind", "Google AI", "Meta AI", "Mistral", "Cohere",
        "Perplexity", "xAI",
    ];
    pub const MODELS: &[&str] = &[
        "GPT-4o", "GPT-5", "Claude 4", "Gemini", "Llama 3", "Mistral Large", "DALL-E", "Sora",
        "Midjourney", "Stable Diffusion",
    ];
    pub const DEV_TOOLS: &[&str] = &[
        "Claude Code", "Claude Cowork", "Cursor", "GitHub Copilot", "Windsurf", "v0",
        "Replit Agent", "Devin", "LangChain", "LlamaIndex",
    ];
    pub const TECHNOLOGIES: &[&str] = &[
        "AI agent", "LLM", "RAG", "fine-tuning", "multimodal", "AGI", "AI safety", "RLHF", "MoE",
        "context window",
    ];
    pub const BREAKING_NEWS: &[&str] = &[
        "Anthropic launches", "OpenAI announces", "Google AI releases", "new AI tool",
        "AI product launch", "just released", "now available",
    ];
}

const SOCIAL_SITE_FILTER: &str = "site:x.com OR site:twitter.com";

/// One search dimension of the social feed.
#[derive(Debug, Clone, Copy)]
pub struct Dimension {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
}

/// Dimensions in priority order; breaking news first.
pub fn twitter_dimensions() -> [Dimension; 5] {
    [
        Dimension {
            name: "AI突发新闻",
            keywords: ai_keywords::BREAKING_NEWS,
        },
        Dimension {
            name: "AI公司动态",
            keywords: &ai_keywords::COMPANIES[..5],
        },
        Dimension {
            name: "AI模型产品",
            keywords: &ai_keywords::MODELS[..5],
        },
        Dimension {
            name: "AI开发工具",
            keywords: &ai_keywords::DEV_TOOLS[..6],
        },
        Dimension {
            name: "AI技术趋势",
            keywords: &ai_keywords::TECHNOLOGIES[..5],
        },
    ]
}

pub fn hacker_news_query() -> String {
    "Hacker News top stories today site:news.ycombinator.com OR site:hntoplinks.com".to_string()
}

pub fn product_hunt_query(date: NaiveDate) -> String {
    format!("Product Hunt top products {} site:producthunt.com", date_short(date))
}

pub fn github_trending_query(date: NaiveDate) -> String {
    format!("GitHub trending repositories today {} site:github.com/trending", date_short(date))
}

pub fn reddit_query(date: NaiveDate) -> String {
    format!(
        "hot discussions {} r/MachineLearning OR r/LocalLLaMA OR r/programming site:reddit.com",
        date.year()
    )
}

/// `(<kw> OR <kw> ...) latest news <year> site:x.com OR site:twitter.com`
pub fn dimension_query(dimension: &Dimension, year: i32) -> String {
    format!(
        "({}) latest news {year} {SOCIAL_SITE_FILTER}",
        dimension.keywords.join(" OR ")
    )
}

fn placeholder(name: &str) -> String {
    format!("（未获取到{name}数据）")
}

/// Run one search; failures become an empty string after a warning.
async fn search_or_empty<S>(searcher: &S, name: &str, query: &str) -> String
where
    S: AskAsync<Response = String>,
{
    info!(source = name, query = %crate::utils::truncate_for_log(query, 80), "Searching");
    match searcher.ask(query).await {
        Ok(text) => text,
        Err(e) => {
            warn!(source = name, error = %e, "Search failed; continuing without this source");
            String::new()
        }
    }
}

async fn single_source<S>(searcher: &S, name: &str, query: &str) -> SourceSnapshot
where
    S: AskAsync<Response = String>,
{
    let text = search_or_empty(searcher, name, query).await;
    SourceSnapshot {
        name: name.to_string(),
        raw_text: if text.trim().is_empty() { placeholder(name) } else { text },
    }
}

/// AI Twitter: one search per dimension, joined as `### <dimension>` sections.
#[instrument(level = "info", skip_all)]
pub async fn fetch_ai_twitter<S>(searcher: &S, year: i32) -> SourceSnapshot
where
    S: AskAsync<Response = String>,
{
    let sections: Vec<String> = stream::iter(twitter_dimensions())
        .then(|dimension| async move {
            let query = dimension_query(&dimension, year);
            let text = search_or_empty(searcher, dimension.name, &query).await;
            (!text.trim().is_empty()).then(|| format!("### {}\n{}", dimension.name, text))
        })
        .filter_map(std::future::ready)
        .collect()
        .await;

    let raw_text = if sections.is_empty() {
        placeholder("AI Twitter")
    } else {
        sections.join("\n\n")
    };
    SourceSnapshot {
        name: "AI Twitter".to_string(),
        raw_text,
    }
}

/// Fetch every source for `date`, one after another.
#[instrument(level = "info", skip_all, fields(%date))]
pub async fn fetch_all<S>(searcher: &S, date: NaiveDate) -> Vec<SourceSnapshot>
where
    S: AskAsync<Response = String>,
{
    let mut snapshots = Vec::with_capacity(5);
    snapshots.push(single_source(searcher, "Hacker News", &hacker_news_query()).await);
    snapshots.push(single_source(searcher, "Product Hunt", &product_hunt_query(date)).await);
    snapshots.push(fetch_ai_twitter(searcher, date.year()).await);
    snapshots.push(single_source(searcher, "GitHub Trending", &github_trending_query(date)).await);
    snapshots.push(single_source(searcher, "Reddit", &reddit_query(date)).await);

    let total_chars: usize = snapshots.iter().map(|s| s.raw_text.chars().count()).sum();
    info!(sources = snapshots.len(), total_chars, "Fetched all sources");
    snapshots
}
