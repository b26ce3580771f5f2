//! # Tech Digest
//!
//! A daily tech digest generator that gathers the day's tech news through an
//! LLM web-search tool, has the LLM write the digest as markdown and as
//! WeChat-styled HTML, and publishes it to a WeChat Official Account.
//!
//! ## Features
//!
//! - Searches Hacker News, Product Hunt, AI Twitter, GitHub Trending and
//!   Reddit through the Anthropic `web_search` tool
//! - Avoids repeating recent headlines by reading the last week of digests back
//! - Regenerates until the HTML is usable, then normalizes it for the WeChat editor
//! - Renders a 900×383 cover with the day's keywords
//! - Uploads, drafts and submits; accounts without publish rights keep the draft
//! - A second binary publishes any hand-written HTML article directory
//!
//! ## Usage
//!
//! ```sh
//! tech_digest                          # run once and publish
//! tech_digest --test                   # generate only
//! tech_digest --schedule --time 08:00  # daily
//! publish_article ./my-article
//! ```
//!
//! ## Architecture
//!
//! The digest follows a pipeline architecture (see [`pipeline`]):
//! 1. **Fetching**: one web search per source, sequentially
//! 2. **Composing**: history-aware prompt, bounded regeneration
//! 3. **Normalizing**: ordered regex rewrites of the HTML
//! 4. **Output**: date-keyed markdown and HTML files
//! 5. **Publishing**: cover, upload, draft, submit

pub mod api;
pub mod article;
pub mod cli;
pub mod compose;
pub mod config;
pub mod cover;
pub mod error;
pub mod history;
pub mod keywords;
pub mod models;
pub mod normalize;
pub mod outputs;
pub mod pipeline;
pub mod prompt;
pub mod publisher;
pub mod schedule;
pub mod sources;
pub mod utils;

pub use config::Config;
pub use error::{DigestError, Result};
