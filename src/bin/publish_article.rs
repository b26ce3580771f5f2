//! `publish_article`: upload a hand-written HTML article directory to WeChat.
//!
//! ```sh
//! publish_article ./article-folder --author Alex
//! ```

use clap::Parser;
use std::error::Error;
use tech_digest::article::publish_article;
use tech_digest::cli::ArticleCli;
use tech_digest::config::Config;
use tech_digest::models::PublishStatus;
use tech_digest::publisher::WeChatPublisher;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = ArticleCli::parse();
    debug!(dir = %args.dir.display(), ?args.author, "Parsed CLI arguments");

    let config = Config::load(args.config.as_deref())?;
    let author = args.author.unwrap_or_else(|| config.wechat.author.clone());
    let publisher = WeChatPublisher::new(&config.wechat)?;

    let report = match publish_article(&args.dir, &publisher, &author).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, details = ?e, "Article publishing failed");
            return Err(e.into());
        }
    };
    info!(title = %report.title, status = %report.record.status, "Article processed");

    let images = if report.content_images.is_empty() {
        "-".to_string()
    } else {
        report.content_images.join(", ")
    };
    println!("Title:          {}", report.title);
    println!("HTML file:      {}", report.html_file);
    println!("Cover image:    {}", report.cover_image);
    println!("Content images: {images}");
    println!("Draft:          {}", report.record.draft_media_id);
    println!("Status:         {}", report.record.status);
    if report.record.status == PublishStatus::DraftCreated {
        println!("Note: log in to the WeChat platform to publish the draft manually.");
    }
    Ok(())
}
