//! `tech_digest`: generate the daily digest and publish it.
//!
//! ```sh
//! tech_digest                          # once, publish
//! tech_digest --test                   # once, files only
//! tech_digest --schedule --time 08:00  # every day
//! ```
//!
//! Credentials come from `ANTHROPIC_API_KEY`, `WECHAT_APP_ID` and
//! `WECHAT_APP_SECRET` (a `.env` file in the working directory is read too).

use chrono::Local;
use clap::Parser;
use std::error::Error;
use tech_digest::cli::Cli;
use tech_digest::config::Config;
use tech_digest::pipeline::{RunMode, RunReport, run_once};
use tech_digest::schedule::run_daily;
use tech_digest::utils::ensure_writable_dir;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

fn print_report(report: &RunReport) {
    println!("Markdown: {}", report.digest.paths.markdown.display());
    match &report.digest.paths.html {
        Some(path) => println!("HTML:     {}", path.display()),
        None => println!("HTML:     (not written; markup failed validation)"),
    }
    if let Some(record) = &report.record {
        println!("Status:   {}", record.status);
        println!("Draft:    {}", record.draft_media_id);
    }
}

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

    info!("tech_digest starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.output_dir, schedule = args.schedule, test = args.test, "Parsed CLI arguments");

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(dir) = args.output_dir {
        config.digest.output_dir = dir;
    }
    info!(
        output_dir = %config.digest.output_dir.display(),
        model = %config.llm.model,
        two_stage = config.digest.two_stage,
        "Configuration loaded"
    );

    // Early check: fail before any LLM call if the output dir is unusable
    if let Err(e) = ensure_writable_dir(&config.digest.output_dir).await {
        error!(
            path = %config.digest.output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }
    config.llm.api_key()?;

    if args.schedule {
        let config = &config;
        run_daily(args.time, || async move {
            let today = Local::now().date_naive();
            match run_once(config, today, RunMode::Publish).await {
                Ok(report) => info!(
                    markdown = %report.digest.paths.markdown.display(),
                    published = report.record.is_some(),
                    "Scheduled run succeeded"
                ),
                Err(e) => error!(error = %e, details = ?e, "Scheduled run failed; will retry tomorrow"),
            }
        })
        .await;
        return Ok(());
    }

    let mode = if args.test { RunMode::GenerateOnly } else { RunMode::Publish };
    let today = Local::now().date_naive();
    match run_once(&config, today, mode).await {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, details = ?e, "Run failed");
            Err(e.into())
        }
    }
}
