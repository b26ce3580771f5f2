//! Command-line interface definitions for both binaries.
//!
//! Credentials are never taken from flags; they come from the environment
//! (or a `.env` file) through [`crate::config::Config::load`].

use crate::schedule::parse_run_time;
use chrono::NaiveTime;
use clap::Parser;
use std::path::PathBuf;

/// Generate the daily tech digest and publish it to WeChat.
///
/// # Examples
///
/// ```sh
/// # Generate and publish once
/// tech_digest
///
/// # Generate only, print the file paths
/// tech_digest --test
///
/// # Run every day at 07:30 local time
/// tech_digest --schedule --time 07:30
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a config.yaml file
    #[arg(short, long, env = "TECH_DIGEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output directory for the digest files (overrides the config file)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Keep running and generate once a day
    #[arg(long)]
    pub schedule: bool,

    /// Daily run time for --schedule, HH:MM local time
    #[arg(long, default_value = "08:00", value_parser = parse_run_time, requires = "schedule")]
    pub time: NaiveTime,

    /// Generate only; skip publishing and print the output paths
    #[arg(long, conflicts_with = "schedule")]
    pub test: bool,
}

/// Publish a hand-written HTML article directory to WeChat.
///
/// The directory holds one `*.html` file, a `cover.png`/`cover.jpg` and any
/// images the HTML references by file name.
#[derive(Parser, Debug)]
#[command(name = "publish_article", author, version, about)]
pub struct ArticleCli {
    /// Article directory
    pub dir: PathBuf,

    /// Optional path to a config.yaml file
    #[arg(short, long, env = "TECH_DIGEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Draft author (defaults to wechat.author from the config)
    #[arg(short, long)]
    pub author: Option<String>,
}
