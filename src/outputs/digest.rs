//! Date-keyed persistence of the composed digest.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── tech_digest_2026-01-15.md
//! ├── tech_digest_2026-01-15.html
//! ├── tech_digest_2026-01-16.md
//! ├── tech_digest_2026-01-16.html
//! └── cover.jpg                    # overwritten every run
//! ```

use crate::error::Result;
use crate::models::{DigestDocument, DigestPaths};
use crate::utils::date_short;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

const FILE_PREFIX: &str = "tech_digest_";
const COVER_FILE: &str = "cover.jpg";

pub fn markdown_path(output_dir: &Path, date: NaiveDate) -> PathBuf {
    output_dir.join(format!("{FILE_PREFIX}{}.md", date_short(date)))
}

pub fn html_path(output_dir: &Path, date: NaiveDate) -> PathBuf {
    output_dir.join(format!("{FILE_PREFIX}{}.html", date_short(date)))
}

pub fn cover_path(output_dir: &Path) -> PathBuf {
    output_dir.join(COVER_FILE)
}

/// Write the markdown and, when present, the HTML rendition.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display(), date = %doc.date))]
pub async fn write_digest(output_dir: &Path, doc: &DigestDocument) -> Result<DigestPaths> {
    fs::create_dir_all(output_dir).await?;

    let markdown = markdown_path(output_dir, doc.date);
    fs::write(&markdown, &doc.markdown).await?;
    info!(path = %markdown.display(), "Wrote markdown digest");

    let html = match &doc.html {
        Some(body) => {
            let path = html_path(output_dir, doc.date);
            fs::write(&path, body).await?;
            info!(path = %path.display(), "Wrote HTML digest");
            Some(path)
        }
        None => None,
    };

    Ok(DigestPaths { markdown, html })
}
