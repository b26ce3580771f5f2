//! Data models passed between the pipeline stages.
//!
//! - [`SourceSnapshot`]: raw search text for one source, held for one run
//! - [`DigestDocument`]: the composed digest, persisted per date
//! - [`PublishRecord`] / [`PublishStatus`]: the only caller-visible publish outcome
//! - [`ArticleReport`]: outcome of the standalone article publisher

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Raw text gathered for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSnapshot {
    /// Display name, e.g. `"Hacker News"`.
    pub name: String,
    /// Unstructured search summary returned by the LLM.
    pub raw_text: String,
}

/// One day's composed digest.
#[derive(Debug, Clone)]
pub struct DigestDocument {
    pub date: NaiveDate,
    /// Markdown rendition, always present.
    pub markdown: String,
    /// Normalized HTML, absent when generation fell short.
    pub html: Option<String>,
    /// Up to four tags for the cover image.
    pub keywords: Vec<String>,
}

/// Paths written for one digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestPaths {
    pub markdown: PathBuf,
    /// `None` when no HTML was written.
    pub html: Option<PathBuf>,
}

/// Outcome of the submit-for-publish step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Published,
    DraftCreated,
}

impl PublishStatus {
    /// `Published` exactly when the platform returned a publish id.
    pub fn from_publish_id(publish_id: Option<&str>) -> Self {
        match publish_id {
            Some(_) => Self::Published,
            None => Self::DraftCreated,
        }
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Published => f.write_str("published"),
            Self::DraftCreated => f.write_str("draft_created"),
        }
    }
}

/// Identifiers returned by the three publishing calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRecord {
    pub thumb_media_id: String,
    pub draft_media_id: String,
    pub publish_id: Option<String>,
    pub status: PublishStatus,
}

impl PublishRecord {
    pub fn new(thumb_media_id: String, draft_media_id: String, publish_id: Option<String>) -> Self {
        let status = PublishStatus::from_publish_id(publish_id.as_deref());
        Self {
            thumb_media_id,
            draft_media_id,
            publish_id,
            status,
        }
    }
}

/// Result of publishing a hand-written article directory.
#[derive(Debug, Clone)]
pub struct ArticleReport {
    pub title: String,
    pub html_file: String,
    pub cover_image: String,
    /// File names of the body images that were uploaded and rewritten.
    pub content_images: Vec<String>,
    pub record: PublishRecord,
}
