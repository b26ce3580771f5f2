//! Publishing a hand-written HTML article directory.
//!
//! ```text
//! article-folder/
//! ├── post.html      # first *.html in name order
//! ├── cover.png      # required; stem `cover` in any case (png, jpg, jpeg, gif)
//! └── diagram.png    # optional body images, uploaded and re-pointed
//! ```

use crate::error::{DigestError, Result};
use crate::models::{ArticleReport, PublishRecord};
use crate::normalize::normalize;
use crate::publisher::{DraftArticle, WeChatPublisher};
use crate::utils::take_chars;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

pub const DEFAULT_TITLE: &str = "微信公众号文章";
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];
const COVER_STEM: &str = "cover";
const MAX_DIGEST_CHARS: usize = 100;

static BODY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<body[^>]*>(.*?)</body>").unwrap());

/// Images found next to the article.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleImages {
    pub cover: Option<PathBuf>,
    /// Body images in name order; only the cover itself is excluded.
    pub content: Vec<PathBuf>,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| allowed.iter().any(|a| a.eq_ignore_ascii_case(e)))
}

/// Regular files in `dir`, sorted by name.
fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// First `*.html` file in name order.
pub fn find_html(dir: &Path) -> Result<PathBuf> {
    sorted_files(dir)?
        .into_iter()
        .find(|p| has_extension(p, &["html"]))
        .ok_or_else(|| DigestError::Article(format!("no HTML file in {}", dir.display())))
}

pub fn find_images(dir: &Path) -> Result<ArticleImages> {
    let mut images = ArticleImages::default();
    for path in sorted_files(dir)? {
        if !has_extension(&path, IMAGE_EXTENSIONS) {
            continue;
        }
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if stem.eq_ignore_ascii_case(COVER_STEM) && images.cover.is_none() {
            images.cover = Some(path);
        } else {
            images.content.push(path);
        }
    }
    Ok(images)
}

/// `<title>`, else the text of the first `<h1>`, else [`DEFAULT_TITLE`].
pub fn extract_title(html: &str) -> String {
    let document = Html::parse_document(html);
    for selector in ["title", "h1"] {
        let Ok(selector) = Selector::parse(selector) else { continue };
        if let Some(element) = document.select(&selector).next() {
            let text = element.text().collect::<String>();
            let text = text.trim();
            if !text.is_empty() {
                return text.to_string();
            }
        }
    }
    DEFAULT_TITLE.to_string()
}

/// Inner content of `<body>`, or the whole document when there is none.
pub fn extract_body(html: &str) -> String {
    BODY.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| html.to_string())
}

/// Point `src="name"` and `src='name'` at `url`.
pub fn replace_image_src(html: &str, name: &str, url: &str) -> String {
    let replacement = format!("src=\"{url}\"");
    html.replace(&format!("src=\"{name}\""), &replacement)
        .replace(&format!("src='{name}'"), &replacement)
}

/// Upload, normalize, draft and submit the article found in `dir`.
///
/// A failing body image upload leaves that reference untouched. Unlike the
/// digest flow, any submit error here only downgrades the result to a draft.
#[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub async fn publish_article(dir: &Path, publisher: &WeChatPublisher, author: &str) -> Result<ArticleReport> {
    if !dir.is_dir() {
        return Err(DigestError::Article(format!("not a directory: {}", dir.display())));
    }

    let html_file = find_html(dir)?;
    let html = tokio::fs::read_to_string(&html_file).await?;
    let title = extract_title(&html);
    info!(file = %file_name(&html_file), %title, "Read article");

    let images = find_images(dir)?;
    let cover = images
        .cover
        .ok_or_else(|| DigestError::Article("no cover image (cover.png/jpg) found".to_string()))?;
    info!(
        cover = %file_name(&cover),
        content_images = images.content.len(),
        "Found article images"
    );

    let mut body = extract_body(&html);
    let mut uploaded = Vec::new();
    for image in &images.content {
        let name = file_name(image);
        match publisher.upload_content_image(image).await {
            Ok(url) => {
                body = replace_image_src(&body, &name, &url);
                uploaded.push(name);
            }
            Err(e) => warn!(image = %name, error = %e, "Body image upload failed; keeping local reference"),
        }
    }

    let thumb_media_id = publisher.upload_image(&cover).await?;
    let body = normalize(&body);
    info!(content_chars = body.chars().count(), "Normalized article body");

    let summary = take_chars(&title, MAX_DIGEST_CHARS);
    let draft = DraftArticle::new(&title, author, &summary, &body, &thumb_media_id);
    let draft_media_id = publisher.create_draft(&draft).await?;

    let publish_id = match publisher.publish(&draft_media_id).await {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "Publish submit failed; article stays a draft");
            None
        }
    };

    Ok(ArticleReport {
        title,
        html_file: file_name(&html_file),
        cover_image: file_name(&cover),
        content_images: uploaded,
        record: PublishRecord::new(thumb_media_id, draft_media_id, publish_id),
    })
}
