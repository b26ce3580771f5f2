//! Recent-digest context used to keep the composer off yesterday's topics.
//!
//! For each of the previous N days the persisted markdown
//! (`tech_digest_<date>.md`) is scanned for its title line, the 今日头条
//! headline and the trend-radar items. Absence of history is never an error.

use crate::outputs::markdown_path;
use crate::utils::date_short;
use chrono::{Duration, NaiveDate};
use itertools::Itertools;
use std::fmt::Write;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Label that introduces the day's headline.
pub const HEADLINE_LABEL: &str = "今日头条";

/// Glyphs that start a trend-radar entry.
pub const RADAR_MARKERS: [&str; 3] = ["🔥", "\u{26a0}", "💀"];

const MAX_RADAR_PER_DAY: usize = 3;

/// What one earlier digest covered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub title: Option<String>,
    pub headline: Option<String>,
    pub radar: Vec<String>,
}

impl HistoryEntry {
    fn is_empty(&self) -> bool {
        self.title.is_none() && self.headline.is_none() && self.radar.is_empty()
    }
}

/// Strip heading, list, quote and emphasis markers around a markdown line.
pub(crate) fn clean_line(line: &str) -> &str {
    line.trim()
        .trim_start_matches(['#', '>', '-', '*', ' '])
        .trim_end_matches(['*', ' '])
        .trim()
}

/// Text after a `label：` / `label:` prefix, if the cleaned line starts with `label`.
fn after_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let rest = clean_line(line).strip_prefix(label)?;
    let rest = rest.trim_start_matches(['*', ' ']);
    let rest = rest
        .strip_prefix('：')
        .or_else(|| rest.strip_prefix(':'))
        .unwrap_or(rest);
    Some(rest.trim_matches(['*', ' ']))
}

/// The headline: text after the label on the same line, or the next non-blank line.
pub fn extract_headline(markdown: &str) -> Option<String> {
    let mut lines = markdown.lines();
    while let Some(line) = lines.next() {
        if let Some(rest) = after_label(line, HEADLINE_LABEL) {
            if !rest.is_empty() {
                return Some(rest.to_string());
            }
            return lines
                .map(clean_line)
                .find(|l| !l.is_empty())
                .map(str::to_string);
        }
    }
    None
}

/// First `# ` heading of the document.
pub fn extract_title(markdown: &str) -> Option<String> {
    markdown
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("# "))
        .map(|l| l.trim_start_matches('#').trim().to_string())
        .filter(|l| !l.is_empty())
}

/// Trend-radar lines, marker included, deduplicated in document order.
pub fn extract_radar(markdown: &str) -> Vec<String> {
    markdown
        .lines()
        .map(clean_line)
        .filter(|l| RADAR_MARKERS.iter().any(|m| l.starts_with(m)))
        .map(|l| l.replace("**", ""))
        .unique()
        .take(MAX_RADAR_PER_DAY)
        .collect()
}

pub fn parse_entry(date: NaiveDate, markdown: &str) -> HistoryEntry {
    HistoryEntry {
        date,
        title: extract_title(markdown),
        headline: extract_headline(markdown),
        radar: extract_radar(markdown),
    }
}

/// Read up to `days` earlier digests from `output_dir`, most recent first.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display(), %today, days))]
pub async fn load_history(output_dir: &Path, today: NaiveDate, days: u32) -> Vec<HistoryEntry> {
    let mut entries = Vec::new();
    for offset in 1..=i64::from(days) {
        let date = today - Duration::days(offset);
        let path = markdown_path(output_dir, date);
        match tokio::fs::read_to_string(&path).await {
            Ok(markdown) => {
                let entry = parse_entry(date, &markdown);
                if entry.is_empty() {
                    debug!(path = %path.display(), "Digest has no recognizable sections");
                } else {
                    entries.push(entry);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No digest for this day");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read earlier digest; skipping");
            }
        }
    }
    info!(found = entries.len(), "Loaded digest history");
    entries
}

/// Render entries as the advisory block appended to the compose prompt.
///
/// Returns an empty string when there is nothing to report.
pub fn render_history_context(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return String::new();
    }
    let mut out = String::from("## 近期已报道（避免与以下内容重复，尤其不要再用作今日头条）\n");
    for entry in entries {
        let mut parts = Vec::new();
        if let Some(title) = &entry.title {
            parts.push(format!("标题：{title}"));
        }
        if let Some(headline) = &entry.headline {
            parts.push(format!("头条：{headline}"));
        }
        if !entry.radar.is_empty() {
            parts.push(format!("雷达：{}", entry.radar.join(" / ")));
        }
        writeln!(out, "- {}：{}", date_short(entry.date), parts.join("；")).ok();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# Tech老兵日记 | 2026-01-15：Claude泄密、Rust进内核\n\n\
开篇几句话。\n\n\
## 今日头条：Anthropic 发布新模型\n\n正文……\n\n\
## 硅谷雷达：本周值得关注\n\n\
### 🔥 **AI Agent 工程化**\n内容\n\
### ⚠️ 端侧大模型\n内容\n\
### 💀 Web3 回潮\n内容\n\
- 🔥 多余的第四条\n";

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    #[test]
    fn extracts_title_headline_and_radar() {
        let entry = parse_entry(day(15), SAMPLE);
        assert_eq!(
            entry.title.as_deref(),
            Some("Tech老兵日记 | 2026-01-15：Claude泄密、Rust进内核")
        );
        assert_eq!(entry.headline.as_deref(), Some("Anthropic 发布新模型"));
        assert_eq!(
            entry.radar,
            vec!["🔥 AI Agent 工程化", "⚠️ 端侧大模型", "💀 Web3 回潮"]
        );
    }

    #[test]
    fn headline_on_following_line() {
        let md = "## **今日头条**\n\n**GitHub Actions 大规模故障**\n";
        assert_eq!(
            extract_headline(md).as_deref(),
            Some("GitHub Actions 大规模故障")
        );
    }

    #[test]
    fn missing_sections_are_none() {
        let entry = parse_entry(day(15), "just some text\nwithout structure");
        assert_eq!(entry.title, None);
        assert_eq!(entry.headline, None);
        assert!(entry.radar.is_empty());
    }

    #[tokio::test]
    async fn load_history_skips_missing_days() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(markdown_path(dir.path(), day(15)), SAMPLE).unwrap();
        std::fs::write(markdown_path(dir.path(), day(13)), "## 今日头条：旧闻\n").unwrap();
        // today's file must not be read as history
        std::fs::write(markdown_path(dir.path(), day(16)), "## 今日头条：今天\n").unwrap();

        let entries = load_history(dir.path(), day(16), 7).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].date, day(15));
        assert_eq!(entries[1].headline.as_deref(), Some("旧闻"));
    }

    #[tokio::test]
    async fn load_history_respects_window() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(markdown_path(dir.path(), day(5)), SAMPLE).unwrap();
        assert!(load_history(dir.path(), day(16), 7).await.is_empty());
    }

    #[tokio::test]
    async fn load_history_without_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(load_history(&missing, day(16), 3).await.is_empty());
    }

    #[test]
    fn context_rendering() {
        assert_eq!(render_history_context(&[]), "");
        let entry = parse_entry(day(15), SAMPLE);
        let block = render_history_context(&[entry]);
        assert!(block.starts_with("## 近期已报道"));
        assert!(block.contains("- 2026-01-15："));
        assert!(block.contains("头条：Anthropic 发布新模型"));
        assert!(block.contains("雷达：🔥 AI Agent 工程化 / ⚠️ 端侧大模型 / 💀 Web3 回潮"));
    }
}
