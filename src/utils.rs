//! Small helpers for date labels, log truncation and output directories.

use chrono::NaiveDate;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// `2026-01-16`, the date key used in file names and prompts.
pub fn date_short(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `2026年01月16日`, the date printed on the cover and in the prompt.
pub fn date_long(date: NaiveDate) -> String {
    date.format("%Y年%m月%d日").to_string()
}

/// `01.16`, used in article titles.
pub fn date_compact(date: NaiveDate) -> String {
    date.format("%m.%d").to_string()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and the number
/// of dropped bytes appended. Cuts land on character boundaries, so CJK text
/// is safe.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// First `max` characters of `s`.
pub fn take_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let result = truncate_for_log("今日头条内容", 2);
        assert_eq!(result, "今日…(+12 bytes)");
    }

    #[test]
    fn test_date_labels() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 16).unwrap();
        assert_eq!(date_short(date), "2026-01-16");
        assert_eq!(date_long(date), "2026年01月16日");
        assert_eq!(date_compact(date), "01.16");
    }

    #[test]
    fn test_take_chars() {
        assert_eq!(take_chars("GitHub Actions被骂了", 15), "GitHub Actions被");
        assert_eq!(take_chars("短", 15), "短");
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert!(!nested.join("..__probe_write__").exists());
    }
}
