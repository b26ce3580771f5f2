//! Cover tags extracted from the composed markdown.
//!
//! A best-effort parser with three tiers, applied in order:
//!
//! 1. phrases from the title line `<prefix> | <date>：<a>、<b>、<c>`
//! 2. the 今日头条 headline, only when tier 1 found nothing
//! 3. well-known brand names found anywhere in the document
//!
//! The result never exceeds [`MAX_KEYWORDS`] entries and keeps tier order.

use crate::history::extract_headline;
use crate::utils::take_chars;

pub const MAX_KEYWORDS: usize = 4;
const MAX_TITLE_PHRASES: usize = 3;
const MAX_KEYWORD_CHARS: usize = 15;

/// Names scanned in tier 3, in the order they are appended.
pub const BRAND_ALLOW_LIST: &[&str] = &[
    "OpenAI", "Anthropic", "Claude", "GPT", "Gemini", "DeepSeek", "Llama", "Mistral", "Cursor",
    "Copilot", "GitHub", "Google", "Meta", "Microsoft", "Apple", "NVIDIA", "Rust", "Python",
];

const PHRASE_SEPARATORS: &[char] = &[',', '，', '、', '|', '｜', ';', '；'];

/// Length ignoring whitespace, so `GitHub Actions被骂` counts 15.
fn visible_len(s: &str) -> usize {
    s.chars().filter(|c| !c.is_whitespace()).count()
}

/// Tier 1: up to three short phrases from the title line.
pub fn title_phrases(markdown: &str) -> Vec<String> {
    let Some(line) = markdown.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return Vec::new();
    };
    let line = line.trim_start_matches('#').trim();
    let Some((_, after_prefix)) = line.split_once(['|', '｜']) else {
        return Vec::new();
    };
    let Some((_, phrases)) = after_prefix.split_once(['：', ':']) else {
        return Vec::new();
    };
    phrases
        .split(PHRASE_SEPARATORS)
        .map(|p| p.trim().trim_matches('*').trim())
        .filter(|p| !p.is_empty() && visible_len(p) <= MAX_KEYWORD_CHARS)
        .take(MAX_TITLE_PHRASES)
        .map(str::to_string)
        .collect()
}

/// Tier 2: the headline, cut to fifteen characters.
pub fn headline_keyword(markdown: &str) -> Option<String> {
    extract_headline(markdown)
        .map(|h| take_chars(&h, MAX_KEYWORD_CHARS).trim().to_string())
        .filter(|h| !h.is_empty())
}

/// Run all three tiers.
pub fn extract_keywords(markdown: &str) -> Vec<String> {
    let mut keywords = title_phrases(markdown);
    if keywords.is_empty() {
        keywords.extend(headline_keyword(markdown));
    }

    let document = markdown.to_lowercase();
    for brand in BRAND_ALLOW_LIST {
        if keywords.len() >= MAX_KEYWORDS {
            break;
        }
        let needle = brand.to_lowercase();
        let already_covered = keywords.iter().any(|k| k.to_lowercase().contains(&needle));
        if document.contains(&needle) && !already_covered {
            keywords.push(brand.to_string());
        }
    }
    keywords.truncate(MAX_KEYWORDS);
    keywords
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_line_phrases_in_order() {
        let md = "前缀 | 2026-01-16：Claude泄密、GitHub Actions被骂";
        assert_eq!(extract_keywords(md), vec!["Claude泄密", "GitHub Actions被骂"]);
    }

    #[test]
    fn markdown_heading_title_line() {
        let md = "# Tech老兵日记 | 2026-01-16: Rust进内核, 苹果AI掉队 | 英伟达财报\n\n正文";
        assert_eq!(title_phrases(md), vec!["Rust进内核", "苹果AI掉队", "英伟达财报"]);
    }

    #[test]
    fn overlong_phrases_are_skipped_and_capped_at_three() {
        let md = "日报 | 2026-01-16：这是一个非常非常非常非常长的短语超过十五个字、A、B、C、D";
        assert_eq!(title_phrases(md), vec!["A", "B", "C"]);
    }

    #[test]
    fn headline_fallback_is_truncated() {
        let md = "没有标题行\n\n## 今日头条：Anthropic 发布了一个全新的编程智能体平台\n";
        let keywords = extract_keywords(md);
        assert_eq!(keywords[0], "Anthropic 发布了一个");
        assert!(keywords[0].chars().count() <= 15);
        // Anthropic is already covered by the headline keyword
        assert_eq!(keywords.len(), 1);
    }

    #[test]
    fn brand_scan_follows_allow_list_order() {
        let md = "今天聊聊 Claude 的新功能，以及 OpenAI 的回应。";
        assert_eq!(extract_keywords(md), vec!["OpenAI", "Claude"]);
    }

    #[test]
    fn never_more_than_four() {
        let md = "日报 | 2026-01-16：甲、乙、丙\nOpenAI Anthropic Gemini Cursor";
        let keywords = extract_keywords(md);
        assert_eq!(keywords, vec!["甲", "乙", "丙", "OpenAI"]);
    }

    #[test]
    fn empty_document_yields_nothing() {
        assert!(extract_keywords("").is_empty());
    }
}
