//! Turns raw feed entries into [`NewsItem`]s: markup stripping, length caps,
//! image selection and read-time estimates.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::catalog::FeedSource;
use crate::model::{MediaType, NewsItem, RawItem};

pub const DESCRIPTION_MAX_CHARS: usize = 200;
pub const CONTENT_MAX_CHARS: usize = 500;
pub const WORDS_PER_MINUTE: usize = 200;

const ELLIPSIS: &str = "...";

static RE_SCRIPT_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>").expect("valid regex")
});
static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static RE_IMG_SRC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<img[^>]+src=["']([^"'>]+)["']"#).expect("valid regex")
});

/// Strip markup and collapse whitespace. Link text survives, hrefs and images do not.
pub fn clean_text(html: &str) -> String {
    let out = RE_SCRIPT_STYLE.replace_all(html, " ");
    let out = RE_TAGS.replace_all(&out, " ");
    let out = html_escape::decode_html_entities(&out);
    RE_WS.replace_all(&out, " ").trim().to_string()
}

/// Cap `text` at `max_chars` characters, appending an ellipsis when cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str(ELLIPSIS);
    out
}

pub fn clean_and_truncate(html: Option<&str>, max_chars: usize) -> String {
    match html {
        Some(html) => truncate(&clean_text(html), max_chars),
        None => String::new(),
    }
}

/// First `<img src=...>` in an HTML fragment.
pub fn extract_inline_image(html: &str) -> Option<String> {
    RE_IMG_SRC
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Media attachment, then enclosure, then the first inline image.
pub fn select_image(raw: &RawItem) -> Option<String> {
    raw.media_url
        .clone()
        .or_else(|| raw.enclosure_url.clone())
        .or_else(|| {
            raw.content
                .as_deref()
                .or(raw.snippet.as_deref())
                .and_then(extract_inline_image)
        })
}

/// "<N> min" at 200 words per minute, rounded up, never below one minute.
pub fn estimate_read_time(text: &str) -> String {
    let words = text.split_whitespace().count();
    let minutes = words.div_ceil(WORDS_PER_MINUTE).max(1);
    format!("{} min", minutes)
}

/// Build a [`NewsItem`] from a raw entry. Returns `None` when the entry has
/// neither a guid nor a link to identify it by.
pub fn normalize(raw: &RawItem, source: &FeedSource) -> Option<NewsItem> {
    let link = raw.link.clone().filter(|l| !l.trim().is_empty());
    let id = raw
        .guid
        .clone()
        .filter(|g| !g.trim().is_empty())
        .or_else(|| link.clone())?;

    let snippet = raw.snippet.as_deref();
    let full = raw.content.as_deref();

    let description = clean_and_truncate(snippet.or(full), DESCRIPTION_MAX_CHARS);
    let content = clean_and_truncate(full.or(snippet), CONTENT_MAX_CHARS);
    let read_time = estimate_read_time(&full.or(snippet).map(clean_text).unwrap_or_default());

    Some(NewsItem {
        id,
        title: raw.title.clone().unwrap_or_else(|| "Untitled".to_string()),
        description,
        content,
        media_url: select_image(raw),
        source_url: link.unwrap_or_default(),
        source_name: source.name.clone(),
        media_type: MediaType::Article,
        date_published: raw.published.or(raw.updated),
        estimated_read_time: read_time,
        relevance_score: 0.0,
        matched_interests: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn test_source() -> FeedSource {
        FeedSource {
            name: "MarketWatch".to_string(),
            url: "https://feeds.marketwatch.com/rss".to_string(),
            category: "finance".to_string(),
        }
    }

    mod clean_text_tests {
        use super::*;

        #[test]
        fn test_strips_tags_and_collapses_whitespace() {
            let html = "<p>Stocks   <b>rally</b></p>\n\n<p>again</p>";
            assert_eq!(clean_text(html), "Stocks rally again");
        }

        #[test]
        fn test_keeps_anchor_text_drops_href_and_images() {
            let html = r#"Read <a href="https://x.com/y">the report</a> <img src="https://x.com/a.png"/>now"#;
            assert_eq!(clean_text(html), "Read the report now");
        }

        #[test]
        fn test_decodes_entities() {
            assert_eq!(clean_text("S&amp;P 500 &gt; 5000"), "S&P 500 > 5000");
        }

        #[test]
        fn test_drops_script_and_style() {
            let html = "<style>p{color:red}</style>Text<script>alert(1)</script>";
            assert_eq!(clean_text(html), "Text");
        }

        #[test]
        fn test_empty_input() {
            assert_eq!(clean_text(""), "");
        }
    }

    mod truncate_tests {
        use super::*;

        #[test]
        fn test_short_text_untouched() {
            assert_eq!(truncate("short", 200), "short");
        }

        #[test]
        fn test_long_text_gets_ellipsis() {
            let text = "a".repeat(250);
            let out = truncate(&text, DESCRIPTION_MAX_CHARS);
            assert_eq!(out.chars().count(), 203);
            assert!(out.ends_with("..."));
        }

        #[test]
        fn test_exact_length_not_truncated() {
            let text = "b".repeat(500);
            assert_eq!(truncate(&text, CONTENT_MAX_CHARS), text);
        }

        #[test]
        fn test_multibyte_boundary() {
            let text = "é".repeat(10);
            assert_eq!(truncate(&text, 3), "ééé...");
        }
    }

    mod image_tests {
        use super::*;

        #[test]
        fn test_media_attachment_wins() {
            let raw = RawItem {
                media_url: Some("https://cdn.com/media.jpg".to_string()),
                enclosure_url: Some("https://cdn.com/enclosure.jpg".to_string()),
                content: Some(r#"<img src="https://cdn.com/inline.jpg">"#.to_string()),
                ..Default::default()
            };
            assert_eq!(select_image(&raw).as_deref(), Some("https://cdn.com/media.jpg"));
        }

        #[test]
        fn test_enclosure_before_inline() {
            let raw = RawItem {
                enclosure_url: Some("https://cdn.com/enclosure.jpg".to_string()),
                content: Some(r#"<img src="https://cdn.com/inline.jpg">"#.to_string()),
                ..Default::default()
            };
            assert_eq!(
                select_image(&raw).as_deref(),
                Some("https://cdn.com/enclosure.jpg")
            );
        }

        #[test]
        fn test_inline_image_from_content() {
            let raw = RawItem {
                content: Some(
                    r#"<p>Intro</p><img class="hero" src="https://cdn.com/inline.jpg" alt="">"#
                        .to_string(),
                ),
                ..Default::default()
            };
            assert_eq!(select_image(&raw).as_deref(), Some("https://cdn.com/inline.jpg"));
        }

        #[test]
        fn test_no_image() {
            let raw = RawItem {
                content: Some("<p>No pictures here</p>".to_string()),
                ..Default::default()
            };
            assert_eq!(select_image(&raw), None);
        }
    }

    mod read_time_tests {
        use super::*;

        #[test]
        fn test_empty_is_one_minute() {
            assert_eq!(estimate_read_time(""), "1 min");
        }

        #[test]
        fn test_rounds_up() {
            let text = vec!["word"; 201].join(" ");
            assert_eq!(estimate_read_time(&text), "2 min");
        }

        #[test]
        fn test_exact_multiple() {
            let text = vec!["word"; 400].join(" ");
            assert_eq!(estimate_read_time(&text), "2 min");
        }

        #[test]
        fn test_few_words() {
            assert_eq!(estimate_read_time("just a few words"), "1 min");
        }
    }

    mod normalize_tests {
        use super::*;

        #[test]
        fn test_guid_preferred_over_link() {
            let raw = RawItem {
                guid: Some("urn:guid:42".to_string()),
                link: Some("https://example.com/42".to_string()),
                title: Some("Fed holds rates".to_string()),
                ..Default::default()
            };
            let item = normalize(&raw, &test_source()).unwrap();
            assert_eq!(item.id, "urn:guid:42");
            assert_eq!(item.source_url, "https://example.com/42");
            assert_eq!(item.source_name, "MarketWatch");
            assert_eq!(item.media_type, MediaType::Article);
        }

        #[test]
        fn test_link_fallback_for_id() {
            let raw = RawItem {
                guid: Some("  ".to_string()),
                link: Some("https://example.com/43".to_string()),
                ..Default::default()
            };
            let item = normalize(&raw, &test_source()).unwrap();
            assert_eq!(item.id, "https://example.com/43");
            assert_eq!(item.title, "Untitled");
        }

        #[test]
        fn test_unidentifiable_entry_skipped() {
            let raw = RawItem {
                title: Some("Orphan".to_string()),
                ..Default::default()
            };
            assert!(normalize(&raw, &test_source()).is_none());
        }

        #[test]
        fn test_description_and_content_fallbacks() {
            let long_body = format!("<p>{}</p>", "word ".repeat(300));
            let raw = RawItem {
                link: Some("https://example.com/44".to_string()),
                content: Some(long_body),
                ..Default::default()
            };
            let item = normalize(&raw, &test_source()).unwrap();
            assert!(item.description.ends_with("..."));
            assert_eq!(item.description.chars().count(), DESCRIPTION_MAX_CHARS + 3);
            assert_eq!(item.content.chars().count(), CONTENT_MAX_CHARS + 3);
            assert_eq!(item.estimated_read_time, "2 min");
        }

        #[test]
        fn test_published_preferred_over_updated() {
            let published = Utc.with_ymd_and_hms(2024, 12, 9, 12, 0, 0).unwrap();
            let updated = Utc.with_ymd_and_hms(2024, 12, 10, 12, 0, 0).unwrap();
            let raw = RawItem {
                link: Some("https://example.com/45".to_string()),
                published: Some(published),
                updated: Some(updated),
                ..Default::default()
            };
            let item = normalize(&raw, &test_source()).unwrap();
            assert_eq!(item.date_published, Some(published));

            let raw = RawItem {
                published: None,
                ..raw
            };
            let item = normalize(&raw, &test_source()).unwrap();
            assert_eq!(item.date_published, Some(updated));
        }
    }
}
