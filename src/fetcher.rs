use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use feed_rs::model::{Entry, FeedType};
use feed_rs::parser::{self, ParseFeedError};
use futures::future::join_all;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::catalog::{FeedSource, SourceCatalog};
use crate::model::{NewsItem, RawItem};
use crate::normalize::normalize;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),
    #[error("malformed feed: {0}")]
    Parse(#[from] ParseFeedError),
}

/// Per-item fields recovered from raw RSS XML that feed-rs does not surface as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemExtras {
    pub guid: Option<String>,
    pub enclosure_url: Option<String>,
}

/// Items of one category plus how many of its sources answered.
#[derive(Debug, Clone, Default)]
pub struct CategoryFetch {
    pub items: Vec<NewsItem>,
    pub succeeded: usize,
    pub failed: usize,
}

impl CategoryFetch {
    /// False when every source failed (or there were none), so the result
    /// says nothing about what the category currently holds.
    pub fn any_succeeded(&self) -> bool {
        self.succeeded > 0
    }
}

pub struct Fetcher {
    client: Client,
    catalog: Arc<SourceCatalog>,
}

impl Fetcher {
    pub fn new(catalog: Arc<SourceCatalog>, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("FinFeed/1.0 (News Aggregator)")
            .build()?;

        Ok(Self { client, catalog })
    }

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    /// Fetch every source of `category` concurrently. Unknown categories use
    /// the general sources; failed sources contribute nothing.
    pub async fn fetch_category(&self, category: &str) -> CategoryFetch {
        let sources = self.catalog.sources_for(category);
        let results = join_all(sources.iter().map(|s| self.fetch_source(s))).await;

        let mut fetch = CategoryFetch::default();
        for (source, result) in sources.iter().zip(results) {
            match result {
                Ok(items) => {
                    fetch.succeeded += 1;
                    fetch.items.extend(items);
                }
                Err(e) => {
                    error!("Failed to fetch feed '{}': {}", source.name, e);
                    fetch.failed += 1;
                }
            }
        }
        fetch
    }

    /// Single best-effort fetch of one source, no retry.
    pub async fn fetch_source(&self, source: &FeedSource) -> Result<Vec<NewsItem>, FetchError> {
        info!("Fetching feed: {} ({})", source.name, source.url);

        let response = self.client.get(&source.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        let bytes = response.bytes().await?;

        let raw_items = Self::parse_document(&bytes)?;
        let total = raw_items.len();
        let items: Vec<NewsItem> = raw_items
            .iter()
            .filter_map(|raw| normalize(raw, source))
            .collect();

        if items.len() < total {
            warn!(
                "Skipped {} entries without guid or link in '{}'",
                total - items.len(),
                source.name
            );
        }
        info!("Fetched {} items from '{}'", items.len(), source.name);
        Ok(items)
    }

    /// Parse a syndication document into raw items.
    pub fn parse_document(bytes: &[u8]) -> Result<Vec<RawItem>, ParseFeedError> {
        // feed-rs invents ids for RSS items without <guid>, so read guids from the XML
        let extras = Self::extract_item_extras_from_xml(bytes);

        let parsed = parser::parse(bytes)?;
        let ids_are_supplied = matches!(parsed.feed_type, FeedType::Atom | FeedType::JSON);

        Ok(parsed
            .entries
            .into_iter()
            .map(|entry| Self::raw_item_from_entry(entry, &extras, ids_are_supplied))
            .collect())
    }

    pub fn raw_item_from_entry(
        entry: Entry,
        extras: &HashMap<String, ItemExtras>,
        ids_are_supplied: bool,
    ) -> RawItem {
        let link = Self::select_link(&entry);
        let extra = link.as_ref().and_then(|l| extras.get(l));

        let guid = extra.and_then(|x| x.guid.clone()).or_else(|| {
            (ids_are_supplied && !entry.id.trim().is_empty()).then(|| entry.id.clone())
        });

        let enclosure_url = extra
            .and_then(|x| x.enclosure_url.clone())
            .or_else(|| {
                entry
                    .links
                    .iter()
                    .find(|l| {
                        l.rel
                            .as_deref()
                            .map_or(false, |r| r.eq_ignore_ascii_case("enclosure"))
                    })
                    .map(|l| l.href.clone())
            });

        // feed-rs files <enclosure> under media too; keep that for the enclosure step
        let media_url = entry
            .media
            .iter()
            .flat_map(|m| {
                m.content
                    .iter()
                    .filter_map(|c| c.url.as_ref().map(|u| u.to_string()))
                    .chain(m.thumbnails.iter().map(|t| t.image.uri.clone()))
            })
            .find(|url| !url.trim().is_empty() && Some(url) != enclosure_url.as_ref());

        RawItem {
            guid,
            title: entry.title.map(|t| t.content),
            link,
            snippet: entry.summary.map(|t| t.content),
            content: entry.content.and_then(|c| c.body),
            published: entry.published,
            updated: entry.updated,
            media_url,
            enclosure_url,
        }
    }

    fn select_link(entry: &Entry) -> Option<String> {
        entry
            .links
            .iter()
            .find(|l| {
                l.rel
                    .as_deref()
                    .map_or(true, |r| r.is_empty() || r.eq_ignore_ascii_case("alternate"))
            })
            .or_else(|| entry.links.first())
            .map(|l| l.href.trim().to_string())
            .filter(|href| !href.is_empty())
    }

    /// Scan raw RSS `<item>` blocks for `<guid>` and `<enclosure url>`, keyed by `<link>`.
    pub fn extract_item_extras_from_xml(xml_bytes: &[u8]) -> HashMap<String, ItemExtras> {
        let mut extras_map = HashMap::new();
        let xml_str = match std::str::from_utf8(xml_bytes) {
            Ok(s) => s,
            Err(_) => return extras_map,
        };

        for item in Self::item_blocks(xml_str) {
            let Some(link) = Self::extract_xml_element(item, "link") else {
                continue;
            };
            let extras = ItemExtras {
                guid: Self::extract_xml_element(item, "guid").filter(|g| !g.is_empty()),
                enclosure_url: Self::extract_xml_attribute(item, "enclosure", "url")
                    .filter(|u| !u.is_empty()),
            };
            if extras != ItemExtras::default() {
                extras_map.insert(link, extras);
            }
        }

        extras_map
    }

    fn item_blocks(xml: &str) -> Vec<&str> {
        let mut blocks = Vec::new();
        let mut rest = xml;
        while let Some((_, open_end)) = Self::find_open_tag(rest, "item") {
            let body = &rest[open_end..];
            let end = body.find("</item>").unwrap_or(body.len());
            blocks.push(&body[..end]);
            rest = &body[end..];
        }
        blocks
    }

    /// Byte range of the first `<tag ...>` opening tag, excluding prefixed names.
    fn find_open_tag(xml: &str, tag: &str) -> Option<(usize, usize)> {
        let needle = format!("<{}", tag);
        let mut from = 0;
        while let Some(pos) = xml[from..].find(&needle) {
            let start = from + pos;
            let after = start + needle.len();
            match xml[after..].chars().next() {
                Some(c) if c == '>' || c == '/' || c.is_whitespace() => {
                    let end = xml[after..].find('>')? + after + 1;
                    return Some((start, end));
                }
                _ => from = after,
            }
        }
        None
    }

    pub fn extract_xml_element(xml: &str, tag: &str) -> Option<String> {
        let (start, open_end) = Self::find_open_tag(xml, tag)?;
        if xml[start..open_end].ends_with("/>") {
            return Some(String::new());
        }

        let end_tag = format!("</{}>", tag);
        let end = xml[open_end..].find(&end_tag)? + open_end;

        Some(Self::decode_text(&xml[open_end..end]))
    }

    pub fn extract_xml_attribute(xml: &str, tag: &str, attr: &str) -> Option<String> {
        let (start, open_end) = Self::find_open_tag(xml, tag)?;
        let open = &xml[start..open_end];

        for quote in ['"', '\''] {
            let needle = format!("{}={}", attr, quote);
            let mut from = 0;
            while let Some(pos) = open[from..].find(&needle) {
                let at = from + pos;
                let value_start = at + needle.len();
                let standalone = open[..at]
                    .chars()
                    .next_back()
                    .map_or(false, char::is_whitespace);
                if standalone {
                    let len = open[value_start..].find(quote)?;
                    let value = &open[value_start..value_start + len];
                    return Some(html_escape::decode_html_entities(value.trim()).to_string());
                }
                from = value_start;
            }
        }
        None
    }

    fn decode_text(raw: &str) -> String {
        let trimmed = raw.trim();
        match trimmed
            .strip_prefix("<![CDATA[")
            .and_then(|s| s.strip_suffix("]]>"))
        {
            Some(cdata) => cdata.trim().to_string(),
            None => html_escape::decode_html_entities(trimmed).trim().to_string(),
        }
    }
}
