//! Keyword relevance scoring with an optional portfolio boost.
//!
//! Each keyword found in an item's title adds [`TITLE_WEIGHT`]; found only in
//! the description or content it adds [`BODY_WEIGHT`]. The keyword score is
//! capped at 1.0, and items matching nothing get [`BASELINE_SCORE`]. The asset
//! boost is added afterwards and is not capped.

use crate::model::{Asset, NewsItem};

pub const NEUTRAL_SCORE: f64 = 0.5;
pub const TITLE_WEIGHT: f64 = 0.5;
pub const BODY_WEIGHT: f64 = 0.3;
pub const MAX_KEYWORD_SCORE: f64 = 1.0;
pub const BASELINE_SCORE: f64 = 0.1;
pub const ASSET_BOOST_FACTOR: f64 = 2.0;

/// Trimmed, non-empty keywords with exact duplicates removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordSet {
    keywords: Vec<String>,
    lowered: Vec<String>,
}

impl KeywordSet {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for keyword in keywords {
            let keyword = keyword.as_ref().trim();
            if keyword.is_empty() || set.keywords.iter().any(|k| k == keyword) {
                continue;
            }
            set.keywords.push(keyword.to_string());
            set.lowered.push(keyword.to_lowercase());
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.keywords
    }

    /// Capped keyword score and the keywords that matched, in keyword order.
    pub fn score(&self, item: &NewsItem) -> (f64, Vec<String>) {
        if self.is_empty() {
            return (NEUTRAL_SCORE, Vec::new());
        }

        let title = item.title.to_lowercase();
        let description = item.description.to_lowercase();
        let content = item.content.to_lowercase();

        let mut score = 0.0;
        let mut matched = Vec::new();
        for (keyword, lowered) in self.keywords.iter().zip(&self.lowered) {
            if title.contains(lowered.as_str()) {
                score += TITLE_WEIGHT;
            } else if description.contains(lowered.as_str()) || content.contains(lowered.as_str())
            {
                score += BODY_WEIGHT;
            } else {
                continue;
            }
            matched.push(keyword.clone());
        }

        if matched.is_empty() {
            return (BASELINE_SCORE, matched);
        }
        (score.min(MAX_KEYWORD_SCORE), matched)
    }
}

/// Per-asset share of the portfolio, precomputed for matching.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetBoost {
    entries: Vec<BoostEntry>,
}

#[derive(Debug, Clone, PartialEq)]
struct BoostEntry {
    name: String,
    asset_type: String,
    increment: f64,
}

impl AssetBoost {
    /// `None` when the portfolio is worth nothing. Assets whose value is not
    /// a positive finite number are left out of the total and never boost.
    pub fn new(assets: &[Asset]) -> Option<Self> {
        let valued: Vec<&Asset> = assets.iter().filter(|a| has_value(a)).collect();
        let total: f64 = valued.iter().map(|a| a.value).sum();
        if valued.is_empty() || !total.is_finite() || total <= 0.0 {
            return None;
        }

        let entries = valued
            .into_iter()
            .map(|a| BoostEntry {
                name: a.name.trim().to_lowercase(),
                asset_type: a.asset_type.trim().to_lowercase(),
                increment: (a.value / total) * ASSET_BOOST_FACTOR,
            })
            .collect();
        Some(Self { entries })
    }

    /// Sum of increments for assets named (by name or type) in the title or description.
    pub fn boost_for(&self, item: &NewsItem) -> f64 {
        let title = item.title.to_lowercase();
        let description = item.description.to_lowercase();
        let mentions = |needle: &str| {
            !needle.is_empty() && (title.contains(needle) || description.contains(needle))
        };

        self.entries
            .iter()
            .filter(|e| mentions(&e.name) || mentions(&e.asset_type))
            .map(|e| e.increment)
            .sum()
    }
}

pub(crate) fn has_value(asset: &Asset) -> bool {
    asset.value.is_finite() && asset.value > 0.0
}

#[derive(Debug, Clone, Default)]
pub struct Scorer {
    keywords: KeywordSet,
    boost: Option<AssetBoost>,
}

impl Scorer {
    pub fn new(keywords: KeywordSet) -> Self {
        Self {
            keywords,
            boost: None,
        }
    }

    pub fn with_assets(mut self, assets: &[Asset]) -> Self {
        self.boost = AssetBoost::new(assets);
        self
    }

    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }

    /// Annotate every item with `relevance_score` and `matched_interests`.
    pub fn score(&self, items: Vec<NewsItem>) -> Vec<NewsItem> {
        items
            .into_iter()
            .map(|mut item| {
                let (score, matched) = self.keywords.score(&item);
                let boost = self.boost.as_ref().map_or(0.0, |b| b.boost_for(&item));
                item.relevance_score = score + boost;
                item.matched_interests = matched;
                item
            })
            .collect()
    }
}
