//! Request-scoped aggregation: resolve categories, fetch them concurrently
//! (through the prefetch cache), dedupe, score, rank and paginate.

use std::cmp::Ordering;
use std::sync::Arc;

use futures::future::join_all;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::cache::{category_key, CategoryCache};
use crate::dedup::dedupe_by_title;
use crate::fetcher::Fetcher;
use crate::model::{NewsItem, NewsPage};
use crate::scorer::Scorer;

pub const DEFAULT_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageWindow {
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl Default for PageWindow {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategorySelection {
    /// The configured default categories.
    Default,
    /// Every category in the catalog.
    All,
    Explicit(Vec<String>),
}

impl CategorySelection {
    /// Parse a comma-separated list; empty means default, a lone `all` means all.
    pub fn parse(raw: Option<&str>) -> Self {
        let names: Vec<String> = raw
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        match names.as_slice() {
            [] => CategorySelection::Default,
            [only] if only.eq_ignore_ascii_case("all") => CategorySelection::All,
            _ => CategorySelection::Explicit(names),
        }
    }
}

pub struct Aggregator {
    fetcher: Arc<Fetcher>,
    cache: Arc<CategoryCache>,
    default_categories: Vec<String>,
}

impl Aggregator {
    pub fn new(
        fetcher: Arc<Fetcher>,
        cache: Arc<CategoryCache>,
        default_categories: Vec<String>,
    ) -> Self {
        Self {
            fetcher,
            cache,
            default_categories,
        }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Catalog categories to fetch, in request order. Unknown names resolve
    /// to the fallback category and duplicates are removed after resolution.
    pub fn resolve_categories(&self, selection: &CategorySelection) -> Vec<String> {
        let names = match selection {
            CategorySelection::Default => self.default_categories.clone(),
            CategorySelection::All => self.fetcher.catalog().categories(),
            CategorySelection::Explicit(names) => names.clone(),
        };

        let catalog = self.fetcher.catalog();
        let mut resolved: Vec<String> = Vec::with_capacity(names.len());
        for name in &names {
            let name = catalog.resolve(name);
            if !resolved.iter().any(|r| r == name) {
                resolved.push(name.to_string());
            }
        }
        resolved
    }

    /// Items for one category, served from the prefetch cache when warm.
    /// The key is the resolved category, so every unknown name shares the
    /// fallback entry. A fetch where no source answered is returned but
    /// never cached.
    pub async fn category_items(&self, category: &str) -> Arc<Vec<NewsItem>> {
        let key = category_key(self.fetcher.catalog().resolve(category));
        if let Some(items) = self.cache.get(&key) {
            debug!("Cache hit for {}", key);
            return items;
        }

        let fetched = self.fetcher.fetch_category(category).await;
        if !fetched.any_succeeded() {
            warn!("No source answered for {}, not caching", key);
            return Arc::new(fetched.items);
        }
        self.cache.set(key, fetched.items)
    }

    /// Fetch all categories concurrently and flatten in category order.
    pub async fn fetch_categories(&self, categories: &[String]) -> Vec<NewsItem> {
        let results = join_all(categories.iter().map(|c| self.category_items(c))).await;
        results
            .iter()
            .flat_map(|items| items.iter().cloned())
            .collect()
    }

    pub async fn aggregate(
        &self,
        categories: &[String],
        scorer: &Scorer,
        window: PageWindow,
    ) -> NewsPage {
        let fetched = self.fetch_categories(categories).await;
        let fetched_count = fetched.len();

        let unique = dedupe_by_title(fetched);
        let mut scored = scorer.score(unique);
        rank(&mut scored);

        info!(
            "Aggregated {} items ({} unique) from {} categories with {} keywords",
            fetched_count,
            scored.len(),
            categories.len(),
            scorer.keywords().len()
        );

        paginate(scored, window)
    }
}

/// Relevance descending, then newest first. Stable, so full ties keep fetch order.
pub fn rank(items: &mut [NewsItem]) {
    items.sort_by(compare_ranked);
}

fn compare_ranked(a: &NewsItem, b: &NewsItem) -> Ordering {
    b.relevance_score
        .total_cmp(&a.relevance_score)
        .then_with(|| b.date_published.cmp(&a.date_published))
}

/// Slice the ranked items. Windows past the end yield an empty page.
pub fn paginate(items: Vec<NewsItem>, window: PageWindow) -> NewsPage {
    let total = items.len();
    let page = items
        .into_iter()
        .skip(window.offset)
        .take(window.limit)
        .collect();

    NewsPage {
        category: None,
        total,
        offset: window.offset,
        limit: window.limit,
        recommended_categories: None,
        items: page,
    }
}
