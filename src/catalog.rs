use crate::config::FeedConfig;

/// Category used when a requested category has no configured sources.
pub const FALLBACK_CATEGORY: &str = "general";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    pub category: String,
}

impl From<&FeedConfig> for FeedSource {
    fn from(config: &FeedConfig) -> Self {
        Self {
            name: config.name.clone(),
            url: config.url.clone(),
            category: config.category.clone(),
        }
    }
}

/// Static catalog of syndication sources, kept in declaration order.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    sources: Vec<FeedSource>,
}

impl SourceCatalog {
    pub fn new(sources: Vec<FeedSource>) -> Self {
        Self { sources }
    }

    pub fn from_config(feeds: &[FeedConfig]) -> Self {
        Self::new(feeds.iter().map(FeedSource::from).collect())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for source in &self.sources {
            if !categories.contains(&source.category) {
                categories.push(source.category.clone());
            }
        }
        categories
    }

    pub fn contains(&self, category: &str) -> bool {
        self.sources.iter().any(|s| s.category == category)
    }

    /// The catalog key actually served for `category`.
    pub fn resolve<'a>(&self, category: &'a str) -> &'a str {
        if self.contains(category) {
            category
        } else {
            FALLBACK_CATEGORY
        }
    }

    pub fn sources_for(&self, category: &str) -> Vec<&FeedSource> {
        let resolved = self.resolve(category);
        self.sources
            .iter()
            .filter(|s| s.category == resolved)
            .collect()
    }
}
