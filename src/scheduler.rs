use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::cache::{category_key, CategoryCache};
use crate::fetcher::Fetcher;

/// Warms the category cache independently of request traffic.
pub struct Prefetcher {
    fetcher: Arc<Fetcher>,
    cache: Arc<CategoryCache>,
    categories: Vec<String>,
    refreshing: Arc<RwLock<bool>>,
}

impl Prefetcher {
    pub fn new(fetcher: Arc<Fetcher>, cache: Arc<CategoryCache>, categories: Vec<String>) -> Self {
        Self {
            fetcher,
            cache,
            categories,
            refreshing: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn is_refreshing(&self) -> bool {
        *self.refreshing.read().await
    }

    /// Run one prefetch cycle unless one is already running. Returns the
    /// number of items cached, or `None` when the cycle was skipped.
    pub async fn prefetch_all(&self) -> Option<usize> {
        {
            let mut refreshing = self.refreshing.write().await;
            if *refreshing {
                info!("Prefetch already in progress, skipping");
                return None;
            }
            *refreshing = true;
        }

        let cached = self.do_prefetch_all().await;

        {
            let mut refreshing = self.refreshing.write().await;
            *refreshing = false;
        }

        Some(cached)
    }

    async fn do_prefetch_all(&self) -> usize {
        info!("Prefetching news for {} categories", self.categories.len());

        let catalog = self.fetcher.catalog();
        let mut refreshed: Vec<&str> = Vec::with_capacity(self.categories.len());
        let mut cached = 0;
        for category in &self.categories {
            let resolved = catalog.resolve(category);
            if refreshed.contains(&resolved) {
                continue;
            }
            refreshed.push(resolved);

            let fetched = self.fetcher.fetch_category(resolved).await;
            if !fetched.any_succeeded() {
                warn!(
                    "All {} sources failed for {}, keeping previous entry",
                    fetched.failed, resolved
                );
                continue;
            }
            info!("Prefetched {} articles for {}", fetched.items.len(), resolved);
            cached += fetched.items.len();
            self.cache.set(category_key(resolved), fetched.items);
        }

        let purged = self.cache.purge_expired();
        if purged > 0 {
            info!("Purged {} expired cache entries", purged);
        }
        info!("News prefetching complete");
        cached
    }
}

pub async fn start_background_prefetch(prefetcher: Arc<Prefetcher>, interval: Duration) {
    info!("Starting initial news prefetch");
    prefetcher.prefetch_all().await;

    loop {
        tokio::time::sleep(interval).await;
        info!("Starting scheduled news prefetch");
        prefetcher.prefetch_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::catalog::{FeedSource, SourceCatalog};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS: &str = r#"<?xml version="1.0"?>
        <rss version="2.0"><channel><title>T</title><link>https://t.example.com</link>
            <description>d</description>
            <item><title>Chip stocks climb</title><link>https://t.example.com/1</link></item>
            <item><title>Rates on hold</title><link>https://t.example.com/2</link></item>
        </channel></rss>
    "#;

    async fn mount_feed(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/tech.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .mount(server)
            .await;
    }

    fn prefetcher_for(
        server: &MockServer,
        categories: &[&str],
    ) -> (Prefetcher, Arc<CategoryCache>) {
        let catalog = SourceCatalog::new(vec![FeedSource {
            name: "Tech".to_string(),
            url: format!("{}/tech.xml", server.uri()),
            category: "technology".to_string(),
        }]);
        let fetcher = Arc::new(Fetcher::new(Arc::new(catalog), Duration::from_secs(5)).unwrap());
        let cache = Arc::new(CategoryCache::new(
            Duration::from_secs(3600),
            Arc::new(ManualClock::new()),
        ));
        let prefetcher = Prefetcher::new(
            fetcher,
            cache.clone(),
            categories.iter().map(|c| c.to_string()).collect(),
        );
        (prefetcher, cache)
    }

    #[tokio::test]
    async fn test_prefetch_fills_category_keys() {
        let server = MockServer::start().await;
        mount_feed(&server).await;
        let (prefetcher, cache) = prefetcher_for(&server, &["technology"]);

        assert_eq!(prefetcher.prefetch_all().await, Some(2));

        let items = cache.get("category_technology").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Chip stocks climb");
        assert!(!prefetcher.is_refreshing().await);
    }

    #[tokio::test]
    async fn test_all_failing_cycle_keeps_previous_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tech.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tech.xml"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let (prefetcher, cache) = prefetcher_for(&server, &["technology"]);

        assert_eq!(prefetcher.prefetch_all().await, Some(2));
        assert_eq!(prefetcher.prefetch_all().await, Some(0));

        let items = cache.get("category_technology").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Chip stocks climb");
    }

    #[tokio::test]
    async fn test_category_without_sources_not_cached() {
        let server = MockServer::start().await;
        mount_feed(&server).await;
        let (prefetcher, cache) = prefetcher_for(&server, &["education"]);

        // no "general" sources in this catalog, so nothing can answer
        assert_eq!(prefetcher.prefetch_all().await, Some(0));
        assert!(cache.get("category_education").is_none());
        assert!(cache.get("category_general").is_none());
    }

    #[tokio::test]
    async fn test_unknown_categories_fetched_once_under_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/general.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .expect(1)
            .mount(&server)
            .await;

        let catalog = SourceCatalog::new(vec![FeedSource {
            name: "General".to_string(),
            url: format!("{}/general.xml", server.uri()),
            category: "general".to_string(),
        }]);
        let fetcher = Arc::new(Fetcher::new(Arc::new(catalog), Duration::from_secs(5)).unwrap());
        let cache = Arc::new(CategoryCache::new(
            Duration::from_secs(3600),
            Arc::new(ManualClock::new()),
        ));
        let prefetcher = Prefetcher::new(
            fetcher,
            cache.clone(),
            vec!["education".to_string(), "general".to_string()],
        );

        assert_eq!(prefetcher.prefetch_all().await, Some(2));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("category_general").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_cycle_skipped() {
        let server = MockServer::start().await;
        let (prefetcher, _cache) = prefetcher_for(&server, &["technology"]);

        *prefetcher.refreshing.write().await = true;
        assert_eq!(prefetcher.prefetch_all().await, None);
        assert!(prefetcher.is_refreshing().await);
    }
}
