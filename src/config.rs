use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Prefetch interval in minutes
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
    /// Prefetch cache TTL in seconds
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: u64,
    /// Per-request response cache TTL in seconds
    #[serde(default = "default_response_cache_ttl")]
    pub response_cache_ttl: u64,
    /// Most pages the response cache holds at once
    #[serde(default = "default_response_cache_max_entries")]
    pub response_cache_max_entries: usize,
    /// Per-source request timeout in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: u64,
    #[serde(default = "default_categories")]
    pub default_categories: Vec<String>,
    #[serde(default = "default_prefetch_categories")]
    pub prefetch_categories: Vec<String>,
    #[serde(default)]
    pub recommend: RecommendConfig,
    pub feeds: Vec<FeedConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    pub category: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RecommendConfig {
    /// Closed vocabulary the categorization service may answer with
    #[serde(default = "default_recommend_categories")]
    pub categories: Vec<String>,
    #[serde(default = "default_fallback_categories")]
    pub fallback: Vec<String>,
    pub model: Option<String>,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            categories: default_recommend_categories(),
            fallback: default_fallback_categories(),
            model: None,
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_refresh_interval() -> u64 {
    60
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_response_cache_ttl() -> u64 {
    600
}

fn default_response_cache_max_entries() -> usize {
    1000
}

fn default_fetch_timeout() -> u64 {
    30
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn default_categories() -> Vec<String> {
    strings(&["general", "technology"])
}

fn default_prefetch_categories() -> Vec<String> {
    strings(&["technology", "science", "business", "education", "general"])
}

fn default_recommend_categories() -> Vec<String> {
    strings(&[
        "technology",
        "science",
        "business",
        "finance",
        "stocks",
        "crypto",
        "realestate",
        "commodities",
        "education",
        "general",
    ])
}

fn default_fallback_categories() -> Vec<String> {
    strings(&["technology", "education", "general"])
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Prefetch period, never shorter than one minute.
    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_interval.max(1).saturating_mul(60))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn response_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.response_cache_ttl)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        assert_eq!(default_refresh_interval(), 60);
        assert_eq!(default_cache_ttl(), 3600);
        assert_eq!(default_response_cache_ttl(), 600);
        assert_eq!(default_response_cache_max_entries(), 1000);
        assert_eq!(default_categories(), vec!["general", "technology"]);
        assert_eq!(default_recommend_categories().len(), 10);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
            refresh_interval = 30
            cache_ttl = 120
            default_categories = ["finance"]

            [[feeds]]
            name = "Test Feed"
            url = "https://example.com/feed.xml"
            category = "finance"

            [[feeds]]
            name = "Another Feed"
            url = "https://example.org/rss"
            category = "general"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.refresh_interval, 30);
        assert_eq!(config.refresh_period(), Duration::from_secs(1800));
        assert_eq!(config.cache_ttl(), Duration::from_secs(120));
        assert_eq!(config.default_categories, vec!["finance"]);
        assert_eq!(config.feeds.len(), 2);
        assert_eq!(config.feeds[0].name, "Test Feed");
        assert_eq!(config.feeds[0].url, "https://example.com/feed.xml");
        assert_eq!(config.feeds[0].category, "finance");
        assert_eq!(config.feeds[1].category, "general");
    }

    #[test]
    fn test_load_config_with_defaults() {
        let content = r#"
            [[feeds]]
            name = "Test Feed"
            url = "https://example.com/feed.xml"
            category = "general"
        "#;

        let config = Config::from_str(content).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.refresh_interval, 60);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(
            config.prefetch_categories,
            vec!["technology", "science", "business", "education", "general"]
        );
        assert_eq!(
            config.recommend.fallback,
            vec!["technology", "education", "general"]
        );
        assert!(config.recommend.model.is_none());
    }

    #[test]
    fn test_recommend_table_overrides() {
        let content = r#"
            feeds = []

            [recommend]
            categories = ["crypto", "stocks"]
            fallback = ["stocks"]
            model = "gpt-4o-mini"
        "#;

        let config = Config::from_str(content).unwrap();
        assert_eq!(config.recommend.categories, vec!["crypto", "stocks"]);
        assert_eq!(config.recommend.fallback, vec!["stocks"]);
        assert_eq!(config.recommend.model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn test_refresh_period_bounds() {
        let mut config = Config::from_str("feeds = []").unwrap();

        config.refresh_interval = 0;
        assert_eq!(config.refresh_period(), Duration::from_secs(60));

        config.refresh_interval = u64::MAX;
        assert_eq!(config.refresh_period(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let content = "this is not valid toml {{{";

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let result = Config::load(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_missing_category() {
        let content = r#"
            [[feeds]]
            name = "Test Feed"
            url = "https://example.com/feed.xml"
        "#;

        let result = Config::from_str(content);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_feeds_list() {
        let config = Config::from_str("feeds = []").unwrap();
        assert!(config.feeds.is_empty());
    }
}
