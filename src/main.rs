use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use finfeed::cache::CategoryCache;
use finfeed::catalog::SourceCatalog;
use finfeed::config::Config;
use finfeed::db::Database;
use finfeed::fetcher::Fetcher;
use finfeed::pipeline::Aggregator;
use finfeed::recommend::{build_client, Categorizer, OpenAiConfig};
use finfeed::routes::{self, AppState, ResponseCache};
use finfeed::scheduler::{start_background_prefetch, Prefetcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "finfeed=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("FINFEED_CONFIG").unwrap_or_else(|_| "feeds.toml".to_string());
    let config = Config::load(&config_path)?;
    let catalog = Arc::new(SourceCatalog::from_config(&config.feeds));
    info!(
        "Loaded {} feeds in {} categories from {}",
        catalog.len(),
        catalog.categories().len(),
        config_path
    );

    // Initialize profile store
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:finfeed.db?mode=rwc".to_string());
    let db = Database::new(&database_url).await?;
    db.initialize().await?;
    info!("Database initialized");

    let fetcher = Arc::new(Fetcher::new(catalog, config.fetch_timeout())?);
    let category_cache = Arc::new(CategoryCache::with_system_clock(config.cache_ttl()));
    let aggregator = Arc::new(Aggregator::new(
        fetcher.clone(),
        category_cache.clone(),
        config.default_categories.clone(),
    ));

    let client = build_client(OpenAiConfig::from_env(
        config.recommend.model.as_deref(),
        config.fetch_timeout(),
    ));
    let categorizer = Arc::new(Categorizer::new(client, config.recommend.fallback.clone()));

    // Start background prefetch task
    let prefetcher = Arc::new(Prefetcher::new(
        fetcher,
        category_cache,
        config.prefetch_categories.clone(),
    ));
    let bg_prefetcher = prefetcher.clone();
    let refresh_period = config.refresh_period();
    tokio::spawn(async move {
        start_background_prefetch(bg_prefetcher, refresh_period).await;
    });

    let state = Arc::new(AppState {
        db: Arc::new(db),
        aggregator,
        categorizer,
        prefetcher,
        response_cache: Arc::new(
            ResponseCache::with_system_clock(config.response_cache_ttl())
                .with_max_entries(config.response_cache_max_entries),
        ),
        recommend_categories: config.recommend.categories.clone(),
    });

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Server starting on http://{}", config.bind_addr);

    axum::serve(listener, routes::router(state)).await?;

    Ok(())
}
