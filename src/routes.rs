use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::cache::TtlCache;
use crate::db::Database;
use crate::model::{NewsPage, UserProfile};
use crate::pipeline::{Aggregator, CategorySelection, PageWindow, DEFAULT_LIMIT};
use crate::recommend::{profile_summary, Categorizer};
use crate::scheduler::Prefetcher;
use crate::scorer::{KeywordSet, Scorer};

pub type ResponseCache = TtlCache<NewsPage>;

pub struct AppState {
    pub db: Arc<Database>,
    pub aggregator: Arc<Aggregator>,
    pub categorizer: Arc<Categorizer>,
    pub prefetcher: Arc<Prefetcher>,
    pub response_cache: Arc<ResponseCache>,
    /// Vocabulary the categorizer may pick from.
    pub recommend_categories: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(err) => {
                error!("Request failed: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NewsQuery {
    #[serde(default)]
    pub interests: Option<String>,
    #[serde(default)]
    pub goals: Option<String>,
    #[serde(default)]
    pub categories: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl NewsQuery {
    pub fn window(&self) -> PageWindow {
        PageWindow {
            offset: self.offset.unwrap_or(0),
            limit: self.limit.unwrap_or(DEFAULT_LIMIT),
        }
    }

    pub fn interests(&self) -> Vec<String> {
        split_list(self.interests.as_deref())
    }

    pub fn goals(&self) -> Vec<String> {
        split_list(self.goals.as_deref())
    }

    pub fn username(&self) -> Option<&str> {
        self.username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    fn selection(&self) -> CategorySelection {
        CategorySelection::parse(self.categories.as_deref())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PrefetchStatus {
    pub refreshing: bool,
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn merge_unique(into: &mut Vec<String>, from: Vec<String>) {
    for value in from {
        if !into.contains(&value) {
            into.push(value);
        }
    }
}

async fn load_profile(db: &Database, username: &str) -> Result<UserProfile, ApiError> {
    db.get_profile(username)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User '{}' not found", username)))
}

pub async fn personalized_news(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    Query(query): Query<NewsQuery>,
) -> Result<Json<NewsPage>, ApiError> {
    let key = uri.to_string();
    if let Some(page) = state.response_cache.get(&key) {
        return Ok(Json(NewsPage::clone(&page)));
    }

    let categories = state.aggregator.resolve_categories(&query.selection());
    let scorer = Scorer::new(KeywordSet::new(query.interests()));
    let page = state
        .aggregator
        .aggregate(&categories, &scorer, query.window())
        .await;

    Ok(Json(NewsPage::clone(&state.response_cache.set(key, page))))
}

pub async fn category_news(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    Path(category): Path<String>,
    Query(query): Query<NewsQuery>,
) -> Result<Json<NewsPage>, ApiError> {
    let key = uri.to_string();
    if let Some(page) = state.response_cache.get(&key) {
        return Ok(Json(NewsPage::clone(&page)));
    }

    let resolved = state
        .aggregator
        .fetcher()
        .catalog()
        .resolve(&category)
        .to_string();
    let scorer = Scorer::new(KeywordSet::new(query.interests()));
    let mut page = state
        .aggregator
        .aggregate(&[resolved.clone()], &scorer, query.window())
        .await;
    page.category = Some(resolved);

    Ok(Json(NewsPage::clone(&state.response_cache.set(key, page))))
}

pub async fn for_you_news(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NewsQuery>,
) -> Result<Json<NewsPage>, ApiError> {
    let username = query
        .username()
        .ok_or_else(|| ApiError::BadRequest("username is required".to_string()))?;
    let profile = load_profile(&state.db, username).await?;

    let categories = state.aggregator.resolve_categories(&query.selection());
    let scorer = Scorer::new(KeywordSet::new(profile.keywords())).with_assets(&profile.assets);
    let page = state
        .aggregator
        .aggregate(&categories, &scorer, query.window())
        .await;

    Ok(Json(page))
}

pub async fn recommended_news(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NewsQuery>,
) -> Result<Json<NewsPage>, ApiError> {
    let mut profile = UserProfile {
        username: query.username().unwrap_or_default().to_string(),
        interests: query.interests(),
        goals: query.goals(),
        assets: Vec::new(),
    };

    if profile.interests.is_empty() && profile.goals.is_empty() && profile.username.is_empty() {
        return Err(ApiError::BadRequest(
            "interests, goals or username is required".to_string(),
        ));
    }

    if !profile.username.is_empty() {
        let stored = load_profile(&state.db, &profile.username).await?;
        merge_unique(&mut profile.interests, stored.interests);
        merge_unique(&mut profile.goals, stored.goals);
        profile.assets = stored.assets;
    }

    let summary = profile_summary(&profile.interests, &profile.goals, &profile.assets);
    let recommended = state
        .categorizer
        .classify_or_default(&summary, &state.recommend_categories)
        .await;

    let selection = CategorySelection::Explicit(recommended.clone());
    let categories = state.aggregator.resolve_categories(&selection);
    let scorer = Scorer::new(KeywordSet::new(profile.keywords())).with_assets(&profile.assets);
    let mut page = state
        .aggregator
        .aggregate(&categories, &scorer, query.window())
        .await;
    page.recommended_categories = Some(recommended);

    Ok(Json(page))
}

pub async fn prefetch(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let prefetcher = state.prefetcher.clone();
    tokio::spawn(async move {
        prefetcher.prefetch_all().await;
    });

    (StatusCode::ACCEPTED, Json(PrefetchStatus { refreshing: true }))
}

pub async fn prefetch_status(State(state): State<Arc<AppState>>) -> Json<PrefetchStatus> {
    Json(PrefetchStatus {
        refreshing: state.prefetcher.is_refreshing().await,
    })
}

pub async fn health() -> &'static str {
    "OK"
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/news/personalized", get(personalized_news))
        .route("/api/news/category/:category", get(category_news))
        .route("/api/news/for-you", get(for_you_news))
        .route("/api/news/recommendations", get(recommended_news))
        .route("/api/news/prefetch", post(prefetch))
        .route("/api/news/prefetch/status", get(prefetch_status))
        .route("/health", get(health))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
