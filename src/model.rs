use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Article,
}

/// A normalized story, shared by every producer in the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub media_url: Option<String>,
    pub source_url: String,
    pub source_name: String,
    pub media_type: MediaType,
    pub date_published: Option<DateTime<Utc>>,
    pub estimated_read_time: String,
    /// Assigned by the scorer; may exceed 1.0 once the asset boost is applied.
    pub relevance_score: f64,
    pub matched_interests: Vec<String>,
}

/// One story as it came out of a syndication document, before cleaning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawItem {
    pub guid: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub snippet: Option<String>,
    pub content: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub media_url: Option<String>,
    pub enclosure_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub interests: Vec<String>,
    pub goals: Vec<String>,
    pub assets: Vec<Asset>,
}

impl UserProfile {
    /// Interests, goals, then asset names and types.
    pub fn keywords(&self) -> Vec<String> {
        let mut keywords: Vec<String> = self
            .interests
            .iter()
            .chain(self.goals.iter())
            .cloned()
            .collect();
        for asset in &self.assets {
            keywords.push(asset.name.clone());
            keywords.push(asset.asset_type.clone());
        }
        keywords
    }
}

/// Paginated response body shared by every news endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsPage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_categories: Option<Vec<String>>,
    pub items: Vec<NewsItem>,
}
