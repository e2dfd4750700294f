//! FinFeed - personalized financial news aggregation
//!
//! Fetches categorized RSS/Atom sources concurrently, normalizes and
//! deduplicates the stories, scores them against a user's interests and
//! portfolio, and serves ranked pages over a JSON API.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod dedup;
pub mod fetcher;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod recommend;
pub mod routes;
pub mod scheduler;
pub mod scorer;
