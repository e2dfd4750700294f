//! SQLite store for user profiles and their portfolios.
//!
//! The server only reads profiles. Operators seed and update them through
//! [`Database::upsert_profile`], for example from a small admin binary or a
//! script linking this crate against the same `DATABASE_URL`.

use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};

use crate::model::{Asset, UserProfile};

#[derive(Debug, Clone, FromRow)]
struct ProfileRow {
    username: String,
    interests: String,
    goals: String,
}

#[derive(Debug, Clone, FromRow)]
struct AssetRow {
    name: String,
    asset_type: String,
    value: f64,
}

impl From<AssetRow> for Asset {
    fn from(row: AssetRow) -> Self {
        Asset {
            name: row.name,
            asset_type: row.asset_type,
            value: row.value,
        }
    }
}

/// User profiles for the for-you and recommendation endpoints.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                username TEXT PRIMARY KEY,
                interests TEXT NOT NULL DEFAULT '[]',
                goals TEXT NOT NULL DEFAULT '[]'
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS assets (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL REFERENCES profiles(username),
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                asset_type TEXT NOT NULL,
                value REAL NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_assets_username
            ON assets(username, position)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_profile(&self, username: &str) -> anyhow::Result<Option<UserProfile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT username, interests, goals FROM profiles WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let assets = sqlx::query_as::<_, AssetRow>(
            r#"
            SELECT name, asset_type, value FROM assets
            WHERE username = ?
            ORDER BY position
            "#,
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(UserProfile {
            username: row.username,
            interests: serde_json::from_str(&row.interests)?,
            goals: serde_json::from_str(&row.goals)?,
            assets: assets.into_iter().map(Asset::from).collect(),
        }))
    }

    /// Insert or replace a profile along with its full asset list.
    pub async fn upsert_profile(&self, profile: &UserProfile) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO profiles (username, interests, goals)
            VALUES (?, ?, ?)
            ON CONFLICT(username) DO UPDATE SET
                interests = excluded.interests,
                goals = excluded.goals
            "#,
        )
        .bind(&profile.username)
        .bind(serde_json::to_string(&profile.interests)?)
        .bind(serde_json::to_string(&profile.goals)?)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM assets WHERE username = ?")
            .bind(&profile.username)
            .execute(&mut *tx)
            .await?;

        for (position, asset) in profile.assets.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO assets (username, position, name, asset_type, value)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&profile.username)
            .bind(position as i64)
            .bind(&asset.name)
            .bind(&asset.asset_type)
            .bind(asset.value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
