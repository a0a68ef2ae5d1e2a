use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use super::{FeedbackEntry, SessionStats, Storage, StoredResult, UsageTotals};
use crate::config::DatabaseConfig;
use crate::domain::{ConceptPair, Profile};
use crate::error::{StorageError, StorageResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create an in-memory storage instance (for tests)
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options =
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
                StorageError::Connection {
                    message: format!("Invalid database URL: {}", e),
                }
            })?;

        // A single connection keeps every query on the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to in-memory database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration {
                message: format!("Failed to run migrations: {}", e),
            })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn last_queries(&self, session_id: &str, limit: u32) -> StorageResult<Vec<ConceptPair>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT concept_a, concept_b
            FROM conversations
            WHERE session_id = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(concept_a, concept_b)| ConceptPair {
                concept_a,
                concept_b,
            })
            .collect())
    }

    async fn recent_feedback(
        &self,
        session_id: &str,
        limit: u32,
    ) -> StorageResult<Vec<FeedbackEntry>> {
        let rows: Vec<(Option<i64>, Option<String>)> = sqlx::query_as(
            r#"
            SELECT rating, comments
            FROM feedback
            WHERE session_id = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter(|(rating, comment)| {
                rating.is_some() || comment.as_deref().is_some_and(|c| !c.trim().is_empty())
            })
            .map(|(rating, comment)| FeedbackEntry { rating, comment })
            .collect())
    }

    async fn save_interaction(
        &self,
        session_id: Option<&str>,
        concept_a: &str,
        concept_b: &str,
        result: &serde_json::Value,
    ) -> StorageResult<i64> {
        let result_json = serde_json::to_string(result).unwrap_or_default();

        let inserted = sqlx::query(
            r#"
            INSERT INTO conversations (session_id, concept_a, concept_b, result_json, timestamp)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(session_id)
        .bind(concept_a)
        .bind(concept_b)
        .bind(&result_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(inserted.last_insert_rowid())
    }

    async fn save_feedback(
        &self,
        session_id: Option<&str>,
        connection_id: Option<&str>,
        rating: Option<i64>,
        comment: Option<&str>,
    ) -> StorageResult<i64> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO feedback (session_id, connection_id, rating, comments, timestamp)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(session_id)
        .bind(connection_id)
        .bind(rating)
        .bind(comment)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(inserted.last_insert_rowid())
    }

    async fn recent_results(
        &self,
        session_id: &str,
        limit: u32,
    ) -> StorageResult<Vec<StoredResult>> {
        let rows: Vec<(String, String, Option<String>, String)> = sqlx::query_as(
            r#"
            SELECT concept_a, concept_b, result_json, timestamp
            FROM conversations
            WHERE session_id = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(concept_a, concept_b, result_json, timestamp)| {
                let payload: serde_json::Value = result_json
                    .and_then(|raw| serde_json::from_str(&raw).ok())
                    .unwrap_or_default();

                StoredResult {
                    timestamp: DateTime::parse_from_rfc3339(&timestamp)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                    concept_a,
                    concept_b,
                    bias_flag: payload
                        .get("bias_flag")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false),
                    fairness: payload.get("fairness").cloned(),
                }
            })
            .collect())
    }

    async fn get_profile(&self, session_id: &str) -> StorageResult<Profile> {
        let row: Option<ProfileRow> = sqlx::query_as(
            r#"
            SELECT knowledge_level, education_level, education_system,
                   concept_a_knowledge, concept_b_knowledge
            FROM user_profiles
            WHERE session_id = ?
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()).unwrap_or_default())
    }

    async fn upsert_profile(&self, session_id: &str, profile: &Profile) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_profiles (
                session_id, knowledge_level, education_level, education_system,
                concept_a_knowledge, concept_b_knowledge
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                knowledge_level = excluded.knowledge_level,
                education_level = excluded.education_level,
                education_system = excluded.education_system,
                concept_a_knowledge = excluded.concept_a_knowledge,
                concept_b_knowledge = excluded.concept_b_knowledge
            "#,
        )
        .bind(session_id)
        .bind(&profile.knowledge_level)
        .bind(&profile.education_level)
        .bind(&profile.education_system)
        .bind(profile.concept_a_knowledge)
        .bind(profile.concept_b_knowledge)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn session_stats(&self, session_id: &str) -> StorageResult<SessionStats> {
        let (query_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM conversations WHERE session_id = ?")
                .bind(session_id)
                .fetch_one(&self.pool)
                .await?;

        let (feedback_count, avg_rating): (i64, Option<f64>) = sqlx::query_as(
            r#"
            SELECT COUNT(*), AVG(rating)
            FROM feedback
            WHERE session_id = ? AND rating IS NOT NULL
            "#,
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(SessionStats {
            query_count,
            feedback_count,
            avg_rating: avg_rating.map(|avg| (avg * 100.0).round() / 100.0),
        })
    }

    async fn usage_totals(&self) -> StorageResult<UsageTotals> {
        let (total_queries,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversations")
            .fetch_one(&self.pool)
            .await?;

        let (unique_sessions,): (i64,) = sqlx::query_as(
            "SELECT COUNT(DISTINCT session_id) FROM conversations WHERE session_id IS NOT NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        let (bias_flags,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM conversations WHERE json_extract(result_json, '$.bias_flag') = 1",
        )
        .fetch_one(&self.pool)
        .await?;

        let (mitigations_triggered,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM conversations WHERE json_extract(result_json, '$.mitigated') = 1",
        )
        .fetch_one(&self.pool)
        .await?;

        let (avg_user_rating,): (Option<f64>,) =
            sqlx::query_as("SELECT AVG(rating) FROM feedback WHERE rating IS NOT NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(UsageTotals {
            total_queries,
            unique_sessions,
            bias_flags,
            mitigations_triggered,
            avg_user_rating: avg_user_rating.map(|avg| (avg * 100.0).round() / 100.0),
        })
    }

    async fn cleanup_old_sessions(&self, days_old: i64) -> StorageResult<u64> {
        let cutoff = (Utc::now() - Duration::days(days_old)).to_rfc3339();

        let conversations = sqlx::query("DELETE FROM conversations WHERE timestamp < ?")
            .bind(&cutoff)
            .execute(&self.pool)
            .await?
            .rows_affected();

        let feedback = sqlx::query("DELETE FROM feedback WHERE timestamp < ?")
            .bind(&cutoff)
            .execute(&self.pool)
            .await?
            .rows_affected();

        info!(
            conversations,
            feedback, days_old, "Deleted expired session data"
        );

        Ok(conversations + feedback)
    }
}

// Internal row type for SQLx mapping
#[derive(sqlx::FromRow)]
struct ProfileRow {
    knowledge_level: Option<String>,
    education_level: Option<String>,
    education_system: Option<String>,
    concept_a_knowledge: Option<i64>,
    concept_b_knowledge: Option<i64>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        let defaults = Profile::default();
        Self {
            knowledge_level: row
                .knowledge_level
                .filter(|level| !level.is_empty())
                .unwrap_or(defaults.knowledge_level),
            education_level: row.education_level.filter(|v| !v.is_empty()),
            education_system: row.education_system.filter(|v| !v.is_empty()),
            concept_a_knowledge: row.concept_a_knowledge.unwrap_or(0),
            concept_b_knowledge: row.concept_b_knowledge.unwrap_or(0),
        }
    }
}
