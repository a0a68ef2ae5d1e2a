//! Storage layer for session history, feedback, and learner profiles.
//!
//! Results are persisted as opaque JSON blobs alongside the concept pair
//! that produced them; the pipeline only ever reads back the small
//! projections defined here.

mod sqlite;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ConceptPair, Profile};
use crate::error::StorageResult;

/// One stored feedback row for a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    /// Learner rating (1-5), if given.
    pub rating: Option<i64>,
    /// Free-form comment, if given.
    pub comment: Option<String>,
}

/// Projection of a stored result for the fairness history view.
#[derive(Debug, Clone, Serialize)]
pub struct StoredResult {
    /// When the interaction was recorded.
    pub timestamp: DateTime<Utc>,
    /// First concept of the query.
    pub concept_a: String,
    /// Second concept of the query.
    pub concept_b: String,
    /// Whether the stored result carried a bias flag.
    pub bias_flag: bool,
    /// The stored fairness report, if present.
    pub fairness: Option<serde_json::Value>,
}

/// Aggregate statistics for one session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    /// Queries recorded for the session.
    pub query_count: i64,
    /// Feedback rows with a rating.
    pub feedback_count: i64,
    /// Mean rating, if any ratings exist.
    pub avg_rating: Option<f64>,
}

/// Database-level usage totals for the metrics endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct UsageTotals {
    /// Total queries recorded.
    pub total_queries: i64,
    /// Distinct sessions seen.
    pub unique_sessions: i64,
    /// Stored results carrying a bias flag.
    pub bias_flags: i64,
    /// Stored results where mitigation cleared the flags.
    pub mitigations_triggered: i64,
    /// Mean rating across all feedback, if any.
    pub avg_user_rating: Option<f64>,
}

/// Storage trait for history, feedback, and profile persistence.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Most recent concept pairs for a session, newest first.
    async fn last_queries(&self, session_id: &str, limit: u32) -> StorageResult<Vec<ConceptPair>>;

    /// Most recent feedback rows for a session, newest first. Rows with
    /// neither a rating nor a non-blank comment are skipped.
    async fn recent_feedback(
        &self,
        session_id: &str,
        limit: u32,
    ) -> StorageResult<Vec<FeedbackEntry>>;

    /// Record a served result against session history. Returns the row id.
    async fn save_interaction(
        &self,
        session_id: Option<&str>,
        concept_a: &str,
        concept_b: &str,
        result: &serde_json::Value,
    ) -> StorageResult<i64>;

    /// Record learner feedback. Returns the row id.
    async fn save_feedback(
        &self,
        session_id: Option<&str>,
        connection_id: Option<&str>,
        rating: Option<i64>,
        comment: Option<&str>,
    ) -> StorageResult<i64>;

    /// Recent stored results for a session, projected for the fairness view.
    async fn recent_results(
        &self,
        session_id: &str,
        limit: u32,
    ) -> StorageResult<Vec<StoredResult>>;

    /// Learner profile for a session, with defaults when absent.
    async fn get_profile(&self, session_id: &str) -> StorageResult<Profile>;

    /// Create or update the learner profile for a session.
    async fn upsert_profile(&self, session_id: &str, profile: &Profile) -> StorageResult<()>;

    /// Aggregate statistics for a session.
    async fn session_stats(&self, session_id: &str) -> StorageResult<SessionStats>;

    /// Database-level usage totals across all sessions.
    async fn usage_totals(&self) -> StorageResult<UsageTotals>;

    /// Delete interactions and feedback older than `days_old` days.
    /// Returns the number of deleted rows.
    async fn cleanup_old_sessions(&self, days_old: i64) -> StorageResult<u64>;
}
