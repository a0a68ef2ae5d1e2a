//! Integration tests for the HTTP surface
//!
//! Drives the axum router directly with stubbed model stages and an
//! in-memory database.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use concept_bridge::config::PipelineConfig;
use concept_bridge::domain::{
    BiasVerdict, Connection, ConnectionOutcome, ContentVerdict, Level, Narrative, Profile,
    QueryContext, ReviewBundle,
};
use concept_bridge::error::ModelResult;
use concept_bridge::pipeline::Orchestrator;
use concept_bridge::server::{router, AppContext};
use concept_bridge::stages::{BiasReviewer, LevelReviewer, NarrativeBuilder, PathFinder};
use concept_bridge::storage::{SqliteStorage, Storage};

struct StubStages;

#[async_trait]
impl PathFinder for StubStages {
    async fn find(
        &self,
        concept_a: &str,
        concept_b: &str,
        _level: Level,
        _ctx: &QueryContext,
    ) -> ModelResult<ConnectionOutcome> {
        Ok(ConnectionOutcome::Parsed(
            Connection::parsed(
                vec![concept_a.to_string(), concept_b.to_string()],
                vec!["physics".to_string(), "astronomy".to_string()],
                0.8,
            )
            .unwrap(),
        ))
    }
}

#[async_trait]
impl NarrativeBuilder for StubStages {
    async fn build(
        &self,
        _connection: &Connection,
        _level: Level,
        _profile: &Profile,
        _guidance: &str,
        concept_a: &str,
        concept_b: &str,
    ) -> ModelResult<Narrative> {
        Ok(Narrative {
            explanation: format!("{} connects to {}.", concept_a, concept_b),
            analogies: vec!["Like a chain".to_string()],
        })
    }
}

#[async_trait]
impl BiasReviewer for StubStages {
    async fn review(&self, _bundle: &ReviewBundle) -> ModelResult<BiasVerdict> {
        Ok(BiasVerdict::default())
    }
}

#[async_trait]
impl LevelReviewer for StubStages {
    async fn evaluate(
        &self,
        _bundle: &ReviewBundle,
        _level: Level,
        _profile: &Profile,
        _concept_a: &str,
        _concept_b: &str,
    ) -> ModelResult<ContentVerdict> {
        Ok(ContentVerdict::default())
    }
}

async fn test_context() -> AppContext {
    let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::new_in_memory().await.unwrap());
    let stages = Arc::new(StubStages);

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&storage),
        Arc::clone(&stages) as Arc<dyn PathFinder>,
        Arc::clone(&stages) as Arc<dyn NarrativeBuilder>,
        Arc::clone(&stages) as Arc<dyn BiasReviewer>,
        stages as Arc<dyn LevelReviewer>,
        PipelineConfig::default(),
    ));

    AppContext {
        orchestrator,
        storage,
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = router(test_context().await);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_connect_returns_full_result_and_stores_profile() {
    let ctx = test_context().await;
    let app = router(ctx.clone());

    let response = app
        .oneshot(post_json(
            "/api/connect",
            json!({
                "concept_a": "Gravity",
                "concept_b": "Orbits",
                "knowledge_level": "beginner",
                "session_id": "s-1",
                "education_level": "high school",
                "concept_a_knowledge": 3,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["concept_a"], "Gravity");
    assert_eq!(body["level"], "beginner");
    assert!(body["narrative"]["explanation"]
        .as_str()
        .unwrap()
        .contains("Gravity"));
    assert_eq!(body["bias_flag"], false);
    assert!(body["timeline"].as_array().unwrap().len() >= 4);

    // The explicit profile update path ran before the pipeline.
    let profile = ctx.storage.get_profile("s-1").await.unwrap();
    assert_eq!(profile.education_level.as_deref(), Some("high school"));
    assert_eq!(profile.concept_a_knowledge, 3);
}

#[tokio::test]
async fn test_connect_rejects_blank_concept() {
    let app = router(test_context().await);

    let response = app
        .oneshot(post_json(
            "/api/connect",
            json!({ "concept_a": "  ", "concept_b": "Orbits" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("concept_a"));
}

#[tokio::test]
async fn test_profile_roundtrip_over_http() {
    let app = router(test_context().await);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/profile",
            json!({
                "session_id": "s-9",
                "knowledge_level": "advanced",
                "education_level": "PhD",
                "education_system": null,
                "concept_a_knowledge": 5,
                "concept_b_knowledge": 2,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get("/api/profile?session_id=s-9"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["knowledge_level"], "advanced");
    assert_eq!(body["education_level"], "PhD");
}

#[tokio::test]
async fn test_profile_requires_session_id() {
    let app = router(test_context().await);

    let response = app.oneshot(get("/api/profile")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_feedback_and_fairness_history() {
    let ctx = test_context().await;
    let app = router(ctx.clone());

    // Serve one query into history first.
    app.clone()
        .oneshot(post_json(
            "/api/connect",
            json!({
                "concept_a": "Gravity",
                "concept_b": "Orbits",
                "session_id": "s-2",
            }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/feedback",
            json!({ "session_id": "s-2", "rating": 5, "comments": "great bridge" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get("/api/fairness?session_id=s-2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["aggregate"]["runs"], 1);
    assert_eq!(body["aggregate"]["bias_flags"], 0);
    assert!(body["aggregate"]["avg_overall"].is_number());
}

#[tokio::test]
async fn test_metrics_endpoint_combines_pipeline_and_database() {
    let ctx = test_context().await;
    let app = router(ctx.clone());

    app.clone()
        .oneshot(post_json(
            "/api/connect",
            json!({ "concept_a": "Heat", "concept_b": "Entropy" }),
        ))
        .await
        .unwrap();

    let response = app.oneshot(get("/api/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["pipeline"]["cache_misses"], 1);
    assert_eq!(body["database"]["total_queries"], 1);
}
