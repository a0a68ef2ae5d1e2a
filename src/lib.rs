//! # Concept Bridge
//!
//! A learning service that builds a "conceptual bridge" between two input
//! concepts for a learner at a given proficiency level, by orchestrating
//! multiple calls to a local generative model (Ollama).
//!
//! ## Pipeline
//!
//! ```text
//! context -> connection -> narrative -> review (bias || content) -> mitigation?
//!                                |                         |
//!                          rate limiter             fairness auditor
//! ```
//!
//! The orchestrator caches completed results (bounded LRU), rate-limits
//! narrative generation, and collects process metrics. When automated review
//! flags bias or level misalignment, a bounded mitigation loop regenerates
//! the narrative with escalating strategies; exhaustion is a normal terminal
//! outcome reported as data, never an error.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use concept_bridge::{Config, Orchestrator};
//! use concept_bridge::domain::Level;
//! use concept_bridge::model::OllamaClient;
//! use concept_bridge::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = Arc::new(SqliteStorage::new(&config.database).await?);
//!     let client = OllamaClient::new(&config.ollama, config.request.clone())?;
//!     let orchestrator = Orchestrator::with_client(storage, client, config.pipeline.clone());
//!     let result = orchestrator
//!         .process_query("Gravity", "Orbits", Level::Beginner, None, None)
//!         .await?;
//!     println!("{}", result.narrative.explanation);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Configuration management for the service.
pub mod config;
/// Core data model shared across the pipeline.
pub mod domain;
/// Error types and result aliases for the application.
pub mod error;
/// Ollama client, request types, and lenient JSON recovery.
pub mod model;
/// The orchestration core: controller, cache, rate limiter, metrics.
pub mod pipeline;
/// System prompts for the generation stages.
pub mod prompts;
/// HTTP surface over the orchestrator.
pub mod server;
/// Stage collaborators: model-backed reviewers and pure auditors.
pub mod stages;
/// SQLite persistence for history, feedback, and profiles.
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use pipeline::Orchestrator;
