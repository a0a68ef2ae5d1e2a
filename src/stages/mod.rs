//! Pipeline stage collaborators.
//!
//! Each model-backed stage is a trait (so the orchestrator can be exercised
//! with stubs) plus an Ollama-backed handler. The fairness auditor and the
//! feedback adapter are pure local computations with no model call.

mod bias;
mod connection;
mod fairness;
mod feedback;
mod narrative;
mod review;

pub use bias::BiasMonitor;
pub use connection::ConnectionFinder;
pub use fairness::FairnessAuditor;
pub use feedback::FeedbackAdapter;
pub use narrative::ExplanationBuilder;
pub use review::ContentReviewer;

use async_trait::async_trait;

use crate::domain::{
    BiasVerdict, Connection, ConnectionOutcome, ContentVerdict, Level, Narrative, Profile,
    QueryContext, ReviewBundle,
};
use crate::error::ModelResult;

/// Finds a conceptual path between two concepts.
#[async_trait]
pub trait PathFinder: Send + Sync {
    /// Discover a candidate path for the given concepts and context.
    ///
    /// Malformed model output degrades to [`ConnectionOutcome::Fallback`];
    /// only transport failures surface as errors.
    async fn find(
        &self,
        concept_a: &str,
        concept_b: &str,
        level: Level,
        ctx: &QueryContext,
    ) -> ModelResult<ConnectionOutcome>;
}

/// Builds the explanation and analogies for a connection.
#[async_trait]
pub trait NarrativeBuilder: Send + Sync {
    /// Generate a narrative for the connection.
    ///
    /// May return an empty explanation on unusable model output; the
    /// orchestrator's safe wrapper substitutes the fallback text.
    async fn build(
        &self,
        connection: &Connection,
        level: Level,
        profile: &Profile,
        guidance: &str,
        concept_a: &str,
        concept_b: &str,
    ) -> ModelResult<Narrative>;
}

/// Reviews a generated bundle for bias.
#[async_trait]
pub trait BiasReviewer: Send + Sync {
    /// Produce a fresh bias verdict for the bundle.
    async fn review(&self, bundle: &ReviewBundle) -> ModelResult<BiasVerdict>;
}

/// Reviews a generated bundle for learner-level alignment.
#[async_trait]
pub trait LevelReviewer: Send + Sync {
    /// Produce a fresh content verdict for the bundle.
    async fn evaluate(
        &self,
        bundle: &ReviewBundle,
        level: Level,
        profile: &Profile,
        concept_a: &str,
        concept_b: &str,
    ) -> ModelResult<ContentVerdict>;
}
