use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::cache::ResultCache;
use super::limiter::RateLimiter;
use super::metrics::{MetricsCollector, MetricsSnapshot};
use crate::config::PipelineConfig;
use crate::domain::{
    BiasVerdict, BridgeResult, CacheKey, Connection, ContentVerdict, Level, MitigationRecord,
    Narrative, Profile, ProfileOverrides, QueryContext, RetryStrategy, ReviewBundle, StageTiming,
};
use crate::error::{AppError, AppResult};
use crate::model::OllamaClient;
use crate::stages::{
    BiasMonitor, BiasReviewer, ConnectionFinder, ContentReviewer, ExplanationBuilder,
    FairnessAuditor, FeedbackAdapter, LevelReviewer, NarrativeBuilder, PathFinder,
};
use crate::storage::Storage;

/// Top-level pipeline controller.
///
/// Sequences the stages (context → connection → narrative → review →
/// optional mitigation loop), owns the result cache, the rate limiter, and
/// the metrics collector, and absorbs soft stage failures into fallback
/// content so callers always receive a well-formed [`BridgeResult`].
pub struct Orchestrator {
    storage: Arc<dyn Storage>,
    path_finder: Arc<dyn PathFinder>,
    explainer: Arc<dyn NarrativeBuilder>,
    bias: Arc<dyn BiasReviewer>,
    reviewer: Arc<dyn LevelReviewer>,
    feedback: FeedbackAdapter,
    fairness: FairnessAuditor,
    cache: ResultCache,
    limiter: RateLimiter,
    metrics: MetricsCollector,
    config: PipelineConfig,
}

impl Orchestrator {
    /// Regeneration attempts allowed beyond the initial pass.
    pub const MAX_RETRIES: u32 = 2;

    /// Create an orchestrator over explicit collaborators.
    pub fn new(
        storage: Arc<dyn Storage>,
        path_finder: Arc<dyn PathFinder>,
        explainer: Arc<dyn NarrativeBuilder>,
        bias: Arc<dyn BiasReviewer>,
        reviewer: Arc<dyn LevelReviewer>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            storage,
            path_finder,
            explainer,
            bias,
            reviewer,
            feedback: FeedbackAdapter::new(),
            fairness: FairnessAuditor::new(),
            cache: ResultCache::new(config.cache_capacity),
            limiter: RateLimiter::new(
                config.rate_limit_max_requests,
                Duration::from_secs(config.rate_limit_window_secs),
            ),
            metrics: MetricsCollector::new(),
            config,
        }
    }

    /// Create an orchestrator whose model stages all share one Ollama client.
    pub fn with_client(
        storage: Arc<dyn Storage>,
        client: OllamaClient,
        config: PipelineConfig,
    ) -> Self {
        Self::new(
            storage,
            Arc::new(ConnectionFinder::new(client.clone())),
            Arc::new(ExplanationBuilder::new(client.clone())),
            Arc::new(BiasMonitor::new(client.clone())),
            Arc::new(ContentReviewer::new(client)),
            config,
        )
    }

    /// Run the full pipeline for one query.
    ///
    /// Soft failures (empty or malformed model output) are absorbed into
    /// fallback content; only transport-level failures of the connection and
    /// review stages surface as errors.
    pub async fn process_query(
        &self,
        concept_a: &str,
        concept_b: &str,
        level: Level,
        session_id: Option<&str>,
        overrides: Option<&ProfileOverrides>,
    ) -> AppResult<BridgeResult> {
        let concept_a = concept_a.trim();
        let concept_b = concept_b.trim();
        validate_concept("concept_a", concept_a)?;
        validate_concept("concept_b", concept_b)?;

        let key = CacheKey::new(concept_a, concept_b, level);
        if let Some(result) = self.cache.get(&key) {
            self.metrics.record_cache_hit();
            info!(concept_a, concept_b, %level, "Cache hit, serving stored result");
            // Cache hits are still served to the session, so they are still
            // recorded against its history.
            self.persist(session_id, concept_a, concept_b, &result).await;
            return Ok(result);
        }
        self.metrics.record_cache_miss();

        let mut timeline: Vec<StageTiming> = Vec::new();

        // Context
        let context_start = Instant::now();
        let ctx = self
            .prepare_context(concept_a, concept_b, level, session_id, overrides)
            .await;
        timeline.push(StageTiming::new(
            "context",
            elapsed_ms(context_start),
            format!(
                "{} prior queries, {} guidance chars",
                ctx.history.len(),
                ctx.guidance.len()
            ),
        ));

        // Connection
        let connection_start = Instant::now();
        let outcome = self
            .path_finder
            .find(concept_a, concept_b, level, &ctx)
            .await
            .map_err(|e| {
                self.metrics.record_collaborator_failure("connection");
                AppError::from(e)
            })?;
        let connection_ms = elapsed_ms(connection_start);
        self.metrics
            .record_stage_duration("connection", connection_ms as f64);
        timeline.push(StageTiming::new(
            "connection",
            connection_ms,
            if outcome.is_fallback() {
                "no bridge identified".to_string()
            } else {
                format!(
                    "path length {}, strength {:.2}",
                    outcome.connection().path.len(),
                    outcome.connection().strength
                )
            },
        ));
        let connection = outcome.into_connection();

        // Narrative
        let mut guidance = ctx.guidance.clone();
        let narrative_start = Instant::now();
        let (mut narrative, used_fallback) = self
            .safe_narrative(&connection, level, &ctx.profile, &guidance, concept_a, concept_b)
            .await;
        let narrative_ms = elapsed_ms(narrative_start);
        self.metrics
            .record_stage_duration("narrative", narrative_ms as f64);
        timeline.push(StageTiming::new(
            "narrative",
            narrative_ms,
            narrative_detail(&narrative, used_fallback),
        ));

        // Review: bias and content run concurrently over one bundle snapshot,
        // fairness is computed locally from the same snapshot.
        let review_start = Instant::now();
        let bundle = make_bundle(&connection, &narrative);
        let (mut bias_verdict, mut content_verdict) = self
            .run_reviews(&bundle, level, &ctx.profile, concept_a, concept_b)
            .await?;
        let mut fairness =
            self.fairness
                .evaluate(&connection, &narrative.explanation, &narrative.analogies);
        let review_ms = elapsed_ms(review_start);
        self.metrics.record_stage_duration("review", review_ms as f64);
        timeline.push(StageTiming::new(
            "review",
            review_ms,
            review_detail(&bias_verdict, &content_verdict, &fairness),
        ));

        // Mitigation loop
        let mut needs_mitigation = bias_verdict.has_bias || !content_verdict.level_alignment;
        let mut mitigation: Option<MitigationRecord> = None;
        let mut mitigated = false;

        if needs_mitigation {
            let mut attempt = 0;
            while attempt < Self::MAX_RETRIES && needs_mitigation {
                attempt += 1;
                let strategy = RetryStrategy::for_attempt(attempt);
                guidance = compose_guidance(
                    strategy,
                    &guidance,
                    &content_verdict.suggested_actions,
                    &bias_verdict.reasons,
                );
                info!(
                    concept_a,
                    concept_b,
                    attempt,
                    %strategy,
                    "Review flagged content, regenerating"
                );

                let attempt_start = Instant::now();
                let (regenerated, fallback_used) = self
                    .safe_narrative(
                        &connection,
                        level,
                        &ctx.profile,
                        &guidance,
                        concept_a,
                        concept_b,
                    )
                    .await;
                narrative = regenerated;

                let bundle = make_bundle(&connection, &narrative);
                let (new_bias, new_content) = self
                    .run_reviews(&bundle, level, &ctx.profile, concept_a, concept_b)
                    .await?;
                bias_verdict = new_bias;
                content_verdict = new_content;
                // Fairness is not part of the trigger condition, but it is
                // cheap and must describe the narrative actually returned.
                fairness = self.fairness.evaluate(
                    &connection,
                    &narrative.explanation,
                    &narrative.analogies,
                );

                needs_mitigation = bias_verdict.has_bias || !content_verdict.level_alignment;
                let attempt_ms = elapsed_ms(attempt_start);
                self.metrics
                    .record_stage_duration("mitigation", attempt_ms as f64);
                timeline.push(StageTiming::new(
                    "mitigation",
                    attempt_ms,
                    format!(
                        "attempt {} ({} strategy): {}{}",
                        attempt,
                        strategy,
                        if needs_mitigation {
                            "flags remain"
                        } else {
                            "flags cleared"
                        },
                        if fallback_used { ", fallback narrative" } else { "" },
                    ),
                ));

                if !needs_mitigation {
                    mitigated = true;
                    mitigation = Some(MitigationRecord {
                        strategy: Some(strategy),
                        guidance: guidance.clone(),
                        attempts: attempt,
                        aborted: false,
                    });
                }
            }

            self.metrics.record_retry(attempt, mitigated);

            if !mitigated {
                warn!(
                    concept_a,
                    concept_b,
                    attempts = attempt,
                    "Mitigation budget exhausted, surfacing flags as-is"
                );
                timeline.push(StageTiming::new(
                    "mitigation_aborted",
                    0,
                    format!("review flags remain after {} regeneration attempts", attempt),
                ));
                mitigation = Some(MitigationRecord {
                    strategy: None,
                    guidance: guidance.clone(),
                    attempts: attempt,
                    aborted: true,
                });
            }
        }

        let bias_flag = bias_verdict.has_bias;
        let result = BridgeResult {
            id: Uuid::new_v4().to_string(),
            concept_a: concept_a.to_string(),
            concept_b: concept_b.to_string(),
            level,
            connection,
            narrative,
            bias_review: bias_verdict,
            content_review: content_verdict,
            fairness,
            guidance,
            bias_flag,
            mitigated,
            mitigation,
            timeline,
        };

        self.persist(session_id, concept_a, concept_b, &result).await;
        self.cache.set(key, &result);

        Ok(result)
    }

    /// Snapshot of the orchestrator's operational metrics.
    pub fn metrics_summary(&self) -> MetricsSnapshot {
        self.metrics.summary()
    }

    /// Assemble the request-scoped context.
    ///
    /// Storage reads are best-effort: a failing history store degrades to
    /// empty history and a default profile rather than failing the query.
    async fn prepare_context(
        &self,
        concept_a: &str,
        concept_b: &str,
        level: Level,
        session_id: Option<&str>,
        overrides: Option<&ProfileOverrides>,
    ) -> QueryContext {
        let mut history = Vec::new();
        let mut profile = Profile::default();
        let mut feedback_rows = Vec::new();

        if let Some(session_id) = session_id {
            match self
                .storage
                .last_queries(session_id, self.config.history_limit)
                .await
            {
                Ok(entries) => history = entries,
                Err(e) => {
                    warn!(session_id, error = %e, "Failed to fetch session history");
                    self.metrics.record_collaborator_failure("history");
                }
            }

            match self.storage.get_profile(session_id).await {
                Ok(stored) => profile = stored,
                Err(e) => {
                    warn!(session_id, error = %e, "Failed to fetch profile, using defaults");
                    self.metrics.record_collaborator_failure("history");
                }
            }

            match self
                .storage
                .recent_feedback(session_id, self.config.feedback_limit)
                .await
            {
                Ok(rows) => feedback_rows = rows,
                Err(e) => {
                    warn!(session_id, error = %e, "Failed to fetch feedback");
                    self.metrics.record_collaborator_failure("history");
                }
            }
        }

        if let Some(overrides) = overrides {
            profile.apply_overrides(overrides);
        }

        let guidance = self.feedback.summarise(&feedback_rows, level);
        debug!(
            concept_a,
            concept_b,
            history = history.len(),
            feedback = feedback_rows.len(),
            "Query context prepared"
        );

        QueryContext {
            history,
            profile,
            guidance,
            level,
            session_id: session_id.map(str::to_string),
        }
    }

    /// Narrative generation behind the rate limiter, with fallback content.
    ///
    /// This is the single place fallback text is generated: a stage
    /// exception or an empty explanation both substitute the deterministic
    /// two-concept fallback (keeping any analogies that were returned).
    async fn safe_narrative(
        &self,
        connection: &Connection,
        level: Level,
        profile: &Profile,
        guidance: &str,
        concept_a: &str,
        concept_b: &str,
    ) -> (Narrative, bool) {
        self.limiter.acquire().await;

        match self
            .explainer
            .build(connection, level, profile, guidance, concept_a, concept_b)
            .await
        {
            Ok(narrative) if !narrative.explanation.trim().is_empty() => (narrative, false),
            Ok(narrative) => {
                warn!(concept_a, concept_b, "Explainer returned empty text, substituting fallback");
                (
                    Narrative {
                        explanation: fallback_explanation(concept_a, concept_b),
                        analogies: narrative.analogies,
                    },
                    true,
                )
            }
            Err(e) => {
                warn!(concept_a, concept_b, error = %e, "Explainer failed, substituting fallback");
                self.metrics.record_collaborator_failure("explanation");
                (
                    Narrative {
                        explanation: fallback_explanation(concept_a, concept_b),
                        analogies: Vec::new(),
                    },
                    true,
                )
            }
        }
    }

    /// Run bias and content review concurrently over one bundle snapshot.
    async fn run_reviews(
        &self,
        bundle: &ReviewBundle,
        level: Level,
        profile: &Profile,
        concept_a: &str,
        concept_b: &str,
    ) -> AppResult<(BiasVerdict, ContentVerdict)> {
        let (bias_result, content_result) = tokio::join!(
            self.bias.review(bundle),
            self.reviewer
                .evaluate(bundle, level, profile, concept_a, concept_b),
        );

        let bias_verdict = bias_result.map_err(|e| {
            self.metrics.record_collaborator_failure("bias");
            AppError::from(e)
        })?;
        let content_verdict = content_result.map_err(|e| {
            self.metrics.record_collaborator_failure("review");
            AppError::from(e)
        })?;

        Ok((bias_verdict, content_verdict))
    }

    /// Best-effort persistence of a served result to session history.
    async fn persist(
        &self,
        session_id: Option<&str>,
        concept_a: &str,
        concept_b: &str,
        result: &BridgeResult,
    ) {
        let payload = match serde_json::to_value(result) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to serialize result for history");
                return;
            }
        };

        if let Err(e) = self
            .storage
            .save_interaction(session_id, concept_a, concept_b, &payload)
            .await
        {
            warn!(concept_a, concept_b, error = %e, "Failed to persist interaction");
            self.metrics.record_collaborator_failure("history");
        }
    }
}

fn validate_concept(field: &str, value: &str) -> AppResult<()> {
    if value.is_empty() {
        return Err(AppError::Validation {
            field: field.to_string(),
            reason: "cannot be empty".to_string(),
        });
    }
    Ok(())
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn make_bundle(connection: &Connection, narrative: &Narrative) -> ReviewBundle {
    ReviewBundle {
        connection: connection.clone(),
        explanation: narrative.explanation.clone(),
        analogies: narrative.analogies.clone(),
    }
}

/// Deterministic fallback explanation; always names both concepts.
fn fallback_explanation(concept_a: &str, concept_b: &str) -> String {
    format!(
        "We were unable to generate a detailed explanation this time. \
         \"{concept_a}\" and \"{concept_b}\" can still be explored together: \
         consider what core principles each relies on, and look for a shared \
         idea, mechanism, or pattern that appears in both. Try the query again \
         for a full walkthrough."
    )
}

fn narrative_detail(narrative: &Narrative, used_fallback: bool) -> String {
    if used_fallback {
        format!(
            "fallback narrative, {} analogies preserved",
            narrative.analogies.len()
        )
    } else {
        format!(
            "explanation {} chars, {} analogies",
            narrative.explanation.len(),
            narrative.analogies.len()
        )
    }
}

fn review_detail(
    bias: &BiasVerdict,
    content: &ContentVerdict,
    fairness: &crate::domain::FairnessReport,
) -> String {
    format!(
        "bias={}, level_alignment={}, fairness={:.2}",
        bias.has_bias, content.level_alignment, fairness.overall
    )
}

/// Compose regeneration guidance from the strategy, prior guidance, and the
/// reviewers' findings. Falls back to a generic rewrite instruction when all
/// inputs are empty.
fn compose_guidance(
    strategy: RetryStrategy,
    prior: &str,
    suggested_actions: &[String],
    bias_reasons: &[String],
) -> String {
    let mut parts = vec![strategy.instruction().to_string()];

    if !prior.trim().is_empty() {
        parts.push(prior.trim().to_string());
    }
    if !suggested_actions.is_empty() {
        parts.push(format!("Reviewer actions: {}", suggested_actions.join("; ")));
    }
    if !bias_reasons.is_empty() {
        parts.push(format!("Bias findings: {}", bias_reasons.join("; ")));
    }

    if parts.len() == 1 {
        parts.push("Rewrite the explanation for clarity and inclusivity.".to_string());
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_guidance_joins_all_sources() {
        let guidance = compose_guidance(
            RetryStrategy::Emphasis,
            "keep it playful",
            &["shorten sentences".to_string()],
            &["car-centric example".to_string()],
        );
        assert!(guidance.starts_with("Address the reviewer's issues with high priority."));
        assert!(guidance.contains("keep it playful"));
        assert!(guidance.contains("Reviewer actions: shorten sentences"));
        assert!(guidance.contains("Bias findings: car-centric example"));
    }

    #[test]
    fn test_compose_guidance_generic_fallback() {
        let guidance = compose_guidance(RetryStrategy::Simplification, "  ", &[], &[]);
        assert_eq!(
            guidance,
            "Use simpler language and a simpler structure. \
             Rewrite the explanation for clarity and inclusivity."
        );
    }

    #[test]
    fn test_fallback_explanation_names_both_concepts() {
        let text = fallback_explanation("Gravity", "Orbits");
        assert!(text.contains("Gravity"));
        assert!(text.contains("Orbits"));
        assert!(!text.trim().is_empty());
    }
}
