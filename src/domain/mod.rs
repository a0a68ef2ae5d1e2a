//! Core data model for the bridge pipeline.
//!
//! These types flow between the orchestrator, the model-backed stages, the
//! fairness auditor, and the storage layer. `BridgeResult` is the externally
//! visible artifact; everything else is an ingredient of it.

use serde::{Deserialize, Serialize};

/// Learner proficiency tier controlling prompt complexity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Simple language, everyday examples.
    Beginner,
    /// Some technical terms with explanations.
    #[default]
    Intermediate,
    /// Technical precision, assumes background knowledge.
    Advanced,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Beginner => write!(f, "beginner"),
            Level::Intermediate => write!(f, "intermediate"),
            Level::Advanced => write!(f, "advanced"),
        }
    }
}

impl std::str::FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beginner" => Ok(Level::Beginner),
            "intermediate" => Ok(Level::Intermediate),
            "advanced" => Ok(Level::Advanced),
            _ => Err(format!("Unknown level: {}", s)),
        }
    }
}

/// Per-session learner attributes.
///
/// Read from storage at query start; callers may override individual fields
/// per request via [`ProfileOverrides`]. Written back to storage only through
/// the explicit profile update path, never by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Self-reported knowledge level label.
    pub knowledge_level: String,
    /// Education level (free-form, e.g. "undergrad").
    pub education_level: Option<String>,
    /// Education system (free-form, e.g. "UK").
    pub education_system: Option<String>,
    /// Familiarity with the first concept (0-5).
    pub concept_a_knowledge: i64,
    /// Familiarity with the second concept (0-5).
    pub concept_b_knowledge: i64,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            knowledge_level: Level::Intermediate.to_string(),
            education_level: None,
            education_system: None,
            concept_a_knowledge: 0,
            concept_b_knowledge: 0,
        }
    }
}

impl Profile {
    /// Apply caller-supplied overrides. Only non-null override fields win;
    /// a `None` override leaves the stored value unchanged.
    pub fn apply_overrides(&mut self, overrides: &ProfileOverrides) {
        if let Some(level) = &overrides.knowledge_level {
            self.knowledge_level = level.clone();
        }
        if let Some(education_level) = &overrides.education_level {
            self.education_level = Some(education_level.clone());
        }
        if let Some(education_system) = &overrides.education_system {
            self.education_system = Some(education_system.clone());
        }
        if let Some(rating) = overrides.concept_a_knowledge {
            self.concept_a_knowledge = rating.clamp(0, 5);
        }
        if let Some(rating) = overrides.concept_b_knowledge {
            self.concept_b_knowledge = rating.clamp(0, 5);
        }
    }
}

/// Per-request profile overrides supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileOverrides {
    /// Override for the knowledge level label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knowledge_level: Option<String>,
    /// Override for the education level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education_level: Option<String>,
    /// Override for the education system.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education_system: Option<String>,
    /// Override for the first-concept familiarity rating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concept_a_knowledge: Option<i64>,
    /// Override for the second-concept familiarity rating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concept_b_knowledge: Option<i64>,
}

/// A prior concept pair from session history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptPair {
    /// First concept of the prior query.
    pub concept_a: String,
    /// Second concept of the prior query.
    pub concept_b: String,
}

/// The discovered bridge between two concepts.
///
/// Invariant: `path` and `disciplines` always have the same length, between
/// 2 and 8 (the two inputs plus up to 6 intermediates).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Ordered concept labels from the first input to the second.
    pub path: Vec<String>,
    /// One discipline label per path entry.
    pub disciplines: Vec<String>,
    /// How direct the connection is (0.0 = very abstract, 1.0 = direct).
    pub strength: f64,
}

/// Minimum number of labels in a connection path (the two inputs).
pub const MIN_PATH_LEN: usize = 2;
/// Maximum number of labels in a connection path (inputs plus 6 intermediates).
pub const MAX_PATH_LEN: usize = 8;

impl Connection {
    /// Validate a parsed payload into a connection.
    ///
    /// Returns `None` when the path length is out of range or the discipline
    /// list does not run parallel to the path.
    pub fn parsed(path: Vec<String>, disciplines: Vec<String>, strength: f64) -> Option<Self> {
        if path.len() < MIN_PATH_LEN || path.len() > MAX_PATH_LEN {
            return None;
        }
        if path.len() != disciplines.len() {
            return None;
        }
        if path.iter().any(|label| label.trim().is_empty()) {
            return None;
        }
        Some(Self {
            path,
            disciplines,
            strength: strength.clamp(0.0, 1.0),
        })
    }

    /// Two-node placeholder used when the path finder returns nothing usable.
    pub fn fallback(concept_a: &str, concept_b: &str) -> Self {
        Self {
            path: vec![concept_a.to_string(), concept_b.to_string()],
            disciplines: vec!["general".to_string(), "general".to_string()],
            strength: 0.0,
        }
    }
}

/// Outcome of the connection stage: a validated model path or the
/// deterministic fallback substituted for unusable output.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionOutcome {
    /// The model returned a usable, validated path.
    Parsed(Connection),
    /// No usable path; downstream stages run on a placeholder.
    Fallback(Connection),
}

impl ConnectionOutcome {
    /// Whether this is the fallback placeholder.
    pub fn is_fallback(&self) -> bool {
        matches!(self, ConnectionOutcome::Fallback(_))
    }

    /// Access the connection either way.
    pub fn connection(&self) -> &Connection {
        match self {
            ConnectionOutcome::Parsed(c) | ConnectionOutcome::Fallback(c) => c,
        }
    }

    /// Consume into the inner connection.
    pub fn into_connection(self) -> Connection {
        match self {
            ConnectionOutcome::Parsed(c) | ConnectionOutcome::Fallback(c) => c,
        }
    }
}

/// Explanation text plus a small set of analogies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    /// Markdown explanation tailored to the learner.
    pub explanation: String,
    /// Short analogy strings (typically 2-3).
    pub analogies: Vec<String>,
}

/// Bias verdict from the bias review stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BiasVerdict {
    /// Whether bias was flagged.
    pub has_bias: bool,
    /// Specific issues with actionable suggestions.
    pub reasons: Vec<String>,
}

/// Bias-risk tier reported by the content reviewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiasRisk {
    /// Low risk.
    Low,
    /// Medium risk.
    Medium,
    /// High risk.
    High,
    /// Reviewer did not report a tier.
    #[default]
    Unknown,
}

impl std::fmt::Display for BiasRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BiasRisk::Low => write!(f, "low"),
            BiasRisk::Medium => write!(f, "medium"),
            BiasRisk::High => write!(f, "high"),
            BiasRisk::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for BiasRisk {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(BiasRisk::Low),
            "medium" => Ok(BiasRisk::Medium),
            "high" => Ok(BiasRisk::High),
            "unknown" => Ok(BiasRisk::Unknown),
            _ => Err(format!("Unknown bias risk: {}", s)),
        }
    }
}

/// Level-alignment verdict from the content review stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentVerdict {
    /// Whether the content matches the target learner level.
    pub level_alignment: bool,
    /// Description of the detected reading level.
    pub reading_level: String,
    /// Specific problems found.
    pub issues: Vec<String>,
    /// Concrete steps to fix the issues.
    pub suggested_actions: Vec<String>,
    /// Reviewer's bias-risk tier.
    pub bias_risk: BiasRisk,
}

impl Default for ContentVerdict {
    fn default() -> Self {
        Self {
            level_alignment: true,
            reading_level: "unknown".to_string(),
            issues: Vec::new(),
            suggested_actions: Vec::new(),
            bias_risk: BiasRisk::Unknown,
        }
    }
}

/// One explainable fairness metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessMetric {
    /// Human-readable metric name.
    pub label: String,
    /// Metric value in [0, 1].
    pub value: f64,
    /// How the value was computed.
    pub detail: String,
}

/// Deterministic fairness report over a generated bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessReport {
    /// Distinct-discipline ratio across the connection path.
    pub discipline_diversity: FairnessMetric,
    /// Short-word ratio of the explanation text.
    pub language_accessibility: FairnessMetric,
    /// Distinct-opening ratio across the analogies.
    pub analogy_variety: FairnessMetric,
    /// Mean of the three metric values.
    pub overall: f64,
}

/// One timeline entry describing a pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    /// Stage name (e.g. "connection", "mitigation_aborted").
    pub stage: String,
    /// Wall-clock duration of the stage in milliseconds.
    pub duration_ms: u64,
    /// One-line description of what happened.
    pub detail: String,
}

impl StageTiming {
    /// Create a timeline entry.
    pub fn new(stage: impl Into<String>, duration_ms: u64, detail: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            duration_ms,
            detail: detail.into(),
        }
    }
}

/// Regeneration strategy used by the mitigation loop, escalating by attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    /// Address reviewer issues with high priority.
    Emphasis,
    /// Use simpler language and structure.
    Simplification,
    /// Reorganize with a fresh approach.
    Restructure,
}

impl RetryStrategy {
    /// Strategy for a given 1-based mitigation attempt.
    pub fn for_attempt(attempt: u32) -> Self {
        match attempt {
            1 => RetryStrategy::Emphasis,
            2 => RetryStrategy::Simplification,
            _ => RetryStrategy::Restructure,
        }
    }

    /// Instruction prefix injected into the regeneration guidance.
    pub fn instruction(&self) -> &'static str {
        match self {
            RetryStrategy::Emphasis => "Address the reviewer's issues with high priority.",
            RetryStrategy::Simplification => "Use simpler language and a simpler structure.",
            RetryStrategy::Restructure => "Reorganize the explanation with a fresh approach.",
        }
    }
}

impl std::fmt::Display for RetryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryStrategy::Emphasis => write!(f, "emphasis"),
            RetryStrategy::Simplification => write!(f, "simplification"),
            RetryStrategy::Restructure => write!(f, "restructure"),
        }
    }
}

/// Record of a mitigation episode attached to the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MitigationRecord {
    /// Strategy that cleared the review flags, if any attempt did.
    pub strategy: Option<RetryStrategy>,
    /// Guidance text used on the last regeneration attempt.
    pub guidance: String,
    /// Regeneration attempts performed.
    pub attempts: u32,
    /// Whether the retry budget ran out without clearing the flags.
    pub aborted: bool,
}

/// The externally visible artifact of one query.
///
/// Always structurally complete: soft stage failures are absorbed into
/// fallback content, and review findings are reported as data rather than
/// errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeResult {
    /// Unique result identifier, referenced by feedback rows.
    pub id: String,
    /// First input concept, as supplied.
    pub concept_a: String,
    /// Second input concept, as supplied.
    pub concept_b: String,
    /// Target learner level.
    pub level: Level,
    /// The discovered (or fallback) connection path.
    pub connection: Connection,
    /// Explanation and analogies (never entirely absent).
    pub narrative: Narrative,
    /// Bias review verdict from the final pass.
    pub bias_review: BiasVerdict,
    /// Content review verdict from the final pass.
    pub content_review: ContentVerdict,
    /// Fairness report over the final bundle.
    pub fairness: FairnessReport,
    /// Guidance text injected into generation prompts.
    pub guidance: String,
    /// Convenience mirror of `bias_review.has_bias`.
    pub bias_flag: bool,
    /// Whether a mitigation retry cleared the review flags.
    pub mitigated: bool,
    /// Mitigation metadata, present when the loop was triggered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mitigation: Option<MitigationRecord>,
    /// Stage timings and descriptions in execution order.
    pub timeline: Vec<StageTiming>,
}

/// Lookup key for the result cache.
///
/// Lowercased but order-sensitive: `(A, B)` and `(B, A)` are distinct
/// entries, since concept order is part of the query's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    concept_a: String,
    concept_b: String,
    level: String,
}

impl CacheKey {
    /// Build a key from raw query inputs.
    pub fn new(concept_a: &str, concept_b: &str, level: Level) -> Self {
        Self {
            concept_a: concept_a.trim().to_lowercase(),
            concept_b: concept_b.trim().to_lowercase(),
            level: level.to_string(),
        }
    }
}

/// Request-scoped context assembled once per query.
#[derive(Debug, Clone)]
pub struct QueryContext {
    /// Recent concept pairs for this session, most recent first.
    pub history: Vec<ConceptPair>,
    /// Effective learner profile (stored values plus overrides).
    pub profile: Profile,
    /// Feedback-derived guidance string for generation prompts.
    pub guidance: String,
    /// Target level for this query.
    pub level: Level,
    /// Session the query belongs to, if any.
    pub session_id: Option<String>,
}

/// Snapshot of generated content handed to both review stages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewBundle {
    /// The connection under review.
    pub connection: Connection,
    /// The explanation text under review.
    pub explanation: String,
    /// The analogies under review.
    pub analogies: Vec<String>,
}
