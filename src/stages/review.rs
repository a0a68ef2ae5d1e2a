use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::LevelReviewer;
use crate::domain::{BiasRisk, ContentVerdict, Level, Profile, ReviewBundle};
use crate::error::ModelResult;
use crate::model::{extract, OllamaClient};
use crate::prompts::REVIEW_SYSTEM_PROMPT;

const TEMPERATURE: f64 = 0.2;

/// Ollama-backed content review handler
#[derive(Clone)]
pub struct ContentReviewer {
    client: OllamaClient,
}

/// Expected payload from the content review prompt
#[derive(Debug, Deserialize)]
struct ReviewPayload {
    #[serde(default = "default_alignment")]
    level_alignment: bool,
    #[serde(default = "default_reading_level")]
    reading_level: String,
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    suggested_actions: Vec<String>,
    #[serde(default = "default_bias_risk")]
    bias_risk: String,
}

fn default_alignment() -> bool {
    true
}

fn default_reading_level() -> String {
    "unknown".to_string()
}

fn default_bias_risk() -> String {
    "unknown".to_string()
}

impl ContentReviewer {
    /// Create a new content review handler
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }

    fn build_user_prompt(
        bundle: &ReviewBundle,
        level: Level,
        profile: &Profile,
        concept_a: &str,
        concept_b: &str,
    ) -> String {
        let content = serde_json::to_string(bundle).unwrap_or_else(|_| "{}".to_string());
        format!(
            "Evaluate whether the following content matches the learner profile.\n\n\
             Target learner profile:\n\
             - Knowledge level: {level}\n\
             - Education level: {education_level}\n\
             - Education system: {education_system}\n\
             - Prior knowledge ratings: \"{concept_a}\": {a_rating}/5, \"{concept_b}\": {b_rating}/5\n\n\
             Content to review:\n{content}\n\n\
             Assess vocabulary, explanation depth, prior-knowledge fit, analogy pitch, and \
             structure. Be specific about what needs to change if the content is misaligned. \
             Return ONLY valid JSON.",
            education_level = profile.education_level.as_deref().unwrap_or("unspecified"),
            education_system = profile.education_system.as_deref().unwrap_or("unspecified"),
            a_rating = profile.concept_a_knowledge,
            b_rating = profile.concept_b_knowledge,
        )
    }
}

#[async_trait]
impl LevelReviewer for ContentReviewer {
    async fn evaluate(
        &self,
        bundle: &ReviewBundle,
        level: Level,
        profile: &Profile,
        concept_a: &str,
        concept_b: &str,
    ) -> ModelResult<ContentVerdict> {
        let prompt = Self::build_user_prompt(bundle, level, profile, concept_a, concept_b);
        let text = self
            .client
            .generate(&prompt, REVIEW_SYSTEM_PROMPT, TEMPERATURE)
            .await?;

        let verdict = parse_review(&text);
        debug!(
            level_alignment = verdict.level_alignment,
            reading_level = %verdict.reading_level,
            issues = verdict.issues.len(),
            "Content review parsed"
        );
        Ok(verdict)
    }
}

/// Parse model output into a content verdict.
///
/// Prose that contains no JSON is treated as a misalignment report: the text
/// becomes the single issue and a generic rewrite action is suggested, so a
/// reviewer that ignores the schema still produces actionable output.
fn parse_review(text: &str) -> ContentVerdict {
    if let Some(payload) = extract::parse_lenient::<ReviewPayload>(text) {
        return ContentVerdict {
            level_alignment: payload.level_alignment,
            reading_level: payload.reading_level,
            issues: payload.issues,
            suggested_actions: payload.suggested_actions,
            bias_risk: payload.bias_risk.parse::<BiasRisk>().unwrap_or_default(),
        };
    }

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ContentVerdict::default();
    }

    ContentVerdict {
        level_alignment: false,
        reading_level: "unknown".to_string(),
        issues: vec![trimmed.to_string()],
        suggested_actions: vec!["Rewrite to match the requested learner level.".to_string()],
        bias_risk: BiasRisk::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Connection;

    #[test]
    fn test_parse_aligned_verdict() {
        let text = r#"{"level_alignment": true, "reading_level": "B1 CEFR", "issues": [], "suggested_actions": [], "bias_risk": "low"}"#;
        let verdict = parse_review(text);
        assert!(verdict.level_alignment);
        assert_eq!(verdict.reading_level, "B1 CEFR");
        assert_eq!(verdict.bias_risk, BiasRisk::Low);
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let verdict = parse_review(r#"{"level_alignment": false}"#);
        assert!(!verdict.level_alignment);
        assert_eq!(verdict.reading_level, "unknown");
        assert_eq!(verdict.bias_risk, BiasRisk::Unknown);
    }

    #[test]
    fn test_prose_becomes_misalignment_issue() {
        let verdict = parse_review("Too advanced for a beginner.");
        assert!(!verdict.level_alignment);
        assert_eq!(verdict.issues, vec!["Too advanced for a beginner."]);
        assert_eq!(
            verdict.suggested_actions,
            vec!["Rewrite to match the requested learner level."]
        );
    }

    #[test]
    fn test_unknown_bias_risk_string() {
        let verdict = parse_review(r#"{"bias_risk": "catastrophic"}"#);
        assert_eq!(verdict.bias_risk, BiasRisk::Unknown);
    }

    #[test]
    fn test_user_prompt_includes_profile() {
        let bundle = ReviewBundle {
            connection: Connection::fallback("A", "B"),
            explanation: "text".to_string(),
            analogies: Vec::new(),
        };
        let mut profile = Profile::default();
        profile.education_system = Some("IB".to_string());
        let prompt =
            ContentReviewer::build_user_prompt(&bundle, Level::Beginner, &profile, "A", "B");
        assert!(prompt.contains("beginner"));
        assert!(prompt.contains("IB"));
    }
}
