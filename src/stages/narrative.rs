use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::NarrativeBuilder;
use crate::domain::{Connection, Level, Narrative, Profile};
use crate::error::ModelResult;
use crate::model::{extract, OllamaClient};
use crate::prompts::EXPLAINER_SYSTEM_PROMPT;

const TEMPERATURE: f64 = 0.6;

/// Ollama-backed narrative stage handler
#[derive(Clone)]
pub struct ExplanationBuilder {
    client: OllamaClient,
}

/// Expected payload from the explainer prompt
#[derive(Debug, Deserialize)]
struct NarrativePayload {
    #[serde(default, alias = "explanation")]
    explanation_markdown: String,
    #[serde(default)]
    analogies: Vec<String>,
}

impl ExplanationBuilder {
    /// Create a new narrative stage handler
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }

    fn build_user_prompt(
        connection: &Connection,
        level: Level,
        profile: &Profile,
        guidance: &str,
        concept_a: &str,
        concept_b: &str,
    ) -> String {
        let connection_json =
            serde_json::to_string(connection).unwrap_or_else(|_| "{}".to_string());

        format!(
            "Using the connection object below, explain how \"{concept_a}\" and \"{concept_b}\" \
             relate and craft analogies.\n\n\
             Connection JSON:\n{connection_json}\n\n\
             Learner profile:\n\
             - Knowledge level: {level}\n\
             - Education level: {education_level}\n\
             - Education system: {education_system}\n\
             - Prior knowledge ratings: \"{concept_a}\": {a_rating}/5, \"{concept_b}\": {b_rating}/5\n\
             Additional guidance from prior feedback/reviewers: {guidance}\n\n\
             Walk through the bridge step by step with a concrete example for this learner, \
             adjust vocabulary and depth to the {level} level, and return ONLY valid JSON.",
            education_level = profile.education_level.as_deref().unwrap_or("unspecified"),
            education_system = profile.education_system.as_deref().unwrap_or("unspecified"),
            a_rating = profile.concept_a_knowledge,
            b_rating = profile.concept_b_knowledge,
            guidance = if guidance.is_empty() { "none" } else { guidance },
        )
    }
}

#[async_trait]
impl NarrativeBuilder for ExplanationBuilder {
    async fn build(
        &self,
        connection: &Connection,
        level: Level,
        profile: &Profile,
        guidance: &str,
        concept_a: &str,
        concept_b: &str,
    ) -> ModelResult<Narrative> {
        let prompt =
            Self::build_user_prompt(connection, level, profile, guidance, concept_a, concept_b);
        let text = self
            .client
            .generate(&prompt, EXPLAINER_SYSTEM_PROMPT, TEMPERATURE)
            .await?;

        let narrative = parse_narrative(&text);
        debug!(
            concept_a,
            concept_b,
            explanation_chars = narrative.explanation.len(),
            analogies = narrative.analogies.len(),
            "Narrative parsed"
        );
        Ok(narrative)
    }
}

/// Parse model output into a narrative.
///
/// Unusable output yields an empty narrative; plain prose (no JSON at all)
/// is kept as the explanation so a model that ignores the schema still
/// produces content.
fn parse_narrative(text: &str) -> Narrative {
    if let Some(payload) = extract::parse_lenient::<NarrativePayload>(text) {
        return Narrative {
            explanation: payload.explanation_markdown,
            analogies: payload
                .analogies
                .into_iter()
                .filter(|a| !a.trim().is_empty())
                .collect(),
        };
    }

    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.starts_with('{') {
        return Narrative::default();
    }

    Narrative {
        explanation: trimmed.to_string(),
        analogies: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_structured_narrative() {
        let text = r###"{"explanation_markdown": "## Bridge\nBoth convert energy.", "analogies": ["like a water wheel", ""]}"###;
        let narrative = parse_narrative(text);
        assert!(narrative.explanation.starts_with("## Bridge"));
        // Blank analogies are dropped.
        assert_eq!(narrative.analogies, vec!["like a water wheel"]);
    }

    #[test]
    fn test_parse_alias_field() {
        let text = r#"{"explanation": "plain field name", "analogies": []}"#;
        let narrative = parse_narrative(text);
        assert_eq!(narrative.explanation, "plain field name");
    }

    #[test]
    fn test_plain_prose_is_kept() {
        let narrative = parse_narrative("Both ideas describe feedback loops.");
        assert_eq!(narrative.explanation, "Both ideas describe feedback loops.");
        assert!(narrative.analogies.is_empty());
    }

    #[test]
    fn test_empty_output_yields_empty_narrative() {
        assert_eq!(parse_narrative("   "), Narrative::default());
        assert_eq!(parse_narrative(r#"{"broken"#), Narrative::default());
    }

    #[test]
    fn test_user_prompt_includes_connection_and_guidance() {
        let connection = Connection::fallback("Gravity", "Orbits");
        let prompt = ExplanationBuilder::build_user_prompt(
            &connection,
            Level::Advanced,
            &Profile::default(),
            "avoid sports metaphors",
            "Gravity",
            "Orbits",
        );
        assert!(prompt.contains("\"Gravity\""));
        assert!(prompt.contains("avoid sports metaphors"));
        assert!(prompt.contains("advanced level"));
    }
}
