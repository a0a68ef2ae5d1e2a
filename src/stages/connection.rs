use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::PathFinder;
use crate::domain::{Connection, ConnectionOutcome, Level, QueryContext};
use crate::error::ModelResult;
use crate::model::{extract, OllamaClient};
use crate::prompts::CONNECTION_SYSTEM_PROMPT;

const TEMPERATURE: f64 = 0.5;

/// Ollama-backed connection stage handler
#[derive(Clone)]
pub struct ConnectionFinder {
    client: OllamaClient,
}

/// Expected payload from the connection prompt
#[derive(Debug, Deserialize)]
struct ConnectionPayload {
    #[serde(default)]
    path: Vec<String>,
    #[serde(default)]
    disciplines: Vec<String>,
    #[serde(default)]
    strength: f64,
}

/// Some models wrap the object in a one-element list
#[derive(Debug, Deserialize)]
struct ConnectionListPayload {
    connections: Vec<ConnectionPayload>,
}

impl ConnectionFinder {
    /// Create a new connection stage handler
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }

    fn build_user_prompt(
        concept_a: &str,
        concept_b: &str,
        level: Level,
        ctx: &QueryContext,
    ) -> String {
        let history = if ctx.history.is_empty() {
            "none".to_string()
        } else {
            ctx.history
                .iter()
                .map(|pair| format!("{} -> {}", pair.concept_a, pair.concept_b))
                .collect::<Vec<_>>()
                .join("; ")
        };

        format!(
            "Find one conceptual path that links \"{concept_a}\" and \"{concept_b}\".\n\n\
             Context (recent queries): {history}\n\
             Learner knowledge level: {level}\n\
             Learner profile:\n\
             - Education level: {education_level}\n\
             - Education system: {education_system}\n\
             - Prior knowledge of \"{concept_a}\": {a_rating}/5\n\
             - Prior knowledge of \"{concept_b}\": {b_rating}/5\n\
             Learner feedback/preferences to respect: {guidance}\n\n\
             Ensure the path is appropriate for a {level} learner and return ONLY valid JSON.",
            education_level = ctx.profile.education_level.as_deref().unwrap_or("unspecified"),
            education_system = ctx.profile.education_system.as_deref().unwrap_or("unspecified"),
            a_rating = ctx.profile.concept_a_knowledge,
            b_rating = ctx.profile.concept_b_knowledge,
            guidance = if ctx.guidance.is_empty() { "none" } else { &ctx.guidance },
        )
    }
}

#[async_trait]
impl PathFinder for ConnectionFinder {
    async fn find(
        &self,
        concept_a: &str,
        concept_b: &str,
        level: Level,
        ctx: &QueryContext,
    ) -> ModelResult<ConnectionOutcome> {
        let prompt = Self::build_user_prompt(concept_a, concept_b, level, ctx);
        let text = self
            .client
            .generate(&prompt, CONNECTION_SYSTEM_PROMPT, TEMPERATURE)
            .await?;

        let outcome = parse_connection(&text, concept_a, concept_b);
        if outcome.is_fallback() {
            warn!(
                concept_a,
                concept_b,
                chars = text.len(),
                "Path finder returned no usable path, using fallback connection"
            );
        } else {
            debug!(
                concept_a,
                concept_b,
                path_len = outcome.connection().path.len(),
                strength = outcome.connection().strength,
                "Connection path parsed"
            );
        }
        Ok(outcome)
    }
}

/// Parse and validate model output into a connection, degrading to the
/// two-node fallback when nothing usable is recovered.
fn parse_connection(text: &str, concept_a: &str, concept_b: &str) -> ConnectionOutcome {
    let payload = extract::parse_lenient::<ConnectionPayload>(text).or_else(|| {
        extract::parse_lenient::<ConnectionListPayload>(text)
            .and_then(|list| list.connections.into_iter().next())
    });

    match payload.and_then(|p| Connection::parsed(p.path, p.disciplines, p.strength)) {
        Some(connection) => ConnectionOutcome::Parsed(connection),
        None => ConnectionOutcome::Fallback(Connection::fallback(concept_a, concept_b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Profile;

    fn test_ctx() -> QueryContext {
        QueryContext {
            history: Vec::new(),
            profile: Profile::default(),
            guidance: String::new(),
            level: Level::Intermediate,
            session_id: None,
        }
    }

    #[test]
    fn test_parse_valid_connection() {
        let text = r#"{"path": ["Gravity", "Curvature", "Orbits"], "disciplines": ["physics", "mathematics", "astronomy"], "strength": 0.85}"#;
        let outcome = parse_connection(text, "Gravity", "Orbits");
        assert!(!outcome.is_fallback());
        assert_eq!(outcome.connection().path.len(), 3);
    }

    #[test]
    fn test_parse_wrapped_list() {
        let text = r#"{"connections": [{"path": ["A", "B"], "disciplines": ["cs", "math"], "strength": 0.7}]}"#;
        let outcome = parse_connection(text, "A", "B");
        assert!(!outcome.is_fallback());
        assert_eq!(outcome.connection().strength, 0.7);
    }

    #[test]
    fn test_mismatched_disciplines_fall_back() {
        let text = r#"{"path": ["A", "B", "C"], "disciplines": ["cs"], "strength": 0.7}"#;
        let outcome = parse_connection(text, "A", "C");
        assert!(outcome.is_fallback());
        assert_eq!(outcome.connection().path, vec!["A", "C"]);
    }

    #[test]
    fn test_prose_falls_back() {
        let outcome = parse_connection("I could not find a connection.", "Music", "Math");
        assert!(outcome.is_fallback());
        assert_eq!(outcome.connection().strength, 0.0);
    }

    #[test]
    fn test_user_prompt_mentions_profile_and_history() {
        let mut ctx = test_ctx();
        ctx.history.push(crate::domain::ConceptPair {
            concept_a: "Heat".to_string(),
            concept_b: "Entropy".to_string(),
        });
        ctx.profile.education_level = Some("undergrad".to_string());
        ctx.guidance = "keep it playful".to_string();

        let prompt =
            ConnectionFinder::build_user_prompt("Gravity", "Orbits", Level::Beginner, &ctx);
        assert!(prompt.contains("Gravity"));
        assert!(prompt.contains("Heat -> Entropy"));
        assert!(prompt.contains("undergrad"));
        assert!(prompt.contains("keep it playful"));
        assert!(prompt.contains("beginner learner"));
    }
}
