use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::BiasReviewer;
use crate::domain::{BiasVerdict, ReviewBundle};
use crate::error::ModelResult;
use crate::model::{extract, OllamaClient};
use crate::prompts::BIAS_SYSTEM_PROMPT;

const TEMPERATURE: f64 = 0.2;

/// Ollama-backed bias review handler
#[derive(Clone)]
pub struct BiasMonitor {
    client: OllamaClient,
}

/// Expected payload from the bias review prompt
#[derive(Debug, Deserialize)]
struct BiasPayload {
    #[serde(default)]
    has_bias: bool,
    #[serde(default)]
    reasons: Vec<String>,
}

impl BiasMonitor {
    /// Create a new bias review handler
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }

    fn build_user_prompt(bundle: &ReviewBundle) -> String {
        let content = serde_json::to_string(bundle).unwrap_or_else(|_| "{}".to_string());
        format!(
            "Review the following generated content for bias, diversity, and accessibility \
             issues:\n\n{content}\n\n\
             Be specific and actionable. If you find issues, suggest concrete alternatives. \
             Return ONLY valid JSON."
        )
    }
}

#[async_trait]
impl BiasReviewer for BiasMonitor {
    async fn review(&self, bundle: &ReviewBundle) -> ModelResult<BiasVerdict> {
        let prompt = Self::build_user_prompt(bundle);
        let text = self
            .client
            .generate(&prompt, BIAS_SYSTEM_PROMPT, TEMPERATURE)
            .await?;

        let verdict = parse_bias(&text);
        debug!(
            has_bias = verdict.has_bias,
            reasons = verdict.reasons.len(),
            "Bias review parsed"
        );
        Ok(verdict)
    }
}

/// Parse model output into a bias verdict; unusable output defaults to a
/// clean verdict rather than raising.
fn parse_bias(text: &str) -> BiasVerdict {
    match extract::parse_lenient::<BiasPayload>(text) {
        Some(payload) => BiasVerdict {
            has_bias: payload.has_bias,
            reasons: payload.reasons,
        },
        None => BiasVerdict::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Connection;

    #[test]
    fn test_parse_flagged_verdict() {
        let text = r#"{"has_bias": true, "reasons": ["car-centric example"]}"#;
        let verdict = parse_bias(text);
        assert!(verdict.has_bias);
        assert_eq!(verdict.reasons, vec!["car-centric example"]);
    }

    #[test]
    fn test_unparseable_output_defaults_clean() {
        let verdict = parse_bias("the content seems fine to me");
        assert!(!verdict.has_bias);
        assert!(verdict.reasons.is_empty());
    }

    #[test]
    fn test_user_prompt_embeds_bundle() {
        let bundle = ReviewBundle {
            connection: Connection::fallback("A", "B"),
            explanation: "short text".to_string(),
            analogies: vec!["like x".to_string()],
        };
        let prompt = BiasMonitor::build_user_prompt(&bundle);
        assert!(prompt.contains("short text"));
        assert!(prompt.contains("like x"));
    }
}
