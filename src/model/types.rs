use serde::{Deserialize, Serialize};

/// Request body for the Ollama `/api/generate` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    /// Model name (e.g. "gemma3:4b").
    pub model: String,
    /// Combined system + user prompt.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Always false; responses are consumed whole.
    pub stream: bool,
}

impl GenerateRequest {
    /// Build a request, framing the system prompt ahead of the user prompt.
    pub fn new(model: impl Into<String>, prompt: &str, system_prompt: &str, temperature: f64) -> Self {
        Self {
            model: model.into(),
            prompt: format!("<|system|>\n{}\n<|user|>\n{}\n", system_prompt, prompt),
            temperature,
            stream: false,
        }
    }
}

/// Response body from the Ollama `/api/generate` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    /// Generated completion text.
    #[serde(default)]
    pub response: String,
    /// Model that produced the completion.
    #[serde(default)]
    pub model: Option<String>,
    /// Whether generation finished.
    #[serde(default)]
    pub done: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_frames_system_prompt() {
        let request = GenerateRequest::new("gemma3:4b", "find a path", "you are a mapper", 0.5);
        assert!(request.prompt.starts_with("<|system|>\nyou are a mapper"));
        assert!(request.prompt.contains("<|user|>\nfind a path"));
        assert!(!request.stream);
    }

    #[test]
    fn test_response_tolerates_missing_fields() {
        let response: GenerateResponse = serde_json::from_str(r#"{"response": "hello"}"#).unwrap();
        assert_eq!(response.response, "hello");
        assert!(response.model.is_none());
    }
}
