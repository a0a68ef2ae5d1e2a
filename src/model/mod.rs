//! Client and types for the Ollama generation endpoint.
//!
//! The transport is a thin wrapper: one `POST /api/generate` call per stage
//! invocation, with bounded retries. Structured output recovery lives in
//! [`extract`], shared by every stage that parses model text.

mod client;
pub mod extract;
mod types;

pub use client::OllamaClient;
pub use types::{GenerateRequest, GenerateResponse};
