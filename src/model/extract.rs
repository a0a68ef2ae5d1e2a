//! Lenient recovery of structured JSON from model output.
//!
//! Every stage that parses model text goes through [`parse_lenient`], which
//! applies a fixed fallback order: strict parse, then markdown fence
//! stripping, then brace-matched extraction of the first embedded object.
//! Callers supply their own deterministic default when all three fail.

use serde::de::DeserializeOwned;

/// Parse model output into `T`, tolerating surrounding noise.
///
/// Returns `None` when no candidate in the text deserializes; never panics
/// on unstructured output.
pub fn parse_lenient<T: DeserializeOwned>(text: &str) -> Option<T> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = serde_json::from_str::<T>(trimmed) {
        return Some(parsed);
    }

    let unfenced = strip_fences(trimmed);
    if let Ok(parsed) = serde_json::from_str::<T>(unfenced) {
        return Some(parsed);
    }

    extract_object(unfenced).and_then(|candidate| serde_json::from_str::<T>(candidate).ok())
}

/// Strip a single ```...``` fence (with optional language tag) if the text
/// is wrapped in one.
fn strip_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").map(str::trim).unwrap_or(text)
}

/// Find the first balanced `{...}` object, respecting string literals and
/// escape sequences.
fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
