use crate::domain::Level;
use crate::storage::FeedbackEntry;

/// Converts stored learner feedback into a guidance string injected into
/// generation prompts.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedbackAdapter;

impl FeedbackAdapter {
    /// Create a new adapter
    pub fn new() -> Self {
        Self
    }

    /// Summarise feedback rows into natural-language guidance.
    pub fn summarise(&self, rows: &[FeedbackEntry], level: Level) -> String {
        if rows.is_empty() {
            return format!(
                "Focus on clarity and discipline balance appropriate for a {} learner.",
                level
            );
        }

        let ratings: Vec<i64> = rows.iter().filter_map(|row| row.rating).collect();
        let avg_rating = if ratings.is_empty() {
            None
        } else {
            Some(ratings.iter().sum::<i64>() as f64 / ratings.len() as f64)
        };

        let comments: Vec<&str> = rows
            .iter()
            .filter_map(|row| row.comment.as_deref())
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();

        let mut parts: Vec<String> = Vec::new();

        if let Some(avg) = avg_rating {
            if avg < 3.0 {
                parts.push(
                    "Learners previously rated clarity low; simplify language and add concrete steps."
                        .to_string(),
                );
            } else if avg < 4.0 {
                parts.push(
                    "Maintain clarity and add vivid examples to improve engagement.".to_string(),
                );
            } else {
                parts.push(
                    "Past feedback is positive; preserve the approachable tone and structured explanations."
                        .to_string(),
                );
            }
        }

        if !comments.is_empty() {
            let quoted: Vec<&str> = comments.into_iter().take(3).collect();
            parts.push(format!("Specific learner notes: {}", quoted.join(" | ")));
        }

        parts.push(format!(
            "Ensure the response stays aligned with a {} learner's expectations.",
            level
        ));

        parts.join(" ")
    }
}
