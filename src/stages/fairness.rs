use std::collections::HashSet;

use crate::domain::{Connection, FairnessMetric, FairnessReport};

/// Pure, deterministic fairness scorer over a generated bundle.
///
/// No model call: every metric is computed locally so the report is
/// explainable and reproducible. Recomputed whenever the explanation or
/// analogies change.
#[derive(Debug, Clone, Copy, Default)]
pub struct FairnessAuditor;

impl FairnessAuditor {
    /// Create a new auditor
    pub fn new() -> Self {
        Self
    }

    /// Evaluate the bundle into a three-metric report with an aggregate mean.
    pub fn evaluate(
        &self,
        connection: &Connection,
        explanation: &str,
        analogies: &[String],
    ) -> FairnessReport {
        let discipline_diversity = discipline_diversity(connection);
        let language_accessibility = language_accessibility(explanation);
        let analogy_variety = analogy_variety(analogies);

        let overall = round2(
            (discipline_diversity.value + language_accessibility.value + analogy_variety.value)
                / 3.0,
        );

        FairnessReport {
            discipline_diversity,
            language_accessibility,
            analogy_variety,
            overall,
        }
    }
}

fn discipline_diversity(connection: &Connection) -> FairnessMetric {
    let disciplines: Vec<String> = connection
        .disciplines
        .iter()
        .filter(|d| !d.trim().is_empty())
        .map(|d| d.to_lowercase())
        .collect();

    let total = disciplines.len();
    if total == 0 {
        return FairnessMetric {
            label: "Discipline diversity".to_string(),
            value: 0.0,
            detail: "No disciplines supplied".to_string(),
        };
    }

    let distinct = disciplines.iter().collect::<HashSet<_>>().len();
    FairnessMetric {
        label: "Discipline diversity".to_string(),
        value: round2(distinct as f64 / total as f64),
        detail: format!("{} unique disciplines across {} steps", distinct, total),
    }
}

fn language_accessibility(explanation: &str) -> FairnessMetric {
    let words: Vec<String> = explanation
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| c.is_ascii_punctuation()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();

    if words.is_empty() {
        return FairnessMetric {
            label: "Language accessibility".to_string(),
            value: 0.0,
            detail: "No explanation text available".to_string(),
        };
    }

    let short_words = words.iter().filter(|w| w.chars().count() <= 6).count();
    FairnessMetric {
        label: "Language accessibility".to_string(),
        value: round2(short_words as f64 / words.len() as f64),
        detail: format!("{}/{} words are short (<=6 chars)", short_words, words.len()),
    }
}

fn analogy_variety(analogies: &[String]) -> FairnessMetric {
    let lines: Vec<&str> = analogies
        .iter()
        .map(|a| a.trim().trim_start_matches(['-', ' ']))
        .filter(|a| !a.is_empty())
        .collect();

    if lines.is_empty() {
        return FairnessMetric {
            label: "Analogy variety".to_string(),
            value: 0.0,
            detail: "No analogies generated".to_string(),
        };
    }

    let starters: HashSet<String> = lines
        .iter()
        .filter_map(|line| line.split_whitespace().next())
        .map(|w| w.to_lowercase())
        .collect();

    FairnessMetric {
        label: "Analogy variety".to_string(),
        value: round2(starters.len() as f64 / lines.len() as f64),
        detail: format!(
            "{} unique starting metaphors across {} analogies",
            starters.len(),
            lines.len()
        ),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_connection() -> Connection {
        Connection {
            path: Vec::new(),
            disciplines: Vec::new(),
            strength: 0.0,
        }
    }

    #[test]
    fn test_empty_inputs_score_zero() {
        let report = FairnessAuditor::new().evaluate(&empty_connection(), "", &[]);

        assert_eq!(report.overall, 0.0);
        assert_eq!(report.discipline_diversity.value, 0.0);
        assert_eq!(report.language_accessibility.value, 0.0);
        assert_eq!(report.analogy_variety.value, 0.0);
        assert_eq!(report.discipline_diversity.detail, "No disciplines supplied");
        assert_eq!(report.analogy_variety.detail, "No analogies generated");
    }

    #[test]
    fn test_discipline_diversity_ratio() {
        let connection = Connection {
            path: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            disciplines: vec![
                "physics".into(),
                "Physics".into(),
                "biology".into(),
                "art".into(),
            ],
            strength: 0.8,
        };
        let report = FairnessAuditor::new().evaluate(&connection, "", &[]);
        // Case-insensitive: 3 distinct of 4.
        assert_eq!(report.discipline_diversity.value, 0.75);
        assert_eq!(
            report.discipline_diversity.detail,
            "3 unique disciplines across 4 steps"
        );
    }

    #[test]
    fn test_language_accessibility_counts_short_words() {
        let report = FairnessAuditor::new().evaluate(
            &empty_connection(),
            "Plants are like tiny photosynthesis factories.",
            &[],
        );
        // "plants", "are", "like", "tiny" are short; the other two are not.
        assert_eq!(report.language_accessibility.value, 0.67);
    }

    #[test]
    fn test_analogy_variety_unique_starters() {
        let analogies = vec![
            "Like a water wheel".to_string(),
            "Like a turbine".to_string(),
            "Similar to a heat engine".to_string(),
        ];
        let report = FairnessAuditor::new().evaluate(&empty_connection(), "", &analogies);
        assert_eq!(report.analogy_variety.value, 0.67);
        assert_eq!(
            report.analogy_variety.detail,
            "2 unique starting metaphors across 3 analogies"
        );
    }

    #[test]
    fn test_overall_is_mean_of_metrics() {
        let connection = Connection {
            path: vec!["A".into(), "B".into()],
            disciplines: vec!["cs".into(), "math".into()],
            strength: 1.0,
        };
        let analogies = vec!["Like a map".to_string(), "As if a ladder".to_string()];
        let report = FairnessAuditor::new().evaluate(&connection, "All short words here", &analogies);
        assert_eq!(report.discipline_diversity.value, 1.0);
        assert_eq!(report.language_accessibility.value, 1.0);
        assert_eq!(report.analogy_variety.value, 1.0);
        assert_eq!(report.overall, 1.0);
    }
}
