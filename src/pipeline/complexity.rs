use std::collections::HashMap;

use serde::Serialize;

use crate::pipeline::decompose::Decomposition;
use crate::types::ComplexityLevel;

/// Each occurrence of one of these in a subtask description adds 0.2 risk.
pub const RISK_KEYWORDS: &[&str] = &[
    "deploy",
    "delete",
    "production",
    "database",
    "migration",
    "security",
    "authentication",
    "payment",
    "critical",
    "infrastructure",
];

const RISK_STEP: f64 = 0.2;
const RISK_CAP: f64 = 3.0;

#[derive(Debug, Clone, Serialize)]
pub struct ComplexityDetails {
    pub subtask_count: usize,
    pub dependency_weight: f64,
    pub risk_factor: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Complexity {
    pub score: f64,
    pub level: ComplexityLevel,
    pub agent_count: usize,
    pub waves: usize,
    pub details: ComplexityDetails,
}

/// score = subtasks × dependency weight × risk, rounded to one decimal.
/// Levels: ≤ 3 simple, < 7 medium, otherwise complex.
pub fn score(decomposition: &Decomposition) -> Complexity {
    let subtask_count = decomposition.tasks.len();
    let total_deps: usize = decomposition.tasks.iter().map(|t| t.depends_on.len()).sum();
    let dependency_weight = 1.0 + total_deps as f64 / subtask_count.max(1) as f64;
    let risk_factor = risk_factor(decomposition);

    let score =
        (subtask_count as f64 * dependency_weight * risk_factor * 10.0).round() / 10.0;

    let level = if score <= 3.0 {
        ComplexityLevel::Simple
    } else if score < 7.0 {
        ComplexityLevel::Medium
    } else {
        ComplexityLevel::Complex
    };

    let (lo, hi) = level.agent_range();
    let agent_count =
        (lo as f64 + (score / 10.0).min(1.0) * (hi - lo) as f64).round() as usize;

    Complexity {
        score,
        level,
        agent_count,
        waves: wave_count(decomposition),
        details: ComplexityDetails {
            subtask_count,
            dependency_weight,
            risk_factor,
        },
    }
}

fn risk_factor(decomposition: &Decomposition) -> f64 {
    let mut risk = 1.0;
    for task in &decomposition.tasks {
        let lower = task.description.to_lowercase();
        for keyword in RISK_KEYWORDS {
            risk += RISK_STEP * lower.matches(keyword).count() as f64;
        }
    }
    risk.min(RISK_CAP)
}

/// Depth of the dependency chain: roots sit at level 0, every other task one
/// past its deepest dependency. Wave count = deepest level + 1.
fn wave_count(decomposition: &Decomposition) -> usize {
    if decomposition.tasks.is_empty() {
        return 0;
    }
    let mut levels: HashMap<&str, usize> = HashMap::new();
    let mut deepest = 0usize;
    // depends_on only references earlier tasks, so one forward pass settles
    // every level.
    for task in &decomposition.tasks {
        let level = task
            .depends_on
            .iter()
            .filter_map(|dep| levels.get(dep.as_str()))
            .max()
            .map(|deepest_dep| deepest_dep + 1)
            .unwrap_or(0);
        deepest = deepest.max(level);
        levels.insert(task.id.as_str(), level);
    }
    deepest + 1
}

#[cfg(test)]
mod tests {
    use super::score;
    use crate::pipeline::{decompose::decompose, intent::classify};
    use crate::types::ComplexityLevel;

    fn complexity_of(raw: &str) -> super::Complexity {
        let intent = classify(raw);
        score(&decompose(raw, &intent))
    }

    #[test]
    fn single_harmless_task_is_simple() {
        let c = complexity_of("list files");
        assert_eq!(c.score, 1.0);
        assert_eq!(c.level, ComplexityLevel::Simple);
        assert_eq!(c.waves, 1);
        assert!(c.agent_count >= 1);
        assert_eq!(c.details.subtask_count, 1);
        assert_eq!(c.details.risk_factor, 1.0);
    }

    #[test]
    fn risky_sequential_chain_scores_complex() {
        // 3 tasks, 2 edges, risk 1.4 ("deploy" + "production"):
        // 3 × (1 + 2/3) × 1.4 = 7.0 → complex.
        let c = complexity_of("research OAuth then build API then deploy to production");
        assert_eq!(c.score, 7.0);
        assert_eq!(c.level, ComplexityLevel::Complex);
        assert_eq!(c.waves, 3);
        assert!((c.details.risk_factor - 1.4).abs() < 1e-9);
        // complex range [5,10]: 5 + 0.7 × 5 = 8.5 → 9.
        assert_eq!(c.agent_count, 9);
    }

    #[test]
    fn independent_tasks_stay_in_one_wave() {
        let c = complexity_of("build API and write tests and deploy");
        assert_eq!(c.waves, 1);
        assert_eq!(c.details.subtask_count, 3);
        assert_eq!(c.details.dependency_weight, 1.0);
    }

    #[test]
    fn risk_is_capped_at_three() {
        let raw = "delete the production database and migrate payment security \
                   authentication infrastructure and deploy critical production \
                   database migration and delete security payment infrastructure";
        let c = complexity_of(raw);
        assert_eq!(c.details.risk_factor, 3.0);
    }

    #[test]
    fn repeated_keyword_occurrences_each_count() {
        let c = complexity_of("deploy the deploy script");
        // "deploy" twice → 1.0 + 2 × 0.2.
        assert!((c.details.risk_factor - 1.4).abs() < 1e-9);
    }
}
