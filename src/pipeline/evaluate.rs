use serde::Serialize;

use crate::exec::scheduler::ExecutionResult;
use crate::types::TaskStatus;

/// Weights of the quality score.
const QUALITY_SUCCESS_WEIGHT: f64 = 0.6;
const QUALITY_SPEED_WEIGHT: f64 = 0.2;
const QUALITY_ERROR_WEIGHT: f64 = 0.2;
/// Speed score bottoms out once the average task takes this long.
const SPEED_FLOOR_MS: f64 = 10_000.0;
/// Error score bottoms out at this many distinct errors.
const ERROR_FLOOR_COUNT: f64 = 5.0;

#[derive(Debug, Clone, Serialize)]
pub struct TaskError {
    pub task_id: String,
    pub error: String,
    pub recoverable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total: usize,
    pub success_rate: f64,
    pub total_duration_ms: u64,
    pub avg_duration_ms: f64,
    pub errors: Vec<TaskError>,
    pub quality: f64,
}

/// Count outcomes, aggregate errors, and fold success, speed and error rate
/// into a single quality score in [0, 1], rounded to two decimals.
pub fn evaluate(execution: &ExecutionResult) -> Evaluation {
    let mut completed = 0usize;
    let mut failed = 0usize;
    let mut skipped = 0usize;
    let mut total_duration_ms = 0u64;
    let mut errors = Vec::new();

    for result in &execution.results {
        total_duration_ms += result.duration_ms;
        match result.status {
            TaskStatus::Completed => completed += 1,
            TaskStatus::Failed => {
                failed += 1;
                let error = result.error.clone().unwrap_or_default();
                errors.push(TaskError {
                    task_id: result.task_id.clone(),
                    recoverable: !error.contains("fatal"),
                    error,
                });
            }
            TaskStatus::Skipped => skipped += 1,
            _ => {}
        }
    }

    let total = execution.results.len();
    let success_rate = if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64
    };
    let avg_duration_ms = if total == 0 {
        0.0
    } else {
        total_duration_ms as f64 / total as f64
    };

    let speed_score = (1.0 - avg_duration_ms / SPEED_FLOOR_MS).max(0.0);
    let error_score = (1.0 - errors.len() as f64 / ERROR_FLOOR_COUNT).max(0.0);
    let quality = QUALITY_SUCCESS_WEIGHT * success_rate
        + QUALITY_SPEED_WEIGHT * speed_score
        + QUALITY_ERROR_WEIGHT * error_score;
    let quality = (quality * 100.0).round() / 100.0;

    Evaluation {
        completed,
        failed,
        skipped,
        total,
        success_rate,
        total_duration_ms,
        avg_duration_ms,
        errors,
        quality,
    }
}

/// User-facing summary: completion counts, wall time and quality on top, one
/// bulleted line per completed task below.
pub fn aggregate(evaluation: &Evaluation, execution: &ExecutionResult) -> String {
    let mut lines = Vec::new();
    let mut headline = format!(
        "Completed {}/{} tasks",
        evaluation.completed, evaluation.total
    );
    if evaluation.failed > 0 {
        headline.push_str(&format!(" ({} failed)", evaluation.failed));
    }
    if evaluation.skipped > 0 {
        headline.push_str(&format!(" ({} skipped)", evaluation.skipped));
    }
    headline.push_str(&format!(
        " in {} ms — quality {:.0}%.",
        evaluation.total_duration_ms,
        evaluation.quality * 100.0
    ));
    lines.push(headline);

    for result in &execution.results {
        if result.status != TaskStatus::Completed {
            continue;
        }
        let output = result.output.as_deref().unwrap_or("(no output)");
        lines.push(format!("  • {} — {}", result.description, output));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{aggregate, evaluate};
    use crate::exec::scheduler::ExecutionResult;
    use crate::types::{TaskResult, TaskStatus};

    fn result(id: &str, status: TaskStatus, duration_ms: u64, error: Option<&str>) -> TaskResult {
        TaskResult {
            task_id: id.to_string(),
            description: format!("do {id}"),
            status,
            output: matches!(status, TaskStatus::Completed).then(|| format!("out {id}")),
            error: error.map(str::to_string),
            duration_ms,
            agent_id: Some("code_agent_v2".to_string()),
            wave: 0,
        }
    }

    fn execution(results: Vec<TaskResult>) -> ExecutionResult {
        ExecutionResult {
            total_tasks: results.len(),
            waves: 1,
            results,
        }
    }

    #[test]
    fn counts_rates_and_quality() {
        let exec = execution(vec![
            result("a", TaskStatus::Completed, 100, None),
            result("b", TaskStatus::Completed, 200, None),
            result("c", TaskStatus::Failed, 60, Some("boom")),
            result("d", TaskStatus::Skipped, 0, None),
        ]);
        let eval = evaluate(&exec);
        assert_eq!(
            (eval.completed, eval.failed, eval.skipped, eval.total),
            (2, 1, 1, 4)
        );
        assert_eq!(eval.success_rate, 0.5);
        assert_eq!(eval.total_duration_ms, 360);
        assert_eq!(eval.avg_duration_ms, 90.0);
        // 0.6×0.5 + 0.2×(1 − 90/10000) + 0.2×(1 − 1/5) = 0.6582 → 0.66.
        assert_eq!(eval.quality, 0.66);
        assert_eq!(eval.errors.len(), 1);
        assert!(eval.errors[0].recoverable);
    }

    #[test]
    fn fatal_errors_are_flagged_unrecoverable() {
        let exec = execution(vec![result(
            "a",
            TaskStatus::Failed,
            10,
            Some("fatal: disk on fire"),
        )]);
        let eval = evaluate(&exec);
        assert!(!eval.errors[0].recoverable);
        assert_eq!(eval.quality, 0.36);
    }

    #[test]
    fn all_green_run_scores_near_one() {
        let exec = execution(vec![
            result("a", TaskStatus::Completed, 80, None),
            result("b", TaskStatus::Completed, 120, None),
        ]);
        let eval = evaluate(&exec);
        assert_eq!(eval.success_rate, 1.0);
        assert_eq!(eval.quality, 1.0);
    }

    #[test]
    fn summary_lists_completed_tasks_only() {
        let exec = execution(vec![
            result("a", TaskStatus::Completed, 100, None),
            result("b", TaskStatus::Failed, 50, Some("boom")),
        ]);
        let eval = evaluate(&exec);
        let summary = aggregate(&eval, &exec);
        assert!(summary.starts_with("Completed 1/2 tasks (1 failed)"));
        assert!(summary.contains("• do a — out a"));
        assert!(!summary.contains("do b —"));
    }
}
