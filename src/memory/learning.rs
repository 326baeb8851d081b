#![allow(dead_code)]

use std::collections::HashMap;

use crate::agents::registry::AgentRegistry;
use crate::exec::scheduler::ExecutionResult;
use crate::memory::store::{MemoryStore, PerformanceRecord, now_ms};
use crate::pipeline::complexity::Complexity;
use crate::pipeline::evaluate::Evaluation;
use crate::pipeline::intent::Intent;
use crate::types::{Task, TaskStatus};

/// Quality above which a request mints a `<intent>:<level>` pattern and a
/// stored solution.
const PATTERN_QUALITY_THRESHOLD: f64 = 0.8;
const SOLUTION_SUCCESS_THRESHOLD: f64 = 0.8;
/// Successful-average duration under which a fast-execution pattern mints.
const FAST_EXECUTION_MS: f64 = 100.0;

const FAST_AGENT_BOOST: f64 = 0.02;
const FAILED_AGENT_PENALTY: f64 = 0.05;

/// One queued confidence adjustment, applied at most once.
#[derive(Debug, Clone)]
pub struct ConfidenceDelta {
    pub agent_id: String,
    pub delta: f64,
    pub reason: &'static str,
}

/// Everything stage 9 sees from one finished request.
pub struct RequestRecord<'a> {
    pub input: &'a str,
    pub intent: &'a Intent,
    pub tasks: &'a [Task],
    pub complexity: &'a Complexity,
    pub execution: &'a ExecutionResult,
    pub evaluation: &'a Evaluation,
    pub summary: &'a str,
}

/// Closes the loop on agent confidence: records performance, mines patterns,
/// queues confidence deltas, and stores high-quality solutions. Deltas only
/// reach the registry through [`LearningSystem::apply_updates`].
#[derive(Default)]
pub struct LearningSystem {
    queue: Vec<ConfidenceDelta>,
}

impl LearningSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn learn(&mut self, store: &mut MemoryStore, record: &RequestRecord<'_>) {
        let cluster_of: HashMap<&str, &str> = record
            .tasks
            .iter()
            .map(|t| (t.id.as_str(), t.cluster.as_str()))
            .collect();

        // 1. Fold every settled task into the performance log. Blank harness
        //    results carry no identity and have nothing to attribute.
        for result in &record.execution.results {
            let Some(cluster) = cluster_of.get(result.task_id.as_str()) else {
                continue;
            };
            store.record_performance(PerformanceRecord {
                timestamp: now_ms(),
                agent_id: result.agent_id.clone().unwrap_or_default(),
                task_id: result.task_id.clone(),
                duration_ms: result.duration_ms,
                success: result.status == TaskStatus::Completed,
                complexity: record.complexity.level.as_str().to_string(),
                cluster: cluster.to_string(),
            });
        }

        // 2. Pattern mining.
        if record.evaluation.quality > PATTERN_QUALITY_THRESHOLD {
            let key = format!(
                "{}:{}",
                record.intent.intent_type,
                record.complexity.level.as_str()
            );
            store.record_pattern(
                &key,
                "high-quality outcome for this intent/complexity pairing",
                Some(record.evaluation.quality),
                Some(record.evaluation.avg_duration_ms),
            );
        }
        if let Some(successful_avg) = successful_avg_ms(record.execution)
            && successful_avg < FAST_EXECUTION_MS
        {
            let key = format!("fast_execution:{}", record.intent.intent_type);
            store.record_pattern(
                &key,
                "tasks of this intent finish well under the speed floor",
                None,
                Some(successful_avg),
            );
        }

        // 3. Confidence deltas. The comparison baseline is the cluster
        //    average over the log as it stands — which already includes this
        //    request's records, so an agent's very first run in a cluster
        //    can never beat the average and earns no boost. Kept as-is.
        for result in &record.execution.results {
            let Some(agent_id) = result.agent_id.clone() else {
                continue;
            };
            match result.status {
                TaskStatus::Completed => {
                    let Some(cluster) = cluster_of.get(result.task_id.as_str()) else {
                        continue;
                    };
                    let baseline = store
                        .cluster_avg_duration(cluster)
                        .unwrap_or(result.duration_ms as f64);
                    if (result.duration_ms as f64) < baseline {
                        self.queue.push(ConfidenceDelta {
                            agent_id,
                            delta: FAST_AGENT_BOOST,
                            reason: "faster than cluster average",
                        });
                    }
                }
                TaskStatus::Failed => {
                    self.queue.push(ConfidenceDelta {
                        agent_id,
                        delta: -FAILED_AGENT_PENALTY,
                        reason: "task failed",
                    });
                }
                _ => {}
            }
        }

        // 4. Keep the whole pipeline summary when the run went well.
        if record.evaluation.success_rate > SOLUTION_SUCCESS_THRESHOLD {
            store.store_solution(record.input, record.summary);
        }
    }

    /// Drain the queue into the registry. Each delta lands exactly once;
    /// the registry clamps and rounds.
    pub fn apply_updates(&mut self, registry: &mut AgentRegistry) {
        for delta in self.queue.drain(..) {
            tracing::debug!(
                "confidence {:+.3} for {} ({})",
                delta.delta,
                delta.agent_id,
                delta.reason
            );
            registry.apply_confidence_delta(&delta.agent_id, delta.delta);
        }
    }
}

fn successful_avg_ms(execution: &ExecutionResult) -> Option<f64> {
    let durations: Vec<u64> = execution
        .results
        .iter()
        .filter(|r| r.status == TaskStatus::Completed)
        .map(|r| r.duration_ms)
        .collect();
    if durations.is_empty() {
        return None;
    }
    Some(durations.iter().sum::<u64>() as f64 / durations.len() as f64)
}
