use std::time::Instant;

use indexmap::IndexMap;
use serde::Serialize;
use tokio::task::JoinSet;

use crate::exec::dag::TaskDag;
use crate::exec::pool::WorkerPool;
use crate::exec::worker::{WorkCtx, WorkJob};
use crate::types::{PipelineEvent, PipelineObserver, TaskResult, TaskStatus};

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// Settle order within each wave; skipped entries lead their wave.
    pub results: Vec<TaskResult>,
    pub waves: usize,
    pub total_tasks: usize,
}

/// Drive the DAG wave by wave. Every node of a wave is dispatched through
/// the pool concurrently; the wave barrier is strict — wave i+1 never starts
/// before every wave-i dispatch settles. Worker failures are absorbed into
/// failed results and skip their dependents; they never abort the run.
pub async fn execute_dag(
    dag: &mut TaskDag,
    assignments: &IndexMap<String, Vec<String>>,
    pool: &WorkerPool,
    ctx: &WorkCtx,
    observer: Option<&dyn PipelineObserver>,
) -> ExecutionResult {
    let total_tasks = dag.len();
    let total_waves = dag.waves().len();
    let mut results: Vec<TaskResult> = Vec::with_capacity(total_tasks);

    for wave_index in 0..total_waves {
        let wave_ids: Vec<String> = dag.waves()[wave_index].clone();
        emit(
            observer,
            &PipelineEvent::WaveStarted {
                wave: wave_index,
                total_waves,
                tasks: wave_ids.len(),
            },
        );

        let mut wave_results: Vec<TaskResult> = Vec::with_capacity(wave_ids.len());
        let mut set: JoinSet<(String, u64, anyhow::Result<crate::exec::worker::WorkOutput>)> =
            JoinSet::new();

        // Dispatch in task index order; skipped nodes settle immediately
        // without touching the pool.
        for id in &wave_ids {
            let Some(node) = dag.node_mut(id) else {
                continue;
            };
            let agent_ids = assignments.get(id).cloned().unwrap_or_default();
            if node.status == TaskStatus::Skipped {
                wave_results.push(TaskResult {
                    task_id: id.clone(),
                    description: node.task.description.clone(),
                    status: TaskStatus::Skipped,
                    output: None,
                    error: None,
                    duration_ms: 0,
                    agent_id: agent_ids.first().cloned(),
                    wave: wave_index,
                });
                continue;
            }

            node.status = TaskStatus::Running;
            let job = WorkJob {
                task_id: id.clone(),
                description: node.task.description.clone(),
                agent_ids,
                wave: wave_index,
            };
            let pool = pool.clone();
            let ctx = ctx.clone();
            set.spawn(async move {
                let started = Instant::now();
                let outcome = pool.execute(&job, &ctx).await;
                (
                    job.task_id,
                    started.elapsed().as_millis() as u64,
                    outcome,
                )
            });
        }

        // Wave barrier: collect every dispatched node in settle order.
        while let Some(joined) = set.join_next().await {
            let result = match joined {
                Ok((task_id, duration_ms, outcome)) => {
                    let (description, agent_id) = dag
                        .node(&task_id)
                        .map(|n| {
                            (
                                n.task.description.clone(),
                                assignments.get(&task_id).and_then(|ids| ids.first().cloned()),
                            )
                        })
                        .unwrap_or((String::new(), None));
                    match outcome {
                        Ok(out) => TaskResult {
                            task_id,
                            description,
                            status: TaskStatus::Completed,
                            output: Some(out.output),
                            error: None,
                            duration_ms,
                            agent_id,
                            wave: wave_index,
                        },
                        Err(e) => TaskResult {
                            task_id,
                            description,
                            status: TaskStatus::Failed,
                            output: None,
                            error: Some(e.to_string()),
                            duration_ms,
                            agent_id,
                            wave: wave_index,
                        },
                    }
                }
                // A panicking or cancelled dispatch loses its identity; it
                // still settles as a blank failed result.
                Err(join_err) => TaskResult {
                    task_id: String::new(),
                    description: String::new(),
                    status: TaskStatus::Failed,
                    output: None,
                    error: Some(join_err.to_string()),
                    duration_ms: 0,
                    agent_id: None,
                    wave: wave_index,
                },
            };
            emit(
                observer,
                &PipelineEvent::TaskSettled {
                    wave: wave_index,
                    task_id: result.task_id.clone(),
                    status: result.status,
                    duration_ms: result.duration_ms,
                },
            );
            wave_results.push(result);
        }

        // Wave settled: write results back, then cascade skips from failures.
        for result in &wave_results {
            if let Some(node) = dag.node_mut(&result.task_id) {
                node.status = result.status;
                node.result = Some(result.clone());
            }
        }
        for result in &wave_results {
            if result.status == TaskStatus::Failed && !result.task_id.is_empty() {
                let skipped = dag.skip_dependents(&result.task_id);
                if !skipped.is_empty() {
                    tracing::debug!(
                        "task {} failed; skipping dependents: {}",
                        result.task_id,
                        skipped.join(", ")
                    );
                }
            }
        }

        let (mut completed, mut failed, mut skipped) = (0usize, 0usize, 0usize);
        for result in &wave_results {
            match result.status {
                TaskStatus::Completed => completed += 1,
                TaskStatus::Failed => failed += 1,
                TaskStatus::Skipped => skipped += 1,
                _ => {}
            }
        }
        emit(
            observer,
            &PipelineEvent::WaveCompleted {
                wave: wave_index,
                completed,
                failed,
                skipped,
            },
        );
        results.extend(wave_results);
    }

    ExecutionResult {
        results,
        waves: total_waves,
        total_tasks,
    }
}

fn emit(observer: Option<&dyn PipelineObserver>, event: &PipelineEvent) {
    if let Some(observer) = observer {
        observer.on_event(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::anyhow;
    use indexmap::IndexMap;
    use serde_json::Value;

    use super::execute_dag;
    use crate::exec::dag::TaskDag;
    use crate::exec::pool::WorkerPool;
    use crate::exec::worker::{FnWorker, SimulatedWorker, WorkCtx, WorkOutput};
    use crate::permission::AllowAll;
    use crate::types::{Task, TaskStatus};

    fn task(id: &str, index: usize, deps: &[&str]) -> Task {
        Task {
            id: id.to_string(),
            index,
            description: format!("do {id}"),
            intent_type: "code".to_string(),
            cluster: "coding".to_string(),
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            status: TaskStatus::Pending,
            priority: 1,
        }
    }

    fn assignments_for(tasks: &[Task]) -> IndexMap<String, Vec<String>> {
        tasks
            .iter()
            .map(|t| (t.id.clone(), vec!["code_agent_v2".to_string()]))
            .collect()
    }

    fn ctx() -> WorkCtx {
        WorkCtx {
            session: "test".to_string(),
            gate: Arc::new(AllowAll),
        }
    }

    #[tokio::test]
    async fn independent_tasks_run_in_a_single_wave() {
        let tasks = vec![task("a", 0, &[]), task("b", 1, &[]), task("c", 2, &[])];
        let mut dag = TaskDag::build(&tasks).expect("acyclic");
        let pool = WorkerPool::new(Arc::new(SimulatedWorker), 8);
        let result = execute_dag(&mut dag, &assignments_for(&tasks), &pool, &ctx(), None).await;

        assert_eq!(result.waves, 1);
        assert_eq!(result.total_tasks, 3);
        assert_eq!(result.results.len(), 3);
        assert!(
            result
                .results
                .iter()
                .all(|r| r.status == TaskStatus::Completed && r.wave == 0)
        );
    }

    #[tokio::test]
    async fn failure_skips_transitive_dependents_without_dispatching_them() {
        // a → b → c, plus independent d. a fails, so b and c are skipped.
        let tasks = vec![
            task("a", 0, &[]),
            task("b", 1, &["a"]),
            task("c", 2, &["b"]),
            task("d", 3, &[]),
        ];
        let mut dag = TaskDag::build(&tasks).expect("acyclic");
        let worker = FnWorker(|job: &crate::exec::worker::WorkJob, _ctx: &WorkCtx| {
            if job.task_id == "a" {
                Err(anyhow!("boom"))
            } else {
                Ok(WorkOutput {
                    output: format!("done {}", job.task_id),
                    metadata: Value::Null,
                })
            }
        });
        let pool = WorkerPool::new(Arc::new(worker), 8);
        let result = execute_dag(&mut dag, &assignments_for(&tasks), &pool, &ctx(), None).await;

        assert_eq!(result.waves, 3);
        let by_id = |id: &str| {
            result
                .results
                .iter()
                .find(|r| r.task_id == id)
                .expect("result present")
        };
        assert_eq!(by_id("a").status, TaskStatus::Failed);
        assert_eq!(by_id("d").status, TaskStatus::Completed);
        assert_eq!(by_id("b").status, TaskStatus::Skipped);
        assert_eq!(by_id("c").status, TaskStatus::Skipped);
        assert_eq!(by_id("b").duration_ms, 0);
        assert!(by_id("b").output.is_none());
        // Skipped results still carry their wave index.
        assert_eq!(by_id("b").wave, 1);
        assert_eq!(by_id("c").wave, 2);
        // Only a and d ever reached the pool.
        assert_eq!(pool.stats().total_executed, 2);
    }

    #[tokio::test]
    async fn results_are_tagged_with_wave_indices_in_order() {
        let tasks = vec![task("a", 0, &[]), task("b", 1, &["a"]), task("c", 2, &["b"])];
        let mut dag = TaskDag::build(&tasks).expect("acyclic");
        let pool = WorkerPool::new(Arc::new(SimulatedWorker), 2);
        let result = execute_dag(&mut dag, &assignments_for(&tasks), &pool, &ctx(), None).await;

        assert_eq!(result.waves, 3);
        let waves: Vec<usize> = result.results.iter().map(|r| r.wave).collect();
        assert_eq!(waves, vec![0, 1, 2]);
        // The barrier holds: results never interleave across waves.
        assert!(waves.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn wave_size_may_exceed_pool_capacity() {
        let tasks: Vec<Task> = (0..10).map(|n| task(&format!("t{n}"), n, &[])).collect();
        let mut dag = TaskDag::build(&tasks).expect("acyclic");
        let pool = WorkerPool::new(Arc::new(SimulatedWorker), 2);
        let result = execute_dag(&mut dag, &assignments_for(&tasks), &pool, &ctx(), None).await;

        assert_eq!(result.waves, 1);
        assert_eq!(result.results.len(), 10);
        assert!(
            result
                .results
                .iter()
                .all(|r| r.status == TaskStatus::Completed)
        );
    }
}
