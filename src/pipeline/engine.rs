#![allow(dead_code)]

use std::{collections::HashSet, sync::Arc, time::Instant};

use serde::Serialize;
use serde_json::json;

use crate::agents::registry::AgentRegistry;
use crate::agents::spawner::{Allocation, allocate};
use crate::config::EngineConfig;
use crate::exec::dag::TaskDag;
use crate::exec::pool::WorkerPool;
use crate::exec::scheduler::{ExecutionResult, execute_dag};
use crate::exec::worker::{SimulatedWorker, TaskWorker, WorkCtx};
use crate::memory::learning::{LearningSystem, RequestRecord};
use crate::memory::store::MemoryStore;
use crate::pipeline::complexity::{Complexity, score};
use crate::pipeline::decompose::{Decomposition, decompose};
use crate::pipeline::evaluate::{Evaluation, aggregate, evaluate};
use crate::pipeline::intent::{Intent, classify};
use crate::permission::PermissionGate;
use crate::types::{
    ComplexityLevel, EngineError, PipelineEvent, PipelineObserver, TaskStatus,
};

/// Per-request context: the session key for the ephemeral memory layer, the
/// permission gate collaborator, and an optional renderer sink.
#[derive(Clone)]
pub struct RequestCtx {
    pub session: String,
    pub gate: Arc<dyn PermissionGate>,
    pub observer: Option<Arc<dyn PipelineObserver>>,
}

/// Stage outputs, populated as stages complete. On failure the caller gets
/// whatever had been produced so far.
#[derive(Default, Serialize)]
pub struct PipelineRecord {
    pub intent: Option<Intent>,
    pub decomposition: Option<Decomposition>,
    pub complexity: Option<Complexity>,
    pub allocation: Option<Allocation>,
    pub execution: Option<ExecutionResult>,
    pub evaluation: Option<Evaluation>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunMetrics {
    pub duration_ms: u64,
    pub agents_used: usize,
    pub tasks_completed: usize,
    pub tasks_failed: usize,
    pub complexity_level: Option<ComplexityLevel>,
}

pub enum RunOutcome {
    Success {
        output: String,
        pipeline: PipelineRecord,
        metrics: RunMetrics,
    },
    Failure {
        error: EngineError,
        pipeline: PipelineRecord,
        metrics: RunMetrics,
    },
}

/// Owns every component and drives the fixed ten-stage pipeline:
/// parse → classify → decompose → score → allocate → execute → evaluate →
/// aggregate → learn → emit. Everything except stage 6 runs synchronously
/// on the caller's task; stage 6 fans out through the worker pool.
pub struct Orchestrator {
    registry: AgentRegistry,
    memory: MemoryStore,
    learning: LearningSystem,
    pool: WorkerPool,
}

impl Orchestrator {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_worker(config, Arc::new(SimulatedWorker))
    }

    pub fn with_worker(config: &EngineConfig, worker: Arc<dyn TaskWorker>) -> Self {
        Self {
            registry: AgentRegistry::with_builtin(),
            memory: MemoryStore::new(),
            learning: LearningSystem::new(),
            pool: WorkerPool::new(worker, config.max_workers),
        }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut MemoryStore {
        &mut self.memory
    }

    pub async fn execute(&mut self, input: &str, ctx: &RequestCtx) -> RunOutcome {
        let started = Instant::now();
        let mut pipeline = PipelineRecord::default();
        let observer = ctx.observer.as_deref();

        // Stage 1: parse.
        let raw = input.trim();
        if raw.is_empty() {
            return RunOutcome::Failure {
                error: EngineError::Parse,
                pipeline,
                metrics: RunMetrics {
                    duration_ms: started.elapsed().as_millis() as u64,
                    ..RunMetrics::default()
                },
            };
        }

        // Stage 2: classify intent.
        let intent = classify(raw);
        emit(
            observer,
            "intent",
            format!("{} ({:.0}%)", intent.intent_type, intent.confidence * 100.0),
        );
        pipeline.intent = Some(intent.clone());

        // Stage 3: decompose.
        let decomposition = decompose(raw, &intent);
        emit(
            observer,
            "decompose",
            format!("{} task(s)", decomposition.tasks.len()),
        );
        pipeline.decomposition = Some(decomposition.clone());

        // Stage 4: score complexity.
        let complexity = score(&decomposition);
        emit(
            observer,
            "complexity",
            format!("{} (score {})", complexity.level.as_str(), complexity.score),
        );
        pipeline.complexity = Some(complexity.clone());

        // Stage 5: allocate agents.
        let allocation = match allocate(&self.registry, &decomposition, &complexity, &intent) {
            Ok(allocation) => allocation,
            Err(error) => {
                return RunOutcome::Failure {
                    metrics: metrics_for(&pipeline, started),
                    error,
                    pipeline,
                };
            }
        };
        emit(
            observer,
            "allocate",
            format!(
                "{} agent(s), {}",
                allocation.agents.len(),
                allocation.strategy.as_str()
            ),
        );
        pipeline.allocation = Some(allocation.clone());

        // Stage 6: execute the DAG. Worker failures are absorbed into
        // failed results inside the scheduler; only a cycle aborts.
        let mut dag = match TaskDag::build(&decomposition.tasks) {
            Ok(dag) => dag,
            Err(error) => {
                return RunOutcome::Failure {
                    metrics: metrics_for(&pipeline, started),
                    error,
                    pipeline,
                };
            }
        };
        let work_ctx = WorkCtx {
            session: ctx.session.clone(),
            gate: ctx.gate.clone(),
        };
        let execution = execute_dag(
            &mut dag,
            &allocation.assignments,
            &self.pool,
            &work_ctx,
            observer,
        )
        .await;
        emit(
            observer,
            "execute",
            format!("{} result(s) over {} wave(s)", execution.results.len(), execution.waves),
        );
        pipeline.execution = Some(execution.clone());

        // Stage 7: evaluate.
        let evaluation = evaluate(&execution);
        emit(
            observer,
            "evaluate",
            format!("quality {:.2}", evaluation.quality),
        );
        pipeline.evaluation = Some(evaluation.clone());

        // Stage 8: aggregate.
        let output = aggregate(&evaluation, &execution);

        // Stage 9: learn — best-effort, never aborts the request.
        let agents_updated =
            self.learn(raw, &intent, &decomposition, &complexity, &execution, &evaluation, &output);
        self.memory.remember(
            &format!("{}:last_output", ctx.session),
            json!({ "input": raw, "quality": evaluation.quality }),
        );
        emit(observer, "learn", format!("{agents_updated} agent(s) updated"));

        // Stage 10: emit.
        RunOutcome::Success {
            output,
            metrics: metrics_for(&pipeline, started),
            pipeline,
        }
    }

    /// Returns the number of distinct agents whose metrics or confidence
    /// were touched by this request.
    #[allow(clippy::too_many_arguments)]
    fn learn(
        &mut self,
        input: &str,
        intent: &Intent,
        decomposition: &Decomposition,
        complexity: &Complexity,
        execution: &ExecutionResult,
        evaluation: &Evaluation,
        summary: &str,
    ) -> usize {
        // Execution metrics fold into the registry directly; confidence is
        // additionally shaped by the batched deltas below. Both paths clamp,
        // so either alone would keep the bounds.
        let mut touched: HashSet<&str> = HashSet::new();
        for result in &execution.results {
            if !matches!(result.status, TaskStatus::Completed | TaskStatus::Failed) {
                continue;
            }
            if let Some(agent_id) = &result.agent_id {
                touched.insert(agent_id.as_str());
                self.registry.update_agent_metrics(
                    agent_id,
                    result.duration_ms as f64 / 1000.0,
                    result.status == TaskStatus::Failed,
                );
            }
        }

        self.learning.learn(
            &mut self.memory,
            &RequestRecord {
                input,
                intent,
                tasks: &decomposition.tasks,
                complexity,
                execution,
                evaluation,
                summary,
            },
        );
        // Batched deltas only ever name agents that executed a task, so the
        // touched set already covers them.
        self.learning.apply_updates(&mut self.registry);
        touched.len()
    }
}

fn metrics_for(pipeline: &PipelineRecord, started: Instant) -> RunMetrics {
    RunMetrics {
        duration_ms: started.elapsed().as_millis() as u64,
        agents_used: pipeline
            .allocation
            .as_ref()
            .map(|a| a.agents.len())
            .unwrap_or(0),
        tasks_completed: pipeline
            .evaluation
            .as_ref()
            .map(|e| e.completed)
            .unwrap_or(0),
        tasks_failed: pipeline
            .evaluation
            .as_ref()
            .map(|e| e.failed)
            .unwrap_or(0),
        complexity_level: pipeline.complexity.as_ref().map(|c| c.level),
    }
}

fn emit(observer: Option<&dyn PipelineObserver>, stage: &'static str, detail: String) {
    if let Some(observer) = observer {
        observer.on_event(&PipelineEvent::StageCompleted { stage, detail });
    }
}
