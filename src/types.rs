use serde::Serialize;
use thiserror::Error;

// ── 任务状态 ─────────────────────────────────────────────────
/// Lifecycle of a single subtask inside one orchestration run.
///
/// Transitions: pending → scheduled → (running → {completed, failed}) | skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Scheduled,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

}

// ── 复杂度等级 ───────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityLevel {
    Simple,
    Medium,
    Complex,
}

impl ComplexityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Medium => "medium",
            Self::Complex => "complex",
        }
    }

    /// Inclusive agent-count range allocated to a run of this level.
    pub fn agent_range(&self) -> (usize, usize) {
        match self {
            Self::Simple => (1, 2),
            Self::Medium => (3, 5),
            Self::Complex => (5, 10),
        }
    }
}

// ── 执行策略 ─────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    DirectExecution,
    ParallelPool,
    DagStagedWaves,
}

impl Strategy {
    pub fn for_level(level: ComplexityLevel) -> Self {
        match level {
            ComplexityLevel::Simple => Self::DirectExecution,
            ComplexityLevel::Medium => Self::ParallelPool,
            ComplexityLevel::Complex => Self::DagStagedWaves,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectExecution => "direct_execution",
            Self::ParallelPool => "parallel_pool",
            Self::DagStagedWaves => "dag_staged_waves",
        }
    }
}

// ── 子任务 ───────────────────────────────────────────────────
/// One decomposed subtask. `depends_on` only ever references tasks with a
/// strictly smaller `index`, so the induced graph is acyclic by construction.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: String,
    pub index: usize,
    pub description: String,
    pub intent_type: String,
    pub cluster: String,
    pub depends_on: Vec<String>,
    pub status: TaskStatus,
    pub priority: u8,
}

/// Settled outcome of one dispatched (or skipped) subtask.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub task_id: String,
    pub description: String,
    pub status: TaskStatus,
    pub output: Option<String>,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub agent_id: Option<String>,
    pub wave: usize,
}

// ── 管线事件 ─────────────────────────────────────────────────
/// Structured events emitted to the optional renderer sink. The engine never
/// depends on a renderer being attached; absence changes nothing.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    StageCompleted {
        stage: &'static str,
        detail: String,
    },
    WaveStarted {
        wave: usize,
        total_waves: usize,
        tasks: usize,
    },
    TaskSettled {
        wave: usize,
        task_id: String,
        status: TaskStatus,
        duration_ms: u64,
    },
    WaveCompleted {
        wave: usize,
        completed: usize,
        failed: usize,
        skipped: usize,
    },
}

pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

// ── 引擎错误 ─────────────────────────────────────────────────
/// Fatal pipeline errors. Worker failures are absorbed into failed
/// `TaskResult`s and never appear here; persistence failures are logged at
/// the call site and never propagated.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("request is empty or whitespace only")]
    Parse,
    #[error("no eligible agents for cluster `{cluster}` at level {}", .level.as_str())]
    NoEligibleAgents {
        cluster: String,
        level: ComplexityLevel,
    },
    #[error("dependency cycle detected among tasks: {}", .remaining.join(", "))]
    CycleDetected { remaining: Vec<String> },
}
