#![allow(dead_code)]

use std::{
    collections::hash_map::DefaultHasher,
    future::Future,
    hash::{Hash, Hasher},
    pin::Pin,
    sync::Arc,
    time::Duration,
};

use anyhow::Result;
use serde_json::{Value, json};

use crate::permission::PermissionGate;

/// One unit of work handed to the pool: a task plus its assigned agents.
#[derive(Debug, Clone)]
pub struct WorkJob {
    pub task_id: String,
    pub description: String,
    pub agent_ids: Vec<String>,
    pub wave: usize,
}

/// What a worker body returns on success.
#[derive(Debug, Clone)]
pub struct WorkOutput {
    pub output: String,
    pub metadata: Value,
}

/// Per-request context threaded through to worker bodies. Side effects a
/// body wants to perform go through the gate.
#[derive(Clone)]
pub struct WorkCtx {
    pub session: String,
    pub gate: Arc<dyn PermissionGate>,
}

pub type WorkFuture<'a> = Pin<Box<dyn Future<Output = Result<WorkOutput>> + Send + 'a>>;

/// The single injection point for a real backend: execute a job and return
/// either an output record or a failure. The engine treats the body as
/// opaque and only validates the `Result` contract at this boundary.
pub trait TaskWorker: Send + Sync {
    fn execute<'a>(&'a self, job: &'a WorkJob, ctx: &'a WorkCtx) -> WorkFuture<'a>;
}

/// Default body: a deterministic-shape simulator. Sleeps 50–250 ms (derived
/// from the description hash, so the same job always takes the same time)
/// and echoes the lead agent plus the task.
pub struct SimulatedWorker;

const SIM_SLEEP_FLOOR_MS: u64 = 50;
const SIM_SLEEP_SPAN_MS: u64 = 201;

impl TaskWorker for SimulatedWorker {
    fn execute<'a>(&'a self, job: &'a WorkJob, _ctx: &'a WorkCtx) -> WorkFuture<'a> {
        Box::pin(async move {
            let sleep_ms = SIM_SLEEP_FLOOR_MS + text_hash(&job.description) % SIM_SLEEP_SPAN_MS;
            tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
            let agent = job
                .agent_ids
                .first()
                .map(String::as_str)
                .unwrap_or("unassigned");
            Ok(WorkOutput {
                output: format!("[{agent}] handled: {}", job.description),
                metadata: json!({ "simulated": true, "sleep_ms": sleep_ms }),
            })
        })
    }
}

/// Adapter for synchronous closures; mostly useful to inject failure shapes
/// in tests and demos.
pub struct FnWorker<F>(pub F);

impl<F> TaskWorker for FnWorker<F>
where
    F: Fn(&WorkJob, &WorkCtx) -> Result<WorkOutput> + Send + Sync,
{
    fn execute<'a>(&'a self, job: &'a WorkJob, ctx: &'a WorkCtx) -> WorkFuture<'a> {
        let result = (self.0)(job, ctx);
        Box::pin(async move { result })
    }
}

fn text_hash(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}
