use indexmap::IndexMap;
use serde::Serialize;

use crate::agents::registry::{Agent, AgentQuery, AgentRegistry};
use crate::pipeline::complexity::Complexity;
use crate::pipeline::decompose::Decomposition;
use crate::pipeline::intent::{Intent, cluster_for};
use crate::types::{ComplexityLevel, EngineError, Strategy};

/// Hard ceiling on selected agents for complex runs.
const COMPLEX_POOL_CAP: usize = 10;

/// Per-request agent selection: a deduplicated pool plus a non-empty agent
/// assignment for every task.
#[derive(Debug, Clone, Serialize)]
pub struct Allocation {
    pub agents: Vec<Agent>,
    pub assignments: IndexMap<String, Vec<String>>,
    pub strategy: Strategy,
}

/// Pool candidates from the primary cluster, then every secondary cluster,
/// dedupe by id preserving order, cut down by level, and assign per task by
/// cluster match (first selected agent as the fallback).
pub fn allocate(
    registry: &AgentRegistry,
    decomposition: &Decomposition,
    complexity: &Complexity,
    intent: &Intent,
) -> Result<Allocation, EngineError> {
    let level = complexity.level;

    let mut pool: Vec<Agent> = registry.find_agents(&AgentQuery {
        cluster: Some(&intent.cluster),
        skills: None,
        complexity: Some(level),
    });
    for secondary in &intent.secondary {
        pool.extend(registry.find_agents(&AgentQuery {
            cluster: Some(cluster_for(&secondary.intent_type)),
            skills: None,
            complexity: Some(level),
        }));
    }

    let mut seen = std::collections::HashSet::new();
    let deduped: Vec<Agent> = pool
        .into_iter()
        .filter(|a| seen.insert(a.id.clone()))
        .collect();

    let keep = match level {
        ComplexityLevel::Simple => complexity.agent_count.max(1),
        ComplexityLevel::Medium => complexity.agent_count,
        ComplexityLevel::Complex => deduped.len().min(COMPLEX_POOL_CAP),
    };
    let selected: Vec<Agent> = deduped.into_iter().take(keep).collect();

    if selected.is_empty() {
        return Err(EngineError::NoEligibleAgents {
            cluster: intent.cluster.clone(),
            level,
        });
    }

    let mut assignments = IndexMap::new();
    for task in &decomposition.tasks {
        let mut ids: Vec<String> = selected
            .iter()
            .filter(|a| a.cluster == task.cluster)
            .map(|a| a.id.clone())
            .collect();
        if ids.is_empty() {
            ids.push(selected[0].id.clone());
        }
        assignments.insert(task.id.clone(), ids);
    }

    Ok(Allocation {
        agents: selected,
        assignments,
        strategy: Strategy::for_level(level),
    })
}
