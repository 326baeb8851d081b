#![allow(dead_code)]

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::types::{EngineError, Task, TaskResult, TaskStatus};

/// One DAG node. `dependents` is the reverse of `depends_on`, computed at
/// build time; the two stay symmetric for the lifetime of the graph.
#[derive(Debug, Clone)]
pub struct DagNode {
    pub task: Task,
    pub depends_on: HashSet<String>,
    pub dependents: HashSet<String>,
    pub status: TaskStatus,
    pub result: Option<TaskResult>,
}

/// Task graph plus its topological waves. Node iteration follows task index
/// order (insertion order), so wave membership is deterministic.
#[derive(Debug, Clone)]
pub struct TaskDag {
    nodes: IndexMap<String, DagNode>,
    waves: Vec<Vec<String>>,
}

impl TaskDag {
    /// Build nodes, wire reverse edges, then extract waves by repeated
    /// frontier scans. The decomposer cannot produce cycles; a stalled
    /// frontier with nodes remaining is still reported defensively.
    pub fn build(tasks: &[Task]) -> Result<Self, EngineError> {
        let mut nodes: IndexMap<String, DagNode> = IndexMap::with_capacity(tasks.len());
        for task in tasks {
            nodes.insert(
                task.id.clone(),
                DagNode {
                    depends_on: task.depends_on.iter().cloned().collect(),
                    dependents: HashSet::new(),
                    status: TaskStatus::Pending,
                    result: None,
                    task: task.clone(),
                },
            );
        }

        let edges: Vec<(String, String)> = nodes
            .iter()
            .flat_map(|(id, node)| {
                node.depends_on
                    .iter()
                    .map(|dep| (dep.clone(), id.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        for (dep, dependent) in edges {
            if let Some(node) = nodes.get_mut(&dep) {
                node.dependents.insert(dependent);
            }
        }

        let mut waves: Vec<Vec<String>> = Vec::new();
        let mut completed: HashSet<String> = HashSet::new();
        while completed.len() < nodes.len() {
            let frontier: Vec<String> = nodes
                .iter()
                .filter(|(id, node)| {
                    !completed.contains(*id)
                        && node.depends_on.iter().all(|dep| completed.contains(dep))
                })
                .map(|(id, _)| id.clone())
                .collect();
            if frontier.is_empty() {
                let remaining: Vec<String> = nodes
                    .keys()
                    .filter(|id| !completed.contains(*id))
                    .cloned()
                    .collect();
                return Err(EngineError::CycleDetected { remaining });
            }
            for id in &frontier {
                if let Some(node) = nodes.get_mut(id) {
                    node.status = TaskStatus::Scheduled;
                }
                completed.insert(id.clone());
            }
            waves.push(frontier);
        }

        Ok(Self { nodes, waves })
    }

    pub fn waves(&self) -> &[Vec<String>] {
        &self.waves
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&DagNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut DagNode> {
        self.nodes.get_mut(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DagNode> {
        self.nodes.values()
    }

    /// Transitively mark every not-yet-dispatched dependent of a failed node
    /// as skipped. Returns the ids that were newly skipped.
    pub fn skip_dependents(&mut self, failed_id: &str) -> Vec<String> {
        let mut skipped = Vec::new();
        let mut queue: Vec<String> = match self.nodes.get(failed_id) {
            Some(node) => node.dependents.iter().cloned().collect(),
            None => return skipped,
        };
        while let Some(id) = queue.pop() {
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            if node.status == TaskStatus::Scheduled {
                node.status = TaskStatus::Skipped;
                skipped.push(id.clone());
            }
            // Walk on regardless: a dependent may already be skipped via
            // another failed upstream, but nodes below it still need visiting.
            let next: Vec<String> = match self.nodes.get(&id) {
                Some(node) if node.status == TaskStatus::Skipped => {
                    node.dependents.iter().cloned().collect()
                }
                _ => Vec::new(),
            };
            queue.extend(next);
        }
        skipped
    }
}

#[cfg(test)]
mod tests {
    use super::TaskDag;
    use crate::types::{EngineError, Task, TaskStatus};

    fn task(id: &str, index: usize, deps: &[&str]) -> Task {
        Task {
            id: id.to_string(),
            index,
            description: format!("task {id}"),
            intent_type: "code".to_string(),
            cluster: "coding".to_string(),
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            status: TaskStatus::Pending,
            priority: 1,
        }
    }

    #[test]
    fn waves_partition_nodes_and_respect_dependencies() {
        // a, b roots; c needs both; d needs c; e independent.
        let tasks = vec![
            task("a", 0, &[]),
            task("b", 1, &[]),
            task("c", 2, &["a", "b"]),
            task("d", 3, &["c"]),
            task("e", 4, &[]),
        ];
        let dag = TaskDag::build(&tasks).expect("acyclic");

        let flattened: Vec<&String> = dag.waves().iter().flatten().collect();
        assert_eq!(flattened.len(), dag.len());
        assert_eq!(dag.waves().len(), 3);
        assert_eq!(dag.waves()[0], vec!["a", "b", "e"]);
        assert_eq!(dag.waves()[1], vec!["c"]);
        assert_eq!(dag.waves()[2], vec!["d"]);

        // Every dependency of wave k sits in a wave strictly before k.
        for (k, wave) in dag.waves().iter().enumerate() {
            for id in wave {
                let node = dag.node(id).expect("node");
                for dep in &node.depends_on {
                    let dep_wave = dag
                        .waves()
                        .iter()
                        .position(|w| w.contains(dep))
                        .expect("dep scheduled");
                    assert!(dep_wave < k);
                }
            }
        }
    }

    #[test]
    fn reverse_edges_mirror_forward_edges() {
        let tasks = vec![task("a", 0, &[]), task("b", 1, &["a"]), task("c", 2, &["a", "b"])];
        let dag = TaskDag::build(&tasks).expect("acyclic");
        for node in dag.nodes() {
            for dep in &node.depends_on {
                assert!(
                    dag.node(dep)
                        .expect("dep node")
                        .dependents
                        .contains(&node.task.id)
                );
            }
            for dependent in &node.dependents {
                assert!(
                    dag.node(dependent)
                        .expect("dependent node")
                        .depends_on
                        .contains(&node.task.id)
                );
            }
        }
    }

    #[test]
    fn all_roots_collapse_into_one_wave() {
        let tasks = vec![task("a", 0, &[]), task("b", 1, &[]), task("c", 2, &[])];
        let dag = TaskDag::build(&tasks).expect("acyclic");
        assert_eq!(dag.waves().len(), 1);
        assert_eq!(dag.waves()[0].len(), 3);
    }

    #[test]
    fn cycle_is_reported_with_remaining_ids() {
        let tasks = vec![task("a", 0, &["b"]), task("b", 1, &["a"]), task("c", 2, &[])];
        let err = TaskDag::build(&tasks).expect_err("cycle");
        match err {
            EngineError::CycleDetected { remaining } => {
                assert_eq!(remaining, vec!["a", "b"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn skip_propagates_transitively_but_only_to_undispatched_nodes() {
        let tasks = vec![
            task("a", 0, &[]),
            task("b", 1, &["a"]),
            task("c", 2, &["b"]),
            task("d", 3, &[]),
        ];
        let mut dag = TaskDag::build(&tasks).expect("acyclic");
        dag.node_mut("a").expect("a").status = TaskStatus::Failed;

        let mut skipped = dag.skip_dependents("a");
        skipped.sort();
        assert_eq!(skipped, vec!["b", "c"]);
        assert_eq!(dag.node("d").expect("d").status, TaskStatus::Scheduled);

        // Re-walking is idempotent.
        assert!(dag.skip_dependents("a").is_empty());
    }

    #[test]
    fn empty_graph_builds_with_no_waves() {
        let dag = TaskDag::build(&[]).expect("empty");
        assert!(dag.is_empty());
        assert!(dag.waves().is_empty());
    }
}
