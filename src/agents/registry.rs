#![allow(dead_code)]

use indexmap::IndexMap;
use serde::Serialize;

use crate::types::ComplexityLevel;

pub const MIN_CONFIDENCE: f64 = 0.1;
pub const MAX_CONFIDENCE: f64 = 1.0;
/// EMA weight for both avg execution time and failure rate.
const METRIC_EMA_ALPHA: f64 = 0.3;
const FAST_SUCCESS_BOOST: f64 = 0.02;
const FAILURE_PENALTY: f64 = 0.05;

/// A named worker profile, not a thread. Confidence is the ranking key in
/// [`AgentRegistry::find_agents`] and the target of reinforcement updates.
#[derive(Debug, Clone, Serialize)]
pub struct Agent {
    pub id: String,
    pub role: String,
    pub cluster: String,
    pub skills: Vec<String>,
    pub levels: Vec<ComplexityLevel>,
    pub confidence: f64,
    /// Seconds; seeded, then an EMA over observed durations.
    pub avg_execution_time: f64,
    pub total_executions: u64,
    pub failure_rate: f64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub description: String,
    pub members: Vec<String>,
}

/// Lookup filter; `None` fields don't filter. Skills match on any overlap.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentQuery<'a> {
    pub cluster: Option<&'a str>,
    pub skills: Option<&'a [&'a str]>,
    pub complexity: Option<ComplexityLevel>,
}

/// Catalog of agents grouped by cluster. Built once with the built-in seeds
/// and mutated only through metric and confidence updates. Insertion order
/// is preserved so equal-confidence ranking stays stable.
pub struct AgentRegistry {
    clusters: IndexMap<String, Cluster>,
    agents: IndexMap<String, Agent>,
}

impl AgentRegistry {
    /// The built-in clusters and agents. The seeds (ids, skills, confidence,
    /// avg times) are part of the external interface: ranking and the
    /// end-to-end behaviours are reproducible only against these values.
    pub fn with_builtin() -> Self {
        let created_at = chrono::Local::now().timestamp_millis();
        let mut registry = Self {
            clusters: IndexMap::new(),
            agents: IndexMap::new(),
        };

        for (id, name, description) in [
            ("research", "Research", "Information gathering and synthesis"),
            ("coding", "Coding", "Implementation, debugging and review"),
            ("devops", "DevOps", "Deployment and infrastructure work"),
            ("uiux", "UI/UX", "Interface and interaction design"),
            ("analysis", "Analysis", "Data analysis and reporting"),
            ("evaluation", "Evaluation", "Quality review and planning"),
        ] {
            registry.clusters.insert(
                id.to_string(),
                Cluster {
                    id: id.to_string(),
                    name: name.to_string(),
                    description: description.to_string(),
                    members: Vec::new(),
                },
            );
        }

        type Seed = (
            &'static str,
            &'static str,
            &'static str,
            &'static [&'static str],
            &'static [ComplexityLevel],
            f64,
            f64,
        );
        const ALL: &[ComplexityLevel] = &[
            ComplexityLevel::Simple,
            ComplexityLevel::Medium,
            ComplexityLevel::Complex,
        ];
        const LOW: &[ComplexityLevel] = &[ComplexityLevel::Simple, ComplexityLevel::Medium];
        const HIGH: &[ComplexityLevel] = &[ComplexityLevel::Medium, ComplexityLevel::Complex];

        let seeds: &[Seed] = &[
            (
                "research_agent_v1",
                "Research Specialist",
                "research",
                &["search", "synthesis", "sources"],
                ALL,
                0.75,
                3.2,
            ),
            (
                "docs_agent_v1",
                "Documentation Scout",
                "research",
                &["docs", "summaries", "examples"],
                LOW,
                0.68,
                2.4,
            ),
            (
                "code_agent_v2",
                "Senior Implementation Engineer",
                "coding",
                &["rust", "apis", "debugging", "testing"],
                ALL,
                0.85,
                4.5,
            ),
            (
                "code_agent_v1",
                "Implementation Engineer",
                "coding",
                &["implementation", "refactoring"],
                LOW,
                0.72,
                5.1,
            ),
            (
                "refactor_agent_v1",
                "Refactoring Specialist",
                "coding",
                &["refactoring", "cleanup", "patterns"],
                HIGH,
                0.70,
                3.8,
            ),
            (
                "devops_agent_v1",
                "Deployment Engineer",
                "devops",
                &["deploy", "ci", "containers"],
                ALL,
                0.80,
                6.0,
            ),
            (
                "infra_agent_v1",
                "Infrastructure Engineer",
                "devops",
                &["provisioning", "networking", "monitoring"],
                HIGH,
                0.66,
                7.5,
            ),
            (
                "design_agent_v1",
                "Interface Designer",
                "uiux",
                &["layout", "wireframes", "accessibility"],
                ALL,
                0.74,
                3.5,
            ),
            (
                "analysis_agent_v1",
                "Data Analyst",
                "analysis",
                &["statistics", "reporting", "trends"],
                ALL,
                0.78,
                4.2,
            ),
            (
                "data_agent_v1",
                "Data Engineer",
                "analysis",
                &["pipelines", "cleaning", "aggregation"],
                HIGH,
                0.69,
                5.6,
            ),
            (
                "review_agent_v1",
                "Quality Reviewer",
                "evaluation",
                &["review", "verification", "planning"],
                ALL,
                0.77,
                2.8,
            ),
        ];

        for (id, role, cluster, skills, levels, confidence, avg_secs) in seeds {
            registry.insert_agent(Agent {
                id: id.to_string(),
                role: role.to_string(),
                cluster: cluster.to_string(),
                skills: skills.iter().map(|s| s.to_string()).collect(),
                levels: levels.to_vec(),
                confidence: *confidence,
                avg_execution_time: *avg_secs,
                total_executions: 0,
                failure_rate: 0.0,
                created_at,
            });
        }

        registry
    }

    fn insert_agent(&mut self, agent: Agent) {
        if let Some(cluster) = self.clusters.get_mut(&agent.cluster) {
            cluster.members.push(agent.id.clone());
        }
        self.agents.insert(agent.id.clone(), agent);
    }

    pub fn get(&self, agent_id: &str) -> Option<&Agent> {
        self.agents.get(agent_id)
    }

    pub fn cluster(&self, cluster_id: &str) -> Option<&Cluster> {
        self.clusters.get(cluster_id)
    }

    pub fn clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.values()
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Filter by cluster equality, any-skill overlap, and supported
    /// complexity, then rank by confidence descending. The sort is stable:
    /// equal confidence keeps registry insertion order.
    pub fn find_agents(&self, query: &AgentQuery<'_>) -> Vec<Agent> {
        let mut found: Vec<Agent> = self
            .agents
            .values()
            .filter(|a| query.cluster.is_none_or(|c| a.cluster == c))
            .filter(|a| {
                query.skills.is_none_or(|wanted| {
                    wanted
                        .iter()
                        .any(|s| a.skills.iter().any(|have| have.as_str() == *s))
                })
            })
            .filter(|a| query.complexity.is_none_or(|lvl| a.levels.contains(&lvl)))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        found
    }

    /// Fold one execution into an agent's rolling metrics and nudge its
    /// confidence: a success faster than the running average earns a small
    /// boost, a failure a larger penalty. Both stay inside
    /// [MIN_CONFIDENCE, MAX_CONFIDENCE].
    pub fn update_agent_metrics(&mut self, agent_id: &str, duration_secs: f64, failed: bool) {
        let Some(agent) = self.agents.get_mut(agent_id) else {
            tracing::warn!("metrics update for unknown agent `{agent_id}`");
            return;
        };
        agent.total_executions += 1;
        agent.avg_execution_time =
            METRIC_EMA_ALPHA * duration_secs + (1.0 - METRIC_EMA_ALPHA) * agent.avg_execution_time;
        let failure_sample = if failed { 1.0 } else { 0.0 };
        agent.failure_rate =
            METRIC_EMA_ALPHA * failure_sample + (1.0 - METRIC_EMA_ALPHA) * agent.failure_rate;

        if failed {
            agent.confidence = (agent.confidence - FAILURE_PENALTY).max(MIN_CONFIDENCE);
        } else if duration_secs < agent.avg_execution_time {
            agent.confidence = (agent.confidence + FAST_SUCCESS_BOOST).min(MAX_CONFIDENCE);
        }
    }

    /// Batched-reinforcement entry point: apply a signed confidence delta,
    /// clamp into bounds and round to three decimals.
    pub fn apply_confidence_delta(&mut self, agent_id: &str, delta: f64) {
        let Some(agent) = self.agents.get_mut(agent_id) else {
            tracing::warn!("confidence delta for unknown agent `{agent_id}`");
            return;
        };
        let next = (agent.confidence + delta).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE);
        agent.confidence = (next * 1000.0).round() / 1000.0;
    }
}
