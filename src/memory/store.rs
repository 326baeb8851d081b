#![allow(dead_code)]

use std::{collections::HashMap, fs, path::PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::hivebot_home_dir;

/// Performance log bounds: capped at 1000 entries; on overflow only the
/// newest 500 survive.
pub const PERFORMANCE_LOG_CAP: usize = 1000;
pub const PERFORMANCE_LOG_RETAIN: usize = 500;

const ENV_MEMORY_DIR: &str = "HIVEBOT_MEMORY_DIR";
const SNAPSHOT_FILENAME: &str = "snapshot.json";

/// One executed task folded into the performance log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRecord {
    pub timestamp: i64,
    pub agent_id: String,
    pub task_id: String,
    pub duration_ms: u64,
    pub success: bool,
    pub complexity: String,
    pub cluster: String,
}

/// A mined optimization pattern. Keys are unique; re-recording a key bumps
/// `applied_count` instead of adding a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    pub key: String,
    pub optimization: String,
    pub discovered_at: i64,
    pub last_applied: Option<i64>,
    pub applied_count: u64,
    pub quality: Option<f64>,
    pub avg_duration_ms: Option<f64>,
}

/// Serialized outcome of a high-quality request, kept for future retrieval.
/// `embedding` is reserved and stays empty for now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSolution {
    pub task_description: String,
    pub solution: String,
    pub stored_at: i64,
    pub embedding: Vec<f64>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    performance_memory: Vec<PerformanceRecord>,
    skill_evolution: Vec<Pattern>,
    vector_memory: Vec<TaskSolution>,
    saved_at: i64,
}

/// Four-layer state: ephemeral session KV, the capped performance log, the
/// pattern ledger, and the task-solution index. Only the last three are
/// persisted, as a single JSON snapshot.
pub struct MemoryStore {
    base: PathBuf,
    session: HashMap<String, Value>,
    performance: Vec<PerformanceRecord>,
    patterns: Vec<Pattern>,
    solutions: Vec<TaskSolution>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_base(default_memory_base_dir())
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self {
            base,
            session: HashMap::new(),
            performance: Vec::new(),
            patterns: Vec::new(),
            solutions: Vec::new(),
        }
    }

    // ── session KV（不持久化） ───────────────────────────────
    pub fn remember(&mut self, key: &str, value: Value) {
        self.session.insert(key.to_string(), value);
    }

    pub fn recall(&self, key: &str) -> Option<&Value> {
        self.session.get(key)
    }

    // ── performance log ──────────────────────────────────────
    pub fn record_performance(&mut self, record: PerformanceRecord) {
        self.performance.push(record);
        if self.performance.len() > PERFORMANCE_LOG_CAP {
            let cut = self.performance.len() - PERFORMANCE_LOG_RETAIN;
            self.performance.drain(..cut);
        }
    }

    pub fn performance(&self) -> &[PerformanceRecord] {
        &self.performance
    }

    /// Mean duration (ms) of logged runs for one cluster, if any exist.
    pub fn cluster_avg_duration(&self, cluster: &str) -> Option<f64> {
        let durations: Vec<u64> = self
            .performance
            .iter()
            .filter(|r| r.cluster == cluster)
            .map(|r| r.duration_ms)
            .collect();
        if durations.is_empty() {
            return None;
        }
        Some(durations.iter().sum::<u64>() as f64 / durations.len() as f64)
    }

    // ── pattern ledger ───────────────────────────────────────
    pub fn record_pattern(
        &mut self,
        key: &str,
        optimization: &str,
        quality: Option<f64>,
        avg_duration_ms: Option<f64>,
    ) {
        let now = now_ms();
        if let Some(existing) = self.patterns.iter_mut().find(|p| p.key == key) {
            existing.applied_count += 1;
            existing.last_applied = Some(now);
            existing.quality = quality.or(existing.quality);
            existing.avg_duration_ms = avg_duration_ms.or(existing.avg_duration_ms);
            return;
        }
        self.patterns.push(Pattern {
            key: key.to_string(),
            optimization: optimization.to_string(),
            discovered_at: now,
            last_applied: None,
            applied_count: 1,
            quality,
            avg_duration_ms,
        });
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    // ── task-solution index ──────────────────────────────────
    pub fn store_solution(&mut self, task_description: &str, solution: &str) {
        self.solutions.push(TaskSolution {
            task_description: task_description.to_string(),
            solution: solution.to_string(),
            stored_at: now_ms(),
            embedding: Vec::new(),
        });
    }

    pub fn solutions(&self) -> &[TaskSolution] {
        &self.solutions
    }

    // ── snapshot persistence ─────────────────────────────────
    pub fn snapshot_path(&self) -> PathBuf {
        self.base.join(SNAPSHOT_FILENAME)
    }

    /// Write the persistent layers as one JSON document. Session memory is
    /// never saved.
    pub fn save(&self) -> Result<()> {
        let path = self.snapshot_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create `{}`", parent.display()))?;
        }
        let snapshot = Snapshot {
            performance_memory: self.performance.clone(),
            skill_evolution: self.patterns.clone(),
            vector_memory: self.solutions.clone(),
            saved_at: now_ms(),
        };
        let text = serde_json::to_string_pretty(&snapshot)?;
        fs::write(&path, text).with_context(|| format!("failed to write `{}`", path.display()))?;
        Ok(())
    }

    /// Load a snapshot if one exists. A missing file means a fresh start and
    /// is not an error; a corrupt one is.
    pub fn load(&mut self) -> Result<()> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&text)
            .with_context(|| format!("`{}` is not a valid snapshot", path.display()))?;
        self.performance = snapshot.performance_memory;
        self.patterns = snapshot.skill_evolution;
        self.solutions = snapshot.vector_memory;
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn now_ms() -> i64 {
    chrono::Local::now().timestamp_millis()
}

fn default_memory_base_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(ENV_MEMORY_DIR) {
        let p = PathBuf::from(dir);
        if !p.as_os_str().is_empty() {
            return p;
        }
    }
    hivebot_home_dir()
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        path::PathBuf,
        sync::atomic::{AtomicU64, Ordering},
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::{MemoryStore, PERFORMANCE_LOG_CAP, PERFORMANCE_LOG_RETAIN, PerformanceRecord};

    static NEXT_TEST_ID: AtomicU64 = AtomicU64::new(0);

    fn unique_base() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let id = NEXT_TEST_ID.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("hivebot-memory-test-{nanos}-{id}"))
    }

    fn record(n: u64, cluster: &str) -> PerformanceRecord {
        PerformanceRecord {
            timestamp: n as i64,
            agent_id: format!("agent{n}"),
            task_id: format!("task{n:04}"),
            duration_ms: n,
            success: true,
            complexity: "simple".to_string(),
            cluster: cluster.to_string(),
        }
    }

    #[test]
    fn performance_log_truncates_to_newest_500_on_overflow() {
        let mut store = MemoryStore::with_base(unique_base());
        for n in 0..=PERFORMANCE_LOG_CAP as u64 {
            store.record_performance(record(n, "coding"));
            assert!(store.performance().len() <= PERFORMANCE_LOG_CAP);
        }
        assert_eq!(store.performance().len(), PERFORMANCE_LOG_RETAIN);
        // Newest retained: the tail ends at the last record written.
        assert_eq!(
            store.performance().last().expect("tail").duration_ms,
            PERFORMANCE_LOG_CAP as u64
        );
    }

    #[test]
    fn pattern_recording_deduplicates_on_key() {
        let mut store = MemoryStore::with_base(unique_base());
        for _ in 0..5 {
            store.record_pattern("code:simple", "works well", Some(0.9), Some(120.0));
        }
        store.record_pattern("fast_execution:code", "fast path", None, Some(80.0));

        assert_eq!(store.patterns().len(), 2);
        let first = &store.patterns()[0];
        assert_eq!(first.key, "code:simple");
        assert_eq!(first.applied_count, 5);
        assert!(first.last_applied.is_some());
    }

    #[test]
    fn cluster_average_ignores_other_clusters() {
        let mut store = MemoryStore::with_base(unique_base());
        store.record_performance(record(100, "coding"));
        store.record_performance(record(300, "coding"));
        store.record_performance(record(900, "devops"));

        assert_eq!(store.cluster_avg_duration("coding"), Some(200.0));
        assert_eq!(store.cluster_avg_duration("devops"), Some(900.0));
        assert_eq!(store.cluster_avg_duration("uiux"), None);
    }

    #[test]
    fn snapshot_round_trips_every_persistent_layer() {
        let base = unique_base();
        let mut store = MemoryStore::with_base(base.clone());
        store.record_performance(record(42, "coding"));
        store.record_pattern("code:medium", "solid", Some(0.85), None);
        store.store_solution("build API", "{\"quality\":0.9}");
        store.remember("cli:last_output", serde_json::json!("done"));
        store.save().expect("save");

        let mut fresh = MemoryStore::with_base(base.clone());
        fresh.load().expect("load");
        assert_eq!(fresh.performance(), store.performance());
        assert_eq!(fresh.patterns(), store.patterns());
        assert_eq!(fresh.solutions(), store.solutions());
        // Session memory never persists.
        assert!(fresh.recall("cli:last_output").is_none());

        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn loading_without_a_snapshot_is_a_fresh_start() {
        let mut store = MemoryStore::with_base(unique_base());
        store.load().expect("absent file is fine");
        assert!(store.performance().is_empty());
        assert!(store.patterns().is_empty());
        assert!(store.solutions().is_empty());
    }
}
