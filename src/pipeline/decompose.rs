use std::{collections::HashSet, sync::OnceLock};

use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

use crate::pipeline::intent::Intent;
use crate::types::{Task, TaskStatus};

/// Whole-word connectors the splitter breaks on, besides `.` and `;`.
pub const CONNECTORS: &[&str] = &["and", "then", "also", "plus", "with", "after"];
/// Connector tokens that make the following fragment depend on the previous one.
pub const SEQUENCE_MARKERS: &[&str] = &["then", "after", "once", "when", "finally", "next"];

const LONG_FRAGMENT_WORDS: usize = 10;
const MAX_PRIORITY: u8 = 5;
const TASK_ID_LEN: usize = 8;

#[derive(Debug, Clone, Serialize)]
pub struct Decomposition {
    pub tasks: Vec<Task>,
    pub has_parallelizable: bool,
}

fn splitter() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(and|then|also|plus|with|after)\b|[.;]\s*").expect("splitter literal")
    })
}

/// Split a raw request into subtasks and infer sequential vs parallel edges.
///
/// A fragment depends on its predecessor when the delimiter captured
/// immediately before it is a sequence marker. Doubled connectors
/// ("and then") leave an empty fragment between them that gets dropped, so
/// the surviving fragment picks up the second token; edge attribution is
/// approximate in that case and intentionally left so.
pub fn decompose(raw: &str, intent: &Intent) -> Decomposition {
    let mut fragments: Vec<(String, Option<String>)> = Vec::new();
    let mut last_end = 0usize;
    let mut pending_connector: Option<String> = None;

    for caps in splitter().captures_iter(raw) {
        let whole = caps.get(0).expect("match 0 always present");
        let fragment = raw[last_end..whole.start()].trim().to_string();
        fragments.push((fragment, pending_connector.take()));
        pending_connector = caps.get(1).map(|c| c.as_str().to_lowercase());
        last_end = whole.end();
    }
    fragments.push((raw[last_end..].trim().to_string(), pending_connector.take()));

    let surviving: Vec<(String, Option<String>)> = fragments
        .into_iter()
        .filter(|(text, _)| text.chars().count() > 2)
        .filter(|(text, _)| {
            let lower = text.to_lowercase();
            !CONNECTORS.contains(&lower.as_str())
        })
        .collect();

    let mut tasks = Vec::new();
    let mut used_ids: HashSet<String> = HashSet::new();
    let mut prev_id: Option<String> = None;

    if surviving.is_empty() {
        // Nothing splittable: the whole request becomes a single root task.
        let id = fresh_task_id(&mut used_ids);
        tasks.push(build_task(id, 0, raw.trim().to_string(), intent, Vec::new()));
    } else {
        for (index, (text, connector)) in surviving.into_iter().enumerate() {
            let depends_on = match (&prev_id, connector.as_deref()) {
                (Some(prev), Some(conn)) if SEQUENCE_MARKERS.contains(&conn) => {
                    vec![prev.clone()]
                }
                _ => Vec::new(),
            };
            let id = fresh_task_id(&mut used_ids);
            prev_id = Some(id.clone());
            tasks.push(build_task(id, index, text, intent, depends_on));
        }
    }

    let roots = tasks.iter().filter(|t| t.depends_on.is_empty()).count();
    Decomposition {
        has_parallelizable: roots >= 2,
        tasks,
    }
}

fn build_task(
    id: String,
    index: usize,
    description: String,
    intent: &Intent,
    depends_on: Vec<String>,
) -> Task {
    let mut priority = 1u8;
    if matches!(intent.intent_type.as_str(), "code" | "devops") {
        priority += 1;
    }
    if description.split_whitespace().count() > LONG_FRAGMENT_WORDS {
        priority += 1;
    }
    Task {
        id,
        index,
        description,
        intent_type: intent.intent_type.clone(),
        cluster: intent.cluster.clone(),
        depends_on,
        status: TaskStatus::Pending,
        priority: priority.min(MAX_PRIORITY),
    }
}

/// 8-hex-char task id. Collisions inside one decomposition are vanishingly
/// rare but still regenerated so ids stay unique deterministically.
fn fresh_task_id(used: &mut HashSet<String>) -> String {
    loop {
        let full = Uuid::new_v4().simple().to_string();
        let id = full[..TASK_ID_LEN].to_string();
        if used.insert(id.clone()) {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::decompose;
    use crate::pipeline::intent::classify;

    #[test]
    fn sequence_markers_create_a_chain() {
        let raw = "research OAuth then build API then deploy to production";
        let intent = classify(raw);
        let d = decompose(raw, &intent);
        assert_eq!(d.tasks.len(), 3);
        assert!(d.tasks[0].depends_on.is_empty());
        assert_eq!(d.tasks[1].depends_on, vec![d.tasks[0].id.clone()]);
        assert_eq!(d.tasks[2].depends_on, vec![d.tasks[1].id.clone()]);
        assert!(!d.has_parallelizable);
    }

    #[test]
    fn plain_and_yields_parallel_roots() {
        let raw = "build API and write tests and deploy";
        let intent = classify(raw);
        let d = decompose(raw, &intent);
        assert_eq!(d.tasks.len(), 3);
        assert!(d.tasks.iter().all(|t| t.depends_on.is_empty()));
        assert!(d.has_parallelizable);
    }

    #[test]
    fn unsplittable_input_becomes_one_task() {
        let raw = "list files";
        let intent = classify(raw);
        let d = decompose(raw, &intent);
        assert_eq!(d.tasks.len(), 1);
        assert_eq!(d.tasks[0].description, "list files");
        assert!(d.tasks[0].depends_on.is_empty());
        assert!(!d.has_parallelizable);
    }

    #[test]
    fn dependencies_always_point_backwards() {
        let raw = "plan the rollout. build it; then verify and also document everything after review";
        let intent = classify(raw);
        let d = decompose(raw, &intent);
        for (i, task) in d.tasks.iter().enumerate() {
            assert_eq!(task.index, i);
            for dep in &task.depends_on {
                let dep_index = d
                    .tasks
                    .iter()
                    .position(|t| &t.id == dep)
                    .expect("dep exists");
                assert!(dep_index < i);
            }
        }
    }

    #[test]
    fn short_fragments_and_bare_connectors_are_dropped() {
        let raw = "ok and build the service then go";
        let intent = classify(raw);
        let d = decompose(raw, &intent);
        // "ok" (<= 2 chars) is dropped; "build the service" and "go"... "go"
        // is also too short, leaving one task.
        assert_eq!(d.tasks.len(), 1);
        assert_eq!(d.tasks[0].description, "build the service");
    }

    #[test]
    fn ids_are_eight_hex_chars_and_unique() {
        let raw = "build API and write tests and deploy and document and review";
        let intent = classify(raw);
        let d = decompose(raw, &intent);
        let mut seen = std::collections::HashSet::new();
        for task in &d.tasks {
            assert_eq!(task.id.len(), 8);
            assert!(task.id.chars().all(|c| c.is_ascii_hexdigit()));
            assert!(seen.insert(task.id.clone()));
        }
    }

    #[test]
    fn priority_reflects_intent_and_length() {
        let raw = "build API and implement the long follow-up integration suite covering every edge case we know about";
        let intent = classify(raw);
        let d = decompose(raw, &intent);
        // code intent: +1 on top of base for every task.
        assert!(d.tasks.iter().all(|t| t.priority >= 2));
        let long = d
            .tasks
            .iter()
            .find(|t| t.description.starts_with("implement"))
            .expect("long fragment");
        assert_eq!(long.priority, 3);
    }
}
