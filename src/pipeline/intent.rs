use serde::Serialize;

/// Confidence assigned when no pattern matches at all.
const GENERAL_CONFIDENCE: f64 = 0.3;
/// Keyword matches needed for full confidence.
const FULL_CONFIDENCE_MATCHES: f64 = 3.0;

pub struct IntentPattern {
    pub intent_type: &'static str,
    pub cluster: &'static str,
    pub keywords: &'static [&'static str],
}

/// Built-in intent patterns. Registration order is the tie-break order for
/// equal confidence, so this table must stay stable.
pub const INTENT_PATTERNS: &[IntentPattern] = &[
    IntentPattern {
        intent_type: "code",
        cluster: "coding",
        keywords: &[
            "build",
            "implement",
            "code",
            "fix",
            "debug",
            "refactor",
            "api",
            "function",
            "test",
        ],
    },
    IntentPattern {
        intent_type: "research",
        cluster: "research",
        keywords: &[
            "research",
            "search",
            "investigate",
            "learn",
            "explore",
            "compare",
            "study",
        ],
    },
    IntentPattern {
        intent_type: "devops",
        cluster: "devops",
        keywords: &[
            "deploy",
            "deployment",
            "infrastructure",
            "docker",
            "kubernetes",
            "server",
            "production",
            "release",
            "monitor",
        ],
    },
    IntentPattern {
        intent_type: "design",
        cluster: "uiux",
        keywords: &["design", "ui", "ux", "layout", "wireframe", "interface", "style"],
    },
    IntentPattern {
        intent_type: "analysis",
        cluster: "analysis",
        keywords: &[
            "analyze",
            "analysis",
            "data",
            "report",
            "metrics",
            "statistics",
            "trends",
        ],
    },
    IntentPattern {
        intent_type: "planning",
        cluster: "evaluation",
        keywords: &["plan", "roadmap", "schedule", "organize", "strategy", "milestones"],
    },
];

#[derive(Debug, Clone, Serialize)]
pub struct SecondaryIntent {
    pub intent_type: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Intent {
    pub intent_type: String,
    pub cluster: String,
    pub confidence: f64,
    pub matched: Vec<String>,
    pub secondary: Vec<SecondaryIntent>,
}

/// Cluster owning an intent type. The `general` fallback (and anything
/// unrecognized) lands on the research cluster.
pub fn cluster_for(intent_type: &str) -> &'static str {
    INTENT_PATTERNS
        .iter()
        .find(|p| p.intent_type == intent_type)
        .map(|p| p.cluster)
        .unwrap_or("research")
}

/// Multi-label keyword scoring over the lowercased raw request.
///
/// Keywords match as substrings, so e.g. "deployment" counts for both
/// `deploy` and `deployment`. Patterns with zero matches are discarded;
/// confidence is `min(matches / 3, 1.0)`; ties keep registration order.
pub fn classify(raw: &str) -> Intent {
    let lower = raw.to_lowercase();

    let mut scored: Vec<(&IntentPattern, Vec<String>, f64)> = Vec::new();
    for pattern in INTENT_PATTERNS {
        let matched: Vec<String> = pattern
            .keywords
            .iter()
            .filter(|kw| lower.contains(*kw))
            .map(|kw| kw.to_string())
            .collect();
        if matched.is_empty() {
            continue;
        }
        let confidence = (matched.len() as f64 / FULL_CONFIDENCE_MATCHES).min(1.0);
        scored.push((pattern, matched, confidence));
    }

    // Stable sort: equal confidence keeps registration order.
    scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

    let Some((primary, matched, confidence)) = scored.first().cloned() else {
        return Intent {
            intent_type: "general".to_string(),
            cluster: "research".to_string(),
            confidence: GENERAL_CONFIDENCE,
            matched: Vec::new(),
            secondary: Vec::new(),
        };
    };

    let secondary = scored
        .iter()
        .skip(1)
        .map(|(p, _, c)| SecondaryIntent {
            intent_type: p.intent_type.to_string(),
            confidence: *c,
        })
        .collect();

    Intent {
        intent_type: primary.intent_type.to_string(),
        cluster: primary.cluster.to_string(),
        confidence,
        matched,
        secondary,
    }
}

#[cfg(test)]
mod tests {
    use super::{classify, cluster_for};

    #[test]
    fn unmatched_input_falls_back_to_general() {
        let intent = classify("list files");
        assert_eq!(intent.intent_type, "general");
        assert_eq!(intent.cluster, "research");
        assert_eq!(intent.confidence, 0.3);
        assert!(intent.matched.is_empty());
        assert!(intent.secondary.is_empty());
    }

    #[test]
    fn code_request_classifies_with_partial_confidence() {
        let intent = classify("build a REST API");
        assert_eq!(intent.intent_type, "code");
        assert_eq!(intent.cluster, "coding");
        // "build" + "api" = 2 of 3 matches.
        assert!((intent.confidence - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(intent.matched, vec!["build", "api"]);
    }

    #[test]
    fn three_matches_saturate_confidence() {
        let intent = classify("build API and write tests and deploy");
        assert_eq!(intent.intent_type, "code");
        assert_eq!(intent.confidence, 1.0);
    }

    #[test]
    fn ties_resolve_in_registration_order() {
        // code ("build", "api"), research ("research", "search" via substring),
        // and devops ("deploy", "production") all score 2 matches; design
        // trails with 1 ("ui" inside "build").
        let intent = classify("research OAuth then build API then deploy to production");
        assert_eq!(intent.intent_type, "code");
        let types: Vec<&str> = intent
            .secondary
            .iter()
            .map(|s| s.intent_type.as_str())
            .collect();
        assert_eq!(types, vec!["research", "devops", "design"]);
    }

    #[test]
    fn cluster_lookup_covers_fallback() {
        assert_eq!(cluster_for("devops"), "devops");
        assert_eq!(cluster_for("design"), "uiux");
        assert_eq!(cluster_for("planning"), "evaluation");
        assert_eq!(cluster_for("general"), "research");
    }
}
