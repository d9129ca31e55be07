//! Relevance tagging of extracted articles against an organization's
//! keyword profile. Pure functions, no I/O.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Read-only keyword profile supplied by the surrounding system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeywordProfile {
    #[serde(default)]
    pub focus_areas: Vec<String>,
    #[serde(default)]
    pub preferred_terms: Vec<String>,
    #[serde(default)]
    pub enabled_objectives: Vec<String>,
}

impl KeywordProfile {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Seed terms contributed by each objective category an organization can
/// enable.
pub const OBJECTIVE_SEED_TERMS: &[(&str, &[&str])] = &[
    (
        "education",
        &["learn", "learning", "science", "research", "study", "discovery"],
    ),
    (
        "environment",
        &["climate", "conservation", "sustainability", "wildlife", "pollution", "habitat"],
    ),
    (
        "health",
        &["health", "wellness", "medicine", "disease", "treatment", "nutrition"],
    ),
    (
        "community",
        &["community", "neighborhood", "volunteer", "civic", "local"],
    ),
    (
        "equity",
        &["equity", "inclusion", "justice", "rights", "accessibility"],
    ),
    (
        "arts",
        &["art", "culture", "museum", "music", "theater", "creative"],
    ),
    (
        "youth",
        &["youth", "children", "school", "mentorship", "family"],
    ),
    (
        "economy",
        &["economy", "jobs", "employment", "workforce", "entrepreneurship"],
    ),
];

const FOCUS_MATCH_POINTS: i64 = 25;
const KEYWORD_MATCH_POINTS: i64 = 15;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RelevanceTag {
    /// Matched keywords in keyword-iteration order.
    pub matched: Vec<String>,
    /// Clamped to [0, 100].
    pub score: i64,
}

/// Score an article's title and excerpt against the profile.
///
/// Matching is exact word-boundary matching on the lowercased text;
/// substrings inside other words do not count.
pub fn tag_relevance(profile: &KeywordProfile, title: &str, excerpt: &str) -> RelevanceTag {
    let keywords = build_keywords(profile);
    let focus_terms: HashSet<String> = profile
        .focus_areas
        .iter()
        .map(|term| term.trim().to_lowercase())
        .collect();

    let haystack = format!("{} {}", title, excerpt).to_lowercase();

    let mut matched = Vec::new();
    let mut score = 0i64;
    for keyword in &keywords {
        let Ok(re) = Regex::new(&format!(r"\b{}\b", regex::escape(keyword))) else {
            continue;
        };
        if re.is_match(&haystack) {
            score += if focus_terms.contains(keyword) {
                FOCUS_MATCH_POINTS
            } else {
                KEYWORD_MATCH_POINTS
            };
            matched.push(keyword.clone());
        }
    }

    RelevanceTag {
        matched,
        score: score.clamp(0, 100),
    }
}

/// Union of focus areas, preferred terms, and enabled-objective seed terms,
/// normalized (lowercase, trimmed, deduped, terms under two characters
/// dropped) while preserving first-seen order.
fn build_keywords(profile: &KeywordProfile) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keywords = Vec::new();

    let mut push = |term: &str| {
        let normalized = term.trim().to_lowercase();
        if normalized.chars().count() < 2 {
            return;
        }
        if seen.insert(normalized.clone()) {
            keywords.push(normalized);
        }
    };

    for term in &profile.focus_areas {
        push(term);
    }
    for term in &profile.preferred_terms {
        push(term);
    }
    for objective in &profile.enabled_objectives {
        let objective = objective.trim().to_lowercase();
        if let Some((_, seeds)) = OBJECTIVE_SEED_TERMS
            .iter()
            .find(|(name, _)| *name == objective)
        {
            for seed in seeds.iter() {
                push(seed);
            }
        }
    }

    keywords
}
