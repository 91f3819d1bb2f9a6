//! Entity resolution: finds the candidate or job a loosely-phrased identifier refers to.
//!
//! Identifiers arrive from natural language: `7`, `"7"`, `"candidate number 8"`,
//! `"Hanani"`, `"senior backend role"`. Each resolver walks a fixed ladder of
//! strategies and stops at the first hit. Every rung is a single store lookup.

use std::fmt;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::candidate::CandidateRow;
use crate::models::job::JobRow;
use crate::store::{Store, TextMatch};

/// A reference to a candidate or job as written by a user or the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityRef {
    ShortId(i64),
    Text(String),
}

impl EntityRef {
    /// Interprets a loose JSON value. Null, empty strings and structured values yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(EntityRef::ShortId),
            Value::String(s) if !s.trim().is_empty() => Some(EntityRef::Text(s.trim().to_string())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            EntityRef::ShortId(n) => Value::from(*n),
            EntityRef::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::ShortId(n) => write!(f, "{n}"),
            EntityRef::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityRef {
    fn from(n: i64) -> Self {
        EntityRef::ShortId(n)
    }
}

impl From<&str> for EntityRef {
    fn from(s: &str) -> Self {
        EntityRef::Text(s.to_string())
    }
}

/// True when `value` is already a concrete id: an integer, a digit string, or a store key.
pub fn looks_like_id(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64(),
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty() && s.chars().all(|c| c.is_ascii_digit())) || Uuid::parse_str(s).is_ok()
        }
        _ => false,
    }
}

fn digit_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").unwrap())
}

fn id_noise() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)[_\d]+|ID|candidate|number|#").unwrap())
}

fn compound_role() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(back|front|full) ?(end|stack)\b").unwrap())
}

fn escaped_compound_role() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(back|front|full)(?:\\-| )?(end|stack)").unwrap())
}

fn is_compound_pair(first: &str, second: &str) -> bool {
    matches!(
        (first.to_lowercase().as_str(), second.to_lowercase().as_str()),
        ("back", "end") | ("front", "end") | ("full", "stack")
    )
}

/// Rewrites closed-form and two-word compound role names to the hyphenated form:
/// "Backend" and "back end" both become "back-end".
pub fn normalize_job_title(title: &str) -> String {
    compound_role()
        .replace_all(title, |caps: &Captures| {
            if is_compound_pair(&caps[1], &caps[2]) {
                format!("{}-{}", &caps[1], &caps[2])
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Escaped, lowercased identifier in which every compound role name accepts any spelling.
fn permissive_title_pattern(identifier: &str) -> String {
    let escaped = regex::escape(&identifier.to_lowercase());
    escaped_compound_role()
        .replace_all(&escaped, |caps: &Captures| {
            if is_compound_pair(&caps[1], &caps[2]) {
                format!("{}[- ]?{}", &caps[1], &caps[2])
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

fn parse_short_id(s: &str) -> Option<i64> {
    s.trim().parse::<i64>().ok()
}

// ────────────────────────────────────────────────────────────────────────────
// Candidates
// ────────────────────────────────────────────────────────────────────────────

pub async fn resolve_candidate(
    store: &dyn Store,
    identifier: &EntityRef,
) -> Result<Option<CandidateRow>, AppError> {
    let text = match identifier {
        EntityRef::ShortId(n) => return store.candidate_by_short_id(*n).await,
        EntityRef::Text(s) => s.trim(),
    };

    if let Ok(key) = Uuid::parse_str(text) {
        if let Some(c) = store.candidate_by_key(key).await? {
            return Ok(Some(c));
        }
    }

    if let Some(n) = parse_short_id(text) {
        if let Some(c) = store.candidate_by_short_id(n).await? {
            return Ok(Some(c));
        }
    }

    // "Hanani_ID_8", "candidate 8", "number 8"
    if let Some(n) = digit_run()
        .find(text)
        .and_then(|m| m.as_str().parse::<i64>().ok())
    {
        if let Some(c) = store.candidate_by_short_id(n).await? {
            return Ok(Some(c));
        }
    }

    if let Some(c) = store
        .find_candidate_by_name(&TextMatch::Exact(text.to_string()))
        .await?
    {
        return Ok(Some(c));
    }

    let name_part = id_noise()
        .replace_all(text, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if name_part.chars().count() > 1 {
        if let Some(c) = store
            .find_candidate_by_name(&TextMatch::Exact(name_part.clone()))
            .await?
        {
            return Ok(Some(c));
        }
        if let Some(c) = store
            .find_candidate_by_name(&TextMatch::Contains(name_part))
            .await?
        {
            return Ok(Some(c));
        }
    }

    for word in text
        .split_whitespace()
        .filter(|w| w.chars().count() > 2 && !w.chars().all(|c| c.is_ascii_digit()))
    {
        if let Some(c) = store
            .find_candidate_by_name(&TextMatch::Contains(word.to_string()))
            .await?
        {
            debug!("Resolved candidate '{text}' by word '{word}'");
            return Ok(Some(c));
        }
    }

    Ok(None)
}

// ────────────────────────────────────────────────────────────────────────────
// Jobs
// ────────────────────────────────────────────────────────────────────────────

pub async fn resolve_job(
    store: &dyn Store,
    identifier: &EntityRef,
) -> Result<Option<JobRow>, AppError> {
    let text = match identifier {
        EntityRef::ShortId(n) => return store.job_by_short_id(*n).await,
        EntityRef::Text(s) => s.trim(),
    };

    if let Ok(key) = Uuid::parse_str(text) {
        if let Some(j) = store.job_by_key(key).await? {
            return Ok(Some(j));
        }
    }

    if let Some(n) = parse_short_id(text) {
        if let Some(j) = store.job_by_short_id(n).await? {
            return Ok(Some(j));
        }
    }

    let normalized = normalize_job_title(text);
    let variant_differs = normalized != text;

    let mut ladder = vec![TextMatch::Exact(text.to_string())];
    if variant_differs {
        ladder.push(TextMatch::Exact(normalized.clone()));
    }
    ladder.push(TextMatch::Contains(text.to_string()));
    if variant_differs {
        ladder.push(TextMatch::Contains(normalized.clone()));
    }
    let words: Vec<String> = normalized
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .map(str::to_string)
        .collect();
    if !words.is_empty() {
        ladder.push(TextMatch::AllWords(words));
    }
    ladder.push(TextMatch::Pattern(permissive_title_pattern(text)));

    for pattern in &ladder {
        if let Some(j) = store.find_job_by_title(pattern).await? {
            debug!("Resolved job '{text}' via {pattern:?}");
            return Ok(Some(j));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::testing::{seed_candidate, seed_job};
    use serde_json::json;

    #[test]
    fn test_normalize_job_title_variants() {
        assert_eq!(normalize_job_title("Backend Engineer"), "Back-end Engineer");
        assert_eq!(normalize_job_title("front end dev"), "front-end dev");
        assert_eq!(normalize_job_title("Fullstack"), "Full-stack");
        assert_eq!(normalize_job_title("back-end"), "back-end");
        // Not a compound role name.
        assert_eq!(normalize_job_title("full end"), "full end");
    }

    #[test]
    fn test_permissive_pattern_accepts_every_spelling() {
        let pattern = permissive_title_pattern("Senior Back-End Engineer");
        let re = regex::RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .unwrap();
        assert!(re.is_match("senior backend engineer"));
        assert!(re.is_match("senior back end engineer"));
        assert!(re.is_match("senior back-end engineer"));
    }

    #[test]
    fn test_looks_like_id() {
        assert!(looks_like_id(&json!(7)));
        assert!(looks_like_id(&json!("12")));
        assert!(looks_like_id(&json!(Uuid::new_v4().to_string())));
        assert!(!looks_like_id(&json!("top")));
        assert!(!looks_like_id(&json!("")));
        assert!(!looks_like_id(&Value::Null));
    }

    #[test]
    fn test_entity_ref_from_value() {
        assert_eq!(EntityRef::from_value(&json!(3)), Some(EntityRef::ShortId(3)));
        assert_eq!(EntityRef::from_value(&json!(3.0)), Some(EntityRef::ShortId(3)));
        assert_eq!(
            EntityRef::from_value(&json!(" Ada ")),
            Some(EntityRef::Text("Ada".into()))
        );
        assert_eq!(EntityRef::from_value(&json!("  ")), None);
        assert_eq!(EntityRef::from_value(&json!({"id": 1})), None);
    }

    #[tokio::test]
    async fn test_resolve_candidate_ladder() {
        let store = MemoryStore::new();
        let ada = seed_candidate(&store, "Ada Lovelace", "Rust engineer", None).await;
        let grace = seed_candidate(&store, "Grace Hopper", "COBOL pioneer", None).await;

        let by_short = resolve_candidate(&store, &EntityRef::ShortId(2)).await.unwrap();
        assert_eq!(by_short.map(|c| c.id), Some(grace.id));

        let by_key = resolve_candidate(&store, &EntityRef::Text(ada.id.to_string()))
            .await
            .unwrap();
        assert_eq!(by_key.map(|c| c.id), Some(ada.id));

        let mixed = resolve_candidate(&store, &"candidate number 2".into()).await.unwrap();
        assert_eq!(mixed.map(|c| c.id), Some(grace.id));

        let exact = resolve_candidate(&store, &"ada lovelace".into()).await.unwrap();
        assert_eq!(exact.map(|c| c.id), Some(ada.id));

        let word = resolve_candidate(&store, &"that Hopper person".into()).await.unwrap();
        assert_eq!(word.map(|c| c.id), Some(grace.id));

        let missing = resolve_candidate(&store, &"Linus".into()).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_resolve_candidate_is_idempotent() {
        let store = MemoryStore::new();
        seed_candidate(&store, "Ada Lovelace", "", None).await;
        let first = resolve_candidate(&store, &"Lovelace".into()).await.unwrap();
        let second = resolve_candidate(&store, &"Lovelace".into()).await.unwrap();
        assert_eq!(first.map(|c| c.id), second.map(|c| c.id));
    }

    #[tokio::test]
    async fn test_resolve_job_ladder() {
        let store = MemoryStore::new();
        let backend = seed_job(&store, "Senior Back-End Engineer", &["Go"]).await;
        let data = seed_job(&store, "Data Scientist", &["Python"]).await;

        let by_string_id = resolve_job(&store, &"2".into()).await.unwrap();
        assert_eq!(by_string_id.map(|j| j.id), Some(data.id));

        let normalized = resolve_job(&store, &"senior backend engineer".into()).await.unwrap();
        assert_eq!(normalized.map(|j| j.id), Some(backend.id));

        let any_order = resolve_job(&store, &"engineer back end senior".into()).await.unwrap();
        assert_eq!(any_order.map(|j| j.id), Some(backend.id));

        let contains = resolve_job(&store, &"scientist".into()).await.unwrap();
        assert_eq!(contains.map(|j| j.id), Some(data.id));

        assert!(resolve_job(&store, &EntityRef::ShortId(99)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_job_permissive_pattern() {
        let store = MemoryStore::new();
        let job = seed_job(&store, "Backend Developer", &[]).await;
        // Normalizes to "back-end developer", which the title does not contain;
        // only the permissive pattern bridges the spelling.
        let found = resolve_job(&store, &"back-end developer".into()).await.unwrap();
        assert_eq!(found.map(|j| j.id), Some(job.id));
    }
}
