//! Candidate search: text filters over resumes, then cosine ranking against a query vector.
//!
//! Filters run in a fixed order (location, minimum years, seniority, required-skill
//! substrings) and each one only removes candidates. Survivors are ranked by similarity
//! between the query embedding and their stored embedding.

use std::sync::OnceLock;

use chrono::{Datelike, Utc};
use regex::Regex;
use tracing::{debug, info};

use crate::actions::prompts::{SUMMARY_PROMPT_HEADER, SUMMARY_SYSTEM};
use crate::actions::{
    format_number, truncate_chars, ActionOutput, Executor, JobSummary, RankedCandidate,
    SearchOutcome,
};
use crate::embedding::{normalize_embedding, EMBEDDING_DIM};
use crate::errors::AppError;
use crate::intent::SearchParams;
use crate::llm_client::{ask_text, ChatMessage};
use crate::resolver::resolve_job;
use crate::similarity::cosine;
use crate::store::CandidateFilter;

const QUERY_DESCRIPTION_CHARS: usize = 800;
const SNIPPET_CHARS: usize = 240;

/// Full state name and postal abbreviation, both lowercase.
const STATE_NAMES: &[(&str, &str)] = &[
    ("maryland", "md"),
    ("california", "ca"),
    ("new york", "ny"),
    ("texas", "tx"),
    ("virginia", "va"),
    ("florida", "fl"),
    ("georgia", "ga"),
    ("washington", "wa"),
    ("massachusetts", "ma"),
    ("pennsylvania", "pa"),
    ("illinois", "il"),
    ("ohio", "oh"),
];

/// The requested location plus its state-name/abbreviation rewrites.
pub(crate) fn location_variants(location: &str) -> Vec<String> {
    let location = location.trim().to_lowercase();
    let mut variants = vec![location.clone()];
    for (full, abbrev) in STATE_NAMES {
        if location.contains(full) {
            variants.push(location.replace(full, abbrev));
        }
        if location.split_whitespace().any(|w| w == *abbrev) {
            variants.push(location.replace(abbrev, full));
        }
    }
    variants
}

fn explicit_year_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(\d+)\+?\s*years?\s*(?:of\s*)?(?:experience|exp)",
            r"(\d+)\+?\s*years?\s*(?:in\s+)?(?:software|engineering|development)",
            r"experience[:\s]+(\d+)\+?\s*years?",
            r"(\d+)\+?\s*yrs?\s*(?:of\s*)?(?:experience|exp)",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

fn date_range_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)\w*\s*(\d{4})\s*[-–—]\s*(?:present|current|now)",
            r"(?i)(\d{4})\s*[-–—]\s*(?:present|current|now)",
            r"(?i)(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)\w*\s*(\d{4})\s*[-–—]",
            r"(?i)(\d{4})\s*[-–—]\s*(\d{4})",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

/// Years of experience stated in, or implied by, a lowercase resume.
///
/// An explicit "N years" phrase wins outright (largest N). Otherwise the earliest start
/// year in 2000..=`current_year` found in a date range gives `current_year - start`.
pub fn extract_years_experience(text: &str, current_year: i32) -> Option<f64> {
    let explicit = explicit_year_patterns()
        .iter()
        .flat_map(|re| re.captures_iter(text))
        .filter_map(|caps| caps[1].parse::<f64>().ok())
        .fold(None, |max: Option<f64>, years| Some(max.map_or(years, |m| m.max(years))));
    if explicit.is_some() {
        return explicit;
    }

    date_range_patterns()
        .iter()
        .flat_map(|re| re.captures_iter(text))
        .filter_map(|caps| caps[1].parse::<i32>().ok())
        .filter(|year| (2000..=current_year).contains(year))
        .min()
        .map(|earliest| f64::from(current_year - earliest))
}

impl Executor {
    pub(super) async fn search_candidates(
        &self,
        params: SearchParams,
    ) -> Result<ActionOutput, AppError> {
        let job = match &params.job_id {
            Some(id) => resolve_job(self.store.as_ref(), id).await?,
            None => None,
        };

        let query_text = match &job {
            Some(job) => format!(
                "{}\nSkills: {}\n{}",
                job.title,
                job.required_skills.join(", "),
                truncate_chars(&job.description, QUERY_DESCRIPTION_CHARS)
            ),
            None => {
                let mut words: Vec<String> = params.job_id.iter().map(|id| id.to_string()).collect();
                words.extend(params.title_keywords.iter().cloned());
                words.extend(params.skills.iter().cloned());
                words.extend(params.must_have.iter().cloned());
                words.extend(params.nice_to_have.iter().cloned());
                words.join(" ")
            }
        };
        debug!("Search query text: {query_text}");
        let query = self.embed(&query_text).await?;

        let filter = CandidateFilter {
            pipeline_stage: params.filters.pipeline_stage.clone(),
            priority: params.filters.priority.clone(),
        };
        let candidates = self.store.list_candidates(&filter).await?;

        let locations = params.location.as_deref().map(location_variants);
        let current_year = Utc::now().year();
        let skill_terms: Vec<String> = params.skills.iter().map(|s| s.to_lowercase()).collect();

        let mut ranked: Vec<RankedCandidate> = Vec::new();
        for c in &candidates {
            let resume = c.resume_text.to_lowercase();

            if let Some(variants) = &locations {
                if !variants.iter().any(|loc| resume.contains(loc.as_str())) {
                    continue;
                }
            }

            if let Some(min_years) = params.years_experience_min.filter(|y| *y > 0.0) {
                match extract_years_experience(&resume, current_year) {
                    Some(years) if years >= min_years => {}
                    _ => continue,
                }
            }

            if let Some(level) = params.seniority {
                let evident = resume.contains(level.as_str())
                    || level.indicators().iter().any(|ind| resume.contains(ind));
                if !evident {
                    continue;
                }
            }

            let matched_skills: Vec<String> = skill_terms
                .iter()
                .filter(|s| resume.contains(s.as_str()))
                .cloned()
                .collect();
            if !skill_terms.is_empty() && matched_skills.is_empty() {
                continue;
            }

            let similarity = cosine(&query, &normalize_embedding(&c.embedding, EMBEDDING_DIM));
            ranked.push(RankedCandidate {
                candidate_id: c.id,
                short_id: c.short_id,
                name: c.name.clone(),
                email: c.email.clone(),
                pipeline_stage: c.pipeline_stage.clone(),
                priority: c.priority.clone(),
                similarity,
                matched_skills,
                snippet: truncate_chars(&c.resume_text, SNIPPET_CHARS).to_string(),
            });
        }

        ranked.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        ranked.truncate(params.top_k);
        info!(
            "Search ranked {} of {} candidates",
            ranked.len(),
            candidates.len()
        );

        let job = job.as_ref().map(JobSummary::of);
        let summary = self.summarize(&ranked).await;
        let explanation = explain_search(&params, job.as_ref(), &filter, ranked.len());

        Ok(ActionOutput::Search(SearchOutcome {
            candidates: ranked,
            summary,
            explanation,
            job,
        }))
    }

    async fn summarize(&self, ranked: &[RankedCandidate]) -> String {
        if ranked.is_empty() {
            return "No candidates found.".to_string();
        }
        let mut prompt = SUMMARY_PROMPT_HEADER.to_string();
        for c in ranked {
            prompt.push_str(&format!("\n- {} ({:.2}): {}", c.name, c.similarity, c.snippet));
        }
        match ask_text(self.llm(), SUMMARY_SYSTEM, &prompt, &[ChatMessage::user("")]).await {
            Some(summary) => summary,
            None => {
                let names: Vec<&str> = ranked.iter().map(|c| c.name.as_str()).collect();
                format!("Top {} candidates: {}.", ranked.len(), names.join(", "))
            }
        }
    }
}

fn explain_search(
    params: &SearchParams,
    job: Option<&JobSummary>,
    filter: &CandidateFilter,
    found: usize,
) -> String {
    let mut why: Vec<String> = Vec::new();
    match (job, &params.job_id) {
        (Some(job), _) => why.push(format!(
            "matched against '{}' (#{}) requirements",
            job.title, job.short_id
        )),
        (None, Some(id)) => why.push(format!(
            "searched for job '{id}' (not found, using as keywords)"
        )),
        (None, None) => {}
    }
    if !params.skills.is_empty() {
        let terms: Vec<String> = params.skills.iter().map(|s| s.to_lowercase()).collect();
        why.push(format!("filtered for skills: {}", terms.join(", ")));
    }
    if let Some(location) = &params.location {
        why.push(format!("location: {location}"));
    }
    if let Some(years) = params.years_experience_min.filter(|y| *y > 0.0) {
        why.push(format!("min {}+ years experience", format_number(years)));
    }
    if let Some(level) = params.seniority {
        why.push(format!("seniority: {}", level.as_str()));
    }
    let mut filters = Vec::new();
    if let Some(stage) = &filter.pipeline_stage {
        filters.push(format!("pipeline_stage={stage}"));
    }
    if let Some(priority) = &filter.priority {
        filters.push(format!("priority={priority}"));
    }
    if !filters.is_empty() {
        why.push(format!("with filters: {}", filters.join(", ")));
    }
    why.push("ranked by semantic similarity to query".to_string());
    format!("Found {found} candidates by {}.", why.join(", "))
}
