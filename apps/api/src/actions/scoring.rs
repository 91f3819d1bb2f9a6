use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::actions::prompts::SCORE_PROMPT;
use crate::actions::{
    ActionOutput, CandidateSummary, Executor, JobSummary, ScoreOutcome, AUTO_JOB_NOTE,
};
use crate::embedding::{normalize_embedding, EMBEDDING_DIM};
use crate::errors::AppError;
use crate::intent::CandidateJobParams;
use crate::llm_client::prompts::ONLY_JSON;
use crate::llm_client::{ask_json, ChatMessage};
use crate::models::candidate::CandidateRow;
use crate::models::job::JobRow;
use crate::resolver::resolve_candidate;
use crate::similarity::cosine;

/// Points per rubric category.
const CATEGORY_MAX: f64 = 25.0;
const NO_SKILLS_MATCH: f64 = 15.0;
const COMMUNICATION_DEFAULT: f64 = 15.0;
const JOB_SKILLS_SHOWN: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    pub skills_match: f64,
    pub experience_relevance: f64,
    pub project_impact: f64,
    pub communication_clarity: f64,
}

impl Rubric {
    fn total(&self) -> f64 {
        self.skills_match + self.experience_relevance + self.project_impact + self.communication_clarity
    }
}

/// A 4-part, 100-point assessment of one candidate against one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub overall_score: f64,
    pub rubric: Rubric,
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
    pub final_explanation: String,
}

/// The model's reply. Only the rubric is mandatory; a missing total is recomputed.
#[derive(Debug, Deserialize)]
struct ModelScore {
    #[serde(default)]
    overall_score: Option<f64>,
    rubric: Rubric,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    concerns: Vec<String>,
    #[serde(default)]
    final_explanation: String,
}

impl From<ModelScore> for ScoreCard {
    fn from(m: ModelScore) -> Self {
        Self {
            overall_score: m.overall_score.unwrap_or_else(|| m.rubric.total().min(100.0)),
            rubric: m.rubric,
            strengths: m.strengths,
            concerns: m.concerns,
            final_explanation: m.final_explanation,
        }
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Deterministic score from skill overlap and embedding similarity.
pub(crate) fn heuristic_score(candidate: &CandidateRow, job: &JobRow) -> ScoreCard {
    let resume = candidate.resume_text.to_lowercase();
    let overlap = job
        .required_skills
        .iter()
        .filter(|s| resume.contains(&s.to_lowercase()))
        .count();
    let skills_match = if job.required_skills.is_empty() {
        NO_SKILLS_MATCH
    } else {
        CATEGORY_MAX * overlap as f64 / job.required_skills.len() as f64
    };

    let similarity = cosine(
        &normalize_embedding(&candidate.embedding, EMBEDDING_DIM),
        &normalize_embedding(&job.embedding, EMBEDDING_DIM),
    )
    .clamp(0.0, 1.0);
    let experience_relevance = similarity * CATEGORY_MAX;
    let project_impact = (skills_match * 0.8 + experience_relevance * 0.2).min(CATEGORY_MAX);

    let rubric = Rubric {
        skills_match: round1(skills_match),
        experience_relevance: round1(experience_relevance),
        project_impact: round1(project_impact),
        communication_clarity: round1(COMMUNICATION_DEFAULT),
    };
    let overall_score = round1(rubric.total().min(100.0));

    let (strengths, concerns) = if overlap > 0 {
        (vec![format!("Overlap on {overlap} skills")], vec![])
    } else {
        (
            vec!["Resume length OK".to_string()],
            vec!["Low skill overlap".to_string()],
        )
    };

    ScoreCard {
        overall_score,
        rubric,
        strengths,
        concerns,
        final_explanation: "Heuristic score based on skill overlap and embedding similarity."
            .to_string(),
    }
}

/// The job/resume context every candidate-vs-job prompt carries.
pub(super) fn candidate_job_context(candidate: &CandidateRow, job: &JobRow) -> String {
    format!(
        "Job title: {}\nRequired skills: {}\nJob description: {}\nCandidate resume: {}",
        job.title,
        job.required_skills.join(", "),
        job.description,
        candidate.resume_text
    )
}

impl Executor {
    pub(super) async fn score_candidate(
        &self,
        params: CandidateJobParams,
    ) -> Result<ActionOutput, AppError> {
        let Some(candidate_ref) = params.candidate_id else {
            return Ok(ActionOutput::failed(
                "candidate_id required. Specify which candidate to score.",
            ));
        };
        let Some(candidate) = resolve_candidate(self.store.as_ref(), &candidate_ref).await? else {
            return Ok(ActionOutput::failed(format!(
                "Candidate '{candidate_ref}' not found"
            )));
        };
        let Some((job, auto_selected)) = self.job_or_latest(params.job_id.as_ref()).await? else {
            return Ok(ActionOutput::failed_with_hint(
                "No job specified and no jobs found in the system. Please create a job first or specify which job to score against.",
                "Try: 'Create a Software Engineer job' first, or say 'Score this candidate for job 1'",
            ));
        };

        let card = match self.score_with_model(&candidate, &job).await {
            Some(card) => card,
            None => heuristic_score(&candidate, &job),
        };
        info!(
            "Scored {} against '{}': {}",
            candidate.name, job.title, card.overall_score
        );

        let note = if auto_selected { AUTO_JOB_NOTE } else { "" };
        let outcome = ScoreOutcome {
            card,
            candidate: CandidateSummary::from(&candidate),
            job: JobSummary::with_skills(&job, JOB_SKILLS_SHOWN),
            explanation: format!(
                "Scored {} against '{}' position using a 4-part rubric: \
                 skills match, experience relevance, project impact, and communication clarity. \
                 Each category is worth 25 points for a maximum of 100.{note}",
                candidate.name, job.title
            ),
        };

        let entry = json!({
            "candidate_id": candidate_ref.to_value(),
            "job_id": params.job_id.as_ref().map(|j| j.to_value()),
            "result": outcome,
            "created_at": Utc::now(),
        });
        self.store.append_score(candidate.id, entry).await?;

        Ok(ActionOutput::Score(outcome))
    }

    async fn score_with_model(&self, candidate: &CandidateRow, job: &JobRow) -> Option<ScoreCard> {
        let reply = ask_json(
            self.llm(),
            ONLY_JSON,
            SCORE_PROMPT,
            &[ChatMessage::user(candidate_job_context(candidate, job))],
        )
        .await?;
        match serde_json::from_value::<ModelScore>(reply) {
            Ok(score) => Some(score.into()),
            Err(e) => {
                warn!("Model score had the wrong shape ({e}); using heuristic");
                None
            }
        }
    }
}
