use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::actions::prompts::QUESTIONS_PROMPT;
use crate::actions::scoring::candidate_job_context;
use crate::actions::{
    ActionOutput, CandidateSummary, Executor, JobSummary, QuestionsOutcome, AUTO_JOB_NOTE,
};
use crate::errors::AppError;
use crate::intent::CandidateJobParams;
use crate::llm_client::prompts::ONLY_JSON;
use crate::llm_client::{ask_json, ChatMessage};
use crate::models::candidate::CandidateRow;
use crate::models::job::JobRow;
use crate::resolver::resolve_candidate;

const QUESTION_COUNT: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningQuestion {
    pub question: String,
    /// What a good answer demonstrates.
    pub evaluates: String,
    pub good_signal: String,
}

#[derive(Deserialize)]
struct ModelQuestions {
    questions: Vec<ScreeningQuestion>,
}

// (question, evaluates, good signal); `{skill}` is filled from the job's skills.
const TEMPLATES: [(&str, &str, &str); QUESTION_COUNT] = [
    (
        "Can you walk me through a project where you applied {skill}?",
        "practical experience with {skill}",
        "Candidate explains specific contributions, metrics, and lessons learned.",
    ),
    (
        "How would you tackle a new feature request that impacts both frontend and backend components?",
        "system thinking and collaboration",
        "Describes breaking work into milestones, aligning stakeholders, and testing strategy.",
    ),
    (
        "Tell me about a time you improved the performance or reliability of an application.",
        "ownership and impact",
        "Provides concrete before/after metrics and proactive follow-up.",
    ),
];

/// Resume sentences that mention a project, in order.
fn project_sentences(resume: &str, limit: usize) -> Vec<&str> {
    resume
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.to_lowercase().contains("project"))
        .take(limit)
        .collect()
}

pub(crate) fn fallback_questions(candidate: &CandidateRow, job: &JobRow) -> Vec<ScreeningQuestion> {
    let projects = project_sentences(&candidate.resume_text, QUESTION_COUNT);
    TEMPLATES
        .iter()
        .enumerate()
        .map(|(idx, (question, evaluates, good_signal))| {
            let skill = job
                .required_skills
                .get(idx)
                .map(String::as_str)
                .unwrap_or("the relevant skillset");
            let mut question = question.replace("{skill}", skill);
            let evaluates = evaluates.replace("{skill}", skill);
            if let Some(project) = projects.get(idx) {
                question.push_str(&format!(" I noticed you mentioned: {project}"));
            }
            ScreeningQuestion {
                question,
                evaluates,
                good_signal: good_signal.to_string(),
            }
        })
        .collect()
}

impl Executor {
    pub(super) async fn generate_questions(
        &self,
        params: CandidateJobParams,
    ) -> Result<ActionOutput, AppError> {
        let Some(candidate_ref) = params.candidate_id else {
            return Ok(ActionOutput::failed(
                "candidate_id required. Specify which candidate to generate questions for.",
            ));
        };
        let Some(candidate) = resolve_candidate(self.store.as_ref(), &candidate_ref).await? else {
            return Ok(ActionOutput::failed(format!(
                "Candidate '{candidate_ref}' not found"
            )));
        };
        let Some((job, auto_selected)) = self.job_or_latest(params.job_id.as_ref()).await? else {
            return Ok(ActionOutput::failed_with_hint(
                "No job specified and no jobs found in the system. Please create a job first.",
                "Try: 'Create a Software Engineer job' first",
            ));
        };

        let questions = match self.questions_with_model(&candidate, &job).await {
            Some(questions) => questions,
            None => fallback_questions(&candidate, &job),
        };
        info!(
            "Generated {} screening questions for {} ({})",
            questions.len(),
            candidate.name,
            job.title
        );

        let note = json!({
            "type": "screening_questions",
            "job_id": job.id.to_string(),
            "job_title": job.title,
            "questions": questions,
            "created_at": Utc::now(),
        });
        self.store.append_note(candidate.id, note).await?;

        let auto_note = if auto_selected { AUTO_JOB_NOTE } else { "" };
        Ok(ActionOutput::Questions(QuestionsOutcome {
            explanation: format!(
                "Generated personalized screening questions for {} based on their resume and the '{}' job requirements. \
                 Each question targets specific skills or experiences mentioned in their background.{auto_note}",
                candidate.name, job.title
            ),
            questions,
            candidate: CandidateSummary::from(&candidate),
            job: JobSummary::of(&job),
        }))
    }

    async fn questions_with_model(
        &self,
        candidate: &CandidateRow,
        job: &JobRow,
    ) -> Option<Vec<ScreeningQuestion>> {
        let reply = ask_json(
            self.llm(),
            ONLY_JSON,
            QUESTIONS_PROMPT,
            &[ChatMessage::user(candidate_job_context(candidate, job))],
        )
        .await?;
        match serde_json::from_value::<ModelQuestions>(reply) {
            Ok(m) if m.questions.len() == QUESTION_COUNT => Some(m.questions),
            Ok(m) => {
                warn!("Model returned {} questions; using templates", m.questions.len());
                None
            }
            Err(e) => {
                warn!("Model questions had the wrong shape ({e}); using templates");
                None
            }
        }
    }
}
