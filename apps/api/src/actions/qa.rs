use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::actions::prompts::{QA_PROMPT, QA_SYSTEM};
use crate::actions::Executor;
use crate::errors::AppError;
use crate::llm_client::{ask_text, ChatMessage};
use crate::models::action_log::{ActionStatus, NewActionLog};
use crate::models::candidate::CandidateRow;
use crate::resolver::{resolve_candidate, EntityRef};

pub const QA_ACTION_TYPE: &str = "candidate_qa";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRef {
    pub id: Uuid,
    pub short_id: Option<i64>,
    pub name: String,
    pub email: String,
}

impl From<&CandidateRow> for CandidateRef {
    fn from(c: &CandidateRow) -> Self {
        Self {
            id: c.id,
            short_id: c.short_id,
            name: c.name.clone(),
            email: c.email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateAnswer {
    pub candidate: CandidateRef,
    pub question: String,
    pub answer: String,
}

impl Executor {
    /// Answers a recruiter's question about one candidate from the resume alone.
    ///
    /// There is no heuristic answer: a failed model call is an `Llm` error and nothing is logged.
    pub async fn answer_candidate_question(
        &self,
        identifier: &str,
        question: &str,
    ) -> Result<CandidateAnswer, AppError> {
        let reference = EntityRef::Text(identifier.trim().to_string());
        let candidate = resolve_candidate(self.store.as_ref(), &reference)
            .await?
            .ok_or_else(|| AppError::NotFound("Candidate not found".to_string()))?;

        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::Validation("Question cannot be empty".to_string()));
        }

        let message = ChatMessage::user(format!(
            "Resume:\n{}\n\nQuestion:\n{question}",
            candidate.resume_text
        ));
        let answer = ask_text(self.llm(), QA_SYSTEM, QA_PROMPT, &[message])
            .await
            .ok_or_else(|| AppError::Llm("candidate Q&A request failed".to_string()))?;
        info!("Answered a question about {}", candidate.name);

        self.write_log(NewActionLog {
            action_type: QA_ACTION_TYPE.to_string(),
            params: json!({"candidate_identifier": identifier, "question": question}),
            status: ActionStatus::Ok,
            output: Some(json!({ "answer": answer })),
        })
        .await;

        Ok(CandidateAnswer {
            candidate: CandidateRef::from(&candidate),
            question: question.to_string(),
            answer,
        })
    }
}
