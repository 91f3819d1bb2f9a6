use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::actions::prompts::email_prompt;
use crate::actions::{ActionOutput, EmailOutcome, Executor};
use crate::errors::AppError;
use crate::intent::{EmailParams, TimeWindow};
use crate::llm_client::prompts::ONLY_JSON;
use crate::llm_client::{ask_json, ChatMessage};
use crate::mail::SendReceipt;
use crate::models::candidate::{CandidateRow, PipelineStage};
use crate::models::job::JobRow;
use crate::resolver::{resolve_candidate, resolve_job};

const AUTO_MOVE_REASON: &str = "Automatically moved after interview email sent";

#[derive(Debug, Deserialize)]
struct Draft {
    subject: String,
    body: String,
}

/// Renders an hour of day as "9 AM" / "12 PM". Non-numeric values pass through.
fn humanize_hour(hour: &Value) -> String {
    let numeric = match hour {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    let Some(h) = numeric else {
        return match hour {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
    };
    let h = h.rem_euclid(24);
    let suffix = if h < 12 { "AM" } else { "PM" };
    let display = if h % 12 == 0 { 12 } else { h % 12 };
    format!("{display} {suffix}")
}

/// Human-readable interview window, empty when none was requested.
pub fn format_time_window(window: Option<&TimeWindow>) -> String {
    match window {
        None => String::new(),
        Some(TimeWindow::Text(text)) => text.trim().to_string(),
        Some(TimeWindow::Slot {
            date,
            start_hour,
            end_hour,
            timezone,
        }) => {
            let mut parts = Vec::new();
            if let Some(date) = date.as_deref().filter(|d| !d.is_empty()) {
                parts.push(date.to_string());
            }
            let present = |v: &Option<Value>| v.as_ref().filter(|v| !v.is_null()).cloned();
            if let (Some(start), Some(end)) = (present(start_hour), present(end_hour)) {
                parts.push(format!(
                    "between {} and {}",
                    humanize_hour(&start),
                    humanize_hour(&end)
                ));
            }
            parts.push(
                timezone
                    .as_deref()
                    .filter(|tz| !tz.is_empty())
                    .unwrap_or("local time")
                    .to_string(),
            );
            parts.join(" ")
        }
    }
}

fn fallback_draft(
    candidate: &CandidateRow,
    job: Option<&JobRow>,
    window_text: &str,
    company: &str,
) -> Draft {
    let subject = match job {
        Some(job) => format!("Interview availability – {}", job.title),
        None => "Interview availability".to_string(),
    };
    let job_line = job
        .map(|j| format!(" for the {}", j.title))
        .unwrap_or_default();
    let availability = if window_text.is_empty() {
        "Let me know some times that work for you this week and I can confirm.".to_string()
    } else {
        format!(
            "I'm available {window_text}. Let me know which option works best or share alternatives."
        )
    };
    let body = [
        format!("Hi {},", candidate.name),
        String::new(),
        format!("Hope you're doing well. I'd love to schedule a conversation{job_line}."),
        availability,
        String::new(),
        "Looking forward to connecting!".to_string(),
        String::new(),
        "Best regards,".to_string(),
        format!("The {company} Recruiting Team"),
    ]
    .join("\n");
    Draft { subject, body }
}

impl Executor {
    pub(super) async fn email_candidate(&self, params: EmailParams) -> Result<ActionOutput, AppError> {
        let window_text = format_time_window(params.window());
        let Some(candidate_ref) = params.candidate_id else {
            return Ok(ActionOutput::failed("candidate_id required"));
        };
        let Some(candidate) = resolve_candidate(self.store.as_ref(), &candidate_ref).await? else {
            return Ok(ActionOutput::failed("candidate not found"));
        };
        let job = match &params.job_id {
            Some(job_ref) => resolve_job(self.store.as_ref(), job_ref).await?,
            None => None,
        };

        let draft = match self.draft_with_model(&candidate, job.as_ref(), &window_text).await {
            Some(draft) => draft,
            None => fallback_draft(&candidate, job.as_ref(), &window_text, &self.company_name),
        };

        let receipt = match self
            .mailer
            .send(&candidate.email, &draft.subject, &draft.body)
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!("Email to {} was not delivered: {e}", candidate.email);
                SendReceipt::not_sent()
            }
        };

        // Sent mail stands even if the stage move fails.
        let auto_moved_to = if receipt.sent {
            match self
                .auto_move(&candidate, PipelineStage::Interview, AUTO_MOVE_REASON)
                .await
            {
                Ok(_) => Some(PipelineStage::Interview.as_str().to_string()),
                Err(e) => {
                    warn!(
                        "Email to {} sent but the move to interview failed: {e}",
                        candidate.email
                    );
                    None
                }
            }
        } else {
            None
        };
        info!(
            "Interview email to {} (sent: {})",
            candidate.email, receipt.sent
        );

        let job_text = job
            .as_ref()
            .map(|j| format!(" about the '{}' position", j.title))
            .unwrap_or_default();
        let window_note = if window_text.is_empty() {
            String::new()
        } else {
            format!(" for {window_text}")
        };
        let explanation = if receipt.sent {
            format!(
                "Drafted and sent an interview scheduling email to {}{job_text}{window_note}. \
                 The email was personalized based on their background and our company's tone.",
                candidate.name
            )
        } else {
            format!(
                "Drafted an interview scheduling email to {}{job_text}{window_note}, \
                 but it was not sent. Delivery is not configured or the mail service rejected it.",
                candidate.name
            )
        };

        Ok(ActionOutput::Email(EmailOutcome {
            sent: receipt.sent,
            to: candidate.email.clone(),
            subject: draft.subject,
            body: draft.body,
            message_id: receipt.message_id,
            explanation,
            candidate_id: candidate.id,
            auto_moved_to,
        }))
    }

    async fn draft_with_model(
        &self,
        candidate: &CandidateRow,
        job: Option<&JobRow>,
        window_text: &str,
    ) -> Option<Draft> {
        let job_text = job
            .map(|j| {
                format!(
                    "Job title: {}\nJob description: {}\nRequired skills: {}",
                    j.title,
                    j.description,
                    j.required_skills.join(", ")
                )
            })
            .unwrap_or_default();
        let context = format!(
            "Candidate name: {}\nCandidate email: {}\nTime window: {window_text}\n{job_text}\nResume: {}",
            candidate.name, candidate.email, candidate.resume_text
        );
        let reply = ask_json(
            self.llm(),
            ONLY_JSON,
            &email_prompt(&self.company_name),
            &[ChatMessage::user(context)],
        )
        .await?;
        serde_json::from_value(reply)
            .map_err(|e| warn!("Model email draft had the wrong shape ({e}); using template"))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Map};

    use super::*;
    use crate::actions::test_support::executor_with;
    use crate::intent::ActionKind;
    use crate::store::memory::MemoryStore;
    use crate::testing::{seed_candidate, seed_job, RecordingMailer, ScriptedModel};

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn slot(date: Option<&str>, start: Value, end: Value, tz: Option<&str>) -> TimeWindow {
        TimeWindow::Slot {
            date: date.map(str::to_string),
            start_hour: Some(start),
            end_hour: Some(end),
            timezone: tz.map(str::to_string),
        }
    }

    #[test]
    fn test_format_time_window() {
        assert_eq!(format_time_window(None), "");
        assert_eq!(
            format_time_window(Some(&TimeWindow::Text("next week".into()))),
            "next week"
        );
        assert_eq!(
            format_time_window(Some(&slot(Some("2024-05-02"), json!(9), json!(14), Some("PST")))),
            "2024-05-02 between 9 AM and 2 PM PST"
        );
        assert_eq!(
            format_time_window(Some(&slot(None, json!(0), json!(12), None))),
            "between 12 AM and 12 PM local time"
        );
        assert_eq!(
            format_time_window(Some(&slot(None, json!(9), Value::Null, None))),
            "local time"
        );
    }

    #[test]
    fn test_humanize_hour() {
        assert_eq!(humanize_hour(&json!(25)), "1 AM");
        assert_eq!(humanize_hour(&json!("17")), "5 PM");
        assert_eq!(humanize_hour(&json!("noon")), "noon");
    }

    #[tokio::test]
    async fn test_sent_email_moves_candidate_to_interview() {
        let store = Arc::new(MemoryStore::new());
        seed_job(&store, "Backend Engineer", &["Go"]).await;
        let ada = seed_candidate(&store, "Ada Lovelace", "Go", Some("screening")).await;
        let mailer = RecordingMailer::delivering();
        let executor = executor_with(store.clone(), ScriptedModel::unavailable(), mailer.clone());

        let output = executor
            .run(
                ActionKind::EmailCandidate,
                &params(json!({
                    "candidate_id": "Ada",
                    "job_id": 1,
                    "requested_time_window": "Thursday afternoon"
                })),
            )
            .await
            .unwrap();
        let ActionOutput::Email(email) = output else {
            panic!("expected an email, got {output:?}");
        };
        assert!(email.sent);
        assert_eq!(email.message_id.as_deref(), Some("msg-1"));
        assert_eq!(email.subject, "Interview availability – Backend Engineer");
        assert!(email.body.contains("I'm available Thursday afternoon."));
        assert!(email.body.ends_with("The HireFlow Recruiting Team"));
        assert_eq!(email.auto_moved_to.as_deref(), Some("interview"));

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ada.lovelace@example.com");

        let row = store.candidate(ada.id).unwrap();
        assert_eq!(row.pipeline_stage.as_deref(), Some("interview"));
        assert_eq!(row.stage_history[0]["reason"], json!(AUTO_MOVE_REASON));
        assert_eq!(store.logs()[0].status, "sent");
    }

    #[tokio::test]
    async fn test_sent_email_survives_failed_stage_move() {
        let store = Arc::new(MemoryStore::new());
        let ada = seed_candidate(&store, "Ada", "Go", Some("screening")).await;
        store.start_failing_writes();
        let mailer = RecordingMailer::delivering();
        let executor = executor_with(store.clone(), ScriptedModel::unavailable(), mailer.clone());

        let output = executor
            .run(ActionKind::EmailCandidate, &params(json!({"candidate_id": 1})))
            .await
            .unwrap();
        let ActionOutput::Email(email) = output else {
            panic!("expected an email, got {output:?}");
        };
        assert!(email.sent);
        assert!(email.auto_moved_to.is_none());
        assert_eq!(mailer.sent().len(), 1);
        assert_eq!(
            store.candidate(ada.id).unwrap().pipeline_stage.as_deref(),
            Some("screening")
        );
    }

    #[tokio::test]
    async fn test_failed_delivery_is_not_sent_and_does_not_move() {
        let store = Arc::new(MemoryStore::new());
        let ada = seed_candidate(&store, "Ada", "Go", Some("screening")).await;
        let executor = executor_with(
            store.clone(),
            ScriptedModel::unavailable(),
            RecordingMailer::failing(),
        );

        let output = executor
            .run(ActionKind::EmailCandidate, &params(json!({"candidate_id": 1})))
            .await
            .unwrap();
        let ActionOutput::Email(email) = output else {
            panic!("expected an email");
        };
        assert!(!email.sent);
        assert!(email.auto_moved_to.is_none());
        assert!(email.explanation.contains("not sent"));
        assert_eq!(email.subject, "Interview availability");
        assert!(email.body.contains("Let me know some times that work for you"));
        assert_eq!(
            store.candidate(ada.id).unwrap().pipeline_stage.as_deref(),
            Some("screening")
        );
        assert_eq!(store.logs()[0].status, "not_sent");
    }

    #[tokio::test]
    async fn test_model_draft_is_used() {
        let store = Arc::new(MemoryStore::new());
        seed_candidate(&store, "Ada", "Go", Some("interview")).await;
        let model = ScriptedModel::json(vec![json!({"subject": "Let's talk", "body": "Hi Ada"})]);
        let executor = executor_with(store.clone(), model.clone(), RecordingMailer::delivering());

        let output = executor
            .run(ActionKind::EmailCandidate, &params(json!({"candidate_id": "Ada"})))
            .await
            .unwrap();
        let ActionOutput::Email(email) = output else {
            panic!("expected an email");
        };
        assert_eq!(email.subject, "Let's talk");
        assert_eq!(email.body, "Hi Ada");
        assert!(model.prompts()[0].contains("HireFlow"));
        // already in interview: reported, but no history entry
        assert_eq!(email.auto_moved_to.as_deref(), Some("interview"));
        let row = store.candidate(email.candidate_id).unwrap();
        assert!(row.stage_history.as_array().map_or(true, |h| h.is_empty()));
    }

    #[tokio::test]
    async fn test_missing_candidate() {
        let store = Arc::new(MemoryStore::new());
        let executor = executor_with(store, ScriptedModel::unavailable(), RecordingMailer::delivering());
        let output = executor.run(ActionKind::EmailCandidate, &Map::new()).await.unwrap();
        assert_eq!(output.error(), Some("candidate_id required"));
        let output = executor
            .run(ActionKind::EmailCandidate, &params(json!({"candidate_id": "Ghost"})))
            .await
            .unwrap();
        assert_eq!(output.error(), Some("candidate not found"));
    }
}
