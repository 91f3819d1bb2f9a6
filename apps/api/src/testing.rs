//! Test doubles for the capability seams plus store seeding helpers.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::embedding::HashingEmbedder;
use crate::llm_client::{CompletionRequest, LanguageModel, LlmError, ModelReply};
use crate::mail::{MailError, Mailer, SendReceipt};
use crate::models::candidate::{CandidateRow, NewCandidate};
use crate::models::job::{JobRow, NewJob};
use crate::store::memory::MemoryStore;
use crate::store::{Store, CANDIDATE_COUNTER, JOB_COUNTER};

/// Replays queued replies in order; once the queue is drained every call is `Unavailable`.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ModelReply, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_replies(replies: Vec<Result<ModelReply, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::default(),
        })
    }

    pub fn json(values: Vec<Value>) -> Arc<Self> {
        Self::with_replies(values.into_iter().map(|v| Ok(ModelReply::Json(v))).collect())
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<ModelReply, LlmError> {
        self.prompts.lock().unwrap().push(request.prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::Unavailable))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Records every send. `failing()` returns an error instead of delivering.
#[derive(Default)]
pub struct RecordingMailer {
    fail: bool,
    sent: Mutex<Vec<SentMail>>,
}

impl RecordingMailer {
    pub fn delivering() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            sent: Mutex::default(),
        })
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<SendReceipt, MailError> {
        if self.fail {
            return Err(MailError::Status(503));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(SendReceipt {
            sent: true,
            message_id: Some(format!("msg-{}", sent.len())),
        })
    }
}

pub async fn seed_candidate(
    store: &MemoryStore,
    name: &str,
    resume: &str,
    stage: Option<&str>,
) -> CandidateRow {
    let short_id = store.next_short_id(CANDIDATE_COUNTER).await.unwrap();
    store
        .insert_candidate(NewCandidate {
            short_id,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            resume_text: resume.to_string(),
            embedding: HashingEmbedder::encode(resume),
            pipeline_stage: stage.map(str::to_string),
            priority: None,
        })
        .unwrap()
}

pub async fn seed_job(store: &MemoryStore, title: &str, skills: &[&str]) -> JobRow {
    let short_id = store.next_short_id(JOB_COUNTER).await.unwrap();
    let skills: Vec<String> = skills.iter().map(|s| s.to_string()).collect();
    let text = format!("{title}\nSkills: {}", skills.join(", "));
    store
        .insert_job(NewJob {
            short_id,
            title: title.to_string(),
            description: String::new(),
            required_skills: skills,
            embedding: HashingEmbedder::encode(&text),
        })
        .await
        .unwrap()
}
