use tracing::info;

use crate::actions::prompts::DESCRIPTION_SYSTEM;
use crate::actions::{truncate_chars, ActionOutput, Executor, JobCreated};
use crate::errors::AppError;
use crate::intent::CreateJobParams;
use crate::llm_client::{ask_text, ChatMessage};
use crate::models::job::NewJob;
use crate::store::JOB_COUNTER;

const EMBED_DESCRIPTION_CHARS: usize = 1000;

impl Executor {
    pub(super) async fn create_job(&self, params: CreateJobParams) -> Result<ActionOutput, AppError> {
        let Some(title) = params.title else {
            return Ok(ActionOutput::failed("Job title is required"));
        };

        let description = match params.description {
            Some(description) => description,
            None => self.draft_description(&title).await,
        };

        let skills = self.skills.extract(&title, &description).await;

        let embed_input = format!(
            "{title}\nSkills: {}\n{}",
            skills.join(", "),
            truncate_chars(&description, EMBED_DESCRIPTION_CHARS)
        );
        let embedding = self.embed(&embed_input).await?;

        let short_id = self.store.next_short_id(JOB_COUNTER).await?;
        let job = self
            .store
            .insert_job(NewJob {
                short_id,
                title: title.clone(),
                description: description.clone(),
                required_skills: skills.clone(),
                embedding,
            })
            .await?;

        info!("Created job #{short_id} '{title}' with {} skills", skills.len());

        let preview = skills.iter().take(5).cloned().collect::<Vec<_>>().join(", ");
        let ellipsis = if skills.len() > 5 { "..." } else { "" };
        Ok(ActionOutput::JobCreated(JobCreated {
            job_id: job.id,
            short_id,
            explanation: format!(
                "Created job posting for '{title}' with ID #{short_id}. \
                 Automatically extracted {} required skills: {preview}{ellipsis}.",
                skills.len()
            ),
            title,
            description,
            required_skills: skills,
        }))
    }

    async fn draft_description(&self, title: &str) -> String {
        let prompt = format!("Write a brief 2-3 sentence job description for: {title}");
        ask_text(self.llm(), DESCRIPTION_SYSTEM, &prompt, &[ChatMessage::user("")])
            .await
            .unwrap_or_else(|| fallback_description(title))
    }
}

fn fallback_description(title: &str) -> String {
    format!("We are looking for a {title} to join our team.")
}
