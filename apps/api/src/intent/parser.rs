use std::sync::{Arc, OnceLock};

use regex::{Captures, Regex};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::intent::prompts::{FALLBACK_QUESTION, INTENT_INSTRUCTIONS, INTENT_SYSTEM, REPAIR_PROMPT};
use crate::intent::{ActionKind, Intent, SearchParams};
use crate::llm_client::prompts::ONLY_JSON;
use crate::llm_client::{ChatMessage, CompletionRequest, LanguageModel, ModelReply};
use crate::resolver::EntityRef;

/// Conversation turns forwarded to the model, newest last.
const HISTORY_TURNS: usize = 6;

/// Turns a transcript into an `Intent`. Never fails: every failure path ends in `clarify`.
#[derive(Clone)]
pub struct IntentParser {
    llm: Arc<dyn LanguageModel>,
}

impl IntentParser {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    pub async fn parse(&self, transcript: &str, history: &[ChatMessage]) -> Intent {
        let normalized = normalize_numbers(transcript);
        debug!("Parsing transcript: {normalized}");

        let recent = &history[history.len().saturating_sub(HISTORY_TURNS)..];
        let mut messages: Vec<ChatMessage> = recent.to_vec();
        messages.push(ChatMessage::user(normalized.clone()));

        let primary = self
            .ask(INTENT_SYSTEM, INTENT_INSTRUCTIONS, &messages)
            .await;
        if let Some(intent) = primary.as_ref().and_then(coerce_intent) {
            info!(
                "Parsed intent: {} (confidence {:.2})",
                intent.action.as_str(),
                intent.confidence
            );
            return intent;
        }

        warn!("Intent parse failed validation; asking the model to repair it");
        let previous = match primary {
            Some(ModelReply::Text(raw)) => raw,
            Some(ModelReply::Json(value)) => value.to_string(),
            None => normalized,
        };
        let repaired = self
            .ask(ONLY_JSON, REPAIR_PROMPT, &[ChatMessage::user(previous)])
            .await;
        if let Some(intent) = repaired.as_ref().and_then(coerce_intent) {
            info!("Repaired intent: {}", intent.action.as_str());
            return intent;
        }

        warn!("Intent repair failed; falling back to clarify");
        Intent::clarify(FALLBACK_QUESTION, 0.0)
    }

    async fn ask(&self, system: &str, prompt: &str, messages: &[ChatMessage]) -> Option<ModelReply> {
        let request = CompletionRequest {
            system,
            prompt,
            messages,
            json_mode: true,
        };
        match self.llm.complete(request).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                warn!("Intent model call failed: {e}");
                None
            }
        }
    }
}

/// Validates a model reply against the intent schema. Text replies are parsed as JSON first.
fn coerce_intent(reply: &ModelReply) -> Option<Intent> {
    let value = match reply {
        ModelReply::Json(v) => v.clone(),
        ModelReply::Text(raw) => serde_json::from_str::<Value>(raw.trim()).ok()?,
    };

    let mut intent: Intent = match serde_json::from_value(value) {
        Ok(intent) => intent,
        Err(e) => {
            debug!("Intent schema mismatch: {e}");
            return None;
        }
    };

    if !(0.0..=1.0).contains(&intent.confidence) {
        debug!("Intent confidence out of range: {}", intent.confidence);
        return None;
    }
    if intent.also_do.as_ref().is_some_and(Vec::is_empty) {
        intent.also_do = None;
    }

    if intent.action == ActionKind::SearchCandidates {
        let mut search: SearchParams =
            match serde_json::from_value(Value::Object(intent.params.clone())) {
                Ok(search) => search,
                Err(e) => {
                    debug!("Search params mismatch: {e}");
                    return None;
                }
            };
        if let Some(EntityRef::ShortId(n)) = search.job_id {
            search.job_id = Some(EntityRef::Text(n.to_string()));
        }
        let nested = intent.params.get("also_do").cloned();
        match serde_json::to_value(&search) {
            Ok(Value::Object(mut map)) => {
                if let Some(nested) = nested {
                    map.insert("also_do".to_string(), nested);
                }
                intent.params = map;
            }
            _ => return None,
        }
    }

    Some(intent)
}

fn number_words() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(zero|one|two|three|four|five|six|seven|eight|nine|ten)\b").unwrap()
    })
}

/// "two years" -> "2 years". Only zero through ten are rewritten.
pub fn normalize_numbers(text: &str) -> String {
    number_words()
        .replace_all(text, |caps: &Captures| {
            let digit = match caps[1].to_lowercase().as_str() {
                "zero" => "0",
                "one" => "1",
                "two" => "2",
                "three" => "3",
                "four" => "4",
                "five" => "5",
                "six" => "6",
                "seven" => "7",
                "eight" => "8",
                "nine" => "9",
                "ten" => "10",
                _ => return caps[0].to_string(),
            };
            digit.to_string()
        })
        .into_owned()
}
