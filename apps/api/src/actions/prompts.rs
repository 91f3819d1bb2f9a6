// Prompt constants for the action handlers.
// JSON calls pair these with `llm_client::prompts::ONLY_JSON` as the system prompt.

pub const DESCRIPTION_SYSTEM: &str =
    "Write concise, professional job descriptions. No headers or formatting.";

pub const SUMMARY_SYSTEM: &str = "Short summary, one sentence.";

pub const SUMMARY_PROMPT_HEADER: &str = "Summarize these top candidates for the recruiter in one short sentence.\n\
    Format: count, key strengths, any risks.";

pub const SCORE_PROMPT: &str = "Score the candidate against the job. Return ONLY JSON with fields: \
    overall_score (0-100), rubric (skills_match, experience_relevance, project_impact, communication_clarity) each 0-25, \
    strengths (array of strings), concerns (array of strings), final_explanation (string).";

pub const QUESTIONS_PROMPT: &str = "Generate exactly three personalized screening questions for this candidate. \
    Return ONLY JSON with key 'questions' mapping to an array of three objects each containing \
    question, evaluates, good_signal.";

pub const NAVIGATE_PROMPT: &str = "You are a navigation intent parser. Return ONLY JSON with keys \
    view (pipeline|candidates|jobs) and filters (object with optional pipeline_stage, priority, search_text).";

/// Outreach drafting instructions, signed with the configured company name.
pub fn email_prompt(company: &str) -> String {
    format!(
        "Draft a concise, professional interview scheduling email from {company}. \
         Sign off as 'The {company} Recruiting Team'. \
         Use the provided time window to propose 2-3 options and ask for the candidate's availability. \
         Return ONLY JSON with keys subject and body."
    )
}

pub const QA_SYSTEM: &str = "Provide concise, factual responses derived from the resume context.";

pub const QA_PROMPT: &str = "You are helping a recruiter understand a candidate. \
    Answer the question using ONLY the resume text. If the answer is not present, say you cannot find it. \
    Keep replies under 120 words.";
