// Shared prompt constants.
// Each service that needs model calls defines its own prompts alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON value. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Terse system persona for structured calls.
pub const ONLY_JSON: &str = "ONLY JSON. No prose.";
