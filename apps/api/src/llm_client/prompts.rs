// Shared prompt constants and prompt-building utilities.
// Each stage that needs LLM calls defines its own prompts alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Common instruction appended to prompts that reason about a candidate.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Every claim you generate must be traceable to the resume or the \
    candidate profile provided. Do NOT infer, interpolate, or invent employers, \
    titles, dates, degrees or metrics. If the input does not support a claim, omit it.";

/// Builds a system prompt from a role description plus the JSON-only rules.
pub fn json_system(role: &str) -> String {
    format!("{role} {JSON_ONLY_SYSTEM}")
}

/// Truncates `text` to at most `max_chars` characters on a char boundary,
/// marking the cut so the model knows input was elided.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}\n[...truncated]", &text[..byte_idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "héllo wörld";
        assert_eq!(truncate_chars(text, 3), "hél\n[...truncated]");
        assert_eq!(truncate_chars(text, 50), text);
    }

    #[test]
    fn test_json_system_appends_rules() {
        let system = json_system("You are a recruiter.");
        assert!(system.starts_with("You are a recruiter."));
        assert!(system.contains("valid JSON only"));
    }
}
