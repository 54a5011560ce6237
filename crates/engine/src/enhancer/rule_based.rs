//! Deterministic enhancer: a fixed rule set, no model calls.

use async_trait::async_trait;
use promptsmith_core::capability::{Enhancement, EnhancementContext, PromptEnhancer};
use promptsmith_core::error::ProviderError;

const PERSONA_PREFIX: &str = "You are a helpful and insightful AI assistant. ";
const PERSONA_KEYWORDS: [&str; 4] = ["you are", "act as", "your role is", "behave like"];
const LENGTH_KEYWORDS: [&str; 10] = [
    "concise",
    "brief",
    "short",
    "summary",
    "detailed",
    "long",
    "elaborate",
    "words",
    "sentences",
    "paragraphs",
];
const COMMAND_VERBS: [&str; 5] = ["generate", "create", "write", "list", "explain"];
const CONCISENESS_SUFFIX: &str = " Please provide a clear and concise response.";
const STRUCTURE_SUFFIX: &str = " If appropriate, consider structuring your answer clearly, perhaps using bullet points for key details or a step-by-step explanation.";
const POLITENESS_SUFFIX: &str = " Thank you.";
const SHORT_PROMPT_WORDS: usize = 15;

/// Marks the feedback note appended on later iterations.
const REFINEMENT_MARKER: &str = " (Refinement #";

/// Rule-based enhancer.
///
/// Rules run in order, each on the output of the previous one:
/// 1. prefix a default persona unless the opening already assigns a role
/// 2. ask for a concise answer when the prompt is short and says nothing about length
/// 3. suggest a structured answer when the prompt is a question
/// 4. close politely unless the prompt is a command or already polite
///
/// Learner feedback is appended as a single refinement note that replaces
/// the previous one, so the prompt does not grow without bound.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedEnhancer;

impl RuleBasedEnhancer {
    pub fn new() -> Self {
        Self
    }

    fn apply_rules(prompt: &str) -> (String, Vec<&'static str>) {
        let mut out = prompt.to_string();
        let mut applied = Vec::new();

        let opening: String = out.to_lowercase().chars().take(50).collect();
        if !PERSONA_KEYWORDS.iter().any(|k| opening.contains(k)) {
            out = format!("{PERSONA_PREFIX}{out}");
            applied.push("Added a default 'helpful AI assistant' persona for role clarity.");
        }

        let lower = out.to_lowercase();
        if out.split_whitespace().count() < SHORT_PROMPT_WORDS
            && !LENGTH_KEYWORDS.iter().any(|k| lower.contains(k))
        {
            terminate_sentence(&mut out, &['.', '?', '!']);
            out.push_str(CONCISENESS_SUFFIX);
            applied.push("Appended a request for conciseness due to the original prompt's brevity.");
        }

        if out.trim().ends_with('?') {
            terminate_sentence(&mut out, &['.', '?', '!']);
            out.push_str(STRUCTURE_SUFFIX);
            applied.push("Suggested a structured answer format as the prompt is a question.");
        }

        let lower = out.to_lowercase();
        let trimmed = out.trim();
        if !trimmed.ends_with(['?', '!'])
            && !lower.contains("please")
            && !lower.contains("thank you")
            && !COMMAND_VERBS.iter().any(|c| lower.starts_with(c))
        {
            terminate_sentence(&mut out, &['.']);
            out.push_str(POLITENESS_SUFFIX);
            applied.push("Added a polite closing statement.");
        }

        (out, applied)
    }
}

fn terminate_sentence(prompt: &mut String, enders: &[char]) {
    if !prompt.ends_with(enders) {
        prompt.push('.');
    }
}

/// Drop a trailing refinement note left by an earlier iteration.
fn strip_refinement_note(prompt: &str) -> &str {
    match prompt.rfind(REFINEMENT_MARKER) {
        Some(idx) if prompt.ends_with(')') => &prompt[..idx],
        _ => prompt,
    }
}

#[async_trait]
impl PromptEnhancer for RuleBasedEnhancer {
    fn name(&self) -> &str {
        "rule_based"
    }

    async fn enhance(&self, ctx: &EnhancementContext) -> Result<Enhancement, ProviderError> {
        let base = strip_refinement_note(&ctx.prompt);
        let (mut prompt, mut applied) = Self::apply_rules(base);

        if let Some(feedback) = ctx.feedback.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
            let round = ctx.iteration.saturating_sub(1).max(1);
            prompt.push_str(&format!("{REFINEMENT_MARKER}{round}: {feedback})"));
            applied.push("Carried the learner's feedback forward as a refinement note.");
        }

        let rationale = if applied.is_empty() {
            "No specific enhancement rules triggered. Original prompt deemed sufficient by basic rules."
                .to_string()
        } else {
            format!("Enhancements applied: {}", applied.join(" "))
        };

        Ok(Enhancement::new(prompt, rationale))
    }
}
