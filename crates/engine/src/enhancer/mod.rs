//! Prompt enhancers, one per `EnhancerKind`.

pub mod architect;
pub mod llm_assisted;
pub mod rule_based;

pub use architect::ArchitectEnhancer;
pub use llm_assisted::LlmAssistedEnhancer;
pub use rule_based::RuleBasedEnhancer;

use promptsmith_core::capability::EnhancementContext;

/// Objective and learner feedback, as extra context for a meta-prompt.
pub(crate) fn steering_notes(ctx: &EnhancementContext) -> String {
    let mut notes = String::new();
    if ctx.objective.trim() != ctx.prompt.trim() {
        notes.push_str(&format!(
            "The user's underlying objective is: \"{}\"\n",
            ctx.objective.trim()
        ));
    }
    if let Some(feedback) = ctx.feedback.as_deref().filter(|f| !f.trim().is_empty()) {
        notes.push_str(&format!(
            "The last version was evaluated and needs work. Evaluator feedback: {}\n",
            feedback.trim()
        ));
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notes_are_empty_on_first_iteration() {
        let ctx = EnhancementContext {
            prompt: "Summarize the article".into(),
            objective: "Summarize the article".into(),
            feedback: None,
            iteration: 1,
        };
        assert!(steering_notes(&ctx).is_empty());
    }

    #[test]
    fn notes_carry_objective_and_feedback() {
        let ctx = EnhancementContext {
            prompt: "You are an editor. Summarize the article.".into(),
            objective: "Summarize the article".into(),
            feedback: Some("Address weak areas: length.".into()),
            iteration: 2,
        };
        let notes = steering_notes(&ctx);
        assert!(notes.contains("objective is: \"Summarize the article\""));
        assert!(notes.contains("Address weak areas: length."));
    }
}
