//! Architect enhancer: a strict meta-prompt with a two-section reply.
//!
//! The model must answer with an `**Enhanced Prompt:**` section followed by
//! an `**Elucidation:**` section. This is the only enhancer with a structured
//! output contract, so it is the only one whose candidates go through the
//! self-correction sub-loop.

use async_trait::async_trait;
use promptsmith_core::capability::{Enhancement, EnhancementContext, PromptEnhancer};
use promptsmith_core::error::ProviderError;
use promptsmith_providers::ModelClient;
use tracing::{debug, warn};

use super::steering_notes;

pub const ENHANCED_HEADING: &str = "**Enhanced Prompt:**";
pub const ELUCIDATION_HEADING: &str = "**Elucidation:**";

pub struct ArchitectEnhancer {
    client: ModelClient,
    temperature: f32,
}

impl ArchitectEnhancer {
    pub fn new(client: ModelClient, temperature: f32) -> Self {
        Self {
            client,
            temperature,
        }
    }

    fn meta_prompt(ctx: &EnhancementContext) -> String {
        format!(
            "Role: you are a Prompt Architect.\n\n\
             Objective: turn the input prompt into a markedly more effective one, optimized for clarity \
             and precision and for drawing high-quality answers from another AI system.\n\n\
             Process:\n\
             1. Identify the prompt's intent and diagnose its ambiguities, missing context, hidden \
             assumptions and structural weaknesses.\n\
             2. Decide which clarifications, constraints, examples, persona, tone or output format would \
             help most.\n\
             3. Write a self-contained enhanced prompt that is ready to send as-is.\n\
             4. Explain the key changes and the reasoning behind them.\n\n\
             Output exactly two sections with these headings:\n\
             {ENHANCED_HEADING}\n[the full enhanced prompt]\n\
             {ELUCIDATION_HEADING}\n[your explanation]\n\n\
             {}\
             Input prompt:\n<prompt>{}</prompt>",
            steering_notes(ctx),
            ctx.prompt,
        )
    }
}

/// Pull `(prompt, elucidation)` out of an architect reply.
pub(crate) fn parse_sections(text: &str) -> Option<(String, Option<String>)> {
    let (head, elucidation) = text.split_once(ELUCIDATION_HEADING)?;
    let (_, prompt) = head.split_once(ENHANCED_HEADING)?;
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return None;
    }
    let elucidation = elucidation.trim();
    Some((
        prompt.to_string(),
        (!elucidation.is_empty()).then(|| elucidation.to_string()),
    ))
}

#[async_trait]
impl PromptEnhancer for ArchitectEnhancer {
    fn name(&self) -> &str {
        "architect"
    }

    async fn enhance(&self, ctx: &EnhancementContext) -> Result<Enhancement, ProviderError> {
        debug!(iteration = ctx.iteration, temperature = self.temperature, "Requesting architect enhancement");
        let reply = self
            .client
            .complete(&Self::meta_prompt(ctx), self.temperature)
            .await?;

        match parse_sections(&reply) {
            Some((prompt, Some(elucidation))) => Ok(Enhancement::new(prompt, elucidation)),
            Some((prompt, None)) => {
                warn!(iteration = ctx.iteration, "Architect reply had no elucidation");
                Ok(Enhancement::new(prompt, "Elucidation not provided by the model."))
            }
            None => {
                warn!(iteration = ctx.iteration, "Could not parse architect reply, keeping the input prompt");
                let preview: String = reply.chars().take(200).collect();
                Ok(Enhancement::new(
                    ctx.prompt.clone(),
                    format!(
                        "The architect reply did not follow the required section format, so the previous \
                         prompt was kept. Reply began: {preview}"
                    ),
                ))
            }
        }
    }
}
