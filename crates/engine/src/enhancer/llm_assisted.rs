//! Single-call model enhancer with a `Rationale: … --- Prompt: …` reply format.

use async_trait::async_trait;
use promptsmith_core::capability::{Enhancement, EnhancementContext, PromptEnhancer};
use promptsmith_core::error::ProviderError;
use promptsmith_providers::ModelClient;
use tracing::debug;

use super::steering_notes;

const ENHANCER_TEMPERATURE: f32 = 0.5;

pub struct LlmAssistedEnhancer {
    client: ModelClient,
    temperature: f32,
}

impl LlmAssistedEnhancer {
    pub fn new(client: ModelClient) -> Self {
        Self {
            client,
            temperature: ENHANCER_TEMPERATURE,
        }
    }

    fn meta_prompt(ctx: &EnhancementContext) -> String {
        format!(
            "You are an expert prompt engineer. Rewrite the prompt between the <prompt> tags so that a \
             large language model answers it more clearly and effectively.\n\n\
             <prompt>{}</prompt>\n\n\
             {}\
             Give a revised prompt and a brief rationale for your changes.\n\
             Reply in exactly this format:\n\n\
             Rationale: [why you changed it]\n\
             ---\n\
             Prompt: [the revised prompt]",
            ctx.prompt,
            steering_notes(ctx),
        )
    }
}

/// Split a `Rationale: … --- Prompt: …` reply.
pub(crate) fn parse_reply(text: &str) -> Result<Enhancement, ProviderError> {
    let (rationale, prompt) = text.split_once("---").ok_or_else(|| {
        ProviderError::MalformedResponse(format!(
            "Enhancer reply has no '---' separator: {}",
            text.chars().take(200).collect::<String>()
        ))
    })?;

    let rationale = rationale.trim();
    let rationale = rationale.strip_prefix("Rationale:").unwrap_or(rationale).trim();
    let prompt = prompt.trim();
    let prompt = prompt.strip_prefix("Prompt:").unwrap_or(prompt).trim();

    if prompt.is_empty() {
        return Err(ProviderError::MalformedResponse(
            "Enhancer reply did not contain a prompt".into(),
        ));
    }
    Ok(Enhancement::new(prompt, rationale))
}

#[async_trait]
impl PromptEnhancer for LlmAssistedEnhancer {
    fn name(&self) -> &str {
        "llm_assisted"
    }

    async fn enhance(&self, ctx: &EnhancementContext) -> Result<Enhancement, ProviderError> {
        debug!(iteration = ctx.iteration, model = %self.client.model(), "Requesting model enhancement");
        let reply = self
            .client
            .complete(&Self::meta_prompt(ctx), self.temperature)
            .await?;
        parse_reply(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::text_client;

    fn ctx() -> EnhancementContext {
        EnhancementContext {
            prompt: "Tell me about volcanoes".into(),
            objective: "Tell me about volcanoes".into(),
            feedback: None,
            iteration: 1,
        }
    }

    #[test]
    fn parses_well_formed_reply() {
        let out = parse_reply("Rationale: Added scope.\n---\nPrompt: Explain how volcanoes form.").unwrap();
        assert_eq!(out.prompt, "Explain how volcanoes form.");
        assert_eq!(out.rationale, "Added scope.");
    }

    #[test]
    fn missing_separator_or_prompt_is_malformed() {
        assert!(matches!(
            parse_reply("Here is a better prompt"),
            Err(ProviderError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_reply("Rationale: nothing\n---\nPrompt:   "),
            Err(ProviderError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn sends_tagged_meta_prompt() {
        let (client, provider) =
            text_client(&["Rationale: Narrowed the topic.\n---\nPrompt: Describe how stratovolcanoes erupt."]);
        let enhancer = LlmAssistedEnhancer::new(client);

        let out = enhancer.enhance(&ctx()).await.unwrap();
        assert_eq!(out.prompt, "Describe how stratovolcanoes erupt.");
        assert_eq!(provider.call_count(), 1);
        assert!(provider.prompt_of(0).contains("<prompt>Tell me about volcanoes</prompt>"));
        assert!((provider.temperature_of(0) - ENHANCER_TEMPERATURE).abs() < f32::EPSILON);
    }
}
