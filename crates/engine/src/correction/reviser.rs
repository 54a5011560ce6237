//! Model-backed prompt reviser.

use async_trait::async_trait;
use promptsmith_core::capability::{FlawReport, PromptReviser};
use promptsmith_core::error::ProviderError;
use promptsmith_providers::ModelClient;

pub const REVISED_HEADING: &str = "**Revised Prompt:**";

pub struct ModelReviser {
    client: ModelClient,
    temperature: f32,
}

impl ModelReviser {
    pub fn new(client: ModelClient, temperature: f32) -> Self {
        Self {
            client,
            temperature,
        }
    }

    fn revision_prompt(candidate: &str, report: &FlawReport) -> String {
        let analysis = serde_json::to_string_pretty(report).unwrap_or_else(|_| report.flaws.join("\n"));
        format!(
            "You revise prompts. The prompt between the <prompt> tags was reviewed and the analysis \
             below lists its flaws. Rewrite the prompt so that every flaw is fixed while keeping its \
             intent. Return only the revised prompt under the heading {REVISED_HEADING}\n\n\
             <prompt>{candidate}</prompt>\n\n\
             Analysis:\n{analysis}"
        )
    }
}

/// Text after the heading if present, otherwise the whole reply.
fn strip_heading(reply: &str) -> &str {
    reply
        .split_once(REVISED_HEADING)
        .map_or(reply, |(_, rest)| rest)
        .trim()
}

#[async_trait]
impl PromptReviser for ModelReviser {
    fn name(&self) -> &str {
        "model"
    }

    async fn revise(&self, candidate: &str, report: &FlawReport) -> Result<String, ProviderError> {
        if !report.has_flaws() {
            return Ok(candidate.to_string());
        }
        let reply = self
            .client
            .complete(&Self::revision_prompt(candidate, report), self.temperature)
            .await?;
        let revised = strip_heading(&reply);
        if revised.is_empty() {
            return Err(ProviderError::MalformedResponse(
                "Reviser returned an empty prompt".into(),
            ));
        }
        Ok(revised.to_string())
    }
}
