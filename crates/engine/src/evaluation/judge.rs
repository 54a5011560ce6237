//! Model-assisted evaluator: a judge call that returns JSON scores.

use std::collections::BTreeMap;

use async_trait::async_trait;
use promptsmith_core::capability::EvaluationEngine;
use promptsmith_core::error::ProviderError;
use promptsmith_core::iteration::Evaluation;
use promptsmith_providers::ModelClient;
use serde::Deserialize;
use tracing::debug;

use super::basic::SCORE_SCALE;

const JUDGE_SYSTEM: &str = "You are an expert AI output quality analyst. Reply with a single JSON object only.";
const OVERALL: &str = "overall_satisfaction";

#[derive(Debug, Deserialize)]
struct Verdict {
    #[serde(default)]
    metric_scores: BTreeMap<String, f64>,
    #[serde(default)]
    qualitative_feedback: Option<String>,
}

pub struct LlmJudge {
    client: ModelClient,
    dimensions: Vec<String>,
    temperature: f32,
    threshold: f64,
}

impl LlmJudge {
    pub fn new(client: ModelClient, dimensions: Vec<String>, temperature: f32, threshold: f64) -> Self {
        Self {
            client,
            dimensions,
            temperature,
            threshold,
        }
    }

    fn judge_prompt(&self, objective: &str, prompt: &str, output: &str) -> String {
        format!(
            "Evaluate a generated text against the user's objective.\n\n\
             User objective:\n{objective}\n\n\
             Prompt that produced the text:\n<prompt>{prompt}</prompt>\n\n\
             Generated text:\n<output>{output}</output>\n\n\
             Score each of these quality dimensions from 0.0 (fails completely) to 5.0 (exceeds \
             expectations): {dims}. Also give an overall_satisfaction score from a holistic \
             assessment, and short constructive feedback explaining the scores.\n\n\
             Reply as JSON: {{\"metric_scores\": {{\"<dimension>\": <score>, \"overall_satisfaction\": <score>}}, \
             \"qualitative_feedback\": \"<feedback>\"}}",
            dims = self.dimensions.join(", "),
        )
    }
}

/// Clamp every score to the scale and derive the overall when it is missing.
fn normalize(mut scores: BTreeMap<String, f64>) -> Result<(BTreeMap<String, f64>, f64), ProviderError> {
    scores.retain(|_, v| v.is_finite());
    if scores.is_empty() {
        return Err(ProviderError::MalformedResponse(
            "Judge reply contained no metric scores".into(),
        ));
    }
    for v in scores.values_mut() {
        *v = v.clamp(0.0, SCORE_SCALE);
    }

    let overall = match scores.get(OVERALL) {
        Some(v) => *v,
        None => scores.values().sum::<f64>() / scores.len() as f64,
    };
    let overall = (overall * 100.0).round() / 100.0;
    scores.insert(OVERALL.to_string(), overall);
    Ok((scores, overall))
}

#[async_trait]
impl EvaluationEngine for LlmJudge {
    fn name(&self) -> &str {
        "llm_assisted"
    }

    async fn evaluate(
        &self,
        objective: &str,
        prompt: &str,
        output: &str,
    ) -> Result<Evaluation, ProviderError> {
        if output.trim().is_empty() {
            let scores = BTreeMap::from([(OVERALL.to_string(), 0.0)]);
            return Ok(Evaluation::new(prompt, scores, 0.0, self.threshold)
                .with_feedback("No evaluable text content found in the output."));
        }

        let verdict: Verdict = self
            .client
            .complete_json(JUDGE_SYSTEM, &self.judge_prompt(objective, prompt, output), self.temperature)
            .await?;
        let (scores, overall) = normalize(verdict.metric_scores)?;
        debug!(overall, model = %self.client.model(), "Judge verdict");

        Ok(Evaluation::new(prompt, scores, overall, self.threshold).with_feedback(
            verdict
                .qualitative_feedback
                .unwrap_or_else(|| "No feedback provided.".into()),
        ))
    }
}
