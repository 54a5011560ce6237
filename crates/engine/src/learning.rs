//! Learning modules: decide between iterations whether to go on, and how.
//!
//! - [`RuleBasedLearner`] turns weak metrics into targeted feedback
//! - [`LlmAssistedLearner`] asks a model to rework an underperforming prompt

use async_trait::async_trait;
use promptsmith_config::LearningConfig;
use promptsmith_core::capability::{Decision, LearningModule};
use promptsmith_core::error::ProviderError;
use promptsmith_core::iteration::Evaluation;
use promptsmith_providers::ModelClient;
use tracing::debug;

use crate::enhancer::llm_assisted::parse_reply;

const OVERALL: &str = "overall_satisfaction";
const GENERIC_FEEDBACK: &str = "Please improve the response further.";

/// Turns the evaluation history into a continue/stop decision.
///
/// Metrics below `low_score_threshold` become targeted feedback for the
/// next enhancement; otherwise the feedback is a generic nudge. With a
/// non-zero `plateau_patience` the learner stops once that many iterations
/// in a row failed to beat the best earlier score.
pub struct RuleBasedLearner {
    low_score_threshold: f64,
    plateau_patience: u32,
}

impl RuleBasedLearner {
    pub fn new(config: &LearningConfig) -> Self {
        Self {
            low_score_threshold: config.low_score_threshold,
            plateau_patience: config.plateau_patience,
        }
    }

    fn plateaued(&self, history: &[Evaluation]) -> bool {
        let patience = self.plateau_patience as usize;
        if patience == 0 || history.len() <= patience {
            return false;
        }
        let (earlier, recent) = history.split_at(history.len() - patience);
        let best = |evals: &[Evaluation]| {
            evals
                .iter()
                .map(|e| e.overall_satisfaction)
                .fold(f64::NEG_INFINITY, f64::max)
        };
        best(recent) <= best(earlier)
    }

    fn feedback(&self, latest: &Evaluation) -> String {
        let weak: Vec<String> = latest
            .metric_scores
            .iter()
            .filter(|(name, score)| name.as_str() != OVERALL && **score < self.low_score_threshold)
            .map(|(name, score)| format!("{name} ({score:.1}/5): {}", hint(name)))
            .collect();

        if weak.is_empty() {
            GENERIC_FEEDBACK.to_string()
        } else {
            format!("Address weak areas: {}.", weak.join("; "))
        }
    }
}

fn hint(metric: &str) -> String {
    match metric {
        "length" => "state the expected answer length".into(),
        "keywords" => "name the terms the answer must cover and discourage refusals".into(),
        "must_contain_phrases" => "require the missing phrases explicitly".into(),
        "bullet_points" => "ask for a bulleted structure".into(),
        "text_quality" => "make sure the prompt asks for a substantive answer".into(),
        other => format!("improve {}", other.replace('_', " ")),
    }
}

#[async_trait]
impl LearningModule for RuleBasedLearner {
    fn name(&self) -> &str {
        "rule_based"
    }

    async fn decide(&self, _prompt: &str, history: &[Evaluation]) -> Result<Decision, ProviderError> {
        let Some(latest) = history.last() else {
            return Ok(Decision::Continue {
                feedback: GENERIC_FEEDBACK.into(),
            });
        };

        if latest.satisfied {
            return Ok(Decision::Stop {
                reason: format!(
                    "Target satisfaction reached ({:.2}).",
                    latest.overall_satisfaction
                ),
            });
        }

        if self.plateaued(history) {
            return Ok(Decision::Stop {
                reason: format!(
                    "No improvement over the last {} iteration(s).",
                    self.plateau_patience
                ),
            });
        }

        Ok(Decision::Continue {
            feedback: self.feedback(latest),
        })
    }
}

/// Model-assisted learner.
///
/// Sends the underperforming prompt and its scores to a model and carries
/// the suggested rewrite forward as feedback for the next enhancement.
/// Stops without a model call once the overall score reaches
/// `stop_threshold`.
pub struct LlmAssistedLearner {
    client: ModelClient,
    stop_threshold: f64,
    temperature: f32,
}

impl LlmAssistedLearner {
    pub fn new(client: ModelClient, config: &LearningConfig) -> Self {
        Self {
            client,
            stop_threshold: config.stop_threshold,
            temperature: config.temperature,
        }
    }

    fn meta_prompt(prompt: &str, latest: &Evaluation) -> String {
        let scores: Vec<String> = latest
            .metric_scores
            .iter()
            .map(|(name, score)| format!("- {name}: {score:.2}"))
            .collect();
        format!(
            "I have a prompt that is underperforming.\n\n\
             Current prompt:\n<prompt>{prompt}</prompt>\n\n\
             Evaluation scores (0-5):\n{scores}\n\n\
             Goal: improve the overall_satisfaction score ({overall:.2}).\n\n\
             Analyze the prompt and the scores, then write a refined prompt that addresses \
             the weaknesses, with a brief rationale for the changes.\n\
             Reply in exactly this format:\n\n\
             Rationale: [why you changed it]\n\
             ---\n\
             Prompt: [the refined prompt]",
            scores = scores.join("\n"),
            overall = latest.overall_satisfaction,
        )
    }
}

#[async_trait]
impl LearningModule for LlmAssistedLearner {
    fn name(&self) -> &str {
        "llm_assisted"
    }

    async fn decide(&self, prompt: &str, history: &[Evaluation]) -> Result<Decision, ProviderError> {
        let Some(latest) = history.last() else {
            return Ok(Decision::Continue {
                feedback: GENERIC_FEEDBACK.into(),
            });
        };

        if latest.overall_satisfaction >= self.stop_threshold {
            return Ok(Decision::Stop {
                reason: format!(
                    "Overall satisfaction {:.2} reached the learner threshold {:.2}.",
                    latest.overall_satisfaction, self.stop_threshold
                ),
            });
        }

        debug!(model = %self.client.model(), score = latest.overall_satisfaction, "Requesting model refinement");
        let reply = self
            .client
            .complete(&Self::meta_prompt(prompt, latest), self.temperature)
            .await?;
        let suggestion = parse_reply(&reply)?;

        Ok(Decision::Continue {
            feedback: format!("{} Suggested revision: {}", suggestion.rationale, suggestion.prompt),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{scripted_client, text_client};
    use std::collections::BTreeMap;

    fn eval(overall: f64, metrics: &[(&str, f64)]) -> Evaluation {
        let scores: BTreeMap<String, f64> = metrics.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        Evaluation::new("p", scores, overall, 4.0)
    }

    fn learner(patience: u32) -> RuleBasedLearner {
        RuleBasedLearner::new(&LearningConfig {
            low_score_threshold: 2.5,
            plateau_patience: patience,
            ..LearningConfig::default()
        })
    }

    #[tokio::test]
    async fn weak_metrics_become_feedback() {
        let decision = learner(0)
            .decide("p", &[eval(2.0, &[("length", 1.0), ("keywords", 5.0)])])
            .await
            .unwrap();
        match decision {
            Decision::Continue { feedback } => {
                assert!(feedback.starts_with("Address weak areas: length (1.0/5)"));
                assert!(!feedback.contains("keywords"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_weak_metric_gives_generic_nudge() {
        let decision = learner(0)
            .decide("p", &[eval(3.0, &[("length", 3.0), (OVERALL, 3.0)])])
            .await
            .unwrap();
        assert_eq!(
            decision,
            Decision::Continue {
                feedback: GENERIC_FEEDBACK.into()
            }
        );
    }

    #[tokio::test]
    async fn satisfied_stops() {
        let decision = learner(0).decide("p", &[eval(4.5, &[])]).await.unwrap();
        assert!(matches!(decision, Decision::Stop { .. }));
    }

    #[tokio::test]
    async fn plateau_stops_only_when_enabled() {
        let history = [eval(3.0, &[]), eval(2.8, &[]), eval(3.0, &[])];
        assert!(matches!(learner(2).decide("p", &history).await.unwrap(), Decision::Stop { .. }));
        assert!(matches!(learner(0).decide("p", &history).await.unwrap(), Decision::Continue { .. }));

        let improving = [eval(2.0, &[]), eval(2.5, &[]), eval(3.0, &[])];
        assert!(matches!(learner(2).decide("p", &improving).await.unwrap(), Decision::Continue { .. }));
    }

    #[tokio::test]
    async fn model_learner_carries_suggestion_as_feedback() {
        let (client, provider) = text_client(&[
            "Rationale: The prompt never names an audience.\n---\nPrompt: Explain tides to a ten-year-old.",
        ]);
        let learner = LlmAssistedLearner::new(client, &LearningConfig::default());

        let decision = learner
            .decide("Explain tides", &[eval(2.0, &[("length", 1.5), (OVERALL, 2.0)])])
            .await
            .unwrap();
        assert_eq!(
            decision,
            Decision::Continue {
                feedback: "The prompt never names an audience. Suggested revision: Explain tides to a ten-year-old."
                    .into()
            }
        );

        assert_eq!(provider.call_count(), 1);
        let sent = provider.prompt_of(0);
        assert!(sent.contains("<prompt>Explain tides</prompt>"));
        assert!(sent.contains("- length: 1.50"));
        assert!((provider.temperature_of(0) - 0.5).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn model_learner_stops_at_threshold_without_a_call() {
        let (client, provider) = text_client(&[]);
        let learner = LlmAssistedLearner::new(client, &LearningConfig::default());

        let decision = learner.decide("p", &[eval(4.5, &[])]).await.unwrap();
        assert!(matches!(decision, Decision::Stop { .. }));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn model_learner_surfaces_bad_replies() {
        let (client, _) = text_client(&["I would rewrite it differently."]);
        let learner = LlmAssistedLearner::new(client, &LearningConfig::default());
        let err = learner.decide("p", &[eval(2.0, &[])]).await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));

        let (client, _) = scripted_client(vec![Err(ProviderError::Network("reset".into()))]);
        let learner = LlmAssistedLearner::new(client, &LearningConfig::default());
        let err = learner.decide("p", &[eval(2.0, &[])]).await.unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)));
    }
}
