//! Flaw analyzers for candidate prompts.

use std::sync::LazyLock;

use async_trait::async_trait;
use promptsmith_core::capability::{FlawAnalyzer, FlawReport};
use promptsmith_core::error::ProviderError;
use promptsmith_core::session::MIN_PROMPT_CHARS;
use promptsmith_providers::ModelClient;
use serde::Deserialize;
use tracing::debug;

use super::reviser::REVISED_HEADING;
use crate::enhancer::architect::{ELUCIDATION_HEADING, ENHANCED_HEADING};

/// Headings that belong to a meta-prompt reply, never to a usable prompt.
const REPLY_HEADINGS: [&str; 3] = [ENHANCED_HEADING, ELUCIDATION_HEADING, REVISED_HEADING];

static PLACEHOLDER: LazyLock<Option<regex_lite::Regex>> = LazyLock::new(|| {
    regex_lite::Regex::new(
        r"(?i)\[(?:insert|your|add|placeholder|todo|tbd)[^\]]*\]|\{\{?\s*[a-z_][a-z0-9_]*\s*\}\}?",
    )
    .ok()
});

/// Structural checks that need no model.
#[derive(Debug, Clone, Default)]
pub struct HeuristicAnalyzer {
    required_sections: Vec<String>,
}

impl HeuristicAnalyzer {
    pub fn new(required_sections: Vec<String>) -> Self {
        Self { required_sections }
    }

    pub fn flaws(&self, candidate: &str) -> Vec<String> {
        let text = candidate.trim();
        if text.is_empty() {
            return vec!["The candidate prompt is empty.".into()];
        }

        let mut flaws = Vec::new();
        if text.chars().count() < MIN_PROMPT_CHARS {
            flaws.push("The candidate prompt is too short to be usable.".into());
        }
        if let Some(heading) = REPLY_HEADINGS.iter().find(|h| text.contains(*h)) {
            flaws.push(format!("The candidate still contains the reply heading {heading}."));
        }
        let placeholders: Vec<&str> = PLACEHOLDER
            .as_ref()
            .map(|re| re.find_iter(text).map(|m| m.as_str()).collect())
            .unwrap_or_default();
        if !placeholders.is_empty() {
            flaws.push(format!(
                "Unfilled template placeholders: {}.",
                placeholders.join(", ")
            ));
        }
        if text.matches("```").count() % 2 != 0 {
            flaws.push("A code fence is opened but never closed.".into());
        }

        let lower = text.to_lowercase();
        for section in &self.required_sections {
            if !lower.contains(&section.to_lowercase()) {
                flaws.push(format!("Missing required section: {section}."));
            }
        }
        flaws
    }

    pub fn report(&self, candidate: &str) -> FlawReport {
        let flaws = self.flaws(candidate);
        if flaws.is_empty() {
            return FlawReport::clean("Structural checks passed.");
        }
        FlawReport {
            feedback_summary: format!("{} structural flaw(s) found.", flaws.len()),
            analysis_summary: format!("Structural checks failed: {}", flaws.join(" ")),
            flaws,
        }
    }
}

#[async_trait]
impl FlawAnalyzer for HeuristicAnalyzer {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn analyze(&self, _source: &str, candidate: &str) -> Result<FlawReport, ProviderError> {
        Ok(self.report(candidate))
    }
}

/// The critic's JSON reply. `flaws_found` may be a flag or a list.
#[derive(Debug, Deserialize)]
struct CriticVerdict {
    #[serde(default)]
    flaws_found: serde_json::Value,
    #[serde(default)]
    feedback_summary: String,
    #[serde(default)]
    analysis_summary: serde_json::Value,
}

impl CriticVerdict {
    fn into_report(self) -> FlawReport {
        let mut flaws: Vec<String> = match &self.flaws_found {
            serde_json::Value::Array(items) => items
                .iter()
                .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
                .filter(|s| !s.trim().is_empty())
                .collect(),
            serde_json::Value::Bool(true) => vec![if self.feedback_summary.is_empty() {
                "The critic reported flaws without details.".to_string()
            } else {
                self.feedback_summary.clone()
            }],
            _ => Vec::new(),
        };
        flaws.dedup();

        let analysis_summary = match self.analysis_summary {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            serde_json::Value::Object(ref o) if o.is_empty() => String::new(),
            other => other.to_string(),
        };
        FlawReport {
            flaws,
            feedback_summary: self.feedback_summary,
            analysis_summary,
        }
    }
}

/// Deploys the candidate for a sample answer, then asks a critic model
/// whether the answer exposes flaws in the prompt. Structural findings
/// from [`HeuristicAnalyzer`] are folded into the result.
pub struct ModelAnalyzer {
    client: ModelClient,
    heuristic: HeuristicAnalyzer,
    sample_temperature: f32,
    temperature: f32,
}

const CRITIC_SYSTEM: &str = "You are a meticulous prompt critic. Reply with a single JSON object only.";

impl ModelAnalyzer {
    pub fn new(
        client: ModelClient,
        heuristic: HeuristicAnalyzer,
        sample_temperature: f32,
        temperature: f32,
    ) -> Self {
        Self {
            client,
            heuristic,
            sample_temperature,
            temperature,
        }
    }

    fn critic_prompt(source: &str, candidate: &str, sample: &str) -> String {
        format!(
            "A prompt was rewritten from an earlier version. Judge whether the rewritten prompt is \
             flawed: ambiguous, missing constraints, drifting from the earlier intent, or likely to \
             produce the weaknesses visible in the sample answer.\n\n\
             Earlier version:\n{source}\n\n\
             Rewritten prompt:\n<prompt>{candidate}</prompt>\n\n\
             Sample answer to the rewritten prompt:\n<output>{sample}</output>\n\n\
             Reply as JSON: {{\"flaws_found\": [\"<one entry per flaw, empty if none>\"], \
             \"feedback_summary\": \"<one sentence>\", \"analysis_summary\": \"<short analysis>\"}}"
        )
    }
}

#[async_trait]
impl FlawAnalyzer for ModelAnalyzer {
    fn name(&self) -> &str {
        "model"
    }

    async fn analyze(&self, source: &str, candidate: &str) -> Result<FlawReport, ProviderError> {
        let structural = self.heuristic.flaws(candidate);

        let sample = self.client.complete(candidate, self.sample_temperature).await?;
        let verdict: CriticVerdict = self
            .client
            .complete_json(
                CRITIC_SYSTEM,
                &Self::critic_prompt(source, candidate, &sample),
                self.temperature,
            )
            .await?;

        let mut report = verdict.into_report();
        for flaw in structural {
            if !report.flaws.contains(&flaw) {
                report.flaws.push(flaw);
            }
        }
        if report.feedback_summary.is_empty() {
            report.feedback_summary = if report.has_flaws() {
                format!("{} flaw(s) found.", report.flaws.len())
            } else {
                "No flaws found.".into()
            };
        }
        debug!(flaws = report.flaws.len(), "Model flaw analysis complete");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::text_client;

    #[test]
    fn clean_prompt_passes() {
        let report = HeuristicAnalyzer::default()
            .report("You are a chemist. Explain why ice floats on water, in three sentences.");
        assert!(!report.has_flaws());
        assert_eq!(report.feedback_summary, "No flaws found.");
    }

    #[test]
    fn structural_flaws_are_found() {
        let analyzer = HeuristicAnalyzer::new(vec!["Output format".into()]);
        let flaws = analyzer.flaws("**Enhanced Prompt:**\nWrite about [insert topic] for {audience}.\n```rust\nfn main()");
        assert_eq!(flaws.len(), 4);
        assert!(flaws[0].contains("reply heading"));
        assert!(flaws[1].contains("[insert topic]"));
        assert!(flaws[1].contains("{audience}"));
        assert!(flaws[2].contains("code fence"));
        assert!(flaws[3].contains("Output format"));
    }

    #[test]
    fn empty_and_short_candidates() {
        let analyzer = HeuristicAnalyzer::default();
        assert_eq!(analyzer.flaws("   "), vec!["The candidate prompt is empty.".to_string()]);
        assert!(analyzer.flaws("Hi")[0].contains("too short"));
    }

    #[test]
    fn json_examples_are_not_placeholders() {
        let flaws = HeuristicAnalyzer::default()
            .flaws("Return JSON like {\"name\": \"Ada\", \"age\": 36} and nothing else.");
        assert!(flaws.is_empty());
    }

    #[test]
    fn critic_flag_form_is_accepted() {
        let verdict: CriticVerdict = serde_json::from_str(
            r#"{"flaws_found": true, "feedback_summary": "Too vague.", "analysis_summary": {"clarity": "low"}}"#,
        )
        .unwrap();
        let report = verdict.into_report();
        assert_eq!(report.flaws, vec!["Too vague.".to_string()]);
        assert!(report.analysis_summary.contains("clarity"));
    }

    #[tokio::test]
    async fn model_analysis_samples_then_critiques() {
        let (client, provider) = text_client(&[
            "A sample answer.",
            r#"{"flaws_found": ["No audience given"], "feedback_summary": "Needs an audience.", "analysis_summary": "Vague."}"#,
        ]);
        let analyzer = ModelAnalyzer::new(client, HeuristicAnalyzer::default(), 0.7, 0.0);
        let report = analyzer
            .analyze("Explain tides", "Explain tides to [your audience] clearly.")
            .await
            .unwrap();

        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.prompt_of(0), "Explain tides to [your audience] clearly.");
        assert!(provider.prompt_of(1).contains("<output>A sample answer.</output>"));
        assert!((provider.temperature_of(1) - 0.0).abs() < f32::EPSILON);
        assert_eq!(report.flaws.len(), 2);
        assert_eq!(report.feedback_summary, "Needs an audience.");
    }
}
