//! Basic evaluator: weighted heuristic rules, no model calls.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use promptsmith_config::{BulletRule, EvaluationRules, KeywordRule, LengthRule, PhraseRule};
use promptsmith_core::capability::EvaluationEngine;
use promptsmith_core::error::ProviderError;
use promptsmith_core::iteration::Evaluation;

/// Top of the score scale.
pub const SCORE_SCALE: f64 = 5.0;

static BULLET: LazyLock<Option<regex_lite::Regex>> =
    LazyLock::new(|| regex_lite::Regex::new(r"(?m)^\s*[*\-•]\s+").ok());

/// Scores output text with the configured rules.
///
/// Each present rule yields a 0–5 metric. The overall satisfaction is the
/// weighted mean, the plain mean when every weight is zero, and 0 when no
/// rule is configured; it is clamped to 0–5 and rounded to two decimals.
pub struct BasicEvaluator {
    rules: EvaluationRules,
    threshold: f64,
}

impl BasicEvaluator {
    pub fn new(rules: EvaluationRules, threshold: f64) -> Self {
        Self { rules, threshold }
    }

    /// Synchronous core of `evaluate`.
    pub fn score(&self, prompt: &str, output: &str) -> Evaluation {
        if output.trim().is_empty() {
            let scores = BTreeMap::from([
                ("text_quality".to_string(), 0.0),
                ("overall_satisfaction".to_string(), 0.0),
            ]);
            return Evaluation::new(prompt, scores, 0.0, self.threshold)
                .with_feedback("No evaluable text content found in the output.");
        }

        let mut scores = BTreeMap::new();
        let mut weighted = Vec::new();
        let mut feedback = Vec::new();

        if let Some(rule) = &self.rules.length {
            let score = score_length(output, rule);
            feedback.push(format!(
                "Length score: {score:.1}/5.0 (min: {}, max: {})",
                bound(rule.min),
                bound(rule.max)
            ));
            if score == 0.0 && rule.strict {
                feedback.push("Failed length check (strict bounds).".into());
            }
            scores.insert("length".to_string(), score);
            weighted.push((score, rule.weight));
        }

        if let Some(rule) = &self.rules.keywords {
            let (score, note) = score_keywords(output, rule);
            feedback.push(format!("Keywords score: {score:.1}/5.0. {note}").trim_end().to_string());
            scores.insert("keywords".to_string(), score);
            weighted.push((score, rule.weight));
        }

        if let Some(rule) = &self.rules.must_contain_phrases {
            let (score, note) = score_phrases(output, rule);
            feedback.push(format!("Must-contain phrases score: {score:.1}/5.0. {note}"));
            scores.insert("must_contain_phrases".to_string(), score);
            weighted.push((score, rule.weight));
        }

        if let Some(rule) = &self.rules.bullet_points {
            let (score, note) = score_bullets(output, rule);
            feedback.push(format!("Bullet points score: {score:.1}/5.0. {note}"));
            scores.insert("bullet_points".to_string(), score);
            weighted.push((score, rule.weight));
        }

        let overall = round2(aggregate(&weighted).clamp(0.0, SCORE_SCALE));
        scores.insert("overall_satisfaction".to_string(), overall);

        Evaluation::new(prompt, scores, overall, self.threshold).with_feedback(feedback.join("; "))
    }
}

fn bound(value: Option<usize>) -> String {
    value.map_or_else(|| "none".to_string(), |v| v.to_string())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn aggregate(weighted: &[(f64, f64)]) -> f64 {
    if weighted.is_empty() {
        return 0.0;
    }
    let total_weight: f64 = weighted.iter().map(|(_, w)| w).sum();
    if total_weight > 0.0 {
        weighted.iter().map(|(s, w)| s * w).sum::<f64>() / total_weight
    } else {
        weighted.iter().map(|(s, _)| s).sum::<f64>() / weighted.len() as f64
    }
}

fn score_length(text: &str, rule: &LengthRule) -> f64 {
    let len = text.chars().count() as f64;
    if let Some(min) = rule.min.filter(|&m| (len as usize) < m) {
        return if rule.strict {
            0.0
        } else {
            SCORE_SCALE * (len / min as f64) * 0.5
        };
    }
    if let Some(max) = rule.max.filter(|&m| (len as usize) > m) {
        return if rule.strict {
            0.0
        } else {
            SCORE_SCALE * (max as f64 / len) * 0.5
        };
    }
    SCORE_SCALE
}

fn score_keywords(text: &str, rule: &KeywordRule) -> (f64, String) {
    let fold = |s: &str| {
        if rule.case_sensitive {
            s.to_string()
        } else {
            s.to_lowercase()
        }
    };
    let haystack = fold(text);
    let present: Vec<String> = rule.present.iter().map(|k| fold(k)).collect();
    let absent: Vec<String> = rule.absent.iter().map(|k| fold(k)).collect();

    let found_present = present.iter().filter(|k| haystack.contains(k.as_str())).count();
    let found_absent: Vec<&str> = absent
        .iter()
        .filter(|k| haystack.contains(k.as_str()))
        .map(String::as_str)
        .collect();

    let mut score = SCORE_SCALE;
    let mut notes = Vec::new();
    if !present.is_empty() {
        score *= found_present as f64 / present.len() as f64;
        notes.push(format!(
            "Found {found_present}/{} required keywords.",
            present.len()
        ));
    }
    if !found_absent.is_empty() {
        score *= 0.2;
        notes.push(format!(
            "Found {} forbidden keywords: {}.",
            found_absent.len(),
            found_absent.join(", ")
        ));
    }
    (score.max(0.0), notes.join(" "))
}

fn score_phrases(text: &str, rule: &PhraseRule) -> (f64, String) {
    if rule.phrases.is_empty() {
        return (SCORE_SCALE, "No must-contain phrases specified.".into());
    }
    let haystack = text.to_lowercase();
    let missing: Vec<&str> = rule
        .phrases
        .iter()
        .filter(|p| !haystack.contains(&p.to_lowercase()))
        .map(String::as_str)
        .collect();

    let total = rule.phrases.len();
    let score = SCORE_SCALE * (1.0 - missing.len() as f64 / total as f64);
    let note = if missing.is_empty() {
        format!("All {total} required phrases found.")
    } else {
        format!(
            "Missing {}/{total} required phrases: {}.",
            missing.len(),
            missing.join(", ")
        )
    };
    (score, note)
}

fn score_bullets(text: &str, rule: &BulletRule) -> (f64, String) {
    let found = BULLET.as_ref().map_or(0, |re| re.find_iter(text).count());
    if rule.min_bullets == 0 {
        return (SCORE_SCALE, format!("Found {found} bullet points (no minimum)."));
    }
    let score = if found >= rule.min_bullets {
        SCORE_SCALE
    } else {
        found as f64 / rule.min_bullets as f64 * SCORE_SCALE
    };
    (
        score,
        format!("Found {found} bullet points (minimum {}).", rule.min_bullets),
    )
}

#[async_trait]
impl EvaluationEngine for BasicEvaluator {
    fn name(&self) -> &str {
        "basic"
    }

    async fn evaluate(
        &self,
        _objective: &str,
        prompt: &str,
        output: &str,
    ) -> Result<Evaluation, ProviderError> {
        Ok(self.score(prompt, output))
    }
}
