//! `promptsmith refine`: run one session and print its events.

use promptsmith_core::session::{
    BackendKind, EnhancerKind, EvaluationMode, ProviderSelection, RefinementConfig,
    RefinementRequest, SessionStatus,
};
use promptsmith_engine::RefinementEvent;

pub struct RefineOptions {
    pub max_iterations: u32,
    pub enhancer: EnhancerKind,
    pub backend: Option<BackendKind>,
    pub evaluation: EvaluationMode,
    pub self_correct: bool,
    pub json: bool,
}

pub async fn run(prompt: String, options: RefineOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let backend = options.backend.unwrap_or(config.default_backend);

    let request = RefinementRequest::new(
        prompt,
        RefinementConfig {
            max_iterations: options.max_iterations,
            providers: ProviderSelection {
                orchestrator: backend,
                enhancer: options.enhancer,
            },
            evaluation_mode: options.evaluation,
            enable_self_correction: options.self_correct,
            ..RefinementConfig::default()
        },
    );

    let engine = super::build_engine(config).await?;
    let mut run = engine.start(request).await?;

    if !options.json {
        println!("Session {} ({backend})", run.session_id);
        println!();
    }
    while let Some(event) = run.events.recv().await {
        if options.json {
            println!("{}", serde_json::to_string(&event)?);
        } else if let Some(text) = render(&event) {
            println!("{text}");
        }
    }

    let (_, session_task) = run.into_parts();
    let outcome = session_task.await?;
    if outcome.status == SessionStatus::Failed {
        return Err(format!("Session {} failed ({})", outcome.session_id, outcome.stop_reason).into());
    }
    Ok(())
}

/// Human-readable rendering of one event. `None` hides it.
fn render(event: &RefinementEvent) -> Option<String> {
    match event {
        RefinementEvent::IterationResult {
            iteration,
            prompt,
            rationale,
            evaluation,
            ..
        } => Some(format!(
            "── Iteration {iteration} ── score {:.2}/5.00{}\nPrompt:\n  {}\nRationale: {rationale}\n",
            evaluation.overall_satisfaction,
            if evaluation.satisfied { " (satisfied)" } else { "" },
            prompt.replace('\n', "\n  "),
        )),
        RefinementEvent::SelfCorrectionStatus {
            status,
            iteration,
            max_iterations,
            message,
        } => Some(match message {
            Some(m) => format!("  [self-correction {iteration}/{max_iterations}] {}: {m}", status.as_str()),
            None => format!("  [self-correction {iteration}/{max_iterations}] {}", status.as_str()),
        }),
        RefinementEvent::SelfCorrectionAnalysis { flaws, .. } if !flaws.is_empty() => {
            Some(format!("  flaws: {}", flaws.join("; ")))
        }
        RefinementEvent::SelfCorrectionError { message } => Some(format!("  self-correction error: {message}")),
        RefinementEvent::SystemError { component, error } => Some(format!("✗ {component} failed: {error}")),
        RefinementEvent::SystemDiagnosis(d) => Some(format!(
            "  diagnosis: {} → {}",
            d.root_cause_analysis,
            d.recovery_strategy.as_str()
        )),
        RefinementEvent::FinalReport { content } => Some(content.clone()),
        RefinementEvent::Error { message } => Some(format!("✗ {message}")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptsmith_core::iteration::Evaluation;
    use promptsmith_engine::CorrectionStatus;
    use std::collections::BTreeMap;

    #[test]
    fn iteration_result_shows_score_and_prompt() {
        let event = RefinementEvent::IterationResult {
            iteration: 2,
            prompt: "line one\nline two".into(),
            rationale: "tightened".into(),
            raw_ai_output: "out".into(),
            evaluation: Evaluation::new("line one\nline two", BTreeMap::new(), 4.5, 4.0),
        };
        let text = render(&event).unwrap();
        assert!(text.starts_with("── Iteration 2 ── score 4.50/5.00 (satisfied)"));
        assert!(text.contains("  line one\n  line two"));
    }

    #[test]
    fn quiet_events_are_hidden() {
        assert!(render(&RefinementEvent::Complete {}).is_none());
        assert!(render(&RefinementEvent::SelfCorrectionRevision {
            revised_prompt: "x".into()
        })
        .is_none());
        let status = RefinementEvent::SelfCorrectionStatus {
            status: CorrectionStatus::Revising,
            iteration: 1,
            max_iterations: 3,
            message: Some("add an audience".into()),
        };
        assert_eq!(
            render(&status).unwrap(),
            "  [self-correction 1/3] revising: add an audience"
        );
    }
}
