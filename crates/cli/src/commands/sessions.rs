//! `promptsmith sessions`: list stored sessions.

use promptsmith_core::session::{SessionFilter, SessionStatus};

pub async fn run(status: Option<SessionStatus>, limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let kb = super::open_knowledge(&config).await?;

    let sessions = kb
        .list_sessions(&SessionFilter {
            status,
            limit: Some(limit),
        })
        .await?;

    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    println!("{:<36}  {:<9}  {:<19}  {:>4}  {:>5}  PROMPT", "ID", "STATUS", "STOP", "ITER", "BEST");
    for s in &sessions {
        let preview: String = s.initial_prompt.chars().take(40).collect();
        println!(
            "{:<36}  {:<9}  {:<19}  {:>4}  {:>5}  {}",
            s.id,
            s.status.as_str(),
            s.stop_reason.map_or("-", |r| r.as_str()),
            s.iterations,
            s.best_score.map_or_else(|| "-".to_string(), |b| format!("{b:.2}")),
            preview,
        );
    }
    println!("\n{} session(s)", sessions.len());

    Ok(())
}
