//! `promptsmith report`: print the final report of a stored session.

use promptsmith_core::session::SessionId;
use promptsmith_engine::FinalReport;

pub async fn run(session_id: String, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let kb = super::open_knowledge(&config).await?;

    let id = SessionId(session_id);
    let session = kb
        .session(&id)
        .await?
        .ok_or_else(|| format!("Session not found: {id}"))?;
    let records = kb.get_session(&id).await?;
    let report = FinalReport::from_stored(&session, &records);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.to_markdown());
    }

    Ok(())
}
