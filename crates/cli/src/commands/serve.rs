//! `promptsmith serve`: start the HTTP gateway.

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Promptsmith gateway");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Allowed origin: {}", config.gateway.allowed_origin);
    println!("   Knowledge Base: {}", config.knowledge.backend);

    promptsmith_gateway::start(config).await?;

    Ok(())
}
