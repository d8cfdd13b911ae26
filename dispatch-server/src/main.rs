use dispatch_server::{Config, Server, ServerState, print_banner, setup_environment};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. dotenv + logger
    setup_environment()?;

    print_banner();
    tracing::info!("Dispatch server starting...");

    // 2. Config
    let config = Config::from_env()?;

    // 3. Databases, collaborators, hub
    let state = ServerState::initialize(&config).await?;

    // 4. HTTP + WebSocket
    let server = Server::with_state(config, state);
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
