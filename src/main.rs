use engage::EngineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before reading configuration from the environment
    dotenvy::dotenv().ok();

    let config = EngineConfig::load()?;
    engage::start_server(config).await
}
