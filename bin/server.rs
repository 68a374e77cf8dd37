// Trasparenza Comuni - Web Server
// HOST / PORT from the environment, datasets served from TC_DATA_DIR (default data/raw)

use anyhow::{Context, Result};
use trasparenza_comuni::api::{router, ApiState};
use trasparenza_comuni::logging::init_tracing;
use trasparenza_comuni::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = ServerConfig::from_env();
    let app = router(ApiState::new(config.data_dir.clone()));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    println!("🌐 Trasparenza Comuni API");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("🚀 Server running on http://{}", addr);
    println!("   Health:   http://{}/health", addr);
    println!("   Datasets: http://{}/api/datasets ({})", addr, config.data_dir.display());
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
