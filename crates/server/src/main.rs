use anyhow::Context;
use splitty_core::Config;
use splitty_ocr::ReceiptPipeline;
use splitty_server::{router, telemetry, AppState};
use std::path::PathBuf;
use std::sync::Arc;

const ENV_CONFIG_PATH: &str = "SPLITTY_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_subscriber("splitty-server", "info,tower_http=debug")?;

    let config_path = std::env::var_os(ENV_CONFIG_PATH).map(PathBuf::from);
    let config = Config::load(config_path.as_deref()).context("failed to load configuration")?;

    let pipeline = ReceiptPipeline::from_config(&config)
        .context("receipt processing needs an OCR credential")?;
    let bind = config.server.bind.clone();
    let body_limit = config.server.body_limit_bytes;
    let state = Arc::new(AppState::new(pipeline, &config));

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(%bind, target_currency = %config.split.target_currency, mode = %config.split.mode, "splitty server listening");

    axum::serve(listener, router(state, body_limit)).await?;
    Ok(())
}
