use anyhow::Context as _;
use tracing::{info, warn};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use rustls::crypto::ring::default_provider;

use tradegenie_core::{AppConfig, Data};
use tradegenie_session::spawn_cleanup_task;
use tradegenie_utils::formatting::format_compact_duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(filter_fn(|metadata| {
        let within_info_level = *metadata.level() <= tracing::Level::INFO;
        within_info_level && !metadata.target().starts_with("hyper")
    }));

    tracing_subscriber::registry().with(fmt_layer).init();

    default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls ring provider"))?;

    // Load the .env file
    if let Err(err) = dotenvy::dotenv() {
        info!(%err, "no .env file loaded; using process environment");
    }

    let config = AppConfig::from_env();
    let data = Data::new(config).context("failed to initialize TradeGenie components")?;

    match &data.llm {
        Some(llm) if llm.config().has_api_key() => {
            info!(model = %llm.config().model, "LLM integration enabled.");
        }
        Some(_) => warn!("LLM integration enabled but no API key is set (LLM_API_KEY)."),
        None => info!("LLM integration disabled (LLM_ENABLED=false)."),
    }

    let assets: Vec<&str> = data.config.risk.supported_assets().collect();
    info!(
        assets = %assets.join(", "),
        default_risk_percent = data.config.risk.default_risk_percent,
        "Position sizing configured."
    );

    let cleanup_interval = data.config.session.cleanup_interval;
    let janitor = spawn_cleanup_task(data.sessions.clone(), cleanup_interval);
    info!(
        interval = %format_compact_duration(cleanup_interval.as_secs()),
        "Conversation cleanup scheduled."
    );

    info!("TradeGenie is ready.");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    janitor.abort();
    let pending = data.sessions.lock().await.len();
    info!(pending_conversations = pending, "TradeGenie shutting down.");

    Ok(())
}
