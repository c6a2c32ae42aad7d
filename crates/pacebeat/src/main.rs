use pacebeat::{config::Config, run_server};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = Config::from_env();
    if config.spotify.client_id.is_none() || config.spotify.client_secret.is_none() {
        tracing::warn!("Spotify client credentials not set; token exchange will fail");
    }

    run_server(config).await
}
