use tracing::info;
use zapi_backend::{serve, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zapi_backend=info,zapi_rpc=info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    info!(
        rpc_url = %config.rpc.url,
        poll_interval_ms = config.poll.interval.as_millis() as u64,
        poll_max_attempts = config.poll.max_attempts,
        "starting zapi-backend"
    );

    serve(config).await
}
