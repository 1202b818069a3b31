use assetflow::gateway::{router, GatewayConfig, GatewayState};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    // Optional config file path as the only argument.
    let file = std::env::args().nth(1);
    let config = GatewayConfig::load(file.as_deref())?;
    let listener = TcpListener::bind(config.listen.as_str()).await?;
    tracing::info!(
        listen = %config.listen,
        backend = %config.backend_url,
        static_dir = %config.static_dir,
        "gateway started"
    );
    axum::serve(listener, router(GatewayState::new(config)?)).await?;
    Ok(())
}
