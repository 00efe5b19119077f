use anyhow::{Context, Result};
use clap::Parser;
use live_recorder::{create_router, AppState, Config, LiveService};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "live-recorder", version, about = "Livestream recording service")]
struct Args {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/live-recorder")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,live_recorder=debug")),
        )
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let service = LiveService::from_config(&cfg)?;
    let app = create_router(AppState::new(service.clone()));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    service.shutdown().await;
    info!("All recordings stopped");
    Ok(())
}
