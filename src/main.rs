use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use securedrive::config::Config;
use securedrive::db::FolderLockStorage;
use securedrive::router::{DriveState, drive_router};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        listen_addr = %cfg.basic.listen_addr,
        database_url = %cfg.basic.database_url,
        static_dir = %cfg.basic.static_dir.display(),
        redirect_url = %cfg.google.redirect_url,
        proxy = %cfg.google.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        operator = %cfg.google.operator_email.as_deref().unwrap_or("<any>"),
        loglevel = %cfg.basic.loglevel,
    );

    if cfg.google.client_id.is_empty() || cfg.google.client_secret.is_empty() {
        warn!("google client_id/client_secret not configured; sign-in will fail");
    }
    if cfg.basic.insecure_cookie {
        warn!("insecure_cookie enabled; OAuth cookies are sent without the Secure flag");
    }

    let storage = FolderLockStorage::connect(&cfg.basic.database_url).await?;
    let state = DriveState::new(&cfg, storage).await?;
    let app = drive_router(state);

    let listener = TcpListener::bind(&cfg.basic.listen_addr).await?;
    info!("HTTP server listening on {}", cfg.basic.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
