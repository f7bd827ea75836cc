use std::sync::Arc;

use canaime::{Config, PortalScraper, RosterService, Scheduler};
use canaime_api::{AppState, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .write_style(env_logger::WriteStyle::Never)
        .init();

    let config = Config::load()?;

    let service = Arc::new(RosterService::new(PortalScraper::new(config.scraper)));
    let scheduler = Scheduler::new();
    scheduler.start();
    service.schedule(&scheduler, config.refresh_interval)?;

    let state = Arc::new(AppState::new(
        Arc::clone(&service),
        config.server.api_credentials.clone(),
    ));

    let address = config.server.bind_address();
    let tcp_listener = tokio::net::TcpListener::bind(&address).await?;

    log::info!("Starting api server on address: {}", address);

    axum::serve(tcp_listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {}", e);
            }
            log::info!("Shutting down");
        })
        .await?;

    scheduler.stop();
    Ok(())
}
