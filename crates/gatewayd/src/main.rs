use std::{
    future::{Future, IntoFuture},
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
};

use anyhow::Context;
use bus::Bus;
use clap::Parser;
use gateway_core::Gateway;
use panel_link::PanelSocket;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod http;
mod settings;

use http::{build_router, AppState};
use settings::{load_settings, Settings};

#[derive(Parser, Debug)]
struct Args {
    /// Configuration file; defaults to `gateway.toml` in the working directory.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = load_settings(args.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let bus = Arc::new(Bus::default());
    run(settings, bus, shutdown_signal()).await?;
    info!("gatewayd stopped");
    Ok(())
}

async fn run(
    settings: Settings,
    bus: Arc<Bus>,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let addr: SocketAddr = settings
        .http_bind
        .parse()
        .with_context(|| format!("invalid http_bind '{}'", settings.http_bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let link = Arc::new(PanelSocket::from_config(&settings.gateway));
    let gateway = Gateway::new(
        settings.gateway.clone(),
        link,
        Arc::clone(&bus) as Arc<dyn bus::Publisher>,
        Arc::clone(&bus) as Arc<dyn bus::Subscriber>,
    );
    gateway
        .start()
        .await
        .context("failed to start gateway session")?;
    info!(
        %addr,
        panel = %settings.gateway.panel_addr(),
        "gatewayd listening"
    );

    let app = build_router(AppState { bus });
    tokio::select! {
        served = axum::serve(listener, app).into_future() => {
            if let Err(err) = served {
                error!(error = %err, "http server failed");
            }
        }
        _ = shutdown => info!("shutdown requested"),
    }

    let report = gateway.stop().await;
    if report.failures() > 0 {
        warn!(
            attempted = report.len(),
            failed = report.failures(),
            "teardown finished with failures"
        );
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
