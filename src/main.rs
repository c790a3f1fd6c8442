//! Story relay server: REST, presence WebSocket and SSE over one session store.

use std::{env, net::SocketAddr};

use anyhow::Context;
use axum::Router;
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use story_relay_back::{
    config::AppConfig,
    routes,
    services::storage_supervisor::{self, StoreBackend},
    state::AppState,
};

const DEFAULT_PORT: u16 = 8080;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = AppState::new(AppConfig::load());

    // Starts degraded; the supervisor installs the store once it answers.
    let backend = StoreBackend::from_env();
    info!(?backend, "selected session store");
    tokio::spawn(storage_supervisor::forward_degraded_changes(state.clone()));
    tokio::spawn(storage_supervisor::run(state.clone(), move || backend.connect()));

    let app: Router = routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "story relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(terminated())
        .await
        .context("serving http")
}

/// `PORT` wins over `SERVER_PORT`; unparsable values fall back to 8080.
fn listen_addr() -> SocketAddr {
    let port = ["PORT", "SERVER_PORT"]
        .into_iter()
        .find_map(|var| env::var(var).ok())
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    SocketAddr::from(([0, 0, 0, 0], port))
}

async fn terminated() {
    #[cfg(unix)]
    let term = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let term = std::future::pending::<()>();

    tokio::select! {
        _ = signal::ctrl_c() => {}
        _ = term => {}
    }
    info!("shutting down");
}
