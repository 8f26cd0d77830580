//! Media Telemetry Back binary entrypoint wiring the HTTP API, player polling and the state store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use media_telemetry_back::{
    config::AppConfig,
    dao::object_store::MemoryObjectStore,
    media_server::{MediaServer, PlexServer},
    player::device::{ClientHeaders, HttpDevice},
    routes,
    services::{refresh, sweeper},
    state::{AppState, Collaborators, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let transport = HttpDevice::new(
        ClientHeaders {
            client_identifier: config.client_identifier.clone(),
            device_name: config.device_name.clone(),
            token: config.server.token.clone(),
        },
        config.poll_timeout,
    )
    .context("building device client")?;
    let server: Option<Arc<dyn MediaServer>> = match PlexServer::new(&config) {
        Ok(server) => Some(Arc::new(server)),
        Err(err) => {
            warn!(error = %err, "media server client unavailable; session metadata disabled");
            None
        }
    };

    let app_state = AppState::new(
        config,
        Collaborators {
            backend: Arc::new(MemoryObjectStore::new()),
            transport: Arc::new(transport),
            server,
        },
    );

    spawn_storage_supervisor(app_state.clone());
    tokio::spawn(refresh::run(app_state.clone()));
    tokio::spawn(sweeper::run(app_state.clone()));
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state.clone());

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal(app_state))
        .await
        .context("serving axum")?;

    Ok(())
}

/// Connect CouchDB in the background when it is configured; states stay in memory otherwise.
#[cfg(feature = "couch-store")]
fn spawn_storage_supervisor(state: SharedState) {
    use media_telemetry_back::{
        dao::{
            object_store::{
                ObjectStore,
                couchdb::{CouchConfig, CouchObjectStore},
            },
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    let config = match CouchConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            info!(reason = %err, "CouchDB not configured; keeping states in memory");
            return;
        }
    };

    tokio::spawn(storage_supervisor::run(state, move || {
        let config = config.clone();
        async move {
            let store = CouchObjectStore::connect(config)
                .await
                .map_err(StorageError::from)?;
            Ok::<Arc<dyn ObjectStore>, StorageError>(Arc::new(store))
        }
    }));
}

#[cfg(not(feature = "couch-store"))]
fn spawn_storage_supervisor(_state: SharedState) {
    info!("built without CouchDB support; keeping states in memory");
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM, then stop the players and background loops.
async fn shutdown_signal(state: SharedState) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown requested");
    state.shutdown();
}
