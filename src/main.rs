use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue};
use drowsiness_monitor::config::Config;
use drowsiness_monitor::logging::{init_tracing, LogConfig};
use drowsiness_monitor::monitor::{Monitor, ReplaySource};
use drowsiness_monitor::response::panic_response;
use drowsiness_monitor::routes::build_router;
use drowsiness_monitor::session::TracingAlarm;
use drowsiness_monitor::state::AppState;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    let _log_guard = init_tracing(&LogConfig::from(&config));
    tracing::info!(config = ?config, "Starting drowsiness-monitor");

    let (shutdown_tx, _) = broadcast::channel::<()>(8);

    let state = AppState::new(&config, Arc::new(TracingAlarm::new()), shutdown_tx.clone());

    let replay_handle = match config.replay_path.as_deref() {
        Some(path) => spawn_replay(&state, path).await,
        None => None,
    };

    let cors_layer = build_cors_layer(&config);

    let app = build_router(state.clone())
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ));

    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!(%addr, "Listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");

    let server_future = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_tx.clone()));

    if let Err(e) = server_future.await {
        tracing::error!(error = %e, "HTTP server crashed");
    }

    if let Some(handle) = replay_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Replay task panicked");
        }
    }

    // leave no alarm sounding on exit
    if let Ok(summary) = state.sessions().stop().await {
        tracing::info!(
            session_id = %summary.info.id,
            frames = summary.counters.frames,
            "Active session stopped at shutdown"
        );
    }
    tracing::info!("Shutdown complete");
}

/// Drive a session from a recorded landmark file. The HTTP surface stays up so
/// display clients can follow the replay over SSE.
async fn spawn_replay(state: &AppState, path: &str) -> Option<JoinHandle<()>> {
    let source = match ReplaySource::open(path).await {
        Ok(source) => source,
        Err(e) => {
            tracing::error!(path, error = %e, "Failed to open replay file");
            return None;
        }
    };

    let session = match state.sessions().start(&Default::default()).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start replay session");
            return None;
        }
    };

    let sessions = state.sessions().clone();
    let shutdown_rx = state.shutdown_rx();
    let path = path.to_string();
    Some(tokio::spawn(async move {
        let session_id = session.id();
        match Monitor::new(session, source).run(shutdown_rx).await {
            Ok(summary) => tracing::info!(
                %session_id,
                path = %path,
                frames = summary.frames_processed,
                alarms = summary.alarms_raised,
                reason = ?summary.reason,
                "Replay finished"
            ),
            Err(e) => tracing::error!(%session_id, path = %path, error = %e, "Replay aborted"),
        }
        let _ = sessions.stop_session(session_id).await;
    }))
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    if config.cors_origin.trim() == "*" {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_credentials(false)
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
            .allow_methods(Any);
    }

    match config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
            .allow_methods(Any),
        Err(e) => {
            panic!(
                "FATAL: Invalid CORS_ORIGIN '{}': {}. \
                 Fix the CORS_ORIGIN environment variable.",
                config.cors_origin, e
            );
        }
    }
}

async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}
