//! Router assembly and the HTTP server loop.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::api;
use crate::state::GatewayState;
use crate::upload::{self, MAX_UPLOAD_SIZE};

/// Build the application router: JSON endpoints plus static artifact mounts.
pub fn build_router(state: Arc<GatewayState>) -> Router {
    let music_dir = state.orchestrator.music.store().dir().to_path_buf();
    let video_dir = state.orchestrator.video.video_store().dir().to_path_buf();

    let router = Router::new()
        .route("/", get(api::root))
        .route("/health", get(api::health))
        .route("/api/generate-music", post(api::generate_music))
        .route("/api/list-music", get(api::list_music))
        .route(
            "/api/upload-image",
            post(upload::upload_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE + 64 * 1024)),
        )
        .route("/api/generate-video", post(api::generate_video))
        .route("/api/list-videos", get(api::list_videos))
        .route("/api/compose-prompt", post(api::compose_prompt));

    #[cfg(feature = "metrics")]
    let router = router.route("/metrics", get(crate::metrics::metrics_handler));

    router
        .nest_service("/music", ServeDir::new(music_dir))
        .nest_service("/videos", ServeDir::new(video_dir))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway on the configured bind address and run until Ctrl+C.
pub async fn start_gateway(state: Arc<GatewayState>, port: u16) -> anyhow::Result<()> {
    let addr = format!("{}:{port}", state.config.bind_addr());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Gateway listening on {addr}");
    serve(listener, state, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
///
/// Shutdown cancels every in-flight video job, then waits for open
/// requests to finish.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: Arc<GatewayState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    state.orchestrator.music.store().ensure_dir().await?;
    state.orchestrator.video.video_store().ensure_dir().await?;

    let cancel = state.shutdown.clone();
    let app = build_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Shutdown signal received, cancelling in-flight jobs");
            cancel.cancel();
        })
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(%e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(%e, "Failed to install SIGTERM handler");
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
