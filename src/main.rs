use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quizhub::{
    config::{RoomConfig, ServerConfig},
    quiz::FileQuizSource,
    state::AppState,
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizhub=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting quizhub...");

    let server_config = ServerConfig::from_env();
    let room_config = RoomConfig::from_env();

    let quizzes = FileQuizSource::new(&server_config.quiz_dir);
    tracing::info!("Serving quizzes from {}", quizzes.dir().display());

    let state = Arc::new(AppState::new(Arc::new(quizzes), room_config));

    let app = quizhub::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", server_config.addr);

    let listener = tokio::net::TcpListener::bind(server_config.addr)
        .await
        .unwrap();
    axum::serve(listener, app).await.unwrap();
}
