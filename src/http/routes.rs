use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Recording upload and status
        .route(
            "/appointments/:appointment_id/recordings",
            post(handlers::upload_recording),
        )
        .route(
            "/recordings/:recording_id/status",
            get(handlers::recording_status),
        )
        .route(
            "/recordings/:recording_id/transcription/retry",
            post(handlers::retry_transcription),
        )
        // Note drafting and editing
        .route("/appointments/:appointment_id/note", get(handlers::get_note))
        .route(
            "/appointments/:appointment_id/note/generate",
            post(handlers::generate_note),
        )
        .route(
            "/appointments/:appointment_id/note/regenerate",
            post(handlers::regenerate_note),
        )
        .route("/notes/:note_id", patch(handlers::update_note))
        .route("/notes/:note_id/finalize", post(handlers::finalize_note))
        .route("/notes/:note_id/export", get(handlers::export_note))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
