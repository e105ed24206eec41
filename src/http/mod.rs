//! HTTP API server for external control of the documentation pipeline
//!
//! REST surface over the pipeline components:
//! - POST /appointments/:id/recordings - Upload a finished capture blob
//! - GET  /recordings/:id/status - Recording + transcription status
//! - POST /recordings/:id/transcription/retry - Retry a failed transcription
//! - GET  /appointments/:id/note - Fetch the appointment's SOAP note
//! - POST /appointments/:id/note/generate - Trigger draft generation
//! - POST /appointments/:id/note/regenerate - Confirmed regeneration
//! - PATCH /notes/:id - Partial section update
//! - POST /notes/:id/finalize - One-way lock to immutable
//! - GET  /notes/:id/export - Plain-text export
//! - GET  /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
