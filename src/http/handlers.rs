use super::state::AppState;
use crate::error::{GenerationError, PipelineError, UploadError};
use crate::export::render_plain_text;
use crate::model::{Recording, SoapNote, SoapSection, Transcript, TranscriptStatus};
use crate::note::NoteDraftOrchestrator;
use crate::recording::RecordedBlob;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UploadRecordingRequest {
    pub owner_id: String,
    /// Base64-encoded WAV blob produced by the recording controller
    pub audio_base64: String,
    pub duration_seconds: f64,
}

#[derive(Debug, Serialize)]
pub struct UploadRecordingResponse {
    pub recording_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct RecordingStatusResponse {
    pub recording: Recording,
    pub transcript: Option<Transcript>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateNoteRequest {
    pub transcript_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RegenerateNoteRequest {
    pub transcript_id: String,
    /// Regeneration overwrites unsaved edits once applied, so it must be
    /// explicitly confirmed
    #[serde(default)]
    pub confirmed: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNoteRequest {
    pub appointment_id: String,
    pub caller: String,
    pub sections: HashMap<SoapSection, String>,
}

#[derive(Debug, Deserialize)]
pub struct FinalizeNoteRequest {
    pub appointment_id: String,
    pub caller: String,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn pipeline_error(err: &PipelineError) -> (StatusCode, Json<ErrorResponse>) {
    let code = match err {
        PipelineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::Authorization(_) => StatusCode::FORBIDDEN,
        PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::StaleWrite(_) => StatusCode::CONFLICT,
        PipelineError::Generation(GenerationError::AlreadyInFlight) => StatusCode::CONFLICT,
        PipelineError::Generation(GenerationError::TranscriptNotReady) => StatusCode::CONFLICT,
        PipelineError::Generation(GenerationError::ConfirmationRequired) => {
            StatusCode::BAD_REQUEST
        }
        PipelineError::Generation(_) | PipelineError::Transcription(_) => StatusCode::BAD_GATEWAY,
        PipelineError::Device(_) | PipelineError::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (code, Json(ErrorResponse { error: err.to_string() }))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /appointments/:appointment_id/recordings
/// Persist a finished capture blob and kick off transcription
pub async fn upload_recording(
    State(state): State<AppState>,
    Path(appointment_id): Path<String>,
    Json(req): Json<UploadRecordingRequest>,
) -> impl IntoResponse {
    let bytes = match base64::engine::general_purpose::STANDARD.decode(&req.audio_base64) {
        Ok(bytes) => bytes,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse { error: format!("invalid audio payload: {e}") }),
            )
                .into_response();
        }
    };

    let blob = RecordedBlob { bytes, duration_seconds: req.duration_seconds };

    info!(appointment_id, owner_id = %req.owner_id, "upload requested");
    match state
        .uploads
        .upload(&blob, &appointment_id, &req.owner_id, |_| {})
        .await
    {
        Ok(recording_id) => (
            StatusCode::OK,
            Json(UploadRecordingResponse { recording_id, status: "uploaded".to_string() }),
        )
            .into_response(),
        Err(UploadError::EmptyBlob) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse { error: UploadError::EmptyBlob.to_string() }),
        )
            .into_response(),
        Err(e) => {
            error!(appointment_id, error = %e, "upload failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse { error: e.to_string() }),
            )
                .into_response()
        }
    }
}

/// GET /recordings/:recording_id/status
/// Current recording and transcription status
pub async fn recording_status(
    State(state): State<AppState>,
    Path(recording_id): Path<String>,
) -> impl IntoResponse {
    match state.store.recording(&recording_id).await {
        Some(recording) => {
            let transcript = state.store.transcript(&recording_id).await;
            (StatusCode::OK, Json(RecordingStatusResponse { recording, transcript }))
                .into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse { error: format!("recording {recording_id} not found") }),
        )
            .into_response(),
    }
}

/// POST /recordings/:recording_id/transcription/retry
/// User-initiated retry after an explicit transcription failure or a stalled
/// enqueue; reuses the same recording
pub async fn retry_transcription(
    State(state): State<AppState>,
    Path(recording_id): Path<String>,
) -> impl IntoResponse {
    let Some(transcript) = state.store.transcript(&recording_id).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse { error: format!("recording {recording_id} not found") }),
        )
            .into_response();
    };

    match transcript.status {
        TranscriptStatus::Failed | TranscriptStatus::Pending => {}
        TranscriptStatus::Processing | TranscriptStatus::Completed => {
            return (
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    error: "transcription is not in a retryable state".to_string(),
                }),
            )
                .into_response();
        }
    }

    let ack = state.transcription.trigger_transcription(&recording_id).await;
    if !ack.accepted {
        let reason = ack
            .error
            .unwrap_or_else(|| "transcription enqueue rejected".to_string());
        return (StatusCode::BAD_GATEWAY, Json(ErrorResponse { error: reason }))
            .into_response();
    }

    state
        .store
        .set_transcript_status(&recording_id, TranscriptStatus::Pending, None)
        .await;
    info!(recording_id, "transcription retry accepted");
    (
        StatusCode::OK,
        Json(AcceptedResponse { status: "pending".to_string() }),
    )
        .into_response()
}

/// GET /appointments/:appointment_id/note
pub async fn get_note(
    State(state): State<AppState>,
    Path(appointment_id): Path<String>,
) -> impl IntoResponse {
    match state.store.note_by_appointment(&appointment_id).await {
        Some(note) => (StatusCode::OK, Json(note)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("no note for appointment {appointment_id}"),
            }),
        )
            .into_response(),
    }
}

/// Fetch or create the appointment's draft orchestrator. Requires an
/// uploaded recording so the orchestrator knows the owning clinician.
async fn orchestrator_for(
    state: &AppState,
    appointment_id: &str,
) -> Result<Arc<NoteDraftOrchestrator>, (StatusCode, Json<ErrorResponse>)> {
    {
        let orchestrators = state.orchestrators.read().await;
        if let Some(orchestrator) = orchestrators.get(appointment_id) {
            return Ok(Arc::clone(orchestrator));
        }
    }

    let Some(recording) = state.store.current_recording(appointment_id).await else {
        return Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: format!("appointment {appointment_id} has no recording"),
            }),
        ));
    };

    let mut orchestrators = state.orchestrators.write().await;
    let orchestrator = orchestrators
        .entry(appointment_id.to_string())
        .or_insert_with(|| {
            Arc::new(NoteDraftOrchestrator::new(
                appointment_id,
                recording.owner_id.clone(),
                Arc::clone(&state.store),
                &state.status,
                Arc::clone(&state.generation),
            ))
        });
    Ok(Arc::clone(orchestrator))
}

/// POST /appointments/:appointment_id/note/generate
pub async fn generate_note(
    State(state): State<AppState>,
    Path(appointment_id): Path<String>,
    Json(req): Json<GenerateNoteRequest>,
) -> impl IntoResponse {
    let orchestrator = match orchestrator_for(&state, &appointment_id).await {
        Ok(orchestrator) => orchestrator,
        Err(rejection) => return rejection.into_response(),
    };

    match orchestrator.generate(&req.transcript_id).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(AcceptedResponse { status: "generating".to_string() }),
        )
            .into_response(),
        Err(e) => pipeline_error(&e).into_response(),
    }
}

/// POST /appointments/:appointment_id/note/regenerate
pub async fn regenerate_note(
    State(state): State<AppState>,
    Path(appointment_id): Path<String>,
    Json(req): Json<RegenerateNoteRequest>,
) -> impl IntoResponse {
    let orchestrator = match orchestrator_for(&state, &appointment_id).await {
        Ok(orchestrator) => orchestrator,
        Err(rejection) => return rejection.into_response(),
    };

    match orchestrator
        .regenerate(&req.transcript_id, req.confirmed)
        .await
    {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(AcceptedResponse { status: "generating".to_string() }),
        )
            .into_response(),
        Err(e) => pipeline_error(&e).into_response(),
    }
}

/// PATCH /notes/:note_id
/// Partial section update; rejected for finalized notes and stale writes
pub async fn update_note(
    State(state): State<AppState>,
    Path(note_id): Path<String>,
    Json(req): Json<UpdateNoteRequest>,
) -> impl IntoResponse {
    let changes: Vec<(SoapSection, String)> = req.sections.into_iter().collect();

    match state
        .store
        .update_note(&note_id, &req.appointment_id, &req.caller, &changes, Utc::now())
        .await
    {
        Ok(note) => (StatusCode::OK, Json::<SoapNote>(note)).into_response(),
        Err(e) => pipeline_error(&e).into_response(),
    }
}

/// POST /notes/:note_id/finalize
pub async fn finalize_note(
    State(state): State<AppState>,
    Path(note_id): Path<String>,
    Json(req): Json<FinalizeNoteRequest>,
) -> impl IntoResponse {
    match state
        .guard
        .finalize(&note_id, &req.appointment_id, &req.caller)
        .await
    {
        Ok(note) => (StatusCode::OK, Json(note)).into_response(),
        Err(e) => pipeline_error(&e).into_response(),
    }
}

/// GET /notes/:note_id/export
/// Plain-text concatenation of the four sections in fixed order
pub async fn export_note(
    State(state): State<AppState>,
    Path(note_id): Path<String>,
) -> impl IntoResponse {
    match state.store.note(&note_id).await {
        Some(note) => (StatusCode::OK, render_plain_text(&note)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse { error: format!("note {note_id} not found") }),
        )
            .into_response(),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
