use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::SoapSection;

/// Capture hardware / permission failures. Terminal for the recording
/// attempt: the caller must start a new controller session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("recording consent has not been captured")]
    ConsentRequired,
    #[error("microphone permission denied")]
    PermissionDenied,
    #[error("capture device unavailable: {0}")]
    Hardware(String),
    #[error("recorder has already been started")]
    AlreadyStarted,
    #[error("recorder is not capturing")]
    NotRecording,
    #[error("no audio was captured")]
    EmptyCapture,
    #[error("failed to encode captured audio: {0}")]
    Encode(String),
}

/// Transport/storage failure while persisting a recording. The blob is
/// retained by the caller, so a retry re-uploads without re-recording.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("recording blob is empty")]
    EmptyBlob,
    #[error("failed to persist audio: {0}")]
    Storage(String),
}

/// Drafting-service failures and policy rejections
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("a draft generation is already in flight for this appointment")]
    AlreadyInFlight,
    #[error("transcript is not completed yet")]
    TranscriptNotReady,
    #[error("regeneration requires explicit confirmation")]
    ConfirmationRequired,
    #[error("drafting service rejected the request: {0}")]
    Rejected(String),
    #[error("drafting service failed: {0}")]
    Failed(String),
}

/// One or more sections below the configured minimum at finalize time
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("sections shorter than {min_chars} characters: {}", section_list(.sections))]
pub struct ValidationError {
    pub sections: Vec<SoapSection>,
    pub min_chars: usize,
}

fn section_list(sections: &[SoapSection]) -> String {
    sections
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Mutation attempted by a non-owner, or against a finalized note
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("caller {caller} does not own this note")]
    NotOwner { caller: String },
    #[error("note is finalized and read-only")]
    Finalized,
}

/// Autosave superseded by a newer edit; the rejected write must not be applied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("save superseded by a newer edit at {newer_edit_at}")]
pub struct StaleWriteError {
    pub newer_edit_at: DateTime<Utc>,
}

/// Umbrella error for pipeline operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("transcription failed: {0}")]
    Transcription(String),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    #[error(transparent)]
    StaleWrite(#[from] StaleWriteError),
    #[error("{0} not found")]
    NotFound(String),
}
