//! External service triggers
//!
//! Transcription and note drafting run in external workers. Triggers follow a
//! two-phase protocol: the call returns only an acceptance acknowledgment,
//! and completion is always observed later on the status channel, never
//! inferred from trigger success.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::status::{StatusChannel, StatusEvent};

/// Acceptance acknowledgment for a fire-and-forget trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerAck {
    pub accepted: bool,
    pub error: Option<String>,
}

impl TriggerAck {
    pub fn accepted() -> Self {
        Self { accepted: true, error: None }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self { accepted: false, error: Some(reason.into()) }
    }
}

/// Requests transcription of a persisted recording
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn trigger_transcription(&self, recording_id: &str) -> TriggerAck;
}

/// Requests (re)generation of the SOAP draft for an appointment
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn trigger_generation(
        &self,
        appointment_id: &str,
        transcript_id: &str,
        regenerate: bool,
    ) -> TriggerAck;
}

/// Trigger implementation that announces the request on the status channel
/// for an external transcription worker
pub struct ChannelTranscriptionService {
    status: StatusChannel,
}

impl ChannelTranscriptionService {
    pub fn new(status: StatusChannel) -> Self {
        Self { status }
    }
}

#[async_trait]
impl TranscriptionService for ChannelTranscriptionService {
    async fn trigger_transcription(&self, recording_id: &str) -> TriggerAck {
        info!(recording_id, "requesting transcription");
        self.status
            .publish(StatusEvent::recording(recording_id, "requested", None));
        TriggerAck::accepted()
    }
}

/// Trigger implementation that announces the request on the status channel
/// for an external drafting worker
pub struct ChannelGenerationService {
    status: StatusChannel,
}

impl ChannelGenerationService {
    pub fn new(status: StatusChannel) -> Self {
        Self { status }
    }
}

#[async_trait]
impl GenerationService for ChannelGenerationService {
    async fn trigger_generation(
        &self,
        appointment_id: &str,
        transcript_id: &str,
        regenerate: bool,
    ) -> TriggerAck {
        info!(appointment_id, transcript_id, regenerate, "requesting draft generation");
        self.status.publish(StatusEvent::note(
            appointment_id,
            "requested",
            Some(json!({ "transcript_id": transcript_id, "regenerate": regenerate })),
        ));
        TriggerAck::accepted()
    }
}
