//! Upload coordination
//!
//! Persists a finished capture blob to durable storage, tracks progress, and
//! fires the transcription trigger once the recording row is durable. The
//! trigger is fire-and-forget: its outcome is observed on the status channel,
//! never from the upload call's return value.

use chrono::Utc;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::error::UploadError;
use crate::model::{new_id, Recording, RecordingStatus};
use crate::recording::RecordedBlob;
use crate::services::TranscriptionService;
use crate::status::{StatusChannel, StatusEvent};
use crate::store::SessionStore;

const DEFAULT_CHUNK_BYTES: usize = 64 * 1024;

pub struct UploadCoordinator {
    store: Arc<SessionStore>,
    status: StatusChannel,
    transcription: Arc<dyn TranscriptionService>,
    storage_dir: PathBuf,
    chunk_bytes: usize,
}

impl UploadCoordinator {
    pub fn new(
        store: Arc<SessionStore>,
        status: StatusChannel,
        transcription: Arc<dyn TranscriptionService>,
        storage_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            status,
            transcription,
            storage_dir: storage_dir.into(),
            chunk_bytes: DEFAULT_CHUNK_BYTES,
        }
    }

    /// Persist a capture blob and return the new recording id.
    ///
    /// `on_progress` receives monotonically non-decreasing 0–100 values; the
    /// final call is 100 iff the upload succeeded. On failure the partial
    /// file is removed and the recording row is left as `failed`, never in a
    /// success-looking state. The blob stays with the caller, so a retry
    /// re-uploads without re-recording.
    pub async fn upload(
        &self,
        blob: &RecordedBlob,
        appointment_id: &str,
        owner_id: &str,
        mut on_progress: impl FnMut(u8) + Send,
    ) -> Result<String, UploadError> {
        // The controller never emits an empty blob, but the HTTP surface can
        if blob.bytes.is_empty() {
            return Err(UploadError::EmptyBlob);
        }

        let recording_id = new_id("rec");
        let path = self.storage_dir.join(format!("{recording_id}.wav"));

        let recording = Recording {
            id: recording_id.clone(),
            appointment_id: appointment_id.to_string(),
            owner_id: owner_id.to_string(),
            audio_uri: path.display().to_string(),
            duration_seconds: blob.duration_seconds,
            status: RecordingStatus::Uploading,
            // A blob only exists once the controller was started with consent
            consent_captured: true,
            created_at: Utc::now(),
        };
        self.store.insert_recording(recording).await;

        on_progress(0);
        if let Err(e) = self.write_blob(&path, &blob.bytes, &mut on_progress).await {
            error!(recording_id, error = %e, "upload failed");
            let _ = tokio::fs::remove_file(&path).await;
            let _ = self
                .store
                .set_recording_status(&recording_id, RecordingStatus::Failed)
                .await;
            self.status
                .publish(StatusEvent::recording(&recording_id, "upload_failed", None));
            return Err(UploadError::Storage(e.to_string()));
        }

        self.store
            .set_recording_status(&recording_id, RecordingStatus::Uploaded)
            .await
            .map_err(|e| UploadError::Storage(e.to_string()))?;
        self.store.ensure_pending_transcript(&recording_id).await;
        self.status
            .publish(StatusEvent::recording(&recording_id, "uploaded", None));
        info!(recording_id, appointment_id, "recording uploaded");

        // Transcription is requested only after the recording row is durable.
        // A rejected enqueue leaves the recording uploaded and the transcript
        // pending; the stall is surfaced on the status channel so the UI can
        // offer a manual retry.
        let transcription = Arc::clone(&self.transcription);
        let status = self.status.clone();
        let id = recording_id.clone();
        tokio::spawn(async move {
            let ack = transcription.trigger_transcription(&id).await;
            if !ack.accepted {
                let reason = ack
                    .error
                    .unwrap_or_else(|| "transcription enqueue rejected".to_string());
                warn!(recording_id = %id, reason, "transcription trigger not accepted");
                status.publish(StatusEvent::recording(
                    &id,
                    "pending",
                    Some(json!({ "stall_reason": reason })),
                ));
            }
        });

        Ok(recording_id)
    }

    async fn write_blob(
        &self,
        path: &Path,
        bytes: &[u8],
        on_progress: &mut (impl FnMut(u8) + Send),
    ) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(path).await?;
        let total = bytes.len().max(1);
        let mut written = 0usize;
        let mut last_pct = 0u8;

        for chunk in bytes.chunks(self.chunk_bytes) {
            file.write_all(chunk).await?;
            written += chunk.len();
            // 100 is withheld until the flush below succeeds; a write can
            // still fail at sync time
            let pct = (written * 100 / total).min(99) as u8;
            if pct > last_pct {
                last_pct = pct;
                on_progress(pct);
            }
        }

        // Durable before the transcription trigger fires
        file.sync_all().await?;
        on_progress(100);
        Ok(())
    }
}
