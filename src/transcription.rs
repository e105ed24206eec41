//! Transcription status tracking
//!
//! One watcher per recording id. Transitions arrive on the status channel;
//! a polling fallback against the store covers missed or lagged push
//! delivery. Failure is only ever inferred from an explicit failed event;
//! transcription may legitimately run for minutes, so elapsed time never
//! promotes "still processing" to failure.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::model::{Transcript, TranscriptStatus};
use crate::services::TranscriptionService;
use crate::status::{StatusChannel, StatusEntity, StatusEvent};
use crate::store::SessionStore;

/// Point-in-time view of a recording's transcription
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptWatch {
    pub status: TranscriptStatus,
    pub transcript: Option<Transcript>,
    pub failure_reason: Option<String>,
    /// Set when the transcription enqueue was rejected: the transcript stays
    /// pending until the user retries
    pub stall_reason: Option<String>,
}

impl TranscriptWatch {
    fn pending() -> Self {
        Self {
            status: TranscriptStatus::Pending,
            transcript: None,
            failure_reason: None,
            stall_reason: None,
        }
    }
}

struct WatcherCore {
    recording_id: String,
    store: Arc<SessionStore>,
    snapshot: watch::Sender<TranscriptWatch>,
}

impl WatcherCore {
    async fn apply_event(&self, event: StatusEvent) {
        match event.status.as_str() {
            "processing" => {
                self.store
                    .set_transcript_status(&self.recording_id, TranscriptStatus::Processing, None)
                    .await;
                self.snapshot.send_replace(TranscriptWatch {
                    status: TranscriptStatus::Processing,
                    transcript: None,
                    failure_reason: None,
                    stall_reason: None,
                });
            }
            "completed" => {
                let transcript = event
                    .payload
                    .and_then(|p| serde_json::from_value::<Transcript>(p).ok());
                match transcript {
                    Some(transcript) => {
                        // Last write wins: a duplicate completion event is an
                        // idempotent overwrite, never corruption
                        self.store.upsert_transcript(transcript.clone()).await;
                        self.snapshot.send_replace(TranscriptWatch {
                            status: TranscriptStatus::Completed,
                            transcript: Some(transcript),
                            failure_reason: None,
                            stall_reason: None,
                        });
                    }
                    None => {
                        warn!(
                            recording_id = %self.recording_id,
                            "completed event without a parseable transcript payload"
                        );
                        self.refresh_from_store().await;
                    }
                }
            }
            "failed" => {
                let reason = event
                    .payload
                    .as_ref()
                    .and_then(|p| p.get("reason"))
                    .and_then(|r| r.as_str())
                    .unwrap_or("transcription failed")
                    .to_string();
                self.store
                    .set_transcript_status(
                        &self.recording_id,
                        TranscriptStatus::Failed,
                        Some(reason.clone()),
                    )
                    .await;
                self.snapshot.send_replace(TranscriptWatch {
                    status: TranscriptStatus::Failed,
                    transcript: None,
                    failure_reason: Some(reason),
                    stall_reason: None,
                });
            }
            "pending" => {
                let stall = event
                    .payload
                    .as_ref()
                    .and_then(|p| p.get("stall_reason"))
                    .and_then(|r| r.as_str())
                    .map(str::to_string);
                if stall.is_some() {
                    self.snapshot.send_replace(TranscriptWatch {
                        status: TranscriptStatus::Pending,
                        transcript: None,
                        failure_reason: None,
                        stall_reason: stall,
                    });
                }
            }
            // upload lifecycle and trigger announcements are not ours
            _ => {}
        }
    }

    /// Poll fallback: reconcile the snapshot with the store row
    async fn refresh_from_store(&self) {
        let Some(row) = self.store.transcript(&self.recording_id).await else {
            return;
        };
        let stall_reason = if row.status == TranscriptStatus::Pending {
            self.snapshot.borrow().stall_reason.clone()
        } else {
            None
        };
        self.snapshot.send_replace(TranscriptWatch {
            status: row.status,
            failure_reason: row.failure_reason.clone(),
            transcript: if row.status == TranscriptStatus::Completed {
                Some(row)
            } else {
                None
            },
            stall_reason,
        });
    }
}

/// Tracks async transcription status for one recording.
///
/// Subscribes to the status channel on creation and unsubscribes on drop.
/// Any number of watchers may observe the same recording; they never mutate
/// shared state beyond idempotent store reconciliation.
pub struct TranscriptionStatusWatcher {
    core: Arc<WatcherCore>,
    transcription: Arc<dyn TranscriptionService>,
    rx: watch::Receiver<TranscriptWatch>,
    task: JoinHandle<()>,
}

impl TranscriptionStatusWatcher {
    pub async fn new(
        recording_id: impl Into<String>,
        store: Arc<SessionStore>,
        status: &StatusChannel,
        transcription: Arc<dyn TranscriptionService>,
        poll_interval: Duration,
    ) -> Self {
        let recording_id = recording_id.into();
        let initial = match store.transcript(&recording_id).await {
            Some(row) => TranscriptWatch {
                status: row.status,
                failure_reason: row.failure_reason.clone(),
                transcript: if row.status == TranscriptStatus::Completed {
                    Some(row)
                } else {
                    None
                },
                stall_reason: None,
            },
            None => TranscriptWatch::pending(),
        };

        let (tx, rx) = watch::channel(initial);
        let core = Arc::new(WatcherCore {
            recording_id: recording_id.clone(),
            store,
            snapshot: tx,
        });

        let mut events = status.subscribe();
        let task_core = Arc::clone(&core);
        let task = tokio::spawn(async move {
            let mut poll = tokio::time::interval(poll_interval);
            poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(event) => {
                            if event.entity == StatusEntity::Recording
                                && event.id == task_core.recording_id
                            {
                                task_core.apply_event(event).await;
                            }
                        }
                        // Missed events are recovered by the next poll tick
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(
                                recording_id = %task_core.recording_id,
                                missed,
                                "status channel lagged; relying on poll fallback"
                            );
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = poll.tick() => {
                        task_core.refresh_from_store().await;
                    }
                }
            }
        });

        Self { core, transcription, rx, task }
    }

    pub fn recording_id(&self) -> &str {
        &self.core.recording_id
    }

    pub fn snapshot(&self) -> TranscriptWatch {
        self.rx.borrow().clone()
    }

    /// Receiver for awaiting status changes
    pub fn subscribe(&self) -> watch::Receiver<TranscriptWatch> {
        self.rx.clone()
    }

    /// Re-trigger transcription for this recording after an explicit failure
    /// or a stalled enqueue. Reuses the same recording; no new Recording row
    /// is ever created here.
    pub async fn retry(&self) -> Result<(), PipelineError> {
        let snap = self.snapshot();
        match snap.status {
            TranscriptStatus::Failed | TranscriptStatus::Pending => {}
            TranscriptStatus::Processing | TranscriptStatus::Completed => {
                return Err(PipelineError::Transcription(
                    "transcription is not in a retryable state".to_string(),
                ));
            }
        }

        let ack = self
            .transcription
            .trigger_transcription(&self.core.recording_id)
            .await;
        if !ack.accepted {
            let reason = ack
                .error
                .unwrap_or_else(|| "transcription enqueue rejected".to_string());
            return Err(PipelineError::Transcription(reason));
        }

        self.core
            .store
            .set_transcript_status(&self.core.recording_id, TranscriptStatus::Pending, None)
            .await;
        self.core.snapshot.send_replace(TranscriptWatch::pending());
        info!(recording_id = %self.core.recording_id, "transcription retry triggered");
        Ok(())
    }
}

impl Drop for TranscriptionStatusWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}
