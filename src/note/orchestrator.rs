use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{AuthorizationError, GenerationError, PipelineError};
use crate::model::{DraftStatus, DraftSuggestion, TranscriptStatus};
use crate::services::GenerationService;
use crate::status::{StatusChannel, StatusEntity, StatusEvent};
use crate::store::SessionStore;

/// Point-in-time view of draft generation for an appointment
#[derive(Debug, Clone)]
pub struct DraftState {
    pub status: DraftStatus,
    /// Generated sections awaiting an explicit apply. `None` when the draft
    /// became the initial note content (no prior note existed) or when no
    /// generation has completed yet.
    pub suggestion: Option<DraftSuggestion>,
    pub failure_reason: Option<String>,
}

impl DraftState {
    fn idle() -> Self {
        Self { status: DraftStatus::Idle, suggestion: None, failure_reason: None }
    }
}

struct OrchestratorCore {
    appointment_id: String,
    owner_id: String,
    store: Arc<SessionStore>,
    state: watch::Sender<DraftState>,
    in_flight: AtomicBool,
}

impl OrchestratorCore {
    async fn apply_event(&self, event: StatusEvent) {
        match event.status.as_str() {
            "generating" => {
                self.state.send_replace(DraftState {
                    status: DraftStatus::Generating,
                    suggestion: None,
                    failure_reason: None,
                });
            }
            "ready" => {
                self.in_flight.store(false, Ordering::SeqCst);
                let Some(draft) = event
                    .payload
                    .and_then(|p| serde_json::from_value::<DraftSuggestion>(p).ok())
                else {
                    warn!(
                        appointment_id = %self.appointment_id,
                        "ready event without a parseable draft payload"
                    );
                    self.state.send_replace(DraftState {
                        status: DraftStatus::Failed,
                        suggestion: None,
                        failure_reason: Some("drafting service returned no content".to_string()),
                    });
                    return;
                };

                // First draft for the appointment becomes the note itself;
                // when a note already exists the draft stays a discrete
                // suggestion until the editing session applies it
                let had_note = self
                    .store
                    .note_by_appointment(&self.appointment_id)
                    .await
                    .is_some();
                let suggestion = if had_note {
                    Some(draft)
                } else {
                    self.store
                        .create_note_from_draft(&self.appointment_id, &self.owner_id, &draft)
                        .await;
                    None
                };
                info!(
                    appointment_id = %self.appointment_id,
                    as_suggestion = had_note,
                    "draft generation ready"
                );
                self.state.send_replace(DraftState {
                    status: DraftStatus::Ready,
                    suggestion,
                    failure_reason: None,
                });
            }
            "failed" => {
                self.in_flight.store(false, Ordering::SeqCst);
                let reason = event
                    .payload
                    .as_ref()
                    .and_then(|p| p.get("reason"))
                    .and_then(|r| r.as_str())
                    .unwrap_or("draft generation failed")
                    .to_string();
                warn!(appointment_id = %self.appointment_id, reason, "draft generation failed");
                self.state.send_replace(DraftState {
                    status: DraftStatus::Failed,
                    suggestion: None,
                    failure_reason: Some(reason),
                });
            }
            _ => {}
        }
    }
}

/// Drives AI note drafting for one appointment.
///
/// `generate` rejects concurrent requests rather than queueing them, and the
/// generated output never overwrites manual edits implicitly; it surfaces as
/// a suggestion that the editing session applies explicitly. Completion and
/// failure arrive on the status channel, not from the trigger call.
pub struct NoteDraftOrchestrator {
    core: Arc<OrchestratorCore>,
    generation: Arc<dyn GenerationService>,
    rx: watch::Receiver<DraftState>,
    task: JoinHandle<()>,
}

impl NoteDraftOrchestrator {
    pub fn new(
        appointment_id: impl Into<String>,
        owner_id: impl Into<String>,
        store: Arc<SessionStore>,
        status: &StatusChannel,
        generation: Arc<dyn GenerationService>,
    ) -> Self {
        let (tx, rx) = watch::channel(DraftState::idle());
        let core = Arc::new(OrchestratorCore {
            appointment_id: appointment_id.into(),
            owner_id: owner_id.into(),
            store,
            state: tx,
            in_flight: AtomicBool::new(false),
        });

        let mut events = status.subscribe();
        let task_core = Arc::clone(&core);
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if event.entity == StatusEntity::Note
                            && event.id == task_core.appointment_id
                        {
                            task_core.apply_event(event).await;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(
                            appointment_id = %task_core.appointment_id,
                            missed,
                            "status channel lagged"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self { core, generation, rx, task }
    }

    pub fn appointment_id(&self) -> &str {
        &self.core.appointment_id
    }

    pub fn state(&self) -> DraftState {
        self.rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DraftState> {
        self.rx.clone()
    }

    /// Request a first draft. Rejected while a generation is in flight, when
    /// the transcript is not completed, or when the note is finalized.
    pub async fn generate(&self, transcript_id: &str) -> Result<(), PipelineError> {
        self.trigger(transcript_id, false).await
    }

    /// Same operation with the regenerate flag; documented to overwrite
    /// unsaved edits once applied, so the caller must confirm explicitly.
    pub async fn regenerate(
        &self,
        transcript_id: &str,
        confirmed: bool,
    ) -> Result<(), PipelineError> {
        if !confirmed {
            return Err(GenerationError::ConfirmationRequired.into());
        }
        self.trigger(transcript_id, true).await
    }

    async fn trigger(&self, transcript_id: &str, regenerate: bool) -> Result<(), PipelineError> {
        if self.core.in_flight.swap(true, Ordering::SeqCst) {
            return Err(GenerationError::AlreadyInFlight.into());
        }

        let result = self.check_and_send(transcript_id, regenerate).await;
        if result.is_err() {
            self.core.in_flight.store(false, Ordering::SeqCst);
        }
        result
    }

    async fn check_and_send(
        &self,
        transcript_id: &str,
        regenerate: bool,
    ) -> Result<(), PipelineError> {
        // Generation requires a completed transcript
        match self.core.store.transcript_by_id(transcript_id).await {
            Some(t) if t.status == TranscriptStatus::Completed => {}
            Some(_) => return Err(GenerationError::TranscriptNotReady.into()),
            None => {
                return Err(PipelineError::NotFound(format!("transcript {transcript_id}")));
            }
        }

        // Never regenerate over a finalized note
        if let Some(note) = self
            .core
            .store
            .note_by_appointment(&self.core.appointment_id)
            .await
        {
            if note.is_finalized {
                return Err(AuthorizationError::Finalized.into());
            }
        }

        self.core.state.send_replace(DraftState {
            status: DraftStatus::Generating,
            suggestion: None,
            failure_reason: None,
        });

        let ack = self
            .generation
            .trigger_generation(&self.core.appointment_id, transcript_id, regenerate)
            .await;
        if !ack.accepted {
            let reason = ack
                .error
                .unwrap_or_else(|| "drafting service rejected the request".to_string());
            self.core.state.send_replace(DraftState {
                status: DraftStatus::Failed,
                suggestion: None,
                failure_reason: Some(reason.clone()),
            });
            return Err(GenerationError::Rejected(reason).into());
        }

        info!(
            appointment_id = %self.core.appointment_id,
            transcript_id,
            regenerate,
            "draft generation triggered"
        );
        Ok(())
    }
}

impl Drop for NoteDraftOrchestrator {
    fn drop(&mut self) {
        self.task.abort();
    }
}
