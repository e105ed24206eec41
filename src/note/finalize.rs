use std::sync::Arc;
use tracing::info;

use crate::error::{AuthorizationError, PipelineError, ValidationError};
use crate::model::{SoapNote, SoapSection};
use crate::status::{StatusChannel, StatusEvent};
use crate::store::SessionStore;

/// Performs the one-way lock to immutable.
///
/// Validation and ownership are checked here for early, user-facing errors;
/// the store re-validates under its write lock so an autosave racing this
/// guard cannot finalize a note with a sub-minimum section.
pub struct FinalizationGuard {
    store: Arc<SessionStore>,
    status: StatusChannel,
    min_chars: usize,
}

impl FinalizationGuard {
    pub fn new(store: Arc<SessionStore>, status: StatusChannel, min_chars: usize) -> Self {
        Self { store, status, min_chars }
    }

    /// Sections currently below the minimum, in export order
    pub fn invalid_sections(&self, note: &SoapNote) -> Vec<SoapSection> {
        SoapSection::ALL
            .iter()
            .copied()
            .filter(|&s| note.section(s).chars().count() < self.min_chars)
            .collect()
    }

    /// Finalize the note: every section must meet the minimum length, the
    /// caller must be the owner, and the note must not already be finalized.
    /// On success the note is permanently read-only; a `ValidationError`
    /// leaves `is_finalized` untouched.
    pub async fn finalize(
        &self,
        note_id: &str,
        appointment_id: &str,
        caller: &str,
    ) -> Result<SoapNote, PipelineError> {
        let note = self
            .store
            .note(note_id)
            .await
            .filter(|n| n.appointment_id == appointment_id)
            .ok_or_else(|| PipelineError::NotFound(format!("note {note_id}")))?;

        if note.owner_id != caller {
            return Err(AuthorizationError::NotOwner { caller: caller.to_string() }.into());
        }
        if note.is_finalized {
            return Err(AuthorizationError::Finalized.into());
        }

        let invalid = self.invalid_sections(&note);
        if !invalid.is_empty() {
            return Err(ValidationError { sections: invalid, min_chars: self.min_chars }.into());
        }

        // The store repeats the length check under its write lock; content
        // may have changed since the snapshot above
        let finalized = self
            .store
            .finalize_note(note_id, appointment_id, caller, self.min_chars)
            .await?;

        self.status.publish(StatusEvent::note(
            appointment_id,
            "finalized",
            serde_json::to_value(&finalized).ok(),
        ));
        info!(note_id, appointment_id, "note locked as finalized");
        Ok(finalized)
    }
}
