//! Session store
//!
//! In-memory stand-in for the durable store behind the pipeline. Beyond plain
//! CRUD it owns the server-side half of the hard invariants: finalized notes
//! reject every mutation, only the owner may write, and autosaves apply in
//! edit order (a write older than the last applied edit is rejected, never
//! merged). Transcript rows are keyed by recording id so a replayed
//! completion event is an idempotent overwrite.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{AuthorizationError, PipelineError, StaleWriteError, ValidationError};
use crate::model::{
    DraftSuggestion, Recording, RecordingStatus, SoapNote, SoapSection, Transcript,
    TranscriptStatus,
};

struct NoteRow {
    note: SoapNote,
    /// Timestamp of the newest edit applied so far; saves carrying older
    /// edits are stale and rejected
    last_edit_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct SessionStore {
    recordings: RwLock<HashMap<String, Recording>>,
    /// Keyed by recording id: exactly one transcript per recording
    transcripts: RwLock<HashMap<String, Transcript>>,
    notes: RwLock<HashMap<String, NoteRow>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            recordings: RwLock::new(HashMap::new()),
            transcripts: RwLock::new(HashMap::new()),
            notes: RwLock::new(HashMap::new()),
        }
    }

    // ------------------------------------------------------------------
    // Recordings
    // ------------------------------------------------------------------

    pub async fn insert_recording(&self, recording: Recording) {
        let mut recordings = self.recordings.write().await;
        recordings.insert(recording.id.clone(), recording);
    }

    pub async fn recording(&self, recording_id: &str) -> Option<Recording> {
        let recordings = self.recordings.read().await;
        recordings.get(recording_id).cloned()
    }

    /// The appointment's current recording: its most recently created one.
    /// Earlier abandoned attempts are kept but no longer current.
    pub async fn current_recording(&self, appointment_id: &str) -> Option<Recording> {
        let recordings = self.recordings.read().await;
        recordings
            .values()
            .filter(|r| r.appointment_id == appointment_id)
            .max_by_key(|r| r.created_at)
            .cloned()
    }

    pub async fn set_recording_status(
        &self,
        recording_id: &str,
        status: RecordingStatus,
    ) -> Result<(), PipelineError> {
        let mut recordings = self.recordings.write().await;
        let recording = recordings
            .get_mut(recording_id)
            .ok_or_else(|| PipelineError::NotFound(format!("recording {recording_id}")))?;
        recording.status = status;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Transcripts
    // ------------------------------------------------------------------

    /// Create the pending transcript row for a recording if none exists yet
    pub async fn ensure_pending_transcript(&self, recording_id: &str) -> Transcript {
        let mut transcripts = self.transcripts.write().await;
        transcripts
            .entry(recording_id.to_string())
            .or_insert_with(|| Transcript::pending(recording_id))
            .clone()
    }

    /// Last write wins: an existing row for the same recording is replaced
    /// wholesale. Duplicate completion events therefore cannot corrupt the
    /// transcript.
    pub async fn upsert_transcript(&self, transcript: Transcript) {
        let mut transcripts = self.transcripts.write().await;
        transcripts.insert(transcript.recording_id.clone(), transcript);
    }

    pub async fn set_transcript_status(
        &self,
        recording_id: &str,
        status: TranscriptStatus,
        failure_reason: Option<String>,
    ) {
        let mut transcripts = self.transcripts.write().await;
        let row = transcripts
            .entry(recording_id.to_string())
            .or_insert_with(|| Transcript::pending(recording_id));
        row.status = status;
        row.failure_reason = failure_reason;
    }

    pub async fn transcript(&self, recording_id: &str) -> Option<Transcript> {
        let transcripts = self.transcripts.read().await;
        transcripts.get(recording_id).cloned()
    }

    pub async fn transcript_by_id(&self, transcript_id: &str) -> Option<Transcript> {
        let transcripts = self.transcripts.read().await;
        transcripts.values().find(|t| t.id == transcript_id).cloned()
    }

    // ------------------------------------------------------------------
    // Notes
    // ------------------------------------------------------------------

    pub async fn note(&self, note_id: &str) -> Option<SoapNote> {
        let notes = self.notes.read().await;
        notes.get(note_id).map(|row| row.note.clone())
    }

    pub async fn note_by_appointment(&self, appointment_id: &str) -> Option<SoapNote> {
        let notes = self.notes.read().await;
        notes
            .values()
            .find(|row| row.note.appointment_id == appointment_id)
            .map(|row| row.note.clone())
    }

    /// Create the appointment's note from a generated draft. If a note
    /// already exists it is returned untouched: generated content never
    /// overwrites an existing note implicitly.
    pub async fn create_note_from_draft(
        &self,
        appointment_id: &str,
        owner_id: &str,
        draft: &DraftSuggestion,
    ) -> SoapNote {
        let mut notes = self.notes.write().await;
        if let Some(row) = notes
            .values()
            .find(|row| row.note.appointment_id == appointment_id)
        {
            return row.note.clone();
        }

        let mut note = SoapNote::new(appointment_id, owner_id);
        for section in SoapSection::ALL {
            note.set_section(section, draft.section(section).to_string());
        }
        info!(note_id = %note.id, appointment_id, "created note from generated draft");
        notes.insert(note.id.clone(), NoteRow { note: note.clone(), last_edit_at: None });
        note
    }

    /// Insert a note row directly (initial empty note, test seeding)
    pub async fn insert_note(&self, note: SoapNote) {
        let mut notes = self.notes.write().await;
        notes.insert(note.id.clone(), NoteRow { note, last_edit_at: None });
    }

    /// Apply a partial section update in edit order.
    ///
    /// Rejects: missing note, non-owner callers, finalized notes, and saves
    /// whose newest covered edit is older than the last applied one
    /// (`StaleWriteError`); ties are accepted so a retried save is not
    /// spuriously stale.
    pub async fn update_note(
        &self,
        note_id: &str,
        appointment_id: &str,
        caller: &str,
        changes: &[(SoapSection, String)],
        edited_at: DateTime<Utc>,
    ) -> Result<SoapNote, PipelineError> {
        let mut notes = self.notes.write().await;
        let row = notes
            .get_mut(note_id)
            .filter(|row| row.note.appointment_id == appointment_id)
            .ok_or_else(|| PipelineError::NotFound(format!("note {note_id}")))?;

        if row.note.owner_id != caller {
            return Err(AuthorizationError::NotOwner { caller: caller.to_string() }.into());
        }
        if row.note.is_finalized {
            return Err(AuthorizationError::Finalized.into());
        }
        if let Some(last) = row.last_edit_at {
            if edited_at < last {
                warn!(note_id, %edited_at, %last, "rejecting stale autosave");
                return Err(StaleWriteError { newer_edit_at: last }.into());
            }
        }

        for (section, text) in changes {
            row.note.set_section(*section, text.clone());
        }
        row.note.edited_by_therapist = true;
        row.note.updated_at = Utc::now();
        row.last_edit_at = Some(edited_at);
        Ok(row.note.clone())
    }

    /// Set the one-way finalized flag. Section lengths are validated here,
    /// under the notes write lock: an autosave racing the finalization guard
    /// cannot slip a sub-minimum draft past a validation done against an
    /// earlier snapshot. The store also rejects non-owner calls and double
    /// finalization.
    pub async fn finalize_note(
        &self,
        note_id: &str,
        appointment_id: &str,
        caller: &str,
        min_chars: usize,
    ) -> Result<SoapNote, PipelineError> {
        let mut notes = self.notes.write().await;
        let row = notes
            .get_mut(note_id)
            .filter(|row| row.note.appointment_id == appointment_id)
            .ok_or_else(|| PipelineError::NotFound(format!("note {note_id}")))?;

        if row.note.owner_id != caller {
            return Err(AuthorizationError::NotOwner { caller: caller.to_string() }.into());
        }
        if row.note.is_finalized {
            return Err(AuthorizationError::Finalized.into());
        }

        let invalid: Vec<SoapSection> = SoapSection::ALL
            .iter()
            .copied()
            .filter(|&s| row.note.section(s).chars().count() < min_chars)
            .collect();
        if !invalid.is_empty() {
            return Err(ValidationError { sections: invalid, min_chars }.into());
        }

        row.note.is_finalized = true;
        row.note.updated_at = Utc::now();
        info!(note_id, appointment_id, "note finalized");
        Ok(row.note.clone())
    }
}
