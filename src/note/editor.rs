use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{AuthorizationError, PipelineError};
use crate::model::{DraftSuggestion, SaveIndicator, SoapNote, SoapSection};
use crate::store::SessionStore;

/// Save target for autosave writes. The session store implements this; tests
/// wrap it to count calls or inject failures.
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn save_sections(
        &self,
        note_id: &str,
        appointment_id: &str,
        caller: &str,
        changes: Vec<(SoapSection, String)>,
        edited_at: DateTime<Utc>,
    ) -> Result<SoapNote, PipelineError>;
}

#[async_trait]
impl DraftStore for SessionStore {
    async fn save_sections(
        &self,
        note_id: &str,
        appointment_id: &str,
        caller: &str,
        changes: Vec<(SoapSection, String)>,
        edited_at: DateTime<Utc>,
    ) -> Result<SoapNote, PipelineError> {
        self.update_note(note_id, appointment_id, caller, &changes, edited_at)
            .await
    }
}

struct EditorState {
    sections: HashMap<SoapSection, String>,
    /// Per-section timestamp of the newest unsaved edit
    dirty: HashMap<SoapSection, DateTime<Utc>>,
    finalized: bool,
    last_saved_at: Option<DateTime<Utc>>,
}

struct EditorInner {
    note_id: String,
    appointment_id: String,
    caller: String,
    min_chars: usize,
    store: Arc<dyn DraftStore>,
    state: Mutex<EditorState>,
    indicator: watch::Sender<SaveIndicator>,
}

enum SaveOutcome {
    /// Nothing dirty (or note finalized); no call was made
    Nothing,
    Saved,
    /// Transient failure; dirty flags survive for the next cycle
    Error(PipelineError),
}

impl EditorInner {
    /// Save all currently dirty sections as one partial update.
    ///
    /// The payload carries only sections changed since the last successful
    /// save, stamped with the newest edit time it covers. After a successful
    /// save, dirty flags are cleared only for sections untouched since the
    /// snapshot; edits racing the save stay queued.
    async fn save_dirty(&self) -> SaveOutcome {
        let (changes, snapshot, newest_edit) = {
            let state = self.state.lock().expect("editor state poisoned");
            if state.finalized || state.dirty.is_empty() {
                return SaveOutcome::Nothing;
            }
            let changes: Vec<(SoapSection, String)> = state
                .dirty
                .keys()
                .map(|&section| (section, state.sections[&section].clone()))
                .collect();
            let snapshot = state.dirty.clone();
            let newest_edit = snapshot.values().max().copied().expect("dirty is non-empty");
            (changes, snapshot, newest_edit)
        };

        self.indicator.send_replace(SaveIndicator::Saving);
        let result = self
            .store
            .save_sections(
                &self.note_id,
                &self.appointment_id,
                &self.caller,
                changes,
                newest_edit,
            )
            .await;

        match result {
            Ok(_) => {
                let mut state = self.state.lock().expect("editor state poisoned");
                for (section, edited_at) in &snapshot {
                    if state.dirty.get(section) == Some(edited_at) {
                        state.dirty.remove(section);
                    }
                }
                state.last_saved_at = Some(Utc::now());
                self.indicator.send_replace(SaveIndicator::Saved);
                SaveOutcome::Saved
            }
            Err(PipelineError::StaleWrite(e)) => {
                // Another session applied a newer edit; last write wins, so
                // this content is obsolete rather than unsaved
                warn!(note_id = %self.note_id, error = %e, "autosave superseded by a newer edit");
                let mut state = self.state.lock().expect("editor state poisoned");
                for (section, edited_at) in &snapshot {
                    if state.dirty.get(section) == Some(edited_at) {
                        state.dirty.remove(section);
                    }
                }
                self.indicator.send_replace(SaveIndicator::Idle);
                SaveOutcome::Nothing
            }
            Err(PipelineError::Authorization(AuthorizationError::Finalized)) => {
                // The note was finalized out from under us; stop autosaving
                warn!(note_id = %self.note_id, "note finalized; dropping pending autosave");
                let mut state = self.state.lock().expect("editor state poisoned");
                state.finalized = true;
                state.dirty.clear();
                self.indicator.send_replace(SaveIndicator::Idle);
                SaveOutcome::Nothing
            }
            Err(e) => {
                // Indicator stays on error until a save actually succeeds;
                // the dirty sections are retried on the next cycle
                warn!(note_id = %self.note_id, error = %e, "autosave failed");
                self.indicator.send_replace(SaveIndicator::Error);
                SaveOutcome::Error(e)
            }
        }
    }
}

/// In-memory editing session for one note.
///
/// Every edit marks its section dirty and resets a single quiet-period timer
/// shared by the whole note; a burst of edits coalesces into exactly one save
/// carrying the final merged content. Validation here is advisory: invalid
/// sections still save as drafts, and only finalization enforces the minimum.
pub struct DraftEditingSession {
    inner: Arc<EditorInner>,
    edits: mpsc::UnboundedSender<()>,
    indicator_rx: watch::Receiver<SaveIndicator>,
    task: JoinHandle<()>,
}

impl DraftEditingSession {
    pub fn new(
        note: &SoapNote,
        caller: impl Into<String>,
        store: Arc<dyn DraftStore>,
        quiet_period: Duration,
        min_chars: usize,
    ) -> Self {
        let sections = SoapSection::ALL
            .iter()
            .map(|&s| (s, note.section(s).to_string()))
            .collect();

        let (indicator_tx, indicator_rx) = watch::channel(SaveIndicator::Idle);
        let inner = Arc::new(EditorInner {
            note_id: note.id.clone(),
            appointment_id: note.appointment_id.clone(),
            caller: caller.into(),
            min_chars,
            store,
            state: Mutex::new(EditorState {
                sections,
                dirty: HashMap::new(),
                finalized: note.is_finalized,
                last_saved_at: None,
            }),
            indicator: indicator_tx,
        });

        let (edits_tx, edits_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(debounce_loop(Arc::clone(&inner), edits_rx, quiet_period));

        Self { inner, edits: edits_tx, indicator_rx, task }
    }

    /// Replace a section's content and (re)schedule the autosave.
    /// Rejected once the note is finalized.
    pub fn edit(
        &self,
        section: SoapSection,
        text: impl Into<String>,
    ) -> Result<(), PipelineError> {
        {
            let mut state = self.inner.state.lock().expect("editor state poisoned");
            if state.finalized {
                return Err(AuthorizationError::Finalized.into());
            }
            state.sections.insert(section, text.into());
            state.dirty.insert(section, Utc::now());
        }
        // Resets the quiet period; the pending debounced save is effectively
        // canceled and rescheduled
        let _ = self.edits.send(());
        Ok(())
    }

    /// Explicitly merge a generated suggestion into the draft, replacing all
    /// four sections. This is the only path by which AI output reaches the
    /// editable note.
    pub fn apply_suggestion(&self, suggestion: &DraftSuggestion) -> Result<(), PipelineError> {
        for section in SoapSection::ALL {
            self.edit(section, suggestion.section(section))?;
        }
        info!(note_id = %self.inner.note_id, "applied generated suggestion to draft");
        Ok(())
    }

    /// Force any pending changes to save now, bypassing the quiet period
    pub async fn flush(&self) -> Result<(), PipelineError> {
        match self.inner.save_dirty().await {
            SaveOutcome::Error(e) => Err(e),
            _ => Ok(()),
        }
    }

    pub fn section(&self, section: SoapSection) -> String {
        let state = self.inner.state.lock().expect("editor state poisoned");
        state.sections[&section].clone()
    }

    pub fn is_dirty(&self) -> bool {
        let state = self.inner.state.lock().expect("editor state poisoned");
        !state.dirty.is_empty()
    }

    /// Sections currently below the configured minimum. Advisory only:
    /// drafts save regardless, and only `finalize` enforces the minimum.
    pub fn invalid_sections(&self) -> Vec<SoapSection> {
        let state = self.inner.state.lock().expect("editor state poisoned");
        SoapSection::ALL
            .iter()
            .copied()
            .filter(|s| state.sections[s].chars().count() < self.inner.min_chars)
            .collect()
    }

    pub fn indicator(&self) -> SaveIndicator {
        *self.indicator_rx.borrow()
    }

    pub fn indicator_watch(&self) -> watch::Receiver<SaveIndicator> {
        self.indicator_rx.clone()
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        let state = self.inner.state.lock().expect("editor state poisoned");
        state.last_saved_at
    }

    /// Mark the local copy read-only after finalization succeeded
    pub fn mark_finalized(&self) {
        let mut state = self.inner.state.lock().expect("editor state poisoned");
        state.finalized = true;
        state.dirty.clear();
    }
}

impl Drop for DraftEditingSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// One quiet period for the whole note: each incoming edit signal resets the
/// timer, so rapid edits coalesce into a single save once typing pauses. A
/// failed save re-arms the timer and retries; an edit during the retry window
/// resets it like any other.
async fn debounce_loop(
    inner: Arc<EditorInner>,
    mut edits: mpsc::UnboundedReceiver<()>,
    quiet_period: Duration,
) {
    'outer: loop {
        // Wait for the first edit of a burst
        if edits.recv().await.is_none() {
            break;
        }

        loop {
            tokio::select! {
                _ = tokio::time::sleep(quiet_period) => {
                    match inner.save_dirty().await {
                        SaveOutcome::Saved | SaveOutcome::Nothing => break,
                        SaveOutcome::Error(_) => continue,
                    }
                }
                edit = edits.recv() => {
                    if edit.is_none() {
                        // Session dropped mid-burst; best-effort final save
                        let _ = inner.save_dirty().await;
                        break 'outer;
                    }
                    // Timer reset
                }
            }
        }
    }
}
