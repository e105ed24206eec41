use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Generate a prefixed entity id, e.g. `rec-7f3a…`.
pub fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

/// Lifecycle of one capture attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStatus {
    Capturing,
    Uploading,
    Uploaded,
    Failed,
}

/// One capture attempt for an appointment
///
/// Immutable after creation except for `status`. The appointment's "current"
/// recording is its most recently created one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub id: String,
    pub appointment_id: String,
    pub owner_id: String,
    /// Storage location of the persisted audio blob
    pub audio_uri: String,
    pub duration_seconds: f64,
    pub status: RecordingStatus,
    /// Whether the clinician captured consent before recording started
    pub consent_captured: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Transcription result for a recording; exactly one per recording.
///
/// `text` is set once on completion and never mutated afterwards. A duplicate
/// completion event overwrites the row with identical content (last write
/// wins), so replays are harmless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub id: String,
    pub recording_id: String,
    pub text: String,
    pub word_count: usize,
    pub status: TranscriptStatus,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transcript {
    /// Build a completed transcript from raw text
    pub fn completed(recording_id: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id: new_id("tr"),
            recording_id: recording_id.into(),
            word_count: text.split_whitespace().count(),
            text,
            status: TranscriptStatus::Completed,
            failure_reason: None,
            created_at: Utc::now(),
        }
    }

    /// Placeholder row created when transcription is first requested
    pub fn pending(recording_id: impl Into<String>) -> Self {
        Self {
            id: new_id("tr"),
            recording_id: recording_id.into(),
            text: String::new(),
            word_count: 0,
            status: TranscriptStatus::Pending,
            failure_reason: None,
            created_at: Utc::now(),
        }
    }
}

/// The four sections of a SOAP note, in export order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoapSection {
    Subjective,
    Objective,
    Assessment,
    Plan,
}

impl SoapSection {
    pub const ALL: [SoapSection; 4] = [
        SoapSection::Subjective,
        SoapSection::Objective,
        SoapSection::Assessment,
        SoapSection::Plan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SoapSection::Subjective => "subjective",
            SoapSection::Objective => "objective",
            SoapSection::Assessment => "assessment",
            SoapSection::Plan => "plan",
        }
    }

    /// Display header used in the plain-text export
    pub fn header(&self) -> &'static str {
        match self {
            SoapSection::Subjective => "Subjective",
            SoapSection::Objective => "Objective",
            SoapSection::Assessment => "Assessment",
            SoapSection::Plan => "Plan",
        }
    }
}

impl std::fmt::Display for SoapSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured clinical note; at most one per appointment.
///
/// Mutable only while `is_finalized` is false. Finalization is one-way: no
/// code path clears the flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoapNote {
    pub id: String,
    pub appointment_id: String,
    pub owner_id: String,
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
    pub is_finalized: bool,
    pub edited_by_therapist: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SoapNote {
    pub fn new(appointment_id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id("note"),
            appointment_id: appointment_id.into(),
            owner_id: owner_id.into(),
            subjective: String::new(),
            objective: String::new(),
            assessment: String::new(),
            plan: String::new(),
            is_finalized: false,
            edited_by_therapist: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn section(&self, section: SoapSection) -> &str {
        match section {
            SoapSection::Subjective => &self.subjective,
            SoapSection::Objective => &self.objective,
            SoapSection::Assessment => &self.assessment,
            SoapSection::Plan => &self.plan,
        }
    }

    pub fn set_section(&mut self, section: SoapSection, text: String) {
        match section {
            SoapSection::Subjective => self.subjective = text,
            SoapSection::Objective => self.objective = text,
            SoapSection::Assessment => self.assessment = text,
            SoapSection::Plan => self.plan = text,
        }
    }
}

/// AI-drafted content for all four sections, held as a discrete suggestion
/// until the editing session explicitly applies it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSuggestion {
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
}

impl DraftSuggestion {
    pub fn section(&self, section: SoapSection) -> &str {
        match section {
            SoapSection::Subjective => &self.subjective,
            SoapSection::Objective => &self.objective,
            SoapSection::Assessment => &self.assessment,
            SoapSection::Plan => &self.plan,
        }
    }
}

/// Autosave indicator surfaced by the editing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveIndicator {
    Idle,
    Saving,
    Saved,
    Error,
}

/// Draft generation lifecycle for an appointment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Idle,
    Generating,
    Ready,
    Failed,
}
