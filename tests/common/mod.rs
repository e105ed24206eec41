// Shared test fakes: scripted capture backends, recording trigger services,
// and an instrumented draft store.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use clinic_scribe::error::{DeviceError, PipelineError, UploadError};
use clinic_scribe::model::{SoapNote, SoapSection};
use clinic_scribe::note::DraftStore;
use clinic_scribe::recording::{AudioFrame, CaptureBackend};
use clinic_scribe::services::{GenerationService, TranscriptionService, TriggerAck};
use clinic_scribe::store::SessionStore;

pub const SAMPLE_RATE: u32 = 16000;
pub const SAMPLES_PER_FRAME: usize = 1600; // 100ms at 16kHz mono

/// Capture backend driven by the test through a channel sender
pub struct ChannelCapture {
    rx: Option<mpsc::Receiver<AudioFrame>>,
}

impl ChannelCapture {
    pub fn new() -> (Self, mpsc::Sender<AudioFrame>) {
        let (tx, rx) = mpsc::channel(256);
        (Self { rx: Some(rx) }, tx)
    }
}

#[async_trait]
impl CaptureBackend for ChannelCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, DeviceError> {
        self.rx.take().ok_or(DeviceError::AlreadyStarted)
    }

    async fn stop(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "channel-capture"
    }
}

/// Capture backend whose device acquisition always fails
pub struct DeniedCapture;

#[async_trait]
impl CaptureBackend for DeniedCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, DeviceError> {
        Err(DeviceError::PermissionDenied)
    }

    async fn stop(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "denied-capture"
    }
}

/// One 100ms frame of constant-amplitude audio
pub fn frame(index: u64, amplitude: i16) -> AudioFrame {
    AudioFrame {
        samples: vec![amplitude; SAMPLES_PER_FRAME],
        sample_rate: SAMPLE_RATE,
        channels: 1,
        timestamp_ms: index * 100,
    }
}

/// Frames adding up to `secs` seconds of 16kHz mono audio
pub fn seconds_of_audio(secs: u64) -> Vec<AudioFrame> {
    (0..secs * 10).map(|i| frame(i, 1000)).collect()
}

/// Transcription trigger that records every call
pub struct RecordingTranscriptionService {
    pub calls: Mutex<Vec<String>>,
    pub accept: AtomicBool,
}

impl RecordingTranscriptionService {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self { calls: Mutex::new(Vec::new()), accept: AtomicBool::new(true) })
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self { calls: Mutex::new(Vec::new()), accept: AtomicBool::new(false) })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscriptionService for RecordingTranscriptionService {
    async fn trigger_transcription(&self, recording_id: &str) -> TriggerAck {
        self.calls.lock().unwrap().push(recording_id.to_string());
        if self.accept.load(Ordering::SeqCst) {
            TriggerAck::accepted()
        } else {
            TriggerAck::rejected("queue unavailable")
        }
    }
}

/// Generation trigger that records every call
pub struct RecordingGenerationService {
    pub calls: Mutex<Vec<(String, String, bool)>>,
    pub accept: AtomicBool,
}

impl RecordingGenerationService {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self { calls: Mutex::new(Vec::new()), accept: AtomicBool::new(true) })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationService for RecordingGenerationService {
    async fn trigger_generation(
        &self,
        appointment_id: &str,
        transcript_id: &str,
        regenerate: bool,
    ) -> TriggerAck {
        self.calls.lock().unwrap().push((
            appointment_id.to_string(),
            transcript_id.to_string(),
            regenerate,
        ));
        if self.accept.load(Ordering::SeqCst) {
            TriggerAck::accepted()
        } else {
            TriggerAck::rejected("drafting service unavailable")
        }
    }
}

/// Draft store wrapper that counts save calls, records the sections each
/// payload carried, and can fail a configurable number of upcoming saves
pub struct CountingDraftStore {
    inner: Arc<SessionStore>,
    pub saves: AtomicUsize,
    pub payloads: Mutex<Vec<Vec<SoapSection>>>,
    pub fail_remaining: AtomicUsize,
}

impl CountingDraftStore {
    pub fn new(inner: Arc<SessionStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            saves: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
            fail_remaining: AtomicUsize::new(0),
        })
    }

    pub fn fail_next(&self, count: usize) {
        self.fail_remaining.store(count, Ordering::SeqCst);
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<Vec<SoapSection>> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl DraftStore for CountingDraftStore {
    async fn save_sections(
        &self,
        note_id: &str,
        appointment_id: &str,
        caller: &str,
        changes: Vec<(SoapSection, String)>,
        edited_at: DateTime<Utc>,
    ) -> Result<SoapNote, PipelineError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        let mut sections: Vec<SoapSection> = changes.iter().map(|(s, _)| *s).collect();
        sections.sort_by_key(|s| s.as_str());
        self.payloads.lock().unwrap().push(sections);

        if self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(UploadError::Storage("simulated save failure".to_string()).into());
        }

        self.inner
            .save_sections(note_id, appointment_id, caller, changes, edited_at)
            .await
    }
}

/// Seed a note whose four sections all meet a 50-character minimum
pub async fn seed_valid_note(
    store: &SessionStore,
    appointment_id: &str,
    owner_id: &str,
) -> SoapNote {
    let mut note = SoapNote::new(appointment_id, owner_id);
    for section in SoapSection::ALL {
        note.set_section(
            section,
            format!("{} section with enough characters to pass validation.", section.header()),
        );
    }
    store.insert_note(note.clone()).await;
    note
}

/// A string of exactly `n` characters
pub fn chars(n: usize) -> String {
    "x".repeat(n)
}
