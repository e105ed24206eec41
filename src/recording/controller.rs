use serde::Serialize;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::capture::{AudioFrame, CaptureBackend};
use crate::error::DeviceError;

/// Recorder state machine: idle → recording ⇄ paused → stopped.
/// `Stopped` is terminal for a controller instance; record again with a new
/// controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderState {
    Idle,
    Recording,
    Paused,
    Stopped,
}

/// Finished capture: one WAV blob plus its elapsed (unpaused) duration
#[derive(Debug, Clone)]
pub struct RecordedBlob {
    pub bytes: Vec<u8>,
    pub duration_seconds: f64,
}

#[derive(Default)]
struct CaptureBuffer {
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
}

/// Local capture state machine.
///
/// A pump task drains frames from the backend into the buffer; frames
/// arriving while paused are discarded and do not count toward duration.
/// Each processed frame also feeds the level meter.
pub struct RecordingController {
    backend: Option<Box<dyn CaptureBackend>>,
    state: RecorderState,
    paused: Arc<AtomicBool>,
    buffer: Arc<Mutex<CaptureBuffer>>,
    levels: broadcast::Sender<f32>,
    pump: Option<JoinHandle<()>>,
}

impl RecordingController {
    pub fn new(backend: Box<dyn CaptureBackend>) -> Self {
        let (levels, _) = broadcast::channel(64);
        Self {
            backend: Some(backend),
            state: RecorderState::Idle,
            paused: Arc::new(AtomicBool::new(false)),
            buffer: Arc::new(Mutex::new(CaptureBuffer::default())),
            levels,
            pump: None,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Live audio-level feed: one normalized RMS sample per captured frame.
    /// Lazy: subscribing mid-session only sees levels from that point on.
    pub fn level_meter(&self) -> broadcast::Receiver<f32> {
        self.levels.subscribe()
    }

    /// Acquire the device and start capturing. Valid only from `Idle`, and
    /// only with consent captured. On device failure the error is reported
    /// once and the controller stays `Idle`.
    pub async fn start(&mut self, consent_given: bool) -> Result<(), DeviceError> {
        if self.state != RecorderState::Idle {
            return Err(DeviceError::AlreadyStarted);
        }
        if !consent_given {
            return Err(DeviceError::ConsentRequired);
        }

        let backend = self.backend.as_mut().ok_or(DeviceError::AlreadyStarted)?;
        let mut frames = backend.start().await?;
        info!(backend = backend.name(), "capture started");

        self.paused.store(false, Ordering::SeqCst);
        let paused = Arc::clone(&self.paused);
        let buffer = Arc::clone(&self.buffer);
        let levels = self.levels.clone();

        let pump = tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                if paused.load(Ordering::SeqCst) {
                    continue;
                }

                let _ = levels.send(frame_level(&frame.samples));

                let mut buf = buffer.lock().await;
                if buf.sample_rate == 0 {
                    buf.sample_rate = frame.sample_rate;
                    buf.channels = frame.channels;
                }
                buf.samples.extend_from_slice(&frame.samples);
            }
        });

        self.pump = Some(pump);
        self.state = RecorderState::Recording;
        Ok(())
    }

    /// No-op unless currently recording
    pub fn pause(&mut self) {
        if self.state == RecorderState::Recording {
            self.paused.store(true, Ordering::SeqCst);
            self.state = RecorderState::Paused;
        }
    }

    /// No-op unless currently paused
    pub fn resume(&mut self) {
        if self.state == RecorderState::Paused {
            self.paused.store(false, Ordering::SeqCst);
            self.state = RecorderState::Recording;
        }
    }

    /// Finalize the capture into one WAV blob. Valid from `Recording` or
    /// `Paused`; transitions to `Stopped` and cannot be rolled back.
    pub async fn stop(&mut self) -> Result<RecordedBlob, DeviceError> {
        match self.state {
            RecorderState::Recording | RecorderState::Paused => {}
            _ => return Err(DeviceError::NotRecording),
        }

        self.state = RecorderState::Stopped;

        if let Some(mut backend) = self.backend.take() {
            if let Err(e) = backend.stop().await {
                error!(error = %e, "capture backend failed to stop");
                return Err(e);
            }
        }

        // Drain any frames still in flight before reading the buffer
        if let Some(pump) = self.pump.take() {
            if let Err(e) = pump.await {
                error!("capture pump task panicked: {}", e);
            }
        }

        let buf = self.buffer.lock().await;
        if buf.samples.is_empty() {
            return Err(DeviceError::EmptyCapture);
        }

        let frames_per_second = buf.sample_rate as f64 * buf.channels as f64;
        let duration_seconds = buf.samples.len() as f64 / frames_per_second;
        let bytes = encode_wav(&buf)?;

        info!(
            duration_seconds,
            bytes = bytes.len(),
            "capture finalized into blob"
        );

        Ok(RecordedBlob { bytes, duration_seconds })
    }
}

fn encode_wav(buf: &CaptureBuffer) -> Result<Vec<u8>, DeviceError> {
    let spec = hound::WavSpec {
        channels: buf.channels,
        sample_rate: buf.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec)
        .map_err(|e| DeviceError::Encode(e.to_string()))?;
    for &sample in &buf.samples {
        writer
            .write_sample(sample)
            .map_err(|e| DeviceError::Encode(e.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|e| DeviceError::Encode(e.to_string()))?;

    Ok(cursor.into_inner())
}

/// Normalized RMS of one frame, 0.0 (silence) to 1.0 (full scale)
fn frame_level(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples
        .iter()
        .map(|&s| {
            let s = s as f64;
            s * s
        })
        .sum();
    let rms = (sum_squares / samples.len() as f64).sqrt();
    (rms / i16::MAX as f64) as f32
}
