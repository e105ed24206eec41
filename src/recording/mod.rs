//! Audio capture
//!
//! `CaptureBackend` abstracts the microphone; `RecordingController` drives
//! the idle → recording ⇄ paused → stopped state machine and finalizes the
//! captured PCM into a single WAV blob.

mod capture;
mod controller;

pub use capture::{AudioFrame, CaptureBackend};
pub use controller::{RecordedBlob, RecorderState, RecordingController};
