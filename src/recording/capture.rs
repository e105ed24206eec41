use tokio::sync::mpsc;

use crate::error::DeviceError;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Microphone capture backend.
///
/// `start` acquires the device (permission prompt included) and returns a
/// channel receiver that delivers PCM frames until `stop` is called or the
/// device goes away. Tests use scripted backends fed from a channel.
#[async_trait::async_trait]
pub trait CaptureBackend: Send {
    /// Acquire the capture device and start streaming frames
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, DeviceError>;

    /// Release the device; the frame channel closes afterwards
    async fn stop(&mut self) -> Result<(), DeviceError>;

    /// Backend name for logging
    fn name(&self) -> &str;
}
