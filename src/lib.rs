pub mod config;
pub mod error;
pub mod export;
pub mod http;
pub mod model;
pub mod note;
pub mod recording;
pub mod services;
pub mod status;
pub mod store;
pub mod transcription;
pub mod upload;

pub use config::Config;
pub use error::{
    AuthorizationError, DeviceError, GenerationError, PipelineError, StaleWriteError,
    UploadError, ValidationError,
};
pub use export::render_plain_text;
pub use http::{create_router, AppState};
pub use model::{
    DraftStatus, DraftSuggestion, Recording, RecordingStatus, SaveIndicator, SoapNote,
    SoapSection, Transcript, TranscriptStatus,
};
pub use note::{DraftEditingSession, DraftState, DraftStore, FinalizationGuard, NoteDraftOrchestrator};
pub use recording::{AudioFrame, CaptureBackend, RecordedBlob, RecorderState, RecordingController};
pub use services::{
    ChannelGenerationService, ChannelTranscriptionService, GenerationService,
    TranscriptionService, TriggerAck,
};
pub use status::{StatusChannel, StatusEntity, StatusEvent};
pub use store::SessionStore;
pub use transcription::{TranscriptWatch, TranscriptionStatusWatcher};
pub use upload::UploadCoordinator;
