use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::note::{FinalizationGuard, NoteDraftOrchestrator};
use crate::services::{GenerationService, TranscriptionService};
use crate::status::StatusChannel;
use crate::store::SessionStore;
use crate::upload::UploadCoordinator;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SessionStore>,
    pub status: StatusChannel,
    pub uploads: Arc<UploadCoordinator>,
    pub guard: Arc<FinalizationGuard>,
    pub transcription: Arc<dyn TranscriptionService>,
    pub generation: Arc<dyn GenerationService>,
    /// Draft orchestrators, one per appointment (appointment_id → orchestrator)
    pub orchestrators: Arc<RwLock<HashMap<String, Arc<NoteDraftOrchestrator>>>>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        config: Config,
        status: StatusChannel,
        transcription: Arc<dyn TranscriptionService>,
        generation: Arc<dyn GenerationService>,
    ) -> Self {
        let store = Arc::new(SessionStore::new());
        let uploads = Arc::new(UploadCoordinator::new(
            Arc::clone(&store),
            status.clone(),
            Arc::clone(&transcription),
            config.storage.recordings_path.clone(),
        ));
        let guard = Arc::new(FinalizationGuard::new(
            Arc::clone(&store),
            status.clone(),
            config.note.min_section_chars,
        ));

        Self {
            store,
            status,
            uploads,
            guard,
            transcription,
            generation,
            orchestrators: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(config),
        }
    }
}
