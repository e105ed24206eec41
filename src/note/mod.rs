//! SOAP note drafting, editing, and finalization
//!
//! `NoteDraftOrchestrator` drives AI draft generation per appointment,
//! `DraftEditingSession` holds the editable copy with debounced autosave,
//! and `FinalizationGuard` performs the one-way lock to immutable.

mod editor;
mod finalize;
mod orchestrator;

pub use editor::{DraftEditingSession, DraftStore};
pub use finalize::FinalizationGuard;
pub use orchestrator::{DraftState, NoteDraftOrchestrator};
