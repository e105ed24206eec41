mod common;

use std::sync::Arc;

use chrono::Utc;
use clinic_scribe::error::PipelineError;
use clinic_scribe::export::render_plain_text;
use clinic_scribe::model::{SoapNote, SoapSection};
use clinic_scribe::note::FinalizationGuard;
use clinic_scribe::status::{StatusChannel, StatusEntity};
use clinic_scribe::store::SessionStore;

use common::{chars, seed_valid_note};

const MIN_CHARS: usize = 50;

fn guard(store: &Arc<SessionStore>, status: &StatusChannel) -> FinalizationGuard {
    FinalizationGuard::new(Arc::clone(store), status.clone(), MIN_CHARS)
}

#[tokio::test]
async fn short_section_blocks_finalization_by_name() {
    let store = Arc::new(SessionStore::new());
    let status = StatusChannel::default();
    let guard = guard(&store, &status);

    let mut note = SoapNote::new("appt-1", "therapist-1");
    note.set_section(SoapSection::Subjective, chars(40));
    note.set_section(SoapSection::Objective, chars(60));
    note.set_section(SoapSection::Assessment, chars(60));
    note.set_section(SoapSection::Plan, chars(60));
    store.insert_note(note.clone()).await;

    let err = guard.finalize(&note.id, "appt-1", "therapist-1").await.unwrap_err();
    match &err {
        PipelineError::Validation(v) => {
            assert_eq!(v.sections, vec![SoapSection::Subjective]);
            assert_eq!(v.min_chars, MIN_CHARS);
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
    assert!(err.to_string().contains("subjective"));
    assert!(!store.note(&note.id).await.unwrap().is_finalized);

    // Extending the short section unblocks finalization
    store
        .update_note(
            &note.id,
            "appt-1",
            "therapist-1",
            &[(SoapSection::Subjective, chars(60))],
            Utc::now(),
        )
        .await
        .unwrap();
    let finalized = guard.finalize(&note.id, "appt-1", "therapist-1").await.unwrap();
    assert!(finalized.is_finalized);
}

#[tokio::test]
async fn a_finalized_note_rejects_every_mutation() {
    let store = Arc::new(SessionStore::new());
    let status = StatusChannel::default();
    let guard = guard(&store, &status);
    let note = seed_valid_note(&store, "appt-1", "therapist-1").await;

    guard.finalize(&note.id, "appt-1", "therapist-1").await.unwrap();
    let before = store.note(&note.id).await.unwrap();

    let err = store
        .update_note(
            &note.id,
            "appt-1",
            "therapist-1",
            &[(SoapSection::Plan, chars(80))],
            Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("finalized"));

    let after = store.note(&note.id).await.unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn store_revalidates_sections_under_its_write_lock() {
    let store = Arc::new(SessionStore::new());
    let status = StatusChannel::default();
    let guard = guard(&store, &status);
    let note = seed_valid_note(&store, "appt-1", "therapist-1").await;

    // The note passes validation against this snapshot
    assert!(guard.invalid_sections(&note).is_empty());

    // An autosave lands after the snapshot was taken and shortens a section;
    // drafts may legally go below the minimum
    store
        .update_note(
            &note.id,
            "appt-1",
            "therapist-1",
            &[(SoapSection::Subjective, chars(10))],
            Utc::now(),
        )
        .await
        .unwrap();

    // Finalizing against the stale snapshot must still be rejected
    let err = store
        .finalize_note(&note.id, "appt-1", "therapist-1", MIN_CHARS)
        .await
        .unwrap_err();
    match &err {
        PipelineError::Validation(v) => {
            assert_eq!(v.sections, vec![SoapSection::Subjective]);
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
    assert!(!store.note(&note.id).await.unwrap().is_finalized);
}

#[tokio::test]
async fn only_the_owner_may_finalize() {
    let store = Arc::new(SessionStore::new());
    let status = StatusChannel::default();
    let guard = guard(&store, &status);
    let note = seed_valid_note(&store, "appt-1", "therapist-1").await;

    let err = guard.finalize(&note.id, "appt-1", "therapist-2").await.unwrap_err();
    assert!(err.to_string().contains("does not own"));
    assert!(!store.note(&note.id).await.unwrap().is_finalized);
}

#[tokio::test]
async fn finalizing_twice_is_rejected() {
    let store = Arc::new(SessionStore::new());
    let status = StatusChannel::default();
    let guard = guard(&store, &status);
    let note = seed_valid_note(&store, "appt-1", "therapist-1").await;

    guard.finalize(&note.id, "appt-1", "therapist-1").await.unwrap();
    let err = guard.finalize(&note.id, "appt-1", "therapist-1").await.unwrap_err();
    assert!(err.to_string().contains("finalized"));
}

#[tokio::test]
async fn sections_at_exactly_the_minimum_pass() {
    let store = Arc::new(SessionStore::new());
    let status = StatusChannel::default();
    let guard = guard(&store, &status);

    let mut note = SoapNote::new("appt-1", "therapist-1");
    for section in SoapSection::ALL {
        note.set_section(section, chars(MIN_CHARS));
    }
    store.insert_note(note.clone()).await;

    assert!(guard.invalid_sections(&note).is_empty());
    let finalized = guard.finalize(&note.id, "appt-1", "therapist-1").await.unwrap();
    assert!(finalized.is_finalized);
}

#[tokio::test]
async fn finalization_is_announced_on_the_status_channel() {
    let store = Arc::new(SessionStore::new());
    let status = StatusChannel::default();
    let guard = guard(&store, &status);
    let note = seed_valid_note(&store, "appt-1", "therapist-1").await;

    let mut events = status.subscribe();
    guard.finalize(&note.id, "appt-1", "therapist-1").await.unwrap();

    let event = events.recv().await.unwrap();
    assert_eq!(event.entity, StatusEntity::Note);
    assert_eq!(event.id, "appt-1");
    assert_eq!(event.status, "finalized");
    let payload: SoapNote = serde_json::from_value(event.payload.unwrap()).unwrap();
    assert!(payload.is_finalized);
}

#[tokio::test]
async fn export_renders_sections_in_fixed_order() {
    let mut note = SoapNote::new("appt-1", "therapist-1");
    note.set_section(SoapSection::Subjective, "Client reports low mood.".to_string());
    note.set_section(SoapSection::Objective, "Flat affect observed.".to_string());
    note.set_section(SoapSection::Assessment, "Consistent with prior sessions.".to_string());
    note.set_section(SoapSection::Plan, "Weekly CBT, review in four weeks.".to_string());

    let text = render_plain_text(&note);
    assert_eq!(
        text,
        "Subjective:\nClient reports low mood.\n\n\
         Objective:\nFlat affect observed.\n\n\
         Assessment:\nConsistent with prior sessions.\n\n\
         Plan:\nWeekly CBT, review in four weeks."
    );
}

#[tokio::test]
async fn export_keeps_empty_sections_under_their_headers() {
    let mut note = SoapNote::new("appt-1", "therapist-1");
    note.set_section(SoapSection::Subjective, "Only the subjective was written.".to_string());

    let text = render_plain_text(&note);
    assert!(text.starts_with("Subjective:\nOnly the subjective was written.\n\nObjective:\n"));
    assert!(text.ends_with("Plan:\n"));
}
