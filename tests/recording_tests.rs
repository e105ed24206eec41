mod common;

use std::time::Duration;

use clinic_scribe::error::DeviceError;
use clinic_scribe::recording::{RecorderState, RecordingController};

use common::{frame, seconds_of_audio, ChannelCapture, DeniedCapture};

#[tokio::test]
async fn start_requires_consent() {
    let (backend, _tx) = ChannelCapture::new();
    let mut recorder = RecordingController::new(Box::new(backend));

    let err = recorder.start(false).await.unwrap_err();
    assert_eq!(err, DeviceError::ConsentRequired);
    assert_eq!(recorder.state(), RecorderState::Idle);

    // Consent captured on the second attempt
    recorder.start(true).await.unwrap();
    assert_eq!(recorder.state(), RecorderState::Recording);
}

#[tokio::test]
async fn device_failure_leaves_recorder_idle() {
    let mut recorder = RecordingController::new(Box::new(DeniedCapture));

    let err = recorder.start(true).await.unwrap_err();
    assert_eq!(err, DeviceError::PermissionDenied);
    assert_eq!(recorder.state(), RecorderState::Idle);

    // Nothing was captured, so there is nothing to stop
    assert_eq!(recorder.stop().await.unwrap_err(), DeviceError::NotRecording);
}

#[tokio::test]
async fn second_start_is_rejected() {
    let (backend, _tx) = ChannelCapture::new();
    let mut recorder = RecordingController::new(Box::new(backend));

    recorder.start(true).await.unwrap();
    let err = recorder.start(true).await.unwrap_err();
    assert_eq!(err, DeviceError::AlreadyStarted);
    assert_eq!(recorder.state(), RecorderState::Recording);
}

#[tokio::test]
async fn pause_and_resume_outside_valid_states_are_noops() {
    let (backend, _tx) = ChannelCapture::new();
    let mut recorder = RecordingController::new(Box::new(backend));

    recorder.pause();
    assert_eq!(recorder.state(), RecorderState::Idle);
    recorder.resume();
    assert_eq!(recorder.state(), RecorderState::Idle);

    recorder.start(true).await.unwrap();
    recorder.resume();
    assert_eq!(recorder.state(), RecorderState::Recording);
}

#[tokio::test]
async fn stop_yields_wav_blob_with_duration() {
    let (backend, tx) = ChannelCapture::new();
    let mut recorder = RecordingController::new(Box::new(backend));

    recorder.start(true).await.unwrap();
    for frame in seconds_of_audio(12) {
        tx.send(frame).await.unwrap();
    }
    drop(tx);

    let blob = recorder.stop().await.unwrap();
    assert_eq!(recorder.state(), RecorderState::Stopped);
    assert!((blob.duration_seconds - 12.0).abs() < 1e-9);
    assert_eq!(&blob.bytes[..4], b"RIFF");

    // Stopped is terminal
    assert_eq!(recorder.stop().await.unwrap_err(), DeviceError::NotRecording);
}

#[tokio::test]
async fn frames_during_pause_are_discarded() {
    let (backend, tx) = ChannelCapture::new();
    let mut recorder = RecordingController::new(Box::new(backend));

    recorder.start(true).await.unwrap();
    for i in 0..2 {
        tx.send(frame(i, 1000)).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    recorder.pause();
    assert_eq!(recorder.state(), RecorderState::Paused);
    for i in 2..4 {
        tx.send(frame(i, 1000)).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    recorder.resume();
    assert_eq!(recorder.state(), RecorderState::Recording);
    for i in 4..6 {
        tx.send(frame(i, 1000)).await.unwrap();
    }
    drop(tx);

    // Four 100ms frames survive; the two paused ones do not count
    let blob = recorder.stop().await.unwrap();
    assert!((blob.duration_seconds - 0.4).abs() < 1e-9);
}

#[tokio::test]
async fn stop_from_paused_is_allowed() {
    let (backend, tx) = ChannelCapture::new();
    let mut recorder = RecordingController::new(Box::new(backend));

    recorder.start(true).await.unwrap();
    tx.send(frame(0, 1000)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    recorder.pause();
    drop(tx);

    let blob = recorder.stop().await.unwrap();
    assert!(blob.duration_seconds > 0.0);
}

#[tokio::test]
async fn stop_without_audio_is_empty_capture() {
    let (backend, tx) = ChannelCapture::new();
    let mut recorder = RecordingController::new(Box::new(backend));

    recorder.start(true).await.unwrap();
    drop(tx);

    assert_eq!(recorder.stop().await.unwrap_err(), DeviceError::EmptyCapture);
}

#[tokio::test]
async fn level_meter_reports_captured_frames() {
    let (backend, tx) = ChannelCapture::new();
    let mut recorder = RecordingController::new(Box::new(backend));
    let mut levels = recorder.level_meter();

    recorder.start(true).await.unwrap();
    tx.send(frame(0, 8000)).await.unwrap();
    tx.send(frame(1, 0)).await.unwrap();
    drop(tx);
    recorder.stop().await.unwrap();

    let loud = levels.recv().await.unwrap();
    assert!(loud > 0.1, "expected audible level, got {loud}");
    let silent = levels.recv().await.unwrap();
    assert_eq!(silent, 0.0);
}
