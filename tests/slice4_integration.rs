//! Integration tests for Slice 4 - Traces and display mapping
//!
//! JSON-lines traces replayed through a session, subject behaviour built
//! with the scripted subject, and detector boxes mapped onto a display.

use liveguard::core::coords::{fit, DisplayFit};
use liveguard::core::{map_to_display, LivenessSession};
use liveguard::replay::{read_trace, replay, FrameRecord, ScriptedSubject};
use liveguard::types::{BoundingBox, ChallengeType, FrameGeometry, LivenessEvent, NoFaceReason};
use liveguard::LivenessConfig;
use pretty_assertions::assert_eq;

fn smile_only() -> LivenessConfig {
    LivenessConfig { challenges: vec![ChallengeType::Smile], ..Default::default() }
}

fn to_json_lines(records: &[FrameRecord]) -> String {
    let mut text = String::from("# scripted subject\n");
    for record in records {
        text.push_str(&serde_json::to_string(record).unwrap());
        text.push('\n');
    }
    text
}

// =============================================================================
// TRACES
// =============================================================================

#[test]
fn test_trace_file_replays_to_verified() {
    let mut session = LivenessSession::new(LivenessConfig::default()).unwrap();
    let recorded = ScriptedSubject::performing(session.challenges());
    let text = to_json_lines(&recorded);

    let records = read_trace(text.as_bytes()).unwrap();
    assert_eq!(records.len(), recorded.len());

    let events = replay(&mut session, &records);
    assert_eq!(events[0].event, LivenessEvent::Initialized);
    assert_eq!(events[1].event, LivenessEvent::Detecting);

    // the last gesture finishes the session; trailing neutral frames are not read
    let last = events.last().unwrap();
    assert!(matches!(last.event, LivenessEvent::Completed { .. }));
    assert!(last.frame_ms < records.last().unwrap().timestamp_ms);
    assert!(session.result().unwrap().verified);
}

#[test]
fn test_trace_without_face_timestamps_uses_frame_clock() {
    let recorded = ScriptedSubject::performing(&[ChallengeType::Smile]);
    let mut text = String::new();
    for record in &recorded {
        let mut line = serde_json::to_value(record).unwrap();
        for face in line["faces"].as_array_mut().unwrap() {
            face.as_object_mut().unwrap().remove("timestamp_ms");
        }
        text.push_str(&line.to_string());
        text.push('\n');
    }

    let records = read_trace(text.as_bytes()).unwrap();
    assert!(records.iter().flat_map(|r| &r.faces).all(|f| f.timestamp_ms == 0));

    let mut session = LivenessSession::new(smile_only()).unwrap();
    replay(&mut session, &records);
    let result = session.result().expect("session finished");
    assert!(result.verified);
    assert_eq!(result.completed_challenges, vec![ChallengeType::Smile]);
}

#[test]
fn test_detector_errors_in_trace_are_reported() {
    let mut records = ScriptedSubject::performing(&[ChallengeType::Smile]);
    let failed_at = records[20].timestamp_ms;
    records[20] = FrameRecord {
        faces: Vec::new(),
        error: Some("detector timeout".into()),
        ..records[20].clone()
    };

    let mut session = LivenessSession::new(smile_only()).unwrap();
    let events = replay(&mut session, &records);

    assert!(events.iter().any(|e| e.frame_ms == failed_at
        && e.event
            == LivenessEvent::NoFace {
                reason: NoFaceReason::DetectionFailed { detail: "detector timeout".into() }
            }));
    assert!(session.result().unwrap().verified);
}

#[test]
fn test_replay_stops_at_terminal_state() {
    let mut records = ScriptedSubject::performing(&[ChallengeType::Smile]);
    let mut extra = ScriptedSubject::new();
    extra.neutral(records.len() as u64 + 5);
    let tail: Vec<FrameRecord> = extra.finish().split_off(records.len());
    records.extend(tail);

    let mut session = LivenessSession::new(smile_only()).unwrap();
    let events = replay(&mut session, &records);
    let completed_at = events
        .iter()
        .position(|e| matches!(e.event, LivenessEvent::Completed { .. }))
        .unwrap();
    assert_eq!(completed_at, events.len() - 1);

    // one frame every 100 ms from 0; nothing after the completing frame counts
    let finished_ms = events[completed_at].frame_ms;
    assert_eq!(session.snapshot().frames_processed, finished_ms / 100 + 1);
    assert!((session.snapshot().frames_processed as usize) < records.len());
}

#[test]
fn test_long_absence_requires_repositioning() {
    let mut subject = ScriptedSubject::new();
    subject.warm_up(40).absent(20);
    let before_return = subject.finish();

    let mut session = LivenessSession::new(smile_only()).unwrap();
    let mut events = replay(&mut session, &before_return);
    assert!(!session.snapshot().stability.stable);
    assert_eq!(session.current_challenge(), Some(ChallengeType::Smile));

    // continue the same clock where the absence ended
    let mut back = ScriptedSubject::new();
    back.absent(60).neutral(5).perform(ChallengeType::Smile);
    let returning = back.finish().split_off(60);
    for record in &returning {
        events.extend(
            record
                .apply(&mut session)
                .into_iter()
                .map(|event| liveguard::types::StampedEvent::new(event, record.timestamp_ms)),
        );
    }

    let positioned = events.iter().filter(|e| e.event == LivenessEvent::Positioned).count();
    assert_eq!(positioned, 2);
    assert!(session.result().unwrap().verified);
}

// =============================================================================
// DISPLAY MAPPING
// =============================================================================

const SENSOR: FrameGeometry = FrameGeometry { width: 640.0, height: 480.0 };

#[test]
fn test_centred_face_maps_to_display_centre() {
    let centred = BoundingBox::new(220.0, 140.0, 200.0, 200.0);
    let mapped = map_to_display(centred, SENSOR, FrameGeometry::new(960.0, 1280.0));
    assert_eq!(mapped, BoundingBox::new(280.0, 440.0, 400.0, 400.0));
    assert_eq!(mapped.center(), (480.0, 640.0));
}

#[test]
fn test_wide_display_pillarboxes() {
    let upright = FrameGeometry::new(480.0, 640.0);
    assert_eq!(
        fit(upright, FrameGeometry::new(1000.0, 640.0)),
        DisplayFit { scale: 1.0, offset_x: 260.0, offset_y: 0.0 }
    );
}

#[test]
fn test_degenerate_image_maps_to_empty_box() {
    let mapped = map_to_display(
        BoundingBox::new(10.0, 10.0, 50.0, 50.0),
        FrameGeometry::new(0.0, 0.0),
        FrameGeometry::new(480.0, 640.0),
    );
    assert_eq!(mapped.width, 0.0);
    assert_eq!(mapped.height, 0.0);
}
