//! Recorded per-frame measurements
//!
//! A trace is a JSON-lines file, one analysed frame per line:
//!
//! ```text
//! {"timestamp_ms":0,"image_width":480,"image_height":640,"faces":[{"bounding_box":{...},"smiling_probability":0.1}]}
//! {"timestamp_ms":100,"image_width":480,"image_height":640,"error":"detector timeout"}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. The same record is
//! the HTTP API's frame submission body. The line's `timestamp_ms` is the
//! session clock; per-face timestamps may be left out.

use std::fs::File;
use std::io::{BufRead, BufReader};

use serde::{Deserialize, Serialize};

use crate::core::LivenessSession;
use crate::types::{
    BoundingBox, ChallengeType, FaceObservation, FrameGeometry, LivenessError, LivenessEvent,
    StampedEvent,
};

/// Detector output for one analysed frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub timestamp_ms: u64,
    pub image_width: f64,
    pub image_height: f64,
    #[serde(default)]
    pub faces: Vec<FaceObservation>,
    /// Set when the detector failed on this frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FrameRecord {
    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry::new(self.image_width, self.image_height)
    }

    /// Feed this frame to `session`
    pub fn apply(&self, session: &mut LivenessSession) -> Vec<LivenessEvent> {
        match &self.error {
            Some(detail) => session.record_failure(detail.clone(), self.timestamp_ms),
            None => session.process(&self.faces, self.geometry(), self.timestamp_ms),
        }
    }
}

/// Parse a JSON-lines trace
pub fn read_trace<R: BufRead>(reader: R) -> Result<Vec<FrameRecord>, LivenessError> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let record = serde_json::from_str(line).map_err(|err| LivenessError::Unknown {
            detail: format!("trace line {}: {}", index + 1, err),
        })?;
        records.push(record);
    }
    Ok(records)
}

pub fn load_trace(path: &str) -> Result<Vec<FrameRecord>, LivenessError> {
    let file = File::open(path)?;
    read_trace(BufReader::new(file))
}

/// Run `records` through `session` until it finishes
pub fn replay(session: &mut LivenessSession, records: &[FrameRecord]) -> Vec<StampedEvent> {
    let mut out: Vec<StampedEvent> = session
        .start()
        .into_iter()
        .map(|event| StampedEvent::new(event, 0))
        .collect();

    for record in records {
        if session.is_terminal() {
            break;
        }
        out.extend(
            record
                .apply(session)
                .into_iter()
                .map(|event| StampedEvent::new(event, record.timestamp_ms)),
        );
    }
    out
}

// =============================================================================
// SCRIPTED SUBJECT
// =============================================================================

/// Portrait frame used by the scripted subject
pub const SUBJECT_FRAME: FrameGeometry = FrameGeometry { width: 480.0, height: 640.0 };

/// Interval between scripted frames (ms)
pub const SUBJECT_FRAME_INTERVAL_MS: u64 = 100;

/// Frames of natural movement before the first gesture
const WARM_UP_FRAMES: u64 = 40;

/// Builds the trace of a cooperative live subject: a warm-up of small
/// natural head movement, then each challenge's gesture followed by a
/// neutral pose.
#[derive(Debug, Clone)]
pub struct ScriptedSubject {
    frame: u64,
    records: Vec<FrameRecord>,
}

impl Default for ScriptedSubject {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSubject {
    pub fn new() -> Self {
        Self { frame: 0, records: Vec::new() }
    }

    /// Full trace performing `challenges` in order
    pub fn performing(challenges: &[ChallengeType]) -> Vec<FrameRecord> {
        let mut subject = Self::new();
        subject.warm_up(WARM_UP_FRAMES);
        for &challenge in challenges {
            subject.perform(challenge);
            subject.neutral(2);
        }
        subject.finish()
    }

    pub fn warm_up(&mut self, frames: u64) -> &mut Self {
        self.neutral(frames)
    }

    pub fn neutral(&mut self, frames: u64) -> &mut Self {
        for _ in 0..frames {
            self.pose(0.1, 0.9, 0.0, 0.0);
        }
        self
    }

    pub fn perform(&mut self, challenge: ChallengeType) -> &mut Self {
        match challenge {
            ChallengeType::Smile => self.pose(0.9, 0.9, 0.0, 0.0),
            ChallengeType::Blink => self.pose(0.1, 0.1, 0.0, 0.0),
            ChallengeType::TurnLeft => self.pose(0.1, 0.9, 30.0, 0.0),
            ChallengeType::TurnRight => self.pose(0.1, 0.9, -30.0, 0.0),
            ChallengeType::Nod => self.pose(0.1, 0.9, 0.0, 24.0),
            ChallengeType::HeadShake => self.pose(0.1, 0.9, -24.0, 0.0),
        }
    }

    /// Frames with no face in view
    pub fn absent(&mut self, frames: u64) -> &mut Self {
        for _ in 0..frames {
            let timestamp_ms = self.next_timestamp();
            self.records.push(FrameRecord {
                timestamp_ms,
                image_width: SUBJECT_FRAME.width,
                image_height: SUBJECT_FRAME.height,
                faces: Vec::new(),
                error: None,
            });
        }
        self
    }

    /// One frame; face size and yaw alternate slightly so the window
    /// always carries motion and depth variation
    pub fn pose(&mut self, smile: f64, eyes: f64, yaw: f64, pitch: f64) -> &mut Self {
        let odd = self.frame % 2 == 1;
        let size = if odd { 208.0 } else { 200.0 };
        let jitter = if odd { 3.0 } else { 0.0 };
        let timestamp_ms = self.next_timestamp();

        let bbox = BoundingBox::new(
            SUBJECT_FRAME.width / 2.0 - size / 2.0,
            SUBJECT_FRAME.height / 2.0 - size / 2.0,
            size,
            size,
        );
        let face = FaceObservation {
            smiling_probability: Some(smile),
            left_eye_open_probability: Some(eyes),
            right_eye_open_probability: Some(eyes),
            head_euler_angle_x: Some(pitch),
            head_euler_angle_y: Some(yaw + jitter),
            head_euler_angle_z: Some(0.0),
            ..FaceObservation::bare(bbox, timestamp_ms)
        };
        self.records.push(FrameRecord {
            timestamp_ms,
            image_width: SUBJECT_FRAME.width,
            image_height: SUBJECT_FRAME.height,
            faces: vec![face],
            error: None,
        });
        self
    }

    pub fn finish(&mut self) -> Vec<FrameRecord> {
        std::mem::take(&mut self.records)
    }

    fn next_timestamp(&mut self) -> u64 {
        let ts = self.frame * SUBJECT_FRAME_INTERVAL_MS;
        self.frame += 1;
        ts
    }
}
