//! Event stream emitted to the caller, one event per transition

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{BoundingBox, ChallengeType, Guidance, LivenessError, LivenessResult, NoFaceReason};

/// Session state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LivenessEvent {
    Initialized,
    Detecting,
    NoFace {
        reason: NoFaceReason,
    },
    FaceDetected {
        bounding_box: BoundingBox,
    },
    Positioning {
        guidance: Guidance,
    },
    Positioned,
    ChallengeInProgress {
        challenge: ChallengeType,
        index: usize,
        total: usize,
        instruction: String,
    },
    ChallengeCompleted {
        from: ChallengeType,
        to: Option<ChallengeType>,
    },
    Completed {
        result: LivenessResult,
    },
    Error {
        error: LivenessError,
    },
}

impl LivenessEvent {
    pub fn challenge_in_progress(challenge: ChallengeType, index: usize, total: usize) -> Self {
        Self::ChallengeInProgress {
            challenge,
            index,
            total,
            instruction: challenge.instruction().to_string(),
        }
    }

    /// Short event name (for logging)
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Detecting => "detecting",
            Self::NoFace { .. } => "no_face",
            Self::FaceDetected { .. } => "face_detected",
            Self::Positioning { .. } => "positioning",
            Self::Positioned => "positioned",
            Self::ChallengeInProgress { .. } => "challenge_in_progress",
            Self::ChallengeCompleted { .. } => "challenge_completed",
            Self::Completed { .. } => "completed",
            Self::Error { .. } => "error",
        }
    }

    /// One-line detail for terminal output
    pub fn detail(&self) -> String {
        match self {
            Self::Initialized | Self::Detecting | Self::Positioned => String::new(),
            Self::NoFace { reason } => reason.to_string(),
            Self::FaceDetected { bounding_box } => format!(
                "box=({:.0},{:.0} {:.0}x{:.0})",
                bounding_box.left, bounding_box.top, bounding_box.width, bounding_box.height
            ),
            Self::Positioning { guidance } => guidance.to_string(),
            Self::ChallengeInProgress { challenge, index, total, instruction } => {
                format!("{} [{}/{}] {}", challenge, index + 1, total, instruction)
            }
            Self::ChallengeCompleted { from, to } => match to {
                Some(next) => format!("{} -> {}", from, next),
                None => format!("{} -> done", from),
            },
            Self::Completed { result } => format!(
                "verified={} challenges={} confidence={:.2} duration={:.1}s attempts={}",
                result.verified,
                result.completed_challenges.len(),
                result.confidence,
                result.total_duration_ms as f64 / 1000.0,
                result.attempt_count
            ),
            Self::Error { error } => format!("{}: {}", error.code(), error),
        }
    }

    fn color_code(&self) -> &'static str {
        match self {
            Self::Initialized | Self::Detecting => "\x1b[90m",
            Self::NoFace { .. } | Self::Positioning { .. } => "\x1b[33m",
            Self::FaceDetected { .. } | Self::Positioned => "\x1b[36m",
            Self::ChallengeInProgress { .. } | Self::ChallengeCompleted { .. } => "\x1b[35m",
            Self::Completed { result } if result.verified => "\x1b[32m",
            Self::Completed { .. } | Self::Error { .. } => "\x1b[31m",
        }
    }
}

/// Event with the wall-clock time it was emitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampedEvent {
    pub timestamp: DateTime<Utc>,
    /// Session clock of the frame that produced the event
    pub frame_ms: u64,
    #[serde(flatten)]
    pub event: LivenessEvent,
}

impl StampedEvent {
    pub fn new(event: LivenessEvent, frame_ms: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            frame_ms,
            event,
        }
    }

    /// Format for terminal display (with colors)
    pub fn to_terminal_string(&self) -> String {
        format!(
            "{}{:>8.3}s | {:<22} | {}{}",
            self.event.color_code(),
            self.frame_ms as f64 / 1000.0,
            self.event.name(),
            self.event.detail(),
            "\x1b[0m"
        )
    }

    /// Format for parseable output (no colors)
    pub fn to_parseable_string(&self) -> String {
        format!(
            "t={:.3}s | event={} | {}",
            self.frame_ms as f64 / 1000.0,
            self.event.name(),
            self.event.detail()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = LivenessEvent::ChallengeCompleted {
            from: ChallengeType::Smile,
            to: Some(ChallengeType::Blink),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "challenge_completed");
        assert_eq!(json["from"], "smile");
        assert_eq!(json["to"], "blink");
    }

    #[test]
    fn test_stamped_event_flattens() {
        let stamped = StampedEvent::new(LivenessEvent::Positioned, 1500);
        let json = serde_json::to_value(&stamped).unwrap();
        assert_eq!(json["type"], "positioned");
        assert_eq!(json["frame_ms"], 1500);
    }

    #[test]
    fn test_parseable_string_has_no_ansi() {
        let stamped = StampedEvent::new(
            LivenessEvent::challenge_in_progress(ChallengeType::Nod, 1, 3),
            2500,
        );
        let line = stamped.to_parseable_string();
        assert!(!line.contains('\x1b'));
        assert!(line.contains("nod [2/3]"));
    }
}
