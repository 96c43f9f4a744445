//! Session outcome and snapshot structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    BoundingBox, ChallengeDuration, ChallengeType, Guidance, LivenessError, SequencerState,
    StabilityState,
};

/// Final outcome of a liveness session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivenessResult {
    pub verified: bool,
    /// Completed challenges, in completion order
    pub completed_challenges: Vec<ChallengeType>,
    pub challenge_durations: Vec<ChallengeDuration>,
    pub total_duration_ms: u64,
    /// 0.0-1.0
    pub confidence: f64,
    /// Attempts used, including the final one
    pub attempt_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<LivenessError>,
    pub completed_at: DateTime<Utc>,
}

impl LivenessResult {
    pub fn verified(
        completed_challenges: Vec<ChallengeType>,
        challenge_durations: Vec<ChallengeDuration>,
        total_duration_ms: u64,
        confidence: f64,
        attempt_count: u32,
    ) -> Self {
        Self {
            verified: true,
            completed_challenges,
            challenge_durations,
            total_duration_ms,
            confidence: confidence.clamp(0.0, 1.0),
            attempt_count,
            failure_reason: None,
            completed_at: Utc::now(),
        }
    }

    pub fn failed(
        completed_challenges: Vec<ChallengeType>,
        challenge_durations: Vec<ChallengeDuration>,
        total_duration_ms: u64,
        attempt_count: u32,
        reason: LivenessError,
    ) -> Self {
        Self {
            verified: false,
            completed_challenges,
            challenge_durations,
            total_duration_ms,
            confidence: 0.0,
            attempt_count,
            failure_reason: Some(reason),
            completed_at: Utc::now(),
        }
    }

    /// Duration recorded for `challenge`, if it was completed
    pub fn duration_of(&self, challenge: ChallengeType) -> Option<u64> {
        self.challenge_durations
            .iter()
            .find(|d| d.challenge == challenge)
            .map(|d| d.duration_ms)
    }
}

/// Challenge progress counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64
    }
}

/// Point-in-time view of a session for accessors and the HTTP API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: SequencerState,
    pub current_challenge: Option<ChallengeType>,
    pub progress: Progress,
    pub bounding_box: Option<BoundingBox>,
    /// Latest instruction shown to the subject
    pub guidance: Option<Guidance>,
    pub stability: StabilityState,
    pub attempt: u32,
    pub live: bool,
    pub frames_processed: u64,
}
