//! Session state definitions

use serde::{Deserialize, Serialize};

/// Challenge sequencer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SequencerState {
    /// Session not started
    Idle,
    /// Waiting for the first stable, live framing
    WaitingForPositioning,
    /// Challenge `index` is being evaluated; `started_at_ms` is cleared on timeout
    ChallengeActive {
        index: usize,
        started_at_ms: Option<u64>,
    },
    /// Previous challenge done, waiting for a neutral pose before `next_index`
    NeutralWait { next_index: usize },
    /// Every challenge completed
    AllCompleted,
    /// Stopped by the caller
    Cancelled,
    /// Failed for good
    Error,
}

impl SequencerState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SequencerState::AllCompleted | SequencerState::Cancelled | SequencerState::Error
        )
    }

    /// ANSI color code for terminal display
    pub fn color_code(&self) -> &'static str {
        match self {
            SequencerState::Idle => "\x1b[90m",
            SequencerState::WaitingForPositioning => "\x1b[33m",
            SequencerState::ChallengeActive { .. } => "\x1b[36m",
            SequencerState::NeutralWait { .. } => "\x1b[33m",
            SequencerState::AllCompleted => "\x1b[32m",
            SequencerState::Cancelled | SequencerState::Error => "\x1b[31m",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            SequencerState::Idle => "⏳",
            SequencerState::WaitingForPositioning => "🔶",
            SequencerState::ChallengeActive { .. } => "🎯",
            SequencerState::NeutralWait { .. } => "😐",
            SequencerState::AllCompleted => "✅",
            SequencerState::Cancelled => "⏹",
            SequencerState::Error => "🔴",
        }
    }
}

impl std::fmt::Display for SequencerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SequencerState::Idle => "IDLE",
            SequencerState::WaitingForPositioning => "WAITING_FOR_POSITIONING",
            SequencerState::ChallengeActive { .. } => "CHALLENGE_ACTIVE",
            SequencerState::NeutralWait { .. } => "NEUTRAL_WAIT",
            SequencerState::AllCompleted => "ALL_COMPLETED",
            SequencerState::Cancelled => "CANCELLED",
            SequencerState::Error => "ERROR",
        };
        write!(f, "{}", name)
    }
}

/// Counters behind the stability filter, for snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StabilityState {
    pub consecutive_good_frames: u32,
    pub consecutive_bad_frames: u32,
    pub last_good_ms: Option<u64>,
    pub stable: bool,
}
