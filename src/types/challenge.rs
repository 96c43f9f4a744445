//! Challenge definitions

use serde::{Deserialize, Serialize};

/// Gestures the subject can be asked to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
    Smile,
    Blink,
    TurnLeft,
    TurnRight,
    Nod,
    HeadShake,
}

impl ChallengeType {
    pub const ALL: [ChallengeType; 6] = [
        ChallengeType::Smile,
        ChallengeType::Blink,
        ChallengeType::TurnLeft,
        ChallengeType::TurnRight,
        ChallengeType::Nod,
        ChallengeType::HeadShake,
    ];

    /// Instruction shown to the subject
    pub fn instruction(&self) -> &'static str {
        match self {
            ChallengeType::Smile => "Please smile",
            ChallengeType::Blink => "Please blink your eyes",
            ChallengeType::TurnLeft => "Please turn your head left",
            ChallengeType::TurnRight => "Please turn your head right",
            ChallengeType::Nod => "Please nod your head",
            ChallengeType::HeadShake => "Please shake your head",
        }
    }

    /// Head-turn challenges relax centring and straight-look requirements
    pub fn is_turn(&self) -> bool {
        matches!(self, ChallengeType::TurnLeft | ChallengeType::TurnRight)
    }

    /// Challenges that most subjects complete first time
    pub fn is_easy(&self) -> bool {
        matches!(self, ChallengeType::Smile | ChallengeType::Blink)
    }
}

impl std::fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ChallengeType::Smile => "smile",
            ChallengeType::Blink => "blink",
            ChallengeType::TurnLeft => "turn_left",
            ChallengeType::TurnRight => "turn_right",
            ChallengeType::Nod => "nod",
            ChallengeType::HeadShake => "head_shake",
        };
        write!(f, "{}", name)
    }
}

/// How long a completed challenge took
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeDuration {
    pub challenge: ChallengeType,
    pub duration_ms: u64,
}
