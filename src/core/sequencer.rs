//! Challenge sequencer
//!
//! State transitions:
//! - IDLE → WAITING_FOR_POSITIONING: `begin()`
//! - WAITING_FOR_POSITIONING → CHALLENGE_ACTIVE(0): first positioned, live frame
//! - CHALLENGE_ACTIVE(i) → NEUTRAL_WAIT(i+1): success, neutral pose required
//! - CHALLENGE_ACTIVE(i) → CHALLENGE_ACTIVE(i+1): success, no neutral gating
//! - NEUTRAL_WAIT(i) → CHALLENGE_ACTIVE(i): neutral pose seen
//! - CHALLENGE_ACTIVE(last) → ALL_COMPLETED: success
//! - any → CANCELLED / ERROR: caller cancel or session failure
//!
//! A challenge timeout clears the challenge timer only; the index never
//! moves backwards and never skips.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use crate::config::{ChallengeThresholds, LivenessConfig};
use crate::core::blink::BlinkDetector;
use crate::types::{
    ChallengeDuration, ChallengeType, LivenessError, Progress, ResolvedFace, SequencerState,
};

/// What one frame did to the sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerStep {
    Started {
        challenge: ChallengeType,
        index: usize,
        total: usize,
    },
    Completed {
        challenge: ChallengeType,
        duration_ms: u64,
        next: Option<ChallengeType>,
    },
    AllCompleted,
}

/// An active challenge ran past its timeout and lost its timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeTimeout {
    pub challenge: ChallengeType,
    pub elapsed_ms: u64,
}

/// Order the configured challenges for a session.
///
/// When shuffling, an easy challenge (smile or blink) is moved to the front
/// so the subject warms up on something they will pass.
pub fn plan_challenges<R: Rng + ?Sized>(
    challenges: &[ChallengeType],
    shuffle: bool,
    rng: &mut R,
) -> Vec<ChallengeType> {
    let mut order = challenges.to_vec();
    if !shuffle {
        return order;
    }
    order.shuffle(rng);
    if let Some(pos) = order.iter().position(|c| c.is_easy()) {
        let easy = order.remove(pos);
        order.insert(0, easy);
    }
    order
}

#[derive(Debug, Clone)]
pub struct ChallengeSequencer {
    challenges: Vec<ChallengeType>,
    thresholds: ChallengeThresholds,
    require_neutral: bool,
    challenge_timeout_ms: u64,
    state: SequencerState,
    completed: Vec<ChallengeType>,
    durations: Vec<ChallengeDuration>,
    blink: BlinkDetector,
}

impl ChallengeSequencer {
    /// Create a sequencer over `challenges` (already ordered, at least one)
    pub fn new(config: &LivenessConfig, challenges: Vec<ChallengeType>) -> Result<Self, LivenessError> {
        if challenges.is_empty() {
            return Err(LivenessError::configuration("challenge sequence is empty"));
        }
        let t = &config.thresholds;
        Ok(Self {
            challenges,
            blink: BlinkDetector::new(t.eye_closed, t.eye_open, t.max_blink_duration_ms),
            thresholds: t.clone(),
            require_neutral: config.require_neutral_position,
            challenge_timeout_ms: config.challenge_timeout_ms,
            state: SequencerState::Idle,
            completed: Vec::new(),
            durations: Vec::new(),
        })
    }

    /// IDLE → WAITING_FOR_POSITIONING
    pub fn begin(&mut self) {
        if self.state == SequencerState::Idle {
            self.state = SequencerState::WaitingForPositioning;
        }
    }

    /// Drop all progress and wait for positioning again (new attempt)
    pub fn restart(&mut self) {
        self.completed.clear();
        self.durations.clear();
        self.blink.reset();
        self.state = SequencerState::WaitingForPositioning;
    }

    /// Evaluate one positioned, live frame
    pub fn on_positioned(&mut self, face: &ResolvedFace, now_ms: u64) -> Vec<SequencerStep> {
        match self.state {
            SequencerState::WaitingForPositioning => vec![self.activate(0, face, now_ms)],
            SequencerState::NeutralWait { next_index } => {
                if self.is_neutral(face) {
                    debug!(next_index, "neutral pose reached");
                    vec![self.activate(next_index, face, now_ms)]
                } else {
                    Vec::new()
                }
            }
            SequencerState::ChallengeActive { index, started_at_ms: None } => {
                // fresh timer after a timeout; evaluation resumes next frame
                self.state = SequencerState::ChallengeActive { index, started_at_ms: Some(now_ms) };
                if self.challenges[index] == ChallengeType::Blink {
                    self.blink.reset();
                    self.blink.observe(face.eye_open_average(), now_ms);
                }
                Vec::new()
            }
            SequencerState::ChallengeActive { index, started_at_ms: Some(started) } => {
                let challenge = self.challenges[index];
                if self.validate(challenge, face, now_ms) {
                    self.complete(index, started, face, now_ms)
                } else {
                    Vec::new()
                }
            }
            SequencerState::Idle
            | SequencerState::AllCompleted
            | SequencerState::Cancelled
            | SequencerState::Error => Vec::new(),
        }
    }

    /// Clear the active challenge's timer once it has run longer than the timeout
    pub fn check_timeout(&mut self, now_ms: u64) -> Option<ChallengeTimeout> {
        if let SequencerState::ChallengeActive { index, started_at_ms: Some(started) } = self.state {
            let elapsed_ms = now_ms.saturating_sub(started);
            if elapsed_ms > self.challenge_timeout_ms {
                let challenge = self.challenges[index];
                info!(%challenge, elapsed_ms, "challenge timed out, timer reset");
                self.state = SequencerState::ChallengeActive { index, started_at_ms: None };
                return Some(ChallengeTimeout { challenge, elapsed_ms });
            }
        }
        None
    }

    /// Test a frame against the challenge's rule
    pub fn validate(&mut self, challenge: ChallengeType, face: &ResolvedFace, now_ms: u64) -> bool {
        let t = &self.thresholds;
        match challenge {
            ChallengeType::Smile => face.smiling > t.smile,
            ChallengeType::Blink => self.blink.observe(face.eye_open_average(), now_ms),
            ChallengeType::TurnLeft => face.yaw > t.head_turn,
            ChallengeType::TurnRight => face.yaw < -t.head_turn,
            ChallengeType::Nod => face.pitch.abs() > t.head_turn * t.nod_shake_factor,
            ChallengeType::HeadShake => face.yaw.abs() > t.head_turn * t.nod_shake_factor,
        }
    }

    /// Relaxed face, both eyes open, looking ahead
    pub fn is_neutral(&self, face: &ResolvedFace) -> bool {
        let t = &self.thresholds;
        face.smiling < t.neutral_smile_max
            && face.left_eye_open > t.eye_open
            && face.right_eye_open > t.eye_open
            && face.yaw.abs() < t.neutral_yaw_max
    }

    fn activate(&mut self, index: usize, face: &ResolvedFace, now_ms: u64) -> SequencerStep {
        let challenge = self.challenges[index];
        self.state = SequencerState::ChallengeActive { index, started_at_ms: Some(now_ms) };
        if challenge == ChallengeType::Blink {
            self.blink.reset();
            self.blink.observe(face.eye_open_average(), now_ms);
        }
        debug!(%challenge, index, "challenge started");
        SequencerStep::Started {
            challenge,
            index,
            total: self.challenges.len(),
        }
    }

    fn complete(
        &mut self,
        index: usize,
        started_ms: u64,
        face: &ResolvedFace,
        now_ms: u64,
    ) -> Vec<SequencerStep> {
        let challenge = self.challenges[index];
        let duration_ms = now_ms.saturating_sub(started_ms);
        self.completed.push(challenge);
        self.durations.push(ChallengeDuration { challenge, duration_ms });

        let next_index = index + 1;
        let next = self.challenges.get(next_index).copied();
        info!(%challenge, duration_ms, "challenge completed");

        let mut steps = vec![SequencerStep::Completed { challenge, duration_ms, next }];
        if next.is_none() {
            self.state = SequencerState::AllCompleted;
            steps.push(SequencerStep::AllCompleted);
        } else if self.require_neutral {
            self.state = SequencerState::NeutralWait { next_index };
        } else {
            steps.push(self.activate(next_index, face, now_ms));
        }
        steps
    }

    pub fn cancel(&mut self) {
        if !self.state.is_terminal() {
            self.state = SequencerState::Cancelled;
        }
    }

    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = SequencerState::Error;
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn challenges(&self) -> &[ChallengeType] {
        &self.challenges
    }

    /// Challenge being evaluated or waited for
    pub fn current_challenge(&self) -> Option<ChallengeType> {
        match self.state {
            SequencerState::ChallengeActive { index, .. } => self.challenges.get(index).copied(),
            SequencerState::NeutralWait { next_index } => self.challenges.get(next_index).copied(),
            _ => None,
        }
    }

    /// True while a head-turn challenge is being evaluated
    pub fn turn_active(&self) -> bool {
        matches!(self.state, SequencerState::ChallengeActive { .. })
            && self.current_challenge().is_some_and(|c| c.is_turn())
    }

    pub fn completed(&self) -> &[ChallengeType] {
        &self.completed
    }

    pub fn durations(&self) -> &[ChallengeDuration] {
        &self.durations
    }

    pub fn progress(&self) -> Progress {
        Progress {
            completed: self.completed.len(),
            total: self.challenges.len(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn neutral(ts: u64) -> ResolvedFace {
        ResolvedFace {
            bounding_box: BoundingBox::new(140.0, 220.0, 200.0, 200.0),
            smiling: 0.05,
            left_eye_open: 0.9,
            right_eye_open: 0.9,
            pitch: 0.0,
            yaw: 0.0,
            roll: 0.0,
            timestamp_ms: ts,
        }
    }

    fn sequencer(challenges: Vec<ChallengeType>, require_neutral: bool) -> ChallengeSequencer {
        let config = LivenessConfig {
            require_neutral_position: require_neutral,
            challenge_timeout_ms: 5000,
            ..Default::default()
        };
        let mut seq = ChallengeSequencer::new(&config, challenges).unwrap();
        seq.begin();
        seq
    }

    fn satisfying(challenge: ChallengeType, ts: u64) -> ResolvedFace {
        let mut face = neutral(ts);
        match challenge {
            ChallengeType::Smile => face.smiling = 0.9,
            ChallengeType::Blink => {}
            ChallengeType::TurnLeft => face.yaw = 30.0,
            ChallengeType::TurnRight => face.yaw = -30.0,
            ChallengeType::Nod => face.pitch = 18.0,
            ChallengeType::HeadShake => face.yaw = -18.0,
        }
        face
    }

    /// Drive one challenge to completion from an active state
    fn perform(seq: &mut ChallengeSequencer, challenge: ChallengeType, ts: &mut u64) -> Vec<SequencerStep> {
        *ts += 100;
        if challenge == ChallengeType::Blink {
            let mut closed = neutral(*ts);
            closed.left_eye_open = 0.1;
            closed.right_eye_open = 0.1;
            seq.on_positioned(&closed, *ts);
            *ts += 100;
            seq.on_positioned(&neutral(*ts), *ts)
        } else {
            seq.on_positioned(&satisfying(challenge, *ts), *ts)
        }
    }

    #[test]
    fn test_initial_state_is_waiting_after_begin() {
        let seq = sequencer(vec![ChallengeType::Smile], false);
        assert_eq!(seq.state(), SequencerState::WaitingForPositioning);
        assert_eq!(seq.current_challenge(), None);
    }

    #[test]
    fn test_first_positioned_frame_starts_challenge() {
        let mut seq = sequencer(vec![ChallengeType::Smile, ChallengeType::Blink], false);
        let steps = seq.on_positioned(&neutral(0), 0);
        assert_eq!(
            steps,
            vec![SequencerStep::Started { challenge: ChallengeType::Smile, index: 0, total: 2 }]
        );
        assert_eq!(seq.current_challenge(), Some(ChallengeType::Smile));
    }

    #[test]
    fn test_all_challenges_complete_exactly_once() {
        let all = ChallengeType::ALL.to_vec();
        let mut seq = sequencer(all.clone(), true);
        let mut ts = 0;
        seq.on_positioned(&neutral(ts), ts);

        let mut all_completed = 0;
        for (i, challenge) in all.iter().enumerate() {
            let steps = perform(&mut seq, *challenge, &mut ts);
            all_completed += steps.iter().filter(|s| **s == SequencerStep::AllCompleted).count();
            if i + 1 < all.len() {
                assert_eq!(seq.state(), SequencerState::NeutralWait { next_index: i + 1 });
                ts += 100;
                let steps = seq.on_positioned(&neutral(ts), ts);
                assert!(matches!(steps[0], SequencerStep::Started { index, .. } if index == i + 1));
            }
        }

        assert_eq!(all_completed, 1);
        assert_eq!(seq.state(), SequencerState::AllCompleted);
        assert_eq!(seq.completed(), all.as_slice());
        assert!(seq.durations().iter().all(|d| d.duration_ms > 0));

        // terminal: further frames do nothing
        assert!(seq.on_positioned(&satisfying(ChallengeType::Smile, ts + 100), ts + 100).is_empty());
    }

    #[test]
    fn test_neutral_gating_blocks_next_challenge() {
        let mut seq = sequencer(vec![ChallengeType::Smile, ChallengeType::TurnLeft], true);
        seq.on_positioned(&neutral(0), 0);
        seq.on_positioned(&satisfying(ChallengeType::Smile, 100), 100);
        assert_eq!(seq.state(), SequencerState::NeutralWait { next_index: 1 });

        // still turned: not neutral, turn must not count
        assert!(seq.on_positioned(&satisfying(ChallengeType::TurnLeft, 200), 200).is_empty());
        assert_eq!(seq.state(), SequencerState::NeutralWait { next_index: 1 });
        assert_eq!(seq.completed().len(), 1);
    }

    #[test]
    fn test_without_neutral_next_challenge_starts_immediately() {
        let mut seq = sequencer(vec![ChallengeType::Smile, ChallengeType::Nod], false);
        seq.on_positioned(&neutral(0), 0);
        let steps = seq.on_positioned(&satisfying(ChallengeType::Smile, 100), 100);
        assert_eq!(
            steps,
            vec![
                SequencerStep::Completed {
                    challenge: ChallengeType::Smile,
                    duration_ms: 100,
                    next: Some(ChallengeType::Nod)
                },
                SequencerStep::Started { challenge: ChallengeType::Nod, index: 1, total: 2 },
            ]
        );
    }

    #[test]
    fn test_timeout_resets_timer_without_advancing() {
        let mut seq = sequencer(vec![ChallengeType::Smile, ChallengeType::Blink], false);
        seq.on_positioned(&neutral(1000), 1000);
        assert_eq!(seq.check_timeout(5000), None);

        let step = seq.check_timeout(6001);
        assert_eq!(
            step,
            Some(ChallengeTimeout { challenge: ChallengeType::Smile, elapsed_ms: 5001 })
        );
        assert_eq!(
            seq.state(),
            SequencerState::ChallengeActive { index: 0, started_at_ms: None }
        );

        // next frame restarts the timer, index unchanged
        assert!(seq.on_positioned(&neutral(6100), 6100).is_empty());
        assert_eq!(
            seq.state(),
            SequencerState::ChallengeActive { index: 0, started_at_ms: Some(6100) }
        );
        let steps = seq.on_positioned(&satisfying(ChallengeType::Smile, 6300), 6300);
        assert!(matches!(steps[0], SequencerStep::Completed { duration_ms: 200, .. }));
    }

    #[test]
    fn test_empty_sequence_rejected() {
        let err = ChallengeSequencer::new(&LivenessConfig::default(), Vec::new()).unwrap_err();
        assert_eq!(err.code(), "E007_CONFIGURATION");
    }

    #[test]
    fn test_timeout_reported_once_per_timer() {
        let mut seq = sequencer(vec![ChallengeType::Smile], false);
        assert_eq!(seq.check_timeout(99_000), None);

        seq.on_positioned(&neutral(0), 0);
        assert!(seq.check_timeout(5001).is_some());
        // timer already cleared
        assert_eq!(seq.check_timeout(9000), None);
    }

    #[test]
    fn test_turn_rules_are_signed() {
        let mut seq = sequencer(vec![ChallengeType::TurnLeft], false);
        let mut face = neutral(0);
        face.yaw = -30.0;
        assert!(!seq.validate(ChallengeType::TurnLeft, &face, 0));
        assert!(seq.validate(ChallengeType::TurnRight, &face, 0));
        assert!(seq.validate(ChallengeType::HeadShake, &face, 0));
    }

    #[test]
    fn test_nod_uses_reduced_threshold() {
        let mut seq = sequencer(vec![ChallengeType::Nod], false);
        let mut face = neutral(0);
        face.pitch = -17.0;
        assert!(seq.validate(ChallengeType::Nod, &face, 0));
        face.pitch = 15.0;
        assert!(!seq.validate(ChallengeType::Nod, &face, 0));
    }

    #[test]
    fn test_turn_active_flag() {
        let mut seq = sequencer(vec![ChallengeType::TurnRight], false);
        assert!(!seq.turn_active());
        seq.on_positioned(&neutral(0), 0);
        assert!(seq.turn_active());
    }

    #[test]
    fn test_cancel_is_terminal() {
        let mut seq = sequencer(vec![ChallengeType::Smile], false);
        seq.cancel();
        assert_eq!(seq.state(), SequencerState::Cancelled);
        seq.fail();
        assert_eq!(seq.state(), SequencerState::Cancelled);
    }

    #[test]
    fn test_plan_without_shuffle_keeps_order() {
        let mut rng = StdRng::seed_from_u64(7);
        let order = plan_challenges(&ChallengeType::ALL, false, &mut rng);
        assert_eq!(order, ChallengeType::ALL.to_vec());
    }

    #[test]
    fn test_shuffled_plan_leads_with_easy_challenge() {
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let order = plan_challenges(&ChallengeType::ALL, true, &mut rng);
            assert_eq!(order.len(), ChallengeType::ALL.len());
            assert!(order[0].is_easy());
            for challenge in ChallengeType::ALL {
                assert!(order.contains(&challenge));
            }
        }
    }
}
