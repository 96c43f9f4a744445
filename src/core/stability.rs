//! Stability filter: hysteresis over the per-frame positioning signal
//!
//! State transitions:
//! - UNSTABLE → STABLE: `good_frame_count` consecutive good frames
//! - STABLE → STABLE: bad frame while bad streak < `bad_frame_count`
//!   or time since last good frame ≤ `grace_period_ms`
//! - STABLE → UNSTABLE: both limits exceeded (last-good timestamp cleared)

use tracing::debug;

use crate::config::StabilityConfig;
use crate::types::StabilityState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Unstable { good_streak: u32 },
    Stable { good_streak: u32, bad_streak: u32, last_good_ms: u64 },
}

/// Result of feeding one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityTransition {
    BecameStable,
    BecameUnstable,
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct StabilityFilter {
    config: StabilityConfig,
    phase: Phase,
}

impl Default for StabilityFilter {
    fn default() -> Self {
        Self::new(StabilityConfig::default())
    }
}

impl StabilityFilter {
    pub fn new(config: StabilityConfig) -> Self {
        Self {
            config,
            phase: Phase::Unstable { good_streak: 0 },
        }
    }

    /// Feed one frame's raw quality
    pub fn update(&mut self, good: bool, now_ms: u64) -> StabilityTransition {
        let (next, transition) = match (self.phase, good) {
            (Phase::Unstable { good_streak }, true) => {
                let streak = good_streak + 1;
                if streak >= self.config.good_frame_count {
                    (
                        Phase::Stable { good_streak: streak, bad_streak: 0, last_good_ms: now_ms },
                        StabilityTransition::BecameStable,
                    )
                } else {
                    (Phase::Unstable { good_streak: streak }, StabilityTransition::Unchanged)
                }
            }
            (Phase::Unstable { .. }, false) => {
                (Phase::Unstable { good_streak: 0 }, StabilityTransition::Unchanged)
            }
            (Phase::Stable { good_streak, .. }, true) => (
                Phase::Stable { good_streak: good_streak + 1, bad_streak: 0, last_good_ms: now_ms },
                StabilityTransition::Unchanged,
            ),
            (Phase::Stable { bad_streak, last_good_ms, .. }, false) => {
                let streak = bad_streak + 1;
                let within_count = streak < self.config.bad_frame_count;
                let within_grace = now_ms.saturating_sub(last_good_ms) <= self.config.grace_period_ms;
                if within_count || within_grace {
                    (
                        Phase::Stable { good_streak: 0, bad_streak: streak, last_good_ms },
                        StabilityTransition::Unchanged,
                    )
                } else {
                    (Phase::Unstable { good_streak: 0 }, StabilityTransition::BecameUnstable)
                }
            }
        };

        if transition != StabilityTransition::Unchanged {
            debug!(?transition, now_ms, "stability transition");
        }
        self.phase = next;
        transition
    }

    pub fn is_stable(&self) -> bool {
        matches!(self.phase, Phase::Stable { .. })
    }

    pub fn state(&self) -> StabilityState {
        match self.phase {
            Phase::Unstable { good_streak } => StabilityState {
                consecutive_good_frames: good_streak,
                consecutive_bad_frames: 0,
                last_good_ms: None,
                stable: false,
            },
            Phase::Stable { good_streak, bad_streak, last_good_ms } => StabilityState {
                consecutive_good_frames: good_streak,
                consecutive_bad_frames: bad_streak,
                last_good_ms: Some(last_good_ms),
                stable: true,
            },
        }
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Unstable { good_streak: 0 };
    }
}

// =============================================================================
// TESTS
// =============================================================================
