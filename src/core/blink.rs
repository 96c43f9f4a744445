//! Edge-triggered blink detection
//!
//! A blink registers only on the closed → open transition, and only when the
//! closure lasted at most `max_blink_duration_ms`. Sustained closure never
//! registers; after an over-long closure the eyes must be seen open again
//! before a new closure can start.

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlinkPhase {
    /// No open sample seen yet (or the last closure expired)
    AwaitingOpen,
    Open,
    Closed { since_ms: u64 },
}

#[derive(Debug, Clone)]
pub struct BlinkDetector {
    closed_threshold: f64,
    open_threshold: f64,
    max_blink_duration_ms: u64,
    phase: BlinkPhase,
    blink_count: u32,
}

impl BlinkDetector {
    pub fn new(closed_threshold: f64, open_threshold: f64, max_blink_duration_ms: u64) -> Self {
        Self {
            closed_threshold,
            open_threshold,
            max_blink_duration_ms,
            phase: BlinkPhase::AwaitingOpen,
            blink_count: 0,
        }
    }

    /// Feed the average eye-open probability; returns true when a blink completes
    pub fn observe(&mut self, eye_open_average: f64, now_ms: u64) -> bool {
        let closed = eye_open_average < self.closed_threshold;
        let open = eye_open_average > self.open_threshold;

        match self.phase {
            BlinkPhase::AwaitingOpen => {
                if open {
                    self.phase = BlinkPhase::Open;
                }
                false
            }
            BlinkPhase::Open => {
                if closed {
                    debug!(now_ms, "eyes closed");
                    self.phase = BlinkPhase::Closed { since_ms: now_ms };
                }
                false
            }
            BlinkPhase::Closed { since_ms } => {
                let closed_for = now_ms.saturating_sub(since_ms);
                if closed_for > self.max_blink_duration_ms {
                    debug!(closed_for, "closure too long, not a blink");
                    self.phase = if open { BlinkPhase::Open } else { BlinkPhase::AwaitingOpen };
                    false
                } else if open {
                    debug!(closed_for, "blink");
                    self.phase = BlinkPhase::Open;
                    self.blink_count += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn blink_count(&self) -> u32 {
        self.blink_count
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.phase, BlinkPhase::Closed { .. })
    }

    pub fn reset(&mut self) {
        self.phase = BlinkPhase::AwaitingOpen;
        self.blink_count = 0;
    }
}
