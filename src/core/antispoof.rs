//! Anti-spoofing engine
//!
//! Fuses three heuristics over a bounded history of validated faces:
//! - Motion: a live head keeps moving a little (variance of rotation
//!   magnitude, share of near-identical consecutive samples)
//! - Depth: a 3D face drifts toward and away from the camera, a flat
//!   replay keeps a constant size ((max - min) / max of face size)
//! - Timing: a verdict needs a minimum time since the first face
//!
//! The verdict depends on the accumulated window, so it is recomputed on
//! every validated frame.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::AntiSpoofConfig;
use crate::types::{FaceHistory, FaceHistoryEntry, ResolvedFace, SpoofReason};

/// Sub-score weights for the confidence blend (sum = 1.0)
const MOTION_WEIGHT: f64 = 0.4;
const DEPTH_WEIGHT: f64 = 0.35;
const TIMING_WEIGHT: f64 = 0.25;

/// Motion analysis outcome
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MotionAnalysis {
    InsufficientData { samples: usize, required: usize },
    Measured { variance: f64, static_ratio: f64, passed: bool },
}

impl MotionAnalysis {
    pub fn passed(&self) -> bool {
        matches!(self, MotionAnalysis::Measured { passed: true, .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthAnalysis {
    /// (max - min) / max of face size
    pub size_variation: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingAnalysis {
    pub elapsed_ms: u64,
    pub passed: bool,
}

/// Live / not-live decision for one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpoofVerdict {
    pub is_live: bool,
    pub motion: MotionAnalysis,
    pub depth: DepthAnalysis,
    pub timing: TimingAnalysis,
    pub reason: Option<SpoofReason>,
    /// Weighted blend of motion/depth/timing sub-scores, 0.0-1.0
    pub score: f64,
}

/// Anti-spoofing engine with its own history window
#[derive(Debug, Clone)]
pub struct AntiSpoofingEngine {
    config: AntiSpoofConfig,
    history: FaceHistory,
    first_face_ms: Option<u64>,
}

impl Default for AntiSpoofingEngine {
    fn default() -> Self {
        Self::new(AntiSpoofConfig::default())
    }
}

impl AntiSpoofingEngine {
    pub fn new(config: AntiSpoofConfig) -> Self {
        let history = FaceHistory::new(config.max_history_length);
        Self {
            config,
            history,
            first_face_ms: None,
        }
    }

    /// Record a validated face and recompute the verdict
    pub fn observe(&mut self, face: &ResolvedFace) -> SpoofVerdict {
        if self.first_face_ms.is_none() {
            self.first_face_ms = Some(face.timestamp_ms);
        }
        self.history.push(FaceHistoryEntry::from_face(face));

        let verdict = self.evaluate(face.timestamp_ms);
        trace!(
            live = verdict.is_live,
            samples = self.history.len(),
            reason = ?verdict.reason,
            "anti-spoof verdict"
        );
        verdict
    }

    /// Verdict over the current window at time `now_ms`
    pub fn evaluate(&self, now_ms: u64) -> SpoofVerdict {
        let motion = self.analyze_motion();
        let depth = self.analyze_depth();
        let timing = self.analyze_timing(now_ms);

        let reason = if !self.config.enabled {
            None
        } else if let MotionAnalysis::InsufficientData { .. } = motion {
            Some(SpoofReason::InsufficientData)
        } else if let MotionAnalysis::Measured { variance, passed: false, .. } = motion {
            if variance < self.config.min_motion_variance {
                Some(SpoofReason::TooLittleMotion)
            } else {
                Some(SpoofReason::StaticFrames)
            }
        } else if !depth.passed {
            Some(SpoofReason::NoDepthVariation)
        } else if !timing.passed {
            Some(SpoofReason::TooFast)
        } else {
            None
        };

        SpoofVerdict {
            is_live: reason.is_none(),
            motion,
            depth,
            timing,
            reason,
            score: self.score(&motion, &depth, &timing),
        }
    }

    pub fn analyze_motion(&self) -> MotionAnalysis {
        let required = self.config.min_frames_for_analysis;
        if self.history.len() < required {
            return MotionAnalysis::InsufficientData {
                samples: self.history.len(),
                required,
            };
        }

        let samples = self.history.rotation_samples();
        let variance = variance(&samples);

        let deltas = samples.len().saturating_sub(1);
        let static_count = samples
            .windows(2)
            .filter(|w| (w[1] - w[0]).abs() < self.config.static_frame_threshold)
            .count();
        let static_ratio = if deltas == 0 {
            1.0
        } else {
            static_count as f64 / deltas as f64
        };

        let passed = variance >= self.config.min_motion_variance
            && static_ratio <= self.config.max_static_frame_ratio;

        MotionAnalysis::Measured { variance, static_ratio, passed }
    }

    pub fn analyze_depth(&self) -> DepthAnalysis {
        let sizes = self.history.size_samples();
        let size_variation = size_variation(&sizes);
        DepthAnalysis {
            size_variation,
            passed: size_variation >= self.config.min_depth_variation,
        }
    }

    pub fn analyze_timing(&self, now_ms: u64) -> TimingAnalysis {
        let elapsed_ms = self
            .first_face_ms
            .map(|first| now_ms.saturating_sub(first))
            .unwrap_or(0);
        TimingAnalysis {
            elapsed_ms,
            passed: elapsed_ms >= self.config.min_session_duration_ms,
        }
    }

    fn score(&self, motion: &MotionAnalysis, depth: &DepthAnalysis, timing: &TimingAnalysis) -> f64 {
        let motion_score = match motion {
            MotionAnalysis::InsufficientData { .. } => 0.0,
            MotionAnalysis::Measured { variance, static_ratio, .. } => {
                0.5 * ratio_score(*variance, self.config.min_motion_variance)
                    + 0.5 * (1.0 - static_ratio).clamp(0.0, 1.0)
            }
        };
        let depth_score = ratio_score(depth.size_variation, self.config.min_depth_variation);
        let timing_score = ratio_score(
            timing.elapsed_ms as f64,
            self.config.min_session_duration_ms as f64,
        );

        (MOTION_WEIGHT * motion_score + DEPTH_WEIGHT * depth_score + TIMING_WEIGHT * timing_score)
            .clamp(0.0, 1.0)
    }

    pub fn history(&self) -> &FaceHistory {
        &self.history
    }

    pub fn first_face_ms(&self) -> Option<u64> {
        self.first_face_ms
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.first_face_ms = None;
    }
}

/// Population variance; 0.0 for an empty slice
pub fn variance(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n
}

/// (max - min) / max; 0.0 when empty or max is not positive
pub fn size_variation(sizes: &[f64]) -> f64 {
    let max = sizes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = sizes.iter().copied().fold(f64::INFINITY, f64::min);
    if sizes.is_empty() || max <= 0.0 {
        return 0.0;
    }
    (max - min) / max
}

/// Maps `value` so that reaching `threshold` scores 0.5 and twice it scores 1.0
fn ratio_score(value: f64, threshold: f64) -> f64 {
    if threshold <= 0.0 {
        return 1.0;
    }
    (value / (2.0 * threshold)).clamp(0.0, 1.0)
}
