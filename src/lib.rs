//! liveguard: liveness detection orchestration engine
//!
//! Pipeline per analysed frame:
//! camera frame → image adapter → detector → validity filter →
//! anti-spoofing → positioning/stability → challenge sequencer → events

pub mod config;
pub mod core;
pub mod logging;
pub mod replay;
pub mod types;

pub use config::LivenessConfig;
pub use types::{LivenessError, LivenessEvent, LivenessResult};

// =============================================================================
// VALIDITY FILTER
// =============================================================================

/// Accepted bounding-box aspect ratio (width / height)
pub const MIN_FACE_ASPECT_RATIO: f64 = 0.4;
pub const MAX_FACE_ASPECT_RATIO: f64 = 2.5;

/// Smallest bounding-box area accepted as a face (px²)
pub const MIN_FACE_AREA_PX: f64 = 1000.0;

// =============================================================================
// ANTI-SPOOFING
// =============================================================================

/// Capacity of the per-session face history window
pub const MAX_HISTORY_LENGTH: usize = 30;

/// Samples required before motion analysis yields a verdict
pub const MIN_FRAMES_FOR_ANALYSIS: usize = 10;

/// Rotation delta (degrees) under which two consecutive samples count as static
pub const STATIC_FRAME_THRESHOLD: f64 = 0.1;

/// Minimum variance of rotation magnitude (deg²)
pub const MIN_MOTION_VARIANCE: f64 = 0.1;

/// Maximum share of static consecutive deltas
pub const MAX_STATIC_FRAME_RATIO: f64 = 0.8;

/// Minimum (max-min)/max spread of face size
pub const MIN_DEPTH_VARIATION: f64 = 0.015;

/// Minimum time since first face before a verdict can be live (milliseconds)
pub const MIN_SESSION_DURATION_MS: u64 = 2000;

// =============================================================================
// POSITIONING & STABILITY
// =============================================================================

/// Allowed face-centre offset as a fraction of image width/height
pub const CENTER_TOLERANCE: f64 = 0.2;

/// Max absolute head angle (degrees) for looking straight
pub const STRAIGHT_ANGLE_TOLERANCE: f64 = 15.0;

/// Face area as a fraction of image area
pub const MIN_FACE_AREA_RATIO: f64 = 0.05;
pub const MAX_FACE_AREA_RATIO: f64 = 0.6;

/// Guide circle, as fractions of the image (centre) and of its shorter side (radius)
pub const GUIDE_CENTER_X: f64 = 0.5;
pub const GUIDE_CENTER_Y: f64 = 0.5;
pub const GUIDE_RADIUS_FRACTION: f64 = 0.35;

/// Guide-region relaxation while a head-turn challenge is active
pub const TURN_TOLERANCE_FACTOR: f64 = 1.5;

/// Consecutive good frames for Unstable → Stable
pub const STABILITY_GOOD_FRAME_COUNT: u32 = 3;

/// Consecutive bad frames tolerated while Stable
pub const STABILITY_BAD_FRAME_COUNT: u32 = 5;

/// Time since last good frame tolerated while Stable (milliseconds)
pub const STABILITY_GRACE_PERIOD_MS: u64 = 1500;

// =============================================================================
// CHALLENGES
// =============================================================================

pub const SMILE_THRESHOLD: f64 = 0.6;

/// Eye-open average below this counts as closed
pub const EYE_CLOSED_THRESHOLD: f64 = 0.3;

/// Eye-open average above this counts as open
pub const EYE_OPEN_THRESHOLD: f64 = 0.6;

/// Longest closure that still counts as a blink (milliseconds)
pub const MAX_BLINK_DURATION_MS: u64 = 1000;

/// Head yaw needed for a turn (degrees)
pub const HEAD_TURN_THRESHOLD: f64 = 20.0;

/// Multiplier applied to the turn threshold for nod and head-shake
pub const NOD_SHAKE_FACTOR: f64 = 0.8;

/// Neutral pose limits between challenges
pub const NEUTRAL_SMILE_MAX: f64 = 0.3;
pub const NEUTRAL_YAW_MAX: f64 = 10.0;

/// Per-challenge timeout (milliseconds)
pub const CHALLENGE_TIMEOUT_MS: u64 = 20_000;

// =============================================================================
// SESSION
// =============================================================================

/// Whole-attempt timeout (milliseconds)
pub const SESSION_TIMEOUT_MS: u64 = 60_000;

/// Attempts before the session fails for good
pub const MAX_ATTEMPTS: u32 = 3;

/// Analyse every Nth eligible frame
pub const FRAME_SKIP: u32 = 2;

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "1.0.0";
