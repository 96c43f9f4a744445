//! Session configuration
//!
//! Every field has a default from the crate-level constants, so a TOML file
//! only needs the values it overrides:
//!
//! ```toml
//! challenges = ["smile", "blink", "turn_left"]
//! shuffle_challenges = true
//!
//! [thresholds]
//! smile = 0.55
//!
//! [stability]
//! good_frame_count = 4
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{ChallengeType, LivenessError};

/// Per-challenge validation thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengeThresholds {
    pub smile: f64,
    pub eye_closed: f64,
    pub eye_open: f64,
    pub max_blink_duration_ms: u64,
    /// Degrees of yaw for turn_left / turn_right
    pub head_turn: f64,
    /// Fraction of `head_turn` required for nod and head_shake
    pub nod_shake_factor: f64,
    pub neutral_smile_max: f64,
    pub neutral_yaw_max: f64,
}

impl Default for ChallengeThresholds {
    fn default() -> Self {
        Self {
            smile: crate::SMILE_THRESHOLD,
            eye_closed: crate::EYE_CLOSED_THRESHOLD,
            eye_open: crate::EYE_OPEN_THRESHOLD,
            max_blink_duration_ms: crate::MAX_BLINK_DURATION_MS,
            head_turn: crate::HEAD_TURN_THRESHOLD,
            nod_shake_factor: crate::NOD_SHAKE_FACTOR,
            neutral_smile_max: crate::NEUTRAL_SMILE_MAX,
            neutral_yaw_max: crate::NEUTRAL_YAW_MAX,
        }
    }
}

/// Validity filter limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidityConfig {
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
    pub min_face_area: f64,
}

impl Default for ValidityConfig {
    fn default() -> Self {
        Self {
            min_aspect_ratio: crate::MIN_FACE_ASPECT_RATIO,
            max_aspect_ratio: crate::MAX_FACE_ASPECT_RATIO,
            min_face_area: crate::MIN_FACE_AREA_PX,
        }
    }
}

/// Anti-spoofing sensitivity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiSpoofConfig {
    pub enabled: bool,
    pub max_history_length: usize,
    pub min_frames_for_analysis: usize,
    pub static_frame_threshold: f64,
    pub min_motion_variance: f64,
    pub max_static_frame_ratio: f64,
    pub min_depth_variation: f64,
    pub min_session_duration_ms: u64,
}

impl Default for AntiSpoofConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_history_length: crate::MAX_HISTORY_LENGTH,
            min_frames_for_analysis: crate::MIN_FRAMES_FOR_ANALYSIS,
            static_frame_threshold: crate::STATIC_FRAME_THRESHOLD,
            min_motion_variance: crate::MIN_MOTION_VARIANCE,
            max_static_frame_ratio: crate::MAX_STATIC_FRAME_RATIO,
            min_depth_variation: crate::MIN_DEPTH_VARIATION,
            min_session_duration_ms: crate::MIN_SESSION_DURATION_MS,
        }
    }
}

/// Framing requirements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositioningConfig {
    pub center_tolerance: f64,
    pub straight_angle_tolerance: f64,
    pub min_face_area_ratio: f64,
    pub max_face_area_ratio: f64,
    pub guide_center_x: f64,
    pub guide_center_y: f64,
    pub guide_radius_fraction: f64,
    /// Guide radius multiplier while a head-turn challenge is active
    pub turn_tolerance_factor: f64,
}

impl Default for PositioningConfig {
    fn default() -> Self {
        Self {
            center_tolerance: crate::CENTER_TOLERANCE,
            straight_angle_tolerance: crate::STRAIGHT_ANGLE_TOLERANCE,
            min_face_area_ratio: crate::MIN_FACE_AREA_RATIO,
            max_face_area_ratio: crate::MAX_FACE_AREA_RATIO,
            guide_center_x: crate::GUIDE_CENTER_X,
            guide_center_y: crate::GUIDE_CENTER_Y,
            guide_radius_fraction: crate::GUIDE_RADIUS_FRACTION,
            turn_tolerance_factor: crate::TURN_TOLERANCE_FACTOR,
        }
    }
}

/// Hysteresis tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    pub good_frame_count: u32,
    pub bad_frame_count: u32,
    pub grace_period_ms: u64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            good_frame_count: crate::STABILITY_GOOD_FRAME_COUNT,
            bad_frame_count: crate::STABILITY_BAD_FRAME_COUNT,
            grace_period_ms: crate::STABILITY_GRACE_PERIOD_MS,
        }
    }
}

/// Complete session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    pub challenges: Vec<ChallengeType>,
    pub shuffle_challenges: bool,
    pub require_neutral_position: bool,
    /// Analyse every Nth eligible frame
    pub frame_skip: u32,
    pub challenge_timeout_ms: u64,
    pub session_timeout_ms: u64,
    pub max_attempts: u32,
    pub thresholds: ChallengeThresholds,
    pub validity: ValidityConfig,
    pub anti_spoof: AntiSpoofConfig,
    pub positioning: PositioningConfig,
    pub stability: StabilityConfig,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            challenges: vec![
                ChallengeType::Smile,
                ChallengeType::Blink,
                ChallengeType::TurnLeft,
                ChallengeType::TurnRight,
            ],
            shuffle_challenges: false,
            require_neutral_position: false,
            frame_skip: crate::FRAME_SKIP,
            challenge_timeout_ms: crate::CHALLENGE_TIMEOUT_MS,
            session_timeout_ms: crate::SESSION_TIMEOUT_MS,
            max_attempts: crate::MAX_ATTEMPTS,
            thresholds: ChallengeThresholds::default(),
            validity: ValidityConfig::default(),
            anti_spoof: AntiSpoofConfig::default(),
            positioning: PositioningConfig::default(),
            stability: StabilityConfig::default(),
        }
    }
}

impl LivenessConfig {
    /// Tighter thresholds, neutral pose required between challenges
    pub fn strict() -> Self {
        Self {
            challenges: ChallengeType::ALL.to_vec(),
            shuffle_challenges: true,
            require_neutral_position: true,
            thresholds: ChallengeThresholds {
                smile: 0.75,
                head_turn: 25.0,
                ..Default::default()
            },
            anti_spoof: AntiSpoofConfig {
                min_frames_for_analysis: 15,
                min_depth_variation: 0.025,
                min_session_duration_ms: 3000,
                ..Default::default()
            },
            challenge_timeout_ms: 15_000,
            ..Default::default()
        }
    }

    /// Looser thresholds for low-end cameras
    pub fn lenient() -> Self {
        Self {
            challenges: vec![ChallengeType::Smile, ChallengeType::Blink],
            thresholds: ChallengeThresholds {
                smile: 0.5,
                head_turn: 15.0,
                ..Default::default()
            },
            anti_spoof: AntiSpoofConfig {
                min_motion_variance: 0.05,
                max_static_frame_ratio: 0.9,
                min_depth_variation: 0.01,
                ..Default::default()
            },
            frame_skip: 3,
            challenge_timeout_ms: 30_000,
            ..Default::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file(path: &str) -> Result<Self, LivenessError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LivenessError::configuration(format!("{}: {}", path, e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(s: &str) -> Result<Self, LivenessError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, LivenessError> {
        toml::to_string_pretty(self).map_err(|e| LivenessError::configuration(e.to_string()))
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<(), LivenessError> {
        if self.challenges.is_empty() {
            return Err(LivenessError::configuration("challenge list is empty"));
        }
        if self.frame_skip == 0 {
            return Err(LivenessError::configuration("frame_skip must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(LivenessError::configuration("max_attempts must be at least 1"));
        }
        if self.challenge_timeout_ms == 0 || self.session_timeout_ms == 0 {
            return Err(LivenessError::configuration("timeouts must be positive"));
        }

        let t = &self.thresholds;
        for (name, value) in [
            ("smile", t.smile),
            ("eye_closed", t.eye_closed),
            ("eye_open", t.eye_open),
            ("neutral_smile_max", t.neutral_smile_max),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(LivenessError::configuration(format!(
                    "threshold {} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if t.eye_closed >= t.eye_open {
            return Err(LivenessError::configuration(
                "eye_closed threshold must be below eye_open threshold",
            ));
        }
        if t.head_turn <= 0.0 || t.nod_shake_factor <= 0.0 {
            return Err(LivenessError::configuration("head angle thresholds must be positive"));
        }

        let v = &self.validity;
        if v.min_aspect_ratio <= 0.0 || v.min_aspect_ratio >= v.max_aspect_ratio {
            return Err(LivenessError::configuration("invalid face aspect-ratio range"));
        }

        let a = &self.anti_spoof;
        if a.max_history_length == 0 {
            return Err(LivenessError::configuration("max_history_length must be at least 1"));
        }
        if a.min_frames_for_analysis < 2 || a.min_frames_for_analysis > a.max_history_length {
            return Err(LivenessError::configuration(format!(
                "min_frames_for_analysis must be within [2, {}]",
                a.max_history_length
            )));
        }
        if !(0.0..=1.0).contains(&a.max_static_frame_ratio) {
            return Err(LivenessError::configuration("max_static_frame_ratio must be within [0, 1]"));
        }

        let p = &self.positioning;
        if p.min_face_area_ratio <= 0.0 || p.min_face_area_ratio >= p.max_face_area_ratio {
            return Err(LivenessError::configuration("invalid face area-ratio range"));
        }
        if p.guide_radius_fraction <= 0.0 || p.center_tolerance <= 0.0 {
            return Err(LivenessError::configuration("guide radius and center tolerance must be positive"));
        }

        if self.stability.good_frame_count == 0 || self.stability.bad_frame_count == 0 {
            return Err(LivenessError::configuration("stability frame counts must be at least 1"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(LivenessConfig::default().validate().is_ok());
        assert!(LivenessConfig::strict().validate().is_ok());
        assert!(LivenessConfig::lenient().validate().is_ok());
    }

    #[test]
    fn test_defaults_match_constants() {
        let config = LivenessConfig::default();
        assert_eq!(config.anti_spoof.max_history_length, 30);
        assert_eq!(config.anti_spoof.min_frames_for_analysis, 10);
        assert_eq!(config.stability.good_frame_count, 3);
        assert_eq!(config.stability.bad_frame_count, 5);
        assert_eq!(config.stability.grace_period_ms, 1500);
        assert_eq!(config.challenge_timeout_ms, 20_000);
        assert_eq!(config.thresholds.max_blink_duration_ms, 1000);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LivenessConfig::from_toml_str(
            r#"
            challenges = ["smile", "blink"]

            [thresholds]
            smile = 0.55
            "#,
        )
        .unwrap();
        assert_eq!(config.challenges, vec![ChallengeType::Smile, ChallengeType::Blink]);
        assert_eq!(config.thresholds.smile, 0.55);
        assert_eq!(config.thresholds.eye_open, crate::EYE_OPEN_THRESHOLD);
        assert_eq!(config.frame_skip, crate::FRAME_SKIP);
    }

    #[test]
    fn test_empty_challenges_rejected() {
        let config = LivenessConfig { challenges: vec![], ..Default::default() };
        assert!(matches!(config.validate(), Err(LivenessError::Configuration { .. })));
    }

    #[test]
    fn test_inverted_eye_thresholds_rejected() {
        let mut config = LivenessConfig::default();
        config.thresholds.eye_closed = 0.8;
        config.thresholds.eye_open = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_frame_skip_rejected() {
        let config = LivenessConfig { frame_skip: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_challenge_is_config_error() {
        let err = LivenessConfig::from_toml_str(r#"challenges = ["wink"]"#).unwrap_err();
        assert_eq!(err.code(), "E007_CONFIGURATION");
    }

    #[test]
    fn test_toml_round_trip_of_strict_preset() {
        let text = LivenessConfig::strict().to_toml_string().unwrap();
        let parsed = LivenessConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, LivenessConfig::strict());
    }
}
