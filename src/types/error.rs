//! Liveness error taxonomy

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every failure the engine can surface to its caller
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LivenessError {
    #[error("camera error: {detail}")]
    Camera { detail: String },

    #[error("camera permission denied")]
    Permission,

    #[error("face detection error: {detail}")]
    FaceDetection { detail: String },

    #[error("attempt {attempt} timed out after {elapsed_ms} ms")]
    Timeout { attempt: u32, elapsed_ms: u64 },

    #[error("maximum attempts exceeded ({max_attempts})")]
    MaxAttemptsExceeded { max_attempts: u32 },

    #[error("anti-spoofing checks failed: {reason}")]
    AntiSpoofingFailed { reason: String },

    #[error("invalid configuration: {detail}")]
    Configuration { detail: String },

    #[error("device not supported: {detail}")]
    DeviceNotSupported { detail: String },

    #[error("cancelled by user")]
    UserCancelled,

    #[error("{detail}")]
    Unknown { detail: String },
}

impl LivenessError {
    pub fn configuration(detail: impl Into<String>) -> Self {
        Self::Configuration { detail: detail.into() }
    }

    pub fn face_detection(detail: impl Into<String>) -> Self {
        Self::FaceDetection { detail: detail.into() }
    }

    pub fn camera(detail: impl Into<String>) -> Self {
        Self::Camera { detail: detail.into() }
    }

    /// Stable code string (for logging and clients)
    pub fn code(&self) -> &'static str {
        match self {
            Self::Camera { .. } => "E001_CAMERA",
            Self::Permission => "E002_PERMISSION",
            Self::FaceDetection { .. } => "E003_FACE_DETECTION",
            Self::Timeout { .. } => "E004_TIMEOUT",
            Self::MaxAttemptsExceeded { .. } => "E005_MAX_ATTEMPTS",
            Self::AntiSpoofingFailed { .. } => "E006_ANTI_SPOOFING",
            Self::Configuration { .. } => "E007_CONFIGURATION",
            Self::DeviceNotSupported { .. } => "E008_DEVICE",
            Self::UserCancelled => "E009_CANCELLED",
            Self::Unknown { .. } => "E999_UNKNOWN",
        }
    }

    /// Whether the session keeps running after this error is reported
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::AntiSpoofingFailed { .. } | Self::FaceDetection { .. }
        )
    }
}

impl From<toml::de::Error> for LivenessError {
    fn from(err: toml::de::Error) -> Self {
        Self::configuration(err.to_string())
    }
}

impl From<std::io::Error> for LivenessError {
    fn from(err: std::io::Error) -> Self {
        Self::Unknown { detail: err.to_string() }
    }
}
