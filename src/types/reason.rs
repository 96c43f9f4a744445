//! Reason codes for rejected frames and user guidance

use serde::{Deserialize, Serialize};

use crate::types::ChallengeType;

/// Why a frame produced no usable face
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoFaceReason {
    /// Detector returned no faces
    NoFaceDetected,
    /// Neither eye-open probability was reported
    MissingEyeData,
    /// Smiling probability was not reported
    MissingSmileData,
    /// No head angle was reported
    MissingHeadPose,
    /// Bounding box is too narrow or too wide to be a face
    ImplausibleAspectRatio,
    /// Bounding box area is below the floor
    FaceTooSmall,
    /// Adapter or detector failed for this frame
    DetectionFailed { detail: String },
}

impl NoFaceReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoFaceDetected => "NF001_NO_FACE",
            Self::MissingEyeData => "NF002_MISSING_EYES",
            Self::MissingSmileData => "NF003_MISSING_SMILE",
            Self::MissingHeadPose => "NF004_MISSING_POSE",
            Self::ImplausibleAspectRatio => "NF005_BAD_ASPECT",
            Self::FaceTooSmall => "NF006_TOO_SMALL",
            Self::DetectionFailed { .. } => "NF007_DETECTION_FAILED",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::NoFaceDetected => "No face in view",
            Self::MissingEyeData => "Eyes not visible",
            Self::MissingSmileData => "Mouth not visible",
            Self::MissingHeadPose => "Head pose unavailable",
            Self::ImplausibleAspectRatio => "Face shape not recognised",
            Self::FaceTooSmall => "Face too small",
            Self::DetectionFailed { .. } => "Face detection failed",
        }
    }
}

impl std::fmt::Display for NoFaceReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DetectionFailed { detail } => {
                write!(f, "{}: {} ({})", self.code(), self.description(), detail)
            }
            _ => write!(f, "{}: {}", self.code(), self.description()),
        }
    }
}

/// Why the anti-spoofing engine withheld a live verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpoofReason {
    /// History shorter than the analysis minimum
    InsufficientData,
    /// Head rotation barely varies (photo)
    TooLittleMotion,
    /// Too many identical consecutive samples (frozen replay)
    StaticFrames,
    /// Face size does not drift (flat surface)
    NoDepthVariation,
    /// Session too young for a verdict
    TooFast,
}

impl SpoofReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientData => "AS001_INSUFFICIENT_DATA",
            Self::TooLittleMotion => "AS002_LOW_MOTION",
            Self::StaticFrames => "AS003_STATIC_FRAMES",
            Self::NoDepthVariation => "AS004_NO_DEPTH",
            Self::TooFast => "AS005_TOO_FAST",
        }
    }

    /// Guidance text for the subject
    pub fn description(&self) -> &'static str {
        match self {
            Self::InsufficientData => "Hold on, analysing",
            Self::TooLittleMotion => "Move your head slightly",
            Self::StaticFrames => "Move naturally",
            Self::NoDepthVariation => "Move slightly closer or further",
            Self::TooFast => "Hold on, analysing",
        }
    }
}

impl std::fmt::Display for SpoofReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}

/// Positioning feedback for the subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Guidance {
    MoveIntoFrame,
    CenterFace,
    LookStraight,
    MoveCloser,
    MoveBack,
    MoveIntoGuide,
    /// Frame is good, stability still accumulating
    HoldStill,
    /// Live-ness evidence still missing
    AntiSpoof { reason: SpoofReason },
    /// Waiting for the neutral pose between challenges
    ReturnToNeutral,
    /// Challenge active, gesture not seen yet
    Perform { challenge: ChallengeType },
}

impl Guidance {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MoveIntoFrame => "G001_INTO_FRAME",
            Self::CenterFace => "G002_CENTER",
            Self::LookStraight => "G003_LOOK_STRAIGHT",
            Self::MoveCloser => "G004_CLOSER",
            Self::MoveBack => "G005_BACK",
            Self::MoveIntoGuide => "G006_INTO_GUIDE",
            Self::HoldStill => "G007_HOLD_STILL",
            Self::AntiSpoof { reason } => reason.code(),
            Self::ReturnToNeutral => "G008_NEUTRAL",
            Self::Perform { .. } => "G009_PERFORM",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::MoveIntoFrame => "Move your face into the frame",
            Self::CenterFace => "Center your face",
            Self::LookStraight => "Look straight at the camera",
            Self::MoveCloser => "Move closer",
            Self::MoveBack => "Move back",
            Self::MoveIntoGuide => "Keep your face inside the circle",
            Self::HoldStill => "Hold still",
            Self::AntiSpoof { reason } => reason.description(),
            Self::ReturnToNeutral => "Relax your face and look straight",
            Self::Perform { challenge } => challenge.instruction(),
        }
    }
}

impl std::fmt::Display for Guidance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_failure_display_carries_detail() {
        let reason = NoFaceReason::DetectionFailed { detail: "no format".to_string() };
        let text = reason.to_string();
        assert!(text.starts_with("NF007_DETECTION_FAILED"));
        assert!(text.contains("no format"));
    }

    #[test]
    fn test_spoof_guidance_uses_spoof_code() {
        let guidance = Guidance::AntiSpoof { reason: SpoofReason::NoDepthVariation };
        assert_eq!(guidance.code(), "AS004_NO_DEPTH");
        assert_eq!(guidance.description(), "Move slightly closer or further");
    }

    #[test]
    fn test_no_face_reason_serializes_tagged() {
        let json = serde_json::to_string(&NoFaceReason::FaceTooSmall).unwrap();
        assert_eq!(json, r#"{"code":"FACE_TOO_SMALL"}"#);
    }
}
