//! Face validity filter
//!
//! Rejects detector output that cannot be a usable face and resolves the
//! optional measurements of the accepted face. Absence policy, applied here
//! and nowhere else:
//! - one eye-open probability absent: mirrors the other eye
//! - head angle absent: 0°
//!
//! Frames missing both eyes, the smile probability or every head angle are
//! rejected outright, so no other absence reaches the downstream stages.

use tracing::debug;

use crate::config::ValidityConfig;
use crate::types::{FaceObservation, NoFaceReason, ResolvedFace};

#[derive(Debug, Clone)]
pub struct FaceValidityFilter {
    config: ValidityConfig,
}

impl Default for FaceValidityFilter {
    fn default() -> Self {
        Self::new(ValidityConfig::default())
    }
}

impl FaceValidityFilter {
    pub fn new(config: ValidityConfig) -> Self {
        Self { config }
    }

    /// Pick the primary face and validate it.
    ///
    /// Single-subject design: only the largest face is considered, the
    /// rest are ignored rather than rejected.
    pub fn check(&self, faces: &[FaceObservation]) -> Result<ResolvedFace, NoFaceReason> {
        let face = faces
            .iter()
            .max_by(|a, b| a.bounding_box.area().total_cmp(&b.bounding_box.area()))
            .ok_or(NoFaceReason::NoFaceDetected)?;

        let resolved = self.validate(face);
        if let Err(reason) = &resolved {
            debug!(code = reason.code(), faces = faces.len(), "primary face rejected");
        }
        resolved
    }

    /// Validate a single observation
    pub fn validate(&self, face: &FaceObservation) -> Result<ResolvedFace, NoFaceReason> {
        let (left_eye_open, right_eye_open) = match (
            face.left_eye_open_probability,
            face.right_eye_open_probability,
        ) {
            (None, None) => return Err(NoFaceReason::MissingEyeData),
            (Some(l), Some(r)) => (l, r),
            (Some(l), None) => (l, l),
            (None, Some(r)) => (r, r),
        };

        let smiling = face
            .smiling_probability
            .ok_or(NoFaceReason::MissingSmileData)?;

        if face.head_euler_angle_x.is_none()
            && face.head_euler_angle_y.is_none()
            && face.head_euler_angle_z.is_none()
        {
            return Err(NoFaceReason::MissingHeadPose);
        }

        let bbox = face.bounding_box;
        let aspect = bbox.aspect_ratio();
        if aspect < self.config.min_aspect_ratio || aspect > self.config.max_aspect_ratio {
            return Err(NoFaceReason::ImplausibleAspectRatio);
        }
        if bbox.area() < self.config.min_face_area {
            return Err(NoFaceReason::FaceTooSmall);
        }

        Ok(ResolvedFace {
            bounding_box: bbox,
            smiling: smiling.clamp(0.0, 1.0),
            left_eye_open: left_eye_open.clamp(0.0, 1.0),
            right_eye_open: right_eye_open.clamp(0.0, 1.0),
            pitch: face.head_euler_angle_x.unwrap_or(0.0),
            yaw: face.head_euler_angle_y.unwrap_or(0.0),
            roll: face.head_euler_angle_z.unwrap_or(0.0),
            timestamp_ms: face.timestamp_ms,
        })
    }
}
