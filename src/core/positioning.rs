//! Framing quality predicates for the dominant face

use serde::{Deserialize, Serialize};

use crate::config::PositioningConfig;
use crate::types::{FrameGeometry, Guidance, ResolvedFace};

/// Per-frame framing evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositioningReport {
    pub in_frame: bool,
    pub centered: bool,
    pub looking_straight: bool,
    pub good_size: bool,
    pub within_guide: bool,
    /// Face area / image area
    pub area_ratio: f64,
    /// Centering and straight-look were not required (head-turn challenge)
    pub relaxed: bool,
}

impl PositioningReport {
    /// Raw per-frame quality fed to the stability filter
    pub fn is_good(&self) -> bool {
        let base = self.in_frame && self.good_size && self.within_guide;
        if self.relaxed {
            base
        } else {
            base && self.centered && self.looking_straight
        }
    }

    /// First problem to fix, or `None` when the frame is good
    pub fn guidance(&self, config: &PositioningConfig) -> Option<Guidance> {
        if !self.in_frame {
            Some(Guidance::MoveIntoFrame)
        } else if !self.good_size {
            if self.area_ratio < config.min_face_area_ratio {
                Some(Guidance::MoveCloser)
            } else {
                Some(Guidance::MoveBack)
            }
        } else if !self.within_guide {
            Some(Guidance::MoveIntoGuide)
        } else if self.relaxed {
            None
        } else if !self.centered {
            Some(Guidance::CenterFace)
        } else if !self.looking_straight {
            Some(Guidance::LookStraight)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct PositioningEvaluator {
    config: PositioningConfig,
}

impl Default for PositioningEvaluator {
    fn default() -> Self {
        Self::new(PositioningConfig::default())
    }
}

impl PositioningEvaluator {
    pub fn new(config: PositioningConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PositioningConfig {
        &self.config
    }

    /// Guide circle `(center_x, center_y, radius)` in image pixels
    pub fn guide_circle(&self, frame: FrameGeometry) -> (f64, f64, f64) {
        (
            frame.width * self.config.guide_center_x,
            frame.height * self.config.guide_center_y,
            frame.width.min(frame.height) * self.config.guide_radius_fraction,
        )
    }

    /// Evaluate framing; `relaxed` is set while a head-turn challenge is active
    pub fn evaluate(&self, face: &ResolvedFace, frame: FrameGeometry, relaxed: bool) -> PositioningReport {
        let bbox = face.bounding_box;

        let in_frame = bbox.left >= 0.0
            && bbox.top >= 0.0
            && bbox.right() <= frame.width
            && bbox.bottom() <= frame.height;

        let (face_x, face_y) = bbox.center();
        let (image_x, image_y) = frame.center();
        let centered = (face_x - image_x).abs() <= self.config.center_tolerance * frame.width
            && (face_y - image_y).abs() <= self.config.center_tolerance * frame.height;

        let tolerance = self.config.straight_angle_tolerance;
        let looking_straight =
            face.yaw.abs() < tolerance && face.pitch.abs() < tolerance && face.roll.abs() < tolerance;

        let area_ratio = if frame.area() > 0.0 { bbox.area() / frame.area() } else { 0.0 };
        let good_size = area_ratio >= self.config.min_face_area_ratio
            && area_ratio <= self.config.max_face_area_ratio;

        let (guide_x, guide_y, mut radius) = self.guide_circle(frame);
        if relaxed {
            radius *= self.config.turn_tolerance_factor;
        }
        let distance = ((face_x - guide_x).powi(2) + (face_y - guide_y).powi(2)).sqrt();
        let within_guide = distance <= radius;

        PositioningReport {
            in_frame,
            centered,
            looking_straight,
            good_size,
            within_guide,
            area_ratio,
            relaxed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    const FRAME: FrameGeometry = FrameGeometry { width: 480.0, height: 640.0 };

    fn face_at(left: f64, top: f64, size: f64, yaw: f64) -> ResolvedFace {
        ResolvedFace {
            bounding_box: BoundingBox::new(left, top, size, size),
            smiling: 0.0,
            left_eye_open: 0.9,
            right_eye_open: 0.9,
            pitch: 0.0,
            yaw,
            roll: 0.0,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn test_centered_straight_face_is_good() {
        let evaluator = PositioningEvaluator::default();
        let report = evaluator.evaluate(&face_at(140.0, 220.0, 200.0, 2.0), FRAME, false);
        assert!(report.in_frame && report.centered && report.looking_straight);
        assert!(report.good_size && report.within_guide);
        assert!(report.is_good());
        assert_eq!(report.guidance(evaluator.config()), None);
    }

    #[test]
    fn test_out_of_frame() {
        let evaluator = PositioningEvaluator::default();
        let report = evaluator.evaluate(&face_at(-20.0, 220.0, 200.0, 0.0), FRAME, false);
        assert!(!report.in_frame);
        assert_eq!(report.guidance(evaluator.config()), Some(Guidance::MoveIntoFrame));
    }

    #[test]
    fn test_size_guidance() {
        let evaluator = PositioningEvaluator::default();
        let small = evaluator.evaluate(&face_at(220.0, 300.0, 40.0, 0.0), FRAME, false);
        assert_eq!(small.guidance(evaluator.config()), Some(Guidance::MoveCloser));
        let large = evaluator.evaluate(&face_at(0.0, 80.0, 470.0, 0.0), FRAME, false);
        assert_eq!(large.guidance(evaluator.config()), Some(Guidance::MoveBack));
    }

    #[test]
    fn test_turned_head_fails_straight_unless_relaxed() {
        let evaluator = PositioningEvaluator::default();
        let turned = face_at(140.0, 220.0, 200.0, 30.0);
        let strict = evaluator.evaluate(&turned, FRAME, false);
        assert!(!strict.is_good());
        assert_eq!(strict.guidance(evaluator.config()), Some(Guidance::LookStraight));

        let relaxed = evaluator.evaluate(&turned, FRAME, true);
        assert!(relaxed.is_good());
    }

    #[test]
    fn test_relaxed_guide_radius() {
        let evaluator = PositioningEvaluator::default();
        // centre offset 200 px: outside 168 px radius, inside 1.5x
        let face = face_at(140.0, 420.0, 200.0, 0.0);
        let (gx, gy, r) = evaluator.guide_circle(FRAME);
        assert_eq!((gx, gy, r), (240.0, 320.0, 168.0));
        assert!(!evaluator.evaluate(&face, FRAME, false).within_guide);
        assert!(evaluator.evaluate(&face, FRAME, true).within_guide);
    }
}
