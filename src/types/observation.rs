//! Per-frame face measurements as produced by the detector

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in image pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Width over height; zero for a degenerate box
    pub fn aspect_ratio(&self) -> f64 {
        if self.height <= 0.0 {
            return 0.0;
        }
        self.width / self.height
    }

    pub fn diagonal(&self) -> f64 {
        (self.width * self.width + self.height * self.height).sqrt()
    }

    pub fn center(&self) -> (f64, f64) {
        (self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

/// One detected face, as reported by the detector.
///
/// Probabilities and angles are `None` when the detector could not
/// compute them. Head angles follow the usual mobile-SDK convention:
/// X = pitch, Y = yaw, Z = roll, all in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceObservation {
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub smiling_probability: Option<f64>,
    #[serde(default)]
    pub left_eye_open_probability: Option<f64>,
    #[serde(default)]
    pub right_eye_open_probability: Option<f64>,
    #[serde(default)]
    pub head_euler_angle_x: Option<f64>,
    #[serde(default)]
    pub head_euler_angle_y: Option<f64>,
    #[serde(default)]
    pub head_euler_angle_z: Option<f64>,
    /// Capture time in milliseconds on the session clock
    #[serde(default)]
    pub timestamp_ms: u64,
}

impl FaceObservation {
    /// Observation with only a bounding box; every measurement absent
    pub fn bare(bounding_box: BoundingBox, timestamp_ms: u64) -> Self {
        Self {
            bounding_box,
            smiling_probability: None,
            left_eye_open_probability: None,
            right_eye_open_probability: None,
            head_euler_angle_x: None,
            head_euler_angle_y: None,
            head_euler_angle_z: None,
            timestamp_ms,
        }
    }
}

/// A face that passed the validity filter, with every optional field
/// resolved to a concrete value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFace {
    pub bounding_box: BoundingBox,
    pub smiling: f64,
    pub left_eye_open: f64,
    pub right_eye_open: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
    pub timestamp_ms: u64,
}

impl ResolvedFace {
    pub fn eye_open_average(&self) -> f64 {
        (self.left_eye_open + self.right_eye_open) / 2.0
    }

    /// √(yaw² + pitch² + roll²)
    pub fn rotation_magnitude(&self) -> f64 {
        (self.yaw * self.yaw + self.pitch * self.pitch + self.roll * self.roll).sqrt()
    }
}

/// Dimensions of the image the bounding boxes refer to
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub width: f64,
    pub height: f64,
}

impl FrameGeometry {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }
}
