//! Raw camera frames and detector input images

use serde::{Deserialize, Serialize};

/// One image plane as delivered by the camera
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub bytes: Vec<u8>,
    /// Bytes between the starts of two consecutive rows
    pub row_stride: usize,
    /// Bytes between two consecutive samples of a row
    pub pixel_stride: usize,
}

impl Plane {
    pub fn new(bytes: Vec<u8>, row_stride: usize, pixel_stride: usize) -> Self {
        Self { bytes, row_stride, pixel_stride }
    }
}

/// A frame straight from the camera stream
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub planes: Vec<Plane>,
    /// Sensor orientation relative to the display, in degrees
    pub rotation_degrees: u16,
    /// Capture time in milliseconds on the session clock
    pub timestamp_ms: u64,
}

/// Pixel encodings the detector understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Y plane followed by interleaved V/U
    Nv21,
    /// Y, U and V planes packed one after another
    Yuv420,
    /// 4 bytes per pixel
    Bgra8888,
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PixelFormat::Nv21 => "NV21",
            PixelFormat::Yuv420 => "YUV420",
            PixelFormat::Bgra8888 => "BGRA8888",
        };
        write!(f, "{}", name)
    }
}

/// Tightly packed image handed to the face detector
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorInput {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub rotation_degrees: u16,
    pub bytes: Vec<u8>,
}

impl DetectorInput {
    /// Row stride of the packed buffer's first plane
    pub fn row_stride(&self) -> usize {
        match self.format {
            PixelFormat::Nv21 | PixelFormat::Yuv420 => self.width as usize,
            PixelFormat::Bgra8888 => self.width as usize * 4,
        }
    }
}
