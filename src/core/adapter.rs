//! Camera frame → detector input conversion
//!
//! Camera stacks disagree on plane layout, so the adapter tries an ordered
//! list of pixel formats and returns the first encoding that succeeds.

use tracing::trace;

use crate::types::{DetectorInput, LivenessError, PixelFormat, Plane, RawFrame};

pub trait ImageAdapter: Send + Sync {
    fn convert(&self, frame: &RawFrame) -> Result<DetectorInput, LivenessError>;
}

/// Tries each candidate format in order
#[derive(Debug, Clone)]
pub struct FormatFallbackAdapter {
    candidates: Vec<PixelFormat>,
}

impl Default for FormatFallbackAdapter {
    fn default() -> Self {
        Self::new(vec![PixelFormat::Nv21, PixelFormat::Yuv420, PixelFormat::Bgra8888])
    }
}

impl FormatFallbackAdapter {
    pub fn new(candidates: Vec<PixelFormat>) -> Self {
        Self { candidates }
    }

    pub fn candidates(&self) -> &[PixelFormat] {
        &self.candidates
    }

    /// Pack `frame` as `format`, or explain why it does not fit
    pub fn encode(format: PixelFormat, frame: &RawFrame) -> Result<Vec<u8>, String> {
        let w = frame.width as usize;
        let h = frame.height as usize;
        if w == 0 || h == 0 {
            return Err("empty frame".to_string());
        }
        let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));

        match format {
            PixelFormat::Nv21 => {
                let [y, vu] = planes::<2>(frame)?;
                let mut out = Vec::with_capacity(w * h + 2 * cw * ch);
                pack_rows(y, w, h, 1, &mut out)?;
                pack_rows(vu, 2 * cw, ch, 1, &mut out)?;
                Ok(out)
            }
            PixelFormat::Yuv420 => {
                let [y, u, v] = planes::<3>(frame)?;
                let mut out = Vec::with_capacity(w * h + 2 * cw * ch);
                pack_rows(y, w, h, 1, &mut out)?;
                pack_rows(u, cw, ch, u.pixel_stride.max(1), &mut out)?;
                pack_rows(v, cw, ch, v.pixel_stride.max(1), &mut out)?;
                Ok(out)
            }
            PixelFormat::Bgra8888 => {
                let [bgra] = planes::<1>(frame)?;
                let mut out = Vec::with_capacity(w * h * 4);
                pack_rows(bgra, w * 4, h, 1, &mut out)?;
                Ok(out)
            }
        }
    }
}

impl ImageAdapter for FormatFallbackAdapter {
    fn convert(&self, frame: &RawFrame) -> Result<DetectorInput, LivenessError> {
        let mut failures = Vec::new();
        for &format in &self.candidates {
            match Self::encode(format, frame) {
                Ok(bytes) => {
                    return Ok(DetectorInput {
                        width: frame.width,
                        height: frame.height,
                        format,
                        rotation_degrees: frame.rotation_degrees,
                        bytes,
                    })
                }
                Err(why) => {
                    trace!(%format, %why, "format rejected");
                    failures.push(format!("{}: {}", format, why));
                }
            }
        }
        Err(LivenessError::face_detection(format!(
            "no usable pixel format ({})",
            failures.join("; ")
        )))
    }
}

fn planes<const N: usize>(frame: &RawFrame) -> Result<[&Plane; N], String> {
    if frame.planes.len() != N {
        return Err(format!("expected {} planes, got {}", N, frame.planes.len()));
    }
    let mut out = [&frame.planes[0]; N];
    for (slot, plane) in out.iter_mut().zip(&frame.planes) {
        *slot = plane;
    }
    Ok(out)
}

/// Copy `rows` rows of `samples` samples, dropping row and pixel padding
fn pack_rows(
    plane: &Plane,
    samples: usize,
    rows: usize,
    pixel_stride: usize,
    out: &mut Vec<u8>,
) -> Result<(), String> {
    let row_bytes = (samples - 1) * pixel_stride + 1;
    if plane.row_stride < row_bytes {
        return Err(format!("row stride {} < {} bytes", plane.row_stride, row_bytes));
    }
    let needed = plane.row_stride * (rows - 1) + row_bytes;
    if plane.bytes.len() < needed {
        return Err(format!("plane has {} bytes, needs {}", plane.bytes.len(), needed));
    }

    for row in 0..rows {
        let start = row * plane.row_stride;
        let line = &plane.bytes[start..start + row_bytes];
        if pixel_stride == 1 {
            out.extend_from_slice(line);
        } else {
            out.extend(line.iter().step_by(pixel_stride));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frame(width: u32, height: u32, planes: Vec<Plane>) -> RawFrame {
        RawFrame { width, height, planes, rotation_degrees: 270, timestamp_ms: 0 }
    }

    #[test]
    fn test_nv21_strips_row_padding() {
        // 4x2 luma with 2 bytes of padding per row, 4 bytes of VU
        let y = Plane::new(vec![1, 2, 3, 4, 0, 0, 5, 6, 7, 8, 0, 0], 6, 1);
        let vu = Plane::new(vec![9, 10, 11, 12], 4, 2);
        let input = FormatFallbackAdapter::default()
            .convert(&frame(4, 2, vec![y, vu]))
            .unwrap();
        assert_eq!(input.format, PixelFormat::Nv21);
        assert_eq!(input.bytes, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        assert_eq!(input.rotation_degrees, 270);
        assert_eq!(input.row_stride(), 4);
    }

    #[test]
    fn test_three_planes_fall_back_to_yuv420() {
        let y = Plane::new(vec![1, 2, 3, 4], 2, 1);
        // chroma with pixel stride 2 (interleaved buffer view)
        let u = Plane::new(vec![5, 0], 2, 2);
        let v = Plane::new(vec![6, 0], 2, 2);
        let input = FormatFallbackAdapter::default()
            .convert(&frame(2, 2, vec![y, u, v]))
            .unwrap();
        assert_eq!(input.format, PixelFormat::Yuv420);
        assert_eq!(input.bytes, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_single_plane_is_bgra() {
        let bgra = Plane::new((0..16).collect(), 8, 4);
        let input = FormatFallbackAdapter::default()
            .convert(&frame(2, 2, vec![bgra]))
            .unwrap();
        assert_eq!(input.format, PixelFormat::Bgra8888);
        assert_eq!(input.bytes.len(), 16);
        assert_eq!(input.row_stride(), 8);
    }

    #[test]
    fn test_short_buffer_fails_every_candidate() {
        let bgra = Plane::new(vec![0; 10], 8, 4);
        let err = FormatFallbackAdapter::default()
            .convert(&frame(2, 2, vec![bgra]))
            .unwrap_err();
        assert_eq!(err.code(), "E003_FACE_DETECTION");
        assert!(err.to_string().contains("BGRA8888"));
    }

    #[test]
    fn test_candidate_order_is_respected() {
        let adapter = FormatFallbackAdapter::new(vec![PixelFormat::Bgra8888]);
        let y = Plane::new(vec![0; 4], 2, 1);
        let vu = Plane::new(vec![0; 2], 2, 2);
        assert!(adapter.convert(&frame(2, 2, vec![y, vu])).is_err());
    }
}
