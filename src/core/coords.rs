//! Detector space → display space
//!
//! Detector boxes are in sensor coordinates, rotated 270° relative to a
//! portrait display. Mapping rotates the box into portrait orientation, then
//! aspect-fits the rotated image into the display, centring it (letterbox
//! bars top/bottom or pillarbox bars left/right).

use crate::types::{BoundingBox, FrameGeometry};

/// Scale and offsets of the fitted image inside the display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayFit {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

/// Rotate a sensor-space box by 270°: `(x, y) → (y, W - x)`
pub fn rotate_270(bbox: BoundingBox, image: FrameGeometry) -> BoundingBox {
    BoundingBox::new(
        bbox.top,
        image.width - bbox.right(),
        bbox.height,
        bbox.width,
    )
}

/// Fit `image` (already upright) into `display`
pub fn fit(image: FrameGeometry, display: FrameGeometry) -> DisplayFit {
    if image.width <= 0.0 || image.height <= 0.0 {
        return DisplayFit { scale: 0.0, offset_x: 0.0, offset_y: 0.0 };
    }
    let scale = (display.width / image.width).min(display.height / image.height);
    DisplayFit {
        scale,
        offset_x: (display.width - image.width * scale) / 2.0,
        offset_y: (display.height - image.height * scale) / 2.0,
    }
}

/// Map a detector box from a `image`-sized sensor frame onto `display`
pub fn map_to_display(bbox: BoundingBox, image: FrameGeometry, display: FrameGeometry) -> BoundingBox {
    let rotated = rotate_270(bbox, image);
    let upright = FrameGeometry::new(image.height, image.width);
    let fit = fit(upright, display);
    BoundingBox::new(
        rotated.left * fit.scale + fit.offset_x,
        rotated.top * fit.scale + fit.offset_y,
        rotated.width * fit.scale,
        rotated.height * fit.scale,
    )
}
