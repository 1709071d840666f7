//! Fixed-ratio crop geometry.
//!
//! The capture screen shows a card-shaped alignment frame at a fixed
//! position. The crop rectangle is derived from the photo's own dimensions
//! only: a centered box `width_ratio` of the photo wide with a card aspect
//! ratio. No card edge detection is attempted.

/// Fraction of the photo width covered by the alignment frame.
pub const DEFAULT_WIDTH_RATIO: f64 = 0.85;

/// Width / height of a standard business card.
pub const CARD_ASPECT_RATIO: f64 = 1.6;

/// A crop rectangle in (fractional) pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A crop rectangle snapped to whole pixels inside the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Centered crop for a `width` × `height` photo.
///
/// `crop_width = width_ratio · width`, `crop_height = crop_width / aspect_ratio`,
/// origin `((width − crop_width) / 2, (height − crop_height) / 2)`. On a
/// landscape photo the box can be taller than the image; the origin is
/// negative then, and [`CropRect::to_pixels`] clamps it.
pub fn card_crop(width: f64, height: f64, width_ratio: f64, aspect_ratio: f64) -> CropRect {
    let crop_width = width * width_ratio;
    let crop_height = crop_width / aspect_ratio;
    CropRect {
        x: (width - crop_width) / 2.0,
        y: (height - crop_height) / 2.0,
        width: crop_width,
        height: crop_height,
    }
}

impl CropRect {
    /// Round to whole pixels and clamp into a `width` × `height` image.
    ///
    /// Returns `None` when nothing of the rectangle is left inside the image.
    pub fn to_pixels(&self, width: u32, height: u32) -> Option<PixelRect> {
        let clamp = |v: f64, max: u32| v.round().clamp(0.0, f64::from(max)) as u32;

        let left = clamp(self.x, width);
        let top = clamp(self.y, height);
        let right = clamp(self.x + self.width, width);
        let bottom = clamp(self.y + self.height, height);

        if right <= left || bottom <= top {
            return None;
        }

        Some(PixelRect {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        })
    }
}
