//! Crop geometry: padding a face box and clamping it to the image.

use crate::types::FaceBox;

/// Crop rectangle inside image bounds; `bottom` and `right` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl CropRegion {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// Grow `face` by `padding` (a fraction of its size) and clamp to a
/// `width × height` image.
///
/// The box grows by `padding × height` vertically and `padding × width`
/// horizontally in total, split evenly between both sides. A 100px box
/// padded by 0.2 gains 10px on every side. Negative padding is treated as
/// zero. Returns `None` when the clamped region is empty.
pub fn pad_and_clamp(face: FaceBox, padding: f32, width: u32, height: u32) -> Option<CropRegion> {
    let padding = padding.max(0.0) as f64;
    let pad_v = (face.height() as f64 * padding / 2.0).round();
    let pad_h = (face.width() as f64 * padding / 2.0).round();

    // Clamped in f64 so an arbitrarily large padding saturates at the edges.
    let clamp = |value: f64, limit: u32| value.clamp(0.0, limit as f64) as i64;
    let top = clamp(face.top as f64 - pad_v, height);
    let bottom = clamp(face.bottom as f64 + pad_v, height);
    let left = clamp(face.left as f64 - pad_h, width);
    let right = clamp(face.right as f64 + pad_h, width);

    if bottom <= top || right <= left {
        return None;
    }

    Some(CropRegion {
        top: top as u32,
        right: right as u32,
        bottom: bottom as u32,
        left: left as u32,
    })
}
