use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Detector output: a face rectangle in source-image pixels, with optional
/// facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    /// Integer `(top, right, bottom, left)` box, rounded to the nearest pixel.
    /// May lie partly outside the image; cropping clamps it.
    pub fn to_face_box(&self) -> FaceBox {
        FaceBox {
            top: self.y.round() as i64,
            right: (self.x + self.width).round() as i64,
            bottom: (self.y + self.height).round() as i64,
            left: self.x.round() as i64,
        }
    }

    /// Intersection-over-union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.width * self.height + other.width * other.height - inter;

        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }
}

/// Face rectangle in `(top, right, bottom, left)` pixel coordinates;
/// `bottom` and `right` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
    pub left: i64,
}

impl FaceBox {
    pub fn new(top: i64, right: i64, bottom: i64, left: i64) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }

    pub fn width(&self) -> i64 {
        self.right - self.left
    }
}

/// One detection in one source image. `index` is the detector's output
/// position and only disambiguates outputs of the same source.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub bounding_box: FaceBox,
    pub source_id: String,
    pub index: usize,
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

/// Detector choice: a cost/accuracy trade-off made by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionModel {
    /// SCRFD 500M, small and quick.
    #[default]
    Fast,
    /// SCRFD 10G. Slower, but finds smaller and harder faces.
    Accurate,
}

impl DetectionModel {
    /// ONNX file name inside the model directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Fast => "det_500m.onnx",
            Self::Accurate => "det_10g.onnx",
        }
    }
}

impl fmt::Display for DetectionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fast => "fast",
            Self::Accurate => "accurate",
        })
    }
}

impl FromStr for DetectionModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" | "hog" => Ok(Self::Fast),
            "accurate" | "cnn" => Ok(Self::Accurate),
            other => Err(format!("unknown detection model `{other}` (expected fast or accurate)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: f32, y: f32, w: f32, h: f32) -> BoundingBox {
        BoundingBox {
            x,
            y,
            width: w,
            height: h,
            confidence: 0.9,
            landmarks: None,
        }
    }

    #[test]
    fn test_to_face_box() {
        let b = bbox(50.0, 50.0, 100.0, 100.0).to_face_box();
        assert_eq!(b, FaceBox::new(50, 150, 150, 50));
        assert_eq!(b.height(), 100);
        assert_eq!(b.width(), 100);
    }

    #[test]
    fn test_to_face_box_rounds() {
        let b = bbox(-3.4, 10.6, 20.2, 19.7).to_face_box();
        assert_eq!(b, FaceBox::new(11, 17, 30, -3));
    }

    #[test]
    fn test_iou_identical() {
        let a = bbox(0.0, 0.0, 100.0, 100.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_partial() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(5.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(20.0, 20.0, 10.0, 10.0);
        assert!(a.iou(&b).abs() < 1e-6);
    }

    #[test]
    fn test_detection_model_parse() {
        assert_eq!("fast".parse::<DetectionModel>().unwrap(), DetectionModel::Fast);
        assert_eq!("Accurate".parse::<DetectionModel>().unwrap(), DetectionModel::Accurate);
        assert_eq!("cnn".parse::<DetectionModel>().unwrap(), DetectionModel::Accurate);
        assert!("best".parse::<DetectionModel>().is_err());
        assert_eq!(DetectionModel::Accurate.to_string(), "accurate");
        assert_eq!(DetectionModel::Fast.file_name(), "det_500m.onnx");
    }
}
