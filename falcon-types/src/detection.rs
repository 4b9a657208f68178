use serde::{Deserialize, Serialize};

use crate::camera::CameraId;
use crate::class::ClassTag;

/// Axis-aligned pixel bounding box, `(x0, y0)` inclusive, `(x1, y1)` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).max(0.0)
    }

    /// The point the area-mapping rule (4.14/4.16) tests against named
    /// polygons: bottom edge, horizontal midpoint.
    pub fn bottom_center(&self) -> (f32, f32) {
        ((self.x0 + self.x1) / 2.0, self.y1)
    }
}

/// 2D body keypoint used by the rescue-level estimator (4.8).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

/// One detector output for one object in one frame, before tracking has
/// assigned it a stable id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub class: ClassTag,
    pub confidence: f32,
    pub bbox: BBox,
    /// Present only when the detector ran in pose mode for this object.
    pub keypoints: Option<Vec<Keypoint>>,
    /// The detector's own short-lived per-frame track id, if it tracks
    /// internally; fed to the stable-id tracker (4.6).
    pub transient_track_id: Option<i64>,
}

/// One tracked object, after 4.6 has assigned (or recognized) a stable id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub object_id: String,
    pub class: ClassTag,
    pub confidence: f32,
    pub bbox: BBox,
    pub rescue_level: Option<u32>,
}

/// All detections produced for one captured frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionBatch {
    pub camera_id: CameraId,
    pub frame_id: u64,
    /// Capture-time timestamp, milliseconds since the Unix epoch.
    pub instant_ms: i64,
    pub detections: Vec<Detection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bottom_center_is_horizontal_midpoint_of_bottom_edge() {
        let b = BBox { x0: 10.0, y0: 20.0, x1: 30.0, y1: 50.0 };
        assert_eq!(b.bottom_center(), (20.0, 50.0));
    }

    #[test]
    fn width_height_never_negative_for_swapped_corners() {
        let b = BBox { x0: 30.0, y0: 50.0, x1: 10.0, y1: 20.0 };
        assert_eq!(b.width(), 0.0);
        assert_eq!(b.height(), 0.0);
    }
}
