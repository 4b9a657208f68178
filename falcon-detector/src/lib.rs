use falcon_frame::Frame;
use falcon_types::RawDetection;

#[derive(thiserror::Error, Debug)]
pub enum DetectorError {
    #[error("detector backend failure: {0}")]
    Backend(String),
}

/// The two modes a detector adapter can be asked to run in (4.5), matching
/// the camera pipeline's object/map mode switch (4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMode {
    Object,
    Pose,
}

/// Seam over the actual detection/pose model. Real model weights and
/// inference internals are out of scope (1); this crate only fixes the
/// shape callers depend on.
pub trait Detector: Send + Sync {
    fn detect_objects(&self, frame: &Frame) -> Result<Vec<RawDetection>, DetectorError>;

    /// Pose keypoints for one already-detected object's crop region, used
    /// by the rescue-level estimator (4.8).
    fn detect_pose(&self, frame: &Frame, bbox: &falcon_types::BBox) -> Result<Vec<falcon_types::Keypoint>, DetectorError>;
}

/// A canned-output test double so the camera pipeline's control flow is
/// testable without real model weights.
#[derive(Debug, Default)]
pub struct NullDetector {
    pub objects: Vec<RawDetection>,
    pub keypoints: Vec<falcon_types::Keypoint>,
}

impl Detector for NullDetector {
    fn detect_objects(&self, _frame: &Frame) -> Result<Vec<RawDetection>, DetectorError> {
        Ok(self.objects.clone())
    }

    fn detect_pose(&self, _frame: &Frame, _bbox: &falcon_types::BBox) -> Result<Vec<falcon_types::Keypoint>, DetectorError> {
        Ok(self.keypoints.clone())
    }
}
