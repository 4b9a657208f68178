use std::collections::{BTreeMap, HashMap};

use falcon_frame::Frame;
use falcon_types::{CameraId, DetectionBatch};

const DEFAULT_MAX_AGE_MS: i64 = 1_000;
const DEFAULT_MAX_GAP_FRAMES: u64 = 5;

struct Entry {
    frame: Option<Frame>,
    detections: Option<DetectionBatch>,
    inserted_at_ms: i64,
}

/// Holds recent frames and their detections per camera so a late-arriving
/// detection batch can still be matched to its frame, and a frame that
/// arrives with no detections yet can borrow the nearest earlier frame's
/// detections for rendering (4.10), within a bounded frame-id gap.
pub struct FrameBuffer {
    max_age_ms: i64,
    max_gap_frames: u64,
    per_camera: HashMap<CameraId, BTreeMap<u64, Entry>>,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        FrameBuffer {
            max_age_ms: DEFAULT_MAX_AGE_MS,
            max_gap_frames: DEFAULT_MAX_GAP_FRAMES,
            per_camera: HashMap::new(),
        }
    }
}

impl FrameBuffer {
    pub fn new(max_age_ms: i64, max_gap_frames: u64) -> Self {
        FrameBuffer {
            max_age_ms,
            max_gap_frames,
            per_camera: HashMap::new(),
        }
    }

    pub fn insert_frame(&mut self, frame: Frame, now_ms: i64) {
        let camera_id = frame.camera_id;
        let frame_id = frame.frame_id;
        let cam = self.per_camera.entry(camera_id).or_default();
        cam.entry(frame_id)
            .and_modify(|e| e.frame = Some(frame.clone()))
            .or_insert(Entry { frame: Some(frame), detections: None, inserted_at_ms: now_ms });
        self.evict_expired(camera_id, now_ms);
    }

    pub fn insert_detections(&mut self, camera_id: CameraId, batch: DetectionBatch, now_ms: i64) {
        let frame_id = batch.frame_id;
        let cam = self.per_camera.entry(camera_id).or_default();
        cam.entry(frame_id)
            .and_modify(|e| e.detections = Some(batch.clone()))
            .or_insert(Entry { frame: None, detections: Some(batch), inserted_at_ms: now_ms });
        self.evict_expired(camera_id, now_ms);
    }

    /// Returns the frame for `frame_id` and the best detections to render
    /// with it: its own if present, otherwise the nearest earlier frame's
    /// detections as long as the gap is within `max_gap_frames`.
    pub fn get_for_render(&self, camera_id: CameraId, frame_id: u64) -> Option<(&Frame, Option<&DetectionBatch>)> {
        let cam = self.per_camera.get(&camera_id)?;
        let frame = cam.get(&frame_id)?.frame.as_ref()?;

        if let Some(Some(batch)) = cam.get(&frame_id).map(|e| e.detections.as_ref()) {
            return Some((frame, Some(batch)));
        }

        let fallback = cam
            .range(..frame_id)
            .rev()
            .find(|(id, e)| frame_id - **id <= self.max_gap_frames && e.detections.is_some());
        Some((frame, fallback.and_then(|(_, e)| e.detections.as_ref())))
    }

    fn evict_expired(&mut self, camera_id: CameraId, now_ms: i64) {
        if let Some(cam) = self.per_camera.get_mut(&camera_id) {
            cam.retain(|_, e| now_ms - e.inserted_at_ms <= self.max_age_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use falcon_types::Detection;
    use image::RgbImage;

    fn cam() -> CameraId {
        CameraId::new("A").unwrap()
    }

    fn frame(frame_id: u64) -> Frame {
        Frame::new(cam(), frame_id, RgbImage::new(4, 4))
    }

    fn batch(frame_id: u64) -> DetectionBatch {
        DetectionBatch {
            camera_id: cam(),
            frame_id,
            instant_ms: 0,
            detections: vec![Detection {
                object_id: "1".into(),
                class: falcon_types::ClassTag::Bird,
                confidence: 0.5,
                bbox: falcon_types::BBox { x0: 0.0, y0: 0.0, x1: 1.0, y1: 1.0 },
                rescue_level: None,
            }],
        }
    }

    #[test]
    fn matching_frame_and_detections_pair_directly() {
        let mut fb = FrameBuffer::default();
        fb.insert_frame(frame(10), 0);
        fb.insert_detections(cam(), batch(10), 0);
        let (_f, dets) = fb.get_for_render(cam(), 10).unwrap();
        assert!(dets.is_some());
    }

    #[test]
    fn frame_with_no_own_detections_borrows_nearest_earlier_within_gap() {
        let mut fb = FrameBuffer::default();
        fb.insert_detections(cam(), batch(10), 0);
        fb.insert_frame(frame(12), 0);
        let (_f, dets) = fb.get_for_render(cam(), 12).unwrap();
        assert_eq!(dets.unwrap().frame_id, 10);
    }

    #[test]
    fn gap_beyond_threshold_returns_no_detections() {
        let mut fb = FrameBuffer::new(10_000, 5);
        fb.insert_detections(cam(), batch(1), 0);
        fb.insert_frame(frame(10), 0);
        let (_f, dets) = fb.get_for_render(cam(), 10).unwrap();
        assert!(dets.is_none());
    }

    #[test]
    fn entries_older_than_max_age_are_evicted() {
        let mut fb = FrameBuffer::new(100, 5);
        fb.insert_frame(frame(1), 0);
        fb.insert_frame(frame(2), 500); // triggers eviction pass at t=500
        assert!(fb.get_for_render(cam(), 1).is_none());
        assert!(fb.get_for_render(cam(), 2).is_some());
    }

    #[test]
    fn unknown_frame_id_returns_none() {
        let fb = FrameBuffer::default();
        assert!(fb.get_for_render(cam(), 999).is_none());
    }
}
