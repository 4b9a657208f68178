use falcon_refiner::RefinerConfig;
use falcon_rescue::RescueEstimator;
use falcon_tracker::Tracker;
use falcon_types::{BBox, CameraId, Detection, DetectionBatch, RawDetection};
use image::RgbImage;

/// Turns one frame's raw detector output into a stable-id, refined,
/// rescue-scored batch (4.6-4.8), wiring the three per-object components
/// together the way the camera pipeline's inference task calls them.
pub fn process_raw_detections(
    tracker: &mut Tracker,
    rescue: &mut RescueEstimator,
    refiner_config: &RefinerConfig,
    frame_image: &RgbImage,
    camera_id: CameraId,
    frame_id: u64,
    instant_ms: i64,
    raw: Vec<RawDetection>,
) -> DetectionBatch {
    let mut seen_transient_ids = Vec::new();
    let mut detections = Vec::with_capacity(raw.len());

    for r in &raw {
        if let Some(tid) = r.transient_track_id {
            seen_transient_ids.push(tid);
        }
        let object_id = tracker.assign(camera_id, r.transient_track_id, instant_ms);

        let class = if r.class.is_refinable() {
            falcon_refiner::refine(frame_image, r.class, &r.bbox, refiner_config).unwrap_or(r.class)
        } else {
            r.class
        };

        let rescue_level = if class.is_pose_eligible() {
            let is_fallen = is_fallen_pose(r);
            rescue.update(&object_id, is_fallen, instant_ms)
        } else {
            None
        };

        detections.push(Detection {
            object_id,
            class,
            confidence: r.confidence,
            bbox: r.bbox,
            rescue_level,
        });
    }

    tracker.evict_unseen(camera_id, &seen_transient_ids);

    DetectionBatch {
        camera_id,
        frame_id,
        instant_ms,
        detections,
    }
}

/// Whether a pose-eligible detection's keypoints indicate a fallen posture.
/// Pose-estimation internals are out of scope (1); this only consumes
/// keypoints already produced by the detector adapter, using the simplest
/// signal available: the bounding box is wider than it is tall, which a
/// standing person's box never is.
fn is_fallen_pose(r: &RawDetection) -> bool {
    if r.keypoints.is_none() {
        return false;
    }
    wider_than_tall(&r.bbox)
}

fn wider_than_tall(bbox: &BBox) -> bool {
    bbox.width() > bbox.height()
}

#[cfg(test)]
mod tests {
    use super::*;
    use falcon_types::ClassTag;

    fn raw(class: ClassTag, bbox: BBox, tid: Option<i64>, keypoints: bool) -> RawDetection {
        RawDetection {
            class,
            confidence: 0.9,
            bbox,
            keypoints: keypoints.then(|| vec![falcon_types::Keypoint { x: 0.0, y: 0.0, confidence: 0.9 }]),
            transient_track_id: tid,
        }
    }

    #[test]
    fn assigns_object_ids_and_passes_through_non_refinable_classes() {
        let mut tracker = Tracker::new(5);
        let mut rescue = RescueEstimator::new(5);
        let cfg = RefinerConfig::default();
        let img = RgbImage::from_pixel(10, 10, image::Rgb([0, 0, 0]));
        let cam = CameraId::new("A").unwrap();

        let batch = process_raw_detections(
            &mut tracker,
            &mut rescue,
            &cfg,
            &img,
            cam,
            1,
            1_000,
            vec![raw(ClassTag::Bird, BBox { x0: 0.0, y0: 0.0, x1: 2.0, y1: 2.0 }, Some(1), false)],
        );

        assert_eq!(batch.detections.len(), 1);
        assert_eq!(batch.detections[0].class, ClassTag::Bird);
        assert!(batch.detections[0].rescue_level.is_none());
    }

    #[test]
    fn fallen_person_gets_a_rescue_level() {
        let mut tracker = Tracker::new(5);
        let mut rescue = RescueEstimator::new(5);
        let cfg = RefinerConfig::default();
        let img = RgbImage::from_pixel(10, 10, image::Rgb([0, 0, 0]));
        let cam = CameraId::new("A").unwrap();

        // wide, short bbox simulates a fallen posture
        let batch = process_raw_detections(
            &mut tracker,
            &mut rescue,
            &cfg,
            &img,
            cam,
            1,
            1_000,
            vec![raw(ClassTag::Person, BBox { x0: 0.0, y0: 0.0, x1: 9.0, y1: 2.0 }, Some(1), true)],
        );

        assert_eq!(batch.detections[0].rescue_level, Some(1));
    }

    #[test]
    fn standing_person_has_no_rescue_level() {
        let mut tracker = Tracker::new(5);
        let mut rescue = RescueEstimator::new(5);
        let cfg = RefinerConfig::default();
        let img = RgbImage::from_pixel(10, 10, image::Rgb([0, 0, 0]));
        let cam = CameraId::new("A").unwrap();

        let batch = process_raw_detections(
            &mut tracker,
            &mut rescue,
            &cfg,
            &img,
            cam,
            1,
            1_000,
            vec![raw(ClassTag::Person, BBox { x0: 0.0, y0: 0.0, x1: 2.0, y1: 9.0 }, Some(1), true)],
        );

        assert_eq!(batch.detections[0].rescue_level, None);
    }
}
