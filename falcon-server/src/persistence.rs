use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use falcon_frame::Frame;
use falcon_repo::{AreaMap, EventRepo};
use falcon_types::{DetectionBatch, EventKind, PersistedEvent};
use tokio::sync::{mpsc, oneshot};

const SWEEP_INTERVAL: Duration = Duration::from_secs(1);
const CROP_QUALITY: u8 = 90;

enum Command {
    ObserveBatch {
        frame: Option<Frame>,
        batch: DetectionBatch,
        now_ms: i64,
        reply: oneshot::Sender<Vec<PersistedEvent>>,
    },
    LatestForObject {
        object_id: String,
        reply: oneshot::Sender<Option<PersistedEvent>>,
    },
}

/// The first-observation gate (4.12) and event repository (4.14), combined
/// under one owning task since every new-id decision is immediately
/// followed by a repository write and must not race a concurrent decision
/// for the same id.
struct PersistenceEngine {
    repo: EventRepo,
    area_map: AreaMap,
    img_dir: PathBuf,
    observed: HashMap<String, i64>,
    ttl_ms: i64,
}

impl PersistenceEngine {
    fn observe_batch(&mut self, frame: Option<&Frame>, batch: &DetectionBatch, now_ms: i64) -> Vec<PersistedEvent> {
        let mut events = Vec::new();
        for d in &batch.detections {
            let already_seen = self.observed.contains_key(&d.object_id);
            if !already_seen {
                let area = self.area_map.locate(&d.bbox).map(|s| s.to_string());
                let crop_path = frame.and_then(|f| match self.save_crop(f, &d.object_id, &d.bbox, now_ms) {
                    Ok(path) => Some(path),
                    Err(e) => {
                        tracing::warn!(error = %e, object_id = %d.object_id, "failed to save detection crop");
                        None
                    }
                });
                let event = PersistedEvent {
                    object_id: d.object_id.clone(),
                    camera_id: batch.camera_id,
                    class: d.class,
                    kind: EventKind::FirstObservation,
                    area,
                    bbox: d.bbox,
                    rescue_level: d.rescue_level,
                    crop_path,
                    instant_ms: now_ms,
                };
                match self.repo.insert_event(&event) {
                    Ok(true) => events.push(event),
                    Ok(false) => {} // raced with a prior insert for this (object_id, instant); the unique index is authoritative
                    Err(e) => tracing::error!(error = %e, object_id = %d.object_id, "failed to persist detection event"),
                }
            }
            self.observed.insert(d.object_id.clone(), now_ms);
        }
        events
    }

    fn save_crop(&self, frame: &Frame, object_id: &str, bbox: &falcon_types::BBox, now_ms: i64) -> std::io::Result<String> {
        let x0 = bbox.x0.max(0.0) as u32;
        let y0 = bbox.y0.max(0.0) as u32;
        let w = (bbox.width() as u32).min(frame.width().saturating_sub(x0)).max(1);
        let h = (bbox.height() as u32).min(frame.height().saturating_sub(y0)).max(1);
        let crop = image::imageops::crop_imm(frame.image(), x0, y0, w, h).to_image();
        let jpeg = falcon_frame::encode_rgb_jpeg(&crop, CROP_QUALITY)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

        let stamp = chrono::DateTime::from_timestamp_millis(now_ms)
            .unwrap_or_default()
            .format("%Y%m%d%H%M%S");
        let filename = format!("img_{object_id}_{stamp}.jpg");
        std::fs::create_dir_all(&self.img_dir)?;
        std::fs::write(self.img_dir.join(&filename), jpeg)?;
        Ok(format!("img/{filename}"))
    }

    /// Evicts ids not seen for longer than `ttl_ms`, per 4.12's "removed from
    /// the set when the server has not received a detection for that id for
    /// longer than the tracker's lost threshold" — so a true re-appearance
    /// is treated as a fresh first observation.
    fn sweep(&mut self, now_ms: i64) {
        self.observed.retain(|_, &mut last| now_ms - last <= self.ttl_ms);
    }
}

#[derive(Clone)]
pub struct PersistenceHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl PersistenceHandle {
    /// Feeds one camera's detection batch through the first-observation
    /// gate, returning the events newly persisted as a result (empty if
    /// every detection in the batch had already been observed).
    pub async fn observe_batch(&self, frame: Option<Frame>, batch: DetectionBatch, now_ms: i64) -> Vec<PersistedEvent> {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::ObserveBatch { frame, batch, now_ms, reply })
            .await
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    pub async fn latest_for_object(&self, object_id: impl Into<String>) -> Option<PersistedEvent> {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::LatestForObject { object_id: object_id.into(), reply })
            .await
            .is_err()
        {
            return None;
        }
        rx.await.ok().flatten()
    }
}

pub fn spawn(repo: EventRepo, area_map: AreaMap, img_dir: PathBuf, ttl_ms: i64) -> PersistenceHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel(256);
    let handle = PersistenceHandle { cmd_tx };

    tokio::spawn(async move {
        let mut engine = PersistenceEngine {
            repo,
            area_map,
            img_dir,
            observed: HashMap::new(),
            ttl_ms,
        };
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(Command::ObserveBatch { frame, batch, now_ms, reply }) => {
                            let events = engine.observe_batch(frame.as_ref(), &batch, now_ms);
                            let _ = reply.send(events);
                        }
                        Some(Command::LatestForObject { object_id, reply }) => {
                            let result = engine.repo.latest_for_object(&object_id).unwrap_or_else(|e| {
                                tracing::error!(error = %e, %object_id, "repository query failed");
                                None
                            });
                            let _ = reply.send(result);
                        }
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    let now_ms = chrono::Utc::now().timestamp_millis();
                    engine.sweep(now_ms);
                }
            }
        }
    });

    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use falcon_types::{BBox, CameraId, ClassTag, Detection};
    use image::RgbImage;

    fn cam() -> CameraId {
        CameraId::new("A").unwrap()
    }

    fn batch(object_id: &str) -> DetectionBatch {
        DetectionBatch {
            camera_id: cam(),
            frame_id: 1,
            instant_ms: 0,
            detections: vec![Detection {
                object_id: object_id.into(),
                class: ClassTag::Bird,
                confidence: 0.9,
                bbox: BBox { x0: 0.0, y0: 0.0, x1: 4.0, y1: 4.0 },
                rescue_level: None,
            }],
        }
    }

    #[tokio::test]
    async fn first_observation_persists_and_second_does_not() {
        let repo = EventRepo::open_in_memory().unwrap();
        let handle = spawn(repo, AreaMap::new(), std::env::temp_dir(), 30_000);
        let frame = Frame::new(cam(), 1, RgbImage::from_pixel(8, 8, image::Rgb([1, 2, 3])));

        let first = handle.observe_batch(Some(frame.clone()), batch("obj1"), 1_000).await;
        assert_eq!(first.len(), 1);

        let second = handle.observe_batch(Some(frame), batch("obj1"), 1_100).await;
        assert!(second.is_empty());

        let latest = handle.latest_for_object("obj1").await.unwrap();
        assert_eq!(latest.object_id, "obj1");
    }

    #[tokio::test]
    async fn unknown_object_query_returns_none() {
        let repo = EventRepo::open_in_memory().unwrap();
        let handle = spawn(repo, AreaMap::new(), std::env::temp_dir(), 30_000);
        assert!(handle.latest_for_object("nope").await.is_none());
    }
}
