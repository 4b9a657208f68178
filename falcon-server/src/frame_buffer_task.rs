use falcon_frame::Frame;
use falcon_framebuffer::FrameBuffer;
use falcon_types::{CameraId, DetectionBatch};
use tokio::sync::{mpsc, oneshot};

enum Command {
    InsertFrame { frame: Frame, now_ms: i64 },
    InsertDetections { camera_id: CameraId, batch: DetectionBatch, now_ms: i64 },
    GetForRender { camera_id: CameraId, frame_id: u64, reply: oneshot::Sender<Option<(Frame, Option<DetectionBatch>)>> },
}

/// A handle to the frame buffer's single owning task (4.10, 5 "Shared-resource
/// policy"). Cheap to clone; every accepted connection and the video
/// receiver task share one.
#[derive(Clone)]
pub struct FrameBufferHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl FrameBufferHandle {
    pub async fn insert_frame(&self, frame: Frame, now_ms: i64) {
        let _ = self.cmd_tx.send(Command::InsertFrame { frame, now_ms }).await;
    }

    pub async fn insert_detections(&self, camera_id: CameraId, batch: DetectionBatch, now_ms: i64) {
        let _ = self.cmd_tx.send(Command::InsertDetections { camera_id, batch, now_ms }).await;
    }

    /// Returns an owned clone of the frame and its best-matching detections,
    /// per `FrameBuffer::get_for_render`.
    pub async fn get_for_render(&self, camera_id: CameraId, frame_id: u64) -> Option<(Frame, Option<DetectionBatch>)> {
        let (reply, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::GetForRender { camera_id, frame_id, reply }).await.is_err() {
            return None;
        }
        rx.await.ok().flatten()
    }
}

pub fn spawn(max_age_ms: i64, max_gap_frames: u64) -> FrameBufferHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel(256);
    let handle = FrameBufferHandle { cmd_tx };

    tokio::spawn(async move {
        let mut buffer = FrameBuffer::new(max_age_ms, max_gap_frames);
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                Command::InsertFrame { frame, now_ms } => buffer.insert_frame(frame, now_ms),
                Command::InsertDetections { camera_id, batch, now_ms } => buffer.insert_detections(camera_id, batch, now_ms),
                Command::GetForRender { camera_id, frame_id, reply } => {
                    let found = buffer
                        .get_for_render(camera_id, frame_id)
                        .map(|(frame, detections)| (frame.clone(), detections.cloned()));
                    let _ = reply.send(found);
                }
            }
        }
    });

    handle
}
