use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use falcon_repo::AreaMap;
use falcon_risk::RiskHandle;
use falcon_stream_transport::{Broadcaster, LineCodec};
use falcon_types::{CameraId, CameraToServerMessage, DetectionBatch, ServerToCameraMessage, ServerToConsoleMessage};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::frame_buffer_task::FrameBufferHandle;
use crate::persistence::PersistenceHandle;
use crate::registry::CameraRegistry;

const RUNWAY_CANDIDATE_CONFIDENCE: f32 = 0.8;

fn camera_id_of(msg: &CameraToServerMessage) -> CameraId {
    match msg {
        CameraToServerMessage::Response { camera_id, .. } => *camera_id,
        CameraToServerMessage::Detections { batch } => batch.camera_id,
    }
}

/// Accepts detection-ingest connections from camera pipelines (4.15). Each
/// accepted connection runs a dedicated reader (decodes detection batches,
/// feeds the frame buffer/gate/risk engine) and writer (drains mode-change
/// commands routed to this camera).
pub async fn accept_loop(
    listener: TcpListener,
    frame_buffer: FrameBufferHandle,
    persistence: PersistenceHandle,
    risk: RiskHandle,
    area_map: Arc<AreaMap>,
    consoles: Broadcaster<ServerToConsoleMessage>,
    cameras: CameraRegistry,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        tokio::spawn(handle_connection(
                            stream,
                            peer,
                            frame_buffer.clone(),
                            persistence.clone(),
                            risk.clone(),
                            area_map.clone(),
                            consoles.clone(),
                            cameras.clone(),
                            shutdown.clone(),
                        ));
                    }
                    Err(e) => tracing::warn!(error = %e, "detection-ingest accept failed"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() { break }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    frame_buffer: FrameBufferHandle,
    persistence: PersistenceHandle,
    risk: RiskHandle,
    area_map: Arc<AreaMap>,
    consoles: Broadcaster<ServerToConsoleMessage>,
    cameras: CameraRegistry,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(%peer, "camera pipeline connected");
    let (read_half, write_half) = stream.into_split();
    let mut reader: FramedRead<_, LineCodec<CameraToServerMessage>> = FramedRead::new(read_half, LineCodec::new());
    let mut writer: FramedWrite<_, LineCodec<ServerToCameraMessage>> = FramedWrite::new(write_half, LineCodec::new());

    let (cmd_tx, mut cmd_rx) = mpsc::channel::<ServerToCameraMessage>(16);
    let mut registered: Option<CameraId> = None;
    let mut last_frame_id: HashMap<CameraId, u64> = HashMap::new();

    loop {
        tokio::select! {
            msg = reader.next() => {
                match msg {
                    Some(Ok(msg)) => {
                        let camera_id = camera_id_of(&msg);
                        if registered != Some(camera_id) {
                            cameras.write().await.insert(camera_id, cmd_tx.clone());
                            registered = Some(camera_id);
                        }
                        if let CameraToServerMessage::Detections { batch } = msg {
                            process_batch(
                                camera_id,
                                batch,
                                &mut last_frame_id,
                                &frame_buffer,
                                &persistence,
                                &risk,
                                &area_map,
                                &consoles,
                            ).await;
                        }
                    }
                    Some(Err(e)) => tracing::warn!(%peer, error = %e, "malformed camera message, dropping connection"),
                    None => break,
                }
            }
            outgoing = cmd_rx.recv() => {
                let Some(outgoing) = outgoing else { break };
                if let Err(e) = writer.send(outgoing).await {
                    tracing::warn!(%peer, error = %e, "failed to send command to camera");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() { break }
            }
        }
    }

    if let Some(camera_id) = registered {
        cameras.write().await.remove(&camera_id);
    }
    tracing::info!(%peer, "camera pipeline disconnected");
}

async fn process_batch(
    camera_id: CameraId,
    batch: DetectionBatch,
    last_frame_id: &mut HashMap<CameraId, u64>,
    frame_buffer: &FrameBufferHandle,
    persistence: &PersistenceHandle,
    risk: &RiskHandle,
    area_map: &AreaMap,
    consoles: &Broadcaster<ServerToConsoleMessage>,
) {
    let prior = last_frame_id.get(&camera_id).copied().unwrap_or(0);
    if batch.frame_id <= prior && prior != 0 {
        tracing::warn!(%camera_id, frame_id = batch.frame_id, prior, "discarding out-of-order detection batch");
        return;
    }
    last_frame_id.insert(camera_id, batch.frame_id);

    let now_ms = batch.instant_ms;
    frame_buffer.insert_detections(camera_id, batch.clone(), now_ms).await;

    if !batch.detections.is_empty() {
        consoles.send(ServerToConsoleMessage::ObjectDetected { batch: batch.clone() });
    }

    for d in &batch.detections {
        if d.confidence >= RUNWAY_CANDIDATE_CONFIDENCE {
            if let Some(area) = area_map.locate(&d.bbox) {
                risk.report_runway_candidate(area.to_string(), now_ms).await;
            }
        }
    }

    let frame = frame_buffer.get_for_render(camera_id, batch.frame_id).await.map(|(f, _)| f);
    let events = persistence.observe_batch(frame, batch, now_ms).await;
    for event in events {
        consoles.send(ServerToConsoleMessage::Event { event });
    }
}
