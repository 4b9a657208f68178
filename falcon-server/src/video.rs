use falcon_overlay::OverlayRenderer;
use falcon_video_transport::FrameReceiver;
use tokio::net::UdpSocket;
use tokio::sync::watch;

use crate::frame_buffer_task::FrameBufferHandle;
use crate::registry::ConsoleVideoTargets;

const MAX_DATAGRAM_SIZE: usize = 65_535;

/// The shared video datagram receiver (4.15), demultiplexed by camera id in
/// the header. Populates the frame buffer, then immediately renders and
/// fans the annotated frame out to every subscribed operator console, per
/// 4.11's "no queue build-up; drop if the sender is behind" (each
/// datagram is handled to completion before the next `recv_from`, so a
/// slow console fan-out only ever delays the next datagram, never queues
/// one).
pub async fn run(
    socket: UdpSocket,
    send_socket: UdpSocket,
    overlay: OverlayRenderer,
    frame_buffer: FrameBufferHandle,
    console_targets: ConsoleVideoTargets,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut receiver = FrameReceiver::new();
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        tokio::select! {
            received = socket.recv_from(&mut buf) => {
                let (n, _peer) = match received {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!(error = %e, "video socket recv failed");
                        continue;
                    }
                };
                match receiver.accept(&buf[..n]) {
                    Ok(Some(frame)) => {
                        let now_ms = chrono::Utc::now().timestamp_millis();
                        frame_buffer.insert_frame(frame.clone(), now_ms).await;

                        let detections = frame_buffer
                            .get_for_render(frame.camera_id, frame.frame_id)
                            .await
                            .and_then(|(_, d)| d);

                        let mut canvas = frame.to_mutable();
                        if let Some(batch) = &detections {
                            overlay.render(&mut canvas, &batch.detections);
                        }
                        let annotated = falcon_frame::Frame::new(frame.camera_id, frame.frame_id, canvas);

                        let targets: Vec<_> = console_targets.read().await.iter().copied().collect();
                        for dest in targets {
                            if let Err(e) = falcon_video_transport::send_frame(&send_socket, dest, &annotated).await {
                                tracing::warn!(%dest, error = %e, "failed to fan out annotated frame");
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::debug!(error = %e, "dropping malformed video datagram"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() { break }
            }
        }
    }
}
