use std::net::SocketAddr;

use falcon_risk::RiskHandle;
use falcon_stream_transport::{Broadcaster, LineCodec};
use falcon_types::{ConsoleToServerMessage, ServerToConsoleMessage};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::persistence::PersistenceHandle;
use crate::registry::{CameraRegistry, ConsoleVideoTargets};

/// Accepts operator-console connections (4.15). Each connection gets a
/// snapshot on connect, then every risk transition and console broadcast
/// thereafter, and may send camera/map-selection and object-detail
/// commands. Also registers the console's annotated-video UDP destination
/// (its peer IP on the well-known `console_video_port`) for the video
/// task's fan-out (4.11).
pub async fn accept_loop(
    listener: TcpListener,
    risk: RiskHandle,
    persistence: PersistenceHandle,
    consoles: Broadcaster<ServerToConsoleMessage>,
    cameras: CameraRegistry,
    video_targets: ConsoleVideoTargets,
    console_video_port: u16,
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
                            risk.clone(),
                            persistence.clone(),
                            consoles.clone(),
                            cameras.clone(),
                            video_targets.clone(),
                            console_video_port,
                            shutdown.clone(),
                        ));
                    }
                    Err(e) => tracing::warn!(error = %e, "console accept failed"),
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
    risk: RiskHandle,
    persistence: PersistenceHandle,
    consoles: Broadcaster<ServerToConsoleMessage>,
    cameras: CameraRegistry,
    video_targets: ConsoleVideoTargets,
    console_video_port: u16,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(%peer, "operator console connected");
    let (read_half, write_half) = stream.into_split();
    let mut reader: FramedRead<_, LineCodec<ConsoleToServerMessage>> = FramedRead::new(read_half, LineCodec::new());
    let mut writer: FramedWrite<_, LineCodec<ServerToConsoleMessage>> = FramedWrite::new(write_half, LineCodec::new());
    let mut broadcast_rx = consoles.subscribe();

    let video_target = SocketAddr::new(peer.ip(), console_video_port);
    video_targets.write().await.insert(video_target);

    let snapshot = risk.snapshot().await;
    if writer.send(ServerToConsoleMessage::Snapshot { risk: snapshot }).await.is_err() {
        video_targets.write().await.remove(&video_target);
        return;
    }

    loop {
        tokio::select! {
            msg = reader.next() => {
                match msg {
                    Some(Ok(cmd)) => {
                        if let Some(reply) = handle_command(cmd, &risk, &persistence, &cameras).await {
                            if writer.send(reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(%peer, error = %e, "malformed console message, dropping connection");
                        break;
                    }
                    None => break,
                }
            }
            item = broadcast_rx.recv() => {
                match item {
                    Ok(msg) => {
                        if writer.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(%peer, skipped = n, "console writer lagged behind broadcast");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() { break }
            }
        }
    }
    video_targets.write().await.remove(&video_target);
    tracing::info!(%peer, "operator console disconnected");
}

async fn handle_command(
    cmd: ConsoleToServerMessage,
    risk: &RiskHandle,
    persistence: &PersistenceHandle,
    cameras: &CameraRegistry,
) -> Option<ServerToConsoleMessage> {
    match cmd {
        ConsoleToServerMessage::Subscribe => None,
        ConsoleToServerMessage::SelectCamera { camera_id } => {
            let success = cameras
                .read()
                .await
                .get(&camera_id)
                .map(|tx| tx.try_send(falcon_types::ServerToCameraMessage::SetModeObject).is_ok())
                .unwrap_or(false);
            Some(ServerToConsoleMessage::CameraSelected { camera_id, success })
        }
        ConsoleToServerMessage::SelectMap { camera_id } => {
            let success = cameras
                .read()
                .await
                .get(&camera_id)
                .map(|tx| tx.try_send(falcon_types::ServerToCameraMessage::SetModeMap).is_ok())
                .unwrap_or(false);
            Some(ServerToConsoleMessage::MapModeSet { camera_id, success })
        }
        ConsoleToServerMessage::QueryObject { object_id } => {
            let event = persistence.latest_for_object(&object_id).await;
            Some(ServerToConsoleMessage::QueryResult { object_id, event })
        }
        ConsoleToServerMessage::SetRunwayRisk { runway, level } => {
            let now_ms = chrono::Utc::now().timestamp_millis();
            risk.set_level(falcon_types::RiskAxis::Runway, runway.area_name(), level, now_ms).await;
            None
        }
    }
}
