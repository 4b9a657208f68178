use std::net::SocketAddr;

use falcon_risk::RiskHandle;
use falcon_stream_transport::LineCodec;
use falcon_types::{BirdToServerMessage, RiskAxis, BIRD_AREA};
use futures::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::codec::FramedRead;

/// Accepts bird-detection-subsystem connections (4.13, 4.15). The
/// subsystem's own risk physics model is out of scope (1); only its
/// `BR_CHANGED` proposal crosses this boundary, fed straight to the risk
/// engine's global bird cell.
pub async fn accept_loop(listener: TcpListener, risk: RiskHandle, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        tokio::spawn(handle_connection(stream, peer, risk.clone(), shutdown.clone()));
                    }
                    Err(e) => tracing::warn!(error = %e, "bird subsystem accept failed"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() { break }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, risk: RiskHandle, mut shutdown: watch::Receiver<bool>) {
    tracing::info!(%peer, "bird subsystem connected");
    let mut reader: FramedRead<_, LineCodec<BirdToServerMessage>> = FramedRead::new(stream, LineCodec::new());

    loop {
        tokio::select! {
            msg = reader.next() => {
                match msg {
                    Some(Ok(BirdToServerMessage::BirdRiskChanged { level })) => {
                        let now_ms = chrono::Utc::now().timestamp_millis();
                        risk.set_level(RiskAxis::Bird, BIRD_AREA, level, now_ms).await;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(%peer, error = %e, "malformed bird subsystem message, dropping connection");
                        break;
                    }
                    None => break,
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() { break }
            }
        }
    }
    tracing::info!(%peer, "bird subsystem disconnected");
}
