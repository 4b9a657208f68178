use std::net::SocketAddr;

use falcon_risk::RiskHandle;
use falcon_stream_transport::LineCodec;
use falcon_types::{
    PilotToServerMessage, RiskAxis, RiskLevel, RiskSnapshot, RunwayAvailability, ServerToPilotMessage, BIRD_AREA,
    RUNWAY_A, RUNWAY_B,
};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::codec::{FramedRead, FramedWrite};

/// Accepts pilot-voice-query connections (4.15). The speech
/// recognition/synthesis chain is out of scope (1); this endpoint is the
/// query/response surface left once that chain is stripped away.
pub async fn accept_loop(listener: TcpListener, risk: RiskHandle, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        tokio::spawn(handle_connection(stream, peer, risk.clone(), shutdown.clone()));
                    }
                    Err(e) => tracing::warn!(error = %e, "pilot query accept failed"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() { break }
            }
        }
    }
}

fn level_of(snapshot: &RiskSnapshot, axis: RiskAxis, area: &str) -> RiskLevel {
    snapshot
        .updates
        .iter()
        .find(|u| u.axis == axis && u.area == area)
        .map(|u| u.level)
        .unwrap_or(RiskLevel::Clear)
}

/// Derives runway availability from both runways' current level (4.15):
/// both clear → `All`; exactly one clear → that runway only; neither →
/// `None`.
fn runway_availability(snapshot: &RiskSnapshot) -> RunwayAvailability {
    let a_clear = level_of(snapshot, RiskAxis::Runway, RUNWAY_A) == RiskLevel::Clear;
    let b_clear = level_of(snapshot, RiskAxis::Runway, RUNWAY_B) == RiskLevel::Clear;
    match (a_clear, b_clear) {
        (true, true) => RunwayAvailability::All,
        (true, false) => RunwayAvailability::AOnly,
        (false, true) => RunwayAvailability::BOnly,
        (false, false) => RunwayAvailability::None,
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, risk: RiskHandle, mut shutdown: watch::Receiver<bool>) {
    tracing::info!(%peer, "pilot query endpoint connected");
    let (read_half, write_half) = stream.into_split();
    let mut reader: FramedRead<_, LineCodec<PilotToServerMessage>> = FramedRead::new(read_half, LineCodec::new());
    let mut writer: FramedWrite<_, LineCodec<ServerToPilotMessage>> = FramedWrite::new(write_half, LineCodec::new());

    loop {
        tokio::select! {
            msg = reader.next() => {
                match msg {
                    Some(Ok(query)) => {
                        let snapshot = risk.snapshot().await;
                        let reply = match query {
                            PilotToServerMessage::BirdRiskInquiry => {
                                ServerToPilotMessage::BirdRisk { level: level_of(&snapshot, RiskAxis::Bird, BIRD_AREA) }
                            }
                            PilotToServerMessage::RunwayAStatus => {
                                ServerToPilotMessage::RunwayStatus { level: level_of(&snapshot, RiskAxis::Runway, RUNWAY_A) }
                            }
                            PilotToServerMessage::RunwayBStatus => {
                                ServerToPilotMessage::RunwayStatus { level: level_of(&snapshot, RiskAxis::Runway, RUNWAY_B) }
                            }
                            PilotToServerMessage::RunwayAvailabilityInquiry => {
                                ServerToPilotMessage::RunwayAvailability { availability: runway_availability(&snapshot) }
                            }
                        };
                        if writer.send(reply).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(%peer, error = %e, "malformed pilot query, dropping connection");
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
    tracing::info!(%peer, "pilot query endpoint disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use falcon_types::RiskUpdate;

    fn snapshot_with(updates: Vec<RiskUpdate>) -> RiskSnapshot {
        RiskSnapshot { updates }
    }

    #[test]
    fn both_runways_clear_means_all_available() {
        let snap = snapshot_with(vec![]);
        assert_eq!(runway_availability(&snap), RunwayAvailability::All);
    }

    #[test]
    fn one_runway_warning_leaves_only_the_other_available() {
        let snap = snapshot_with(vec![RiskUpdate {
            axis: RiskAxis::Runway,
            area: RUNWAY_B.to_string(),
            level: RiskLevel::Warning,
            instant_ms: 0,
        }]);
        assert_eq!(runway_availability(&snap), RunwayAvailability::AOnly);
    }

    #[test]
    fn both_runways_warning_means_none_available() {
        let snap = snapshot_with(vec![
            RiskUpdate { axis: RiskAxis::Runway, area: RUNWAY_A.to_string(), level: RiskLevel::Warning, instant_ms: 0 },
            RiskUpdate { axis: RiskAxis::Runway, area: RUNWAY_B.to_string(), level: RiskLevel::Warning, instant_ms: 0 },
        ]);
        assert_eq!(runway_availability(&snap), RunwayAvailability::None);
    }
}
