use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use falcon_types::{RiskAxis, RiskLevel, RiskSnapshot, RiskUpdate};
use tokio::sync::{broadcast, mpsc, oneshot};

const RUNWAY_WINDOW_MS: i64 = 2_000;
const RUNWAY_HIT_THRESHOLD: usize = 3;
const RUNWAY_CLEAR_AFTER_MS: i64 = 10_000;
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

enum Command {
    ReportRunwayCandidate { area: String, now_ms: i64 },
    SetLevel { axis: RiskAxis, area: String, level: RiskLevel, now_ms: i64 },
    Snapshot { reply: oneshot::Sender<RiskSnapshot> },
}

/// The single owning task's view of risk state (4.13). All mutation goes
/// through the command channel; nothing outside this module ever reaches
/// the maps directly.
struct RiskEngine {
    levels: HashMap<(RiskAxis, String), RiskLevel>,
    runway_hits: HashMap<String, VecDeque<i64>>,
    runway_last_hit_ms: HashMap<String, i64>,
    updates: broadcast::Sender<RiskUpdate>,
}

impl RiskEngine {
    fn new(updates: broadcast::Sender<RiskUpdate>) -> Self {
        RiskEngine {
            levels: HashMap::new(),
            runway_hits: HashMap::new(),
            runway_last_hit_ms: HashMap::new(),
            updates,
        }
    }

    fn set_level(&mut self, axis: RiskAxis, area: String, level: RiskLevel, now_ms: i64) {
        let key = (axis, area.clone());
        let changed = self.levels.get(&key).copied() != Some(level);
        self.levels.insert(key, level);
        if changed {
            let _ = self.updates.send(RiskUpdate { axis, area, level, instant_ms: now_ms });
        }
    }

    fn report_runway_candidate(&mut self, area: String, now_ms: i64) {
        self.runway_last_hit_ms.insert(area.clone(), now_ms);
        let hits = self.runway_hits.entry(area.clone()).or_default();
        hits.push_back(now_ms);
        while let Some(&front) = hits.front() {
            if now_ms - front > RUNWAY_WINDOW_MS {
                hits.pop_front();
            } else {
                break;
            }
        }
        if hits.len() >= RUNWAY_HIT_THRESHOLD {
            self.set_level(RiskAxis::Runway, area, RiskLevel::Warning, now_ms);
        }
    }

    /// Periodic sweep (4.17): clears a runway's risk once no qualifying
    /// batch has arrived for `RUNWAY_CLEAR_AFTER_MS`.
    fn sweep_runway_clear(&mut self, now_ms: i64) {
        let stale: Vec<String> = self
            .runway_last_hit_ms
            .iter()
            .filter(|(_, &last)| now_ms - last > RUNWAY_CLEAR_AFTER_MS)
            .map(|(area, _)| area.clone())
            .collect();
        for area in stale {
            self.runway_hits.remove(&area);
            self.runway_last_hit_ms.remove(&area);
            self.set_level(RiskAxis::Runway, area, RiskLevel::Clear, now_ms);
        }
    }

    fn snapshot(&self) -> RiskSnapshot {
        RiskSnapshot {
            updates: self
                .levels
                .iter()
                .map(|((axis, area), level)| RiskUpdate {
                    axis: *axis,
                    area: area.clone(),
                    level: *level,
                    instant_ms: 0,
                })
                .collect(),
        }
    }
}

/// A handle callers use to message the risk-state owning task. Cheap to
/// clone; every clone can send commands and independently subscribe to
/// updates.
#[derive(Clone)]
pub struct RiskHandle {
    cmd_tx: mpsc::Sender<Command>,
    updates: broadcast::Sender<RiskUpdate>,
}

impl RiskHandle {
    pub async fn report_runway_candidate(&self, area: impl Into<String>, now_ms: i64) {
        let _ = self
            .cmd_tx
            .send(Command::ReportRunwayCandidate { area: area.into(), now_ms })
            .await;
    }

    pub async fn set_level(&self, axis: RiskAxis, area: impl Into<String>, level: RiskLevel, now_ms: i64) {
        let _ = self
            .cmd_tx
            .send(Command::SetLevel { axis, area: area.into(), level, now_ms })
            .await;
    }

    pub async fn snapshot(&self) -> RiskSnapshot {
        let (reply, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Snapshot { reply }).await.is_err() {
            return RiskSnapshot { updates: vec![] };
        }
        rx.await.unwrap_or(RiskSnapshot { updates: vec![] })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RiskUpdate> {
        self.updates.subscribe()
    }
}

/// Spawns the risk-state owning task and returns a handle to it.
pub fn spawn() -> RiskHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel(256);
    let (updates, _first_rx) = broadcast::channel(256);
    let handle = RiskHandle { cmd_tx, updates: updates.clone() };

    tokio::spawn(async move {
        let mut engine = RiskEngine::new(updates);
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(Command::ReportRunwayCandidate { area, now_ms }) => engine.report_runway_candidate(area, now_ms),
                        Some(Command::SetLevel { axis, area, level, now_ms }) => engine.set_level(axis, area, level, now_ms),
                        Some(Command::Snapshot { reply }) => { let _ = reply.send(engine.snapshot()); }
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    let now_ms = chrono::Utc::now().timestamp_millis();
                    engine.sweep_runway_clear(now_ms);
                }
            }
        }
    });

    handle
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn three_hits_within_window_raise_runway_to_warning() {
        let handle = spawn();
        let mut sub = handle.subscribe();
        handle.report_runway_candidate("RWY-A", 0).await;
        handle.report_runway_candidate("RWY-A", 500).await;
        handle.report_runway_candidate("RWY-A", 1_000).await;
        let update = sub.recv().await.unwrap();
        assert_eq!(update.axis, RiskAxis::Runway);
        assert_eq!(update.level, RiskLevel::Warning);
    }

    #[tokio::test]
    async fn hits_outside_window_do_not_accumulate() {
        let handle = spawn();
        let mut sub = handle.subscribe();
        handle.report_runway_candidate("RWY-A", 0).await;
        handle.report_runway_candidate("RWY-A", 3_000).await; // outside 2s window of the first
        handle.report_runway_candidate("RWY-A", 3_200).await;
        // only two hits are within any trailing 2s window, so no warning fires
        let snap = handle.snapshot().await;
        assert!(snap.updates.is_empty());
        drop(sub);
    }

    #[tokio::test]
    async fn snapshot_reflects_explicit_level_sets() {
        let handle = spawn();
        handle.set_level(RiskAxis::Bird, "APRON", RiskLevel::Alert, 10).await;
        let snap = handle.snapshot().await;
        assert_eq!(snap.updates.len(), 1);
        assert_eq!(snap.updates[0].level, RiskLevel::Alert);
    }
}
