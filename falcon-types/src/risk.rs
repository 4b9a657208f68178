use serde::{Deserialize, Serialize};

/// Severity level of one risk axis (4.13).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "CLEAR")]
    Clear,
    #[serde(rename = "WARNING")]
    Warning,
    #[serde(rename = "ALERT")]
    Alert,
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Clear
    }
}

/// The three independent risk axes the dispatch core tracks (4.13): a
/// wildlife-on-airfield axis, a foreign-object-debris axis, and a
/// runway-incursion axis. Each is keyed by the runway/area it concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskAxis {
    #[serde(rename = "BIRD")]
    Bird,
    #[serde(rename = "FOD")]
    Fod,
    #[serde(rename = "RUNWAY")]
    Runway,
}

/// One area's current level on one axis, as broadcast to operator consoles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskUpdate {
    pub axis: RiskAxis,
    pub area: String,
    pub level: RiskLevel,
    pub instant_ms: i64,
}

/// A full point-in-time snapshot, sent to a console on first connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub updates: Vec<RiskUpdate>,
}

/// The fixed area keys the risk engine's three cells (4.13) are addressed
/// by. `RiskAxis::Bird` has exactly one global cell; `RiskAxis::Runway` has
/// one per named runway. An `AreaMap` (4.16) may configure other named
/// areas too, but only polygons named `RUNWAY_A`/`RUNWAY_B` feed the
/// pilot-query runway-status/availability endpoint (4.15).
pub const BIRD_AREA: &str = "GLOBAL";
pub const RUNWAY_A: &str = "A";
pub const RUNWAY_B: &str = "B";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_level_is_clear() {
        assert_eq!(RiskLevel::default(), RiskLevel::Clear);
    }

    #[test]
    fn axis_wire_names() {
        assert_eq!(serde_json::to_string(&RiskAxis::Runway).unwrap(), "\"RUNWAY\"");
    }
}
