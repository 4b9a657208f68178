use serde::{Deserialize, Serialize};

use crate::camera::CameraId;
use crate::detection::DetectionBatch;
use crate::event::PersistedEvent;
use crate::risk::{RiskLevel, RiskSnapshot, RiskUpdate};

/// The two operating modes a camera pipeline can run in (4.9): normal
/// object detection, or the ArUco-marker map-calibration mode used to teach
/// the server a camera's pixel-to-area mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraMode {
    #[serde(rename = "object")]
    Object,
    #[serde(rename = "map")]
    Map,
}

/// Messages the server sends down the stream-message transport (4.3) to a
/// camera pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerToCameraMessage {
    SetModeObject,
    SetModeMap,
}

/// Messages a camera pipeline sends up the stream-message transport to the
/// server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CameraToServerMessage {
    Response {
        camera_id: CameraId,
        mode: CameraMode,
        success: bool,
    },
    Detections {
        batch: DetectionBatch,
    },
}

/// The two runways the risk state machine tracks (4.13).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunwayId {
    A,
    B,
}

impl RunwayId {
    pub fn area_name(self) -> &'static str {
        match self {
            RunwayId::A => crate::risk::RUNWAY_A,
            RunwayId::B => crate::risk::RUNWAY_B,
        }
    }
}

/// Messages an operator console (pilot/ATC query endpoint, 4.15) sends to
/// the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsoleToServerMessage {
    Subscribe,
    SelectCamera { camera_id: CameraId },
    SelectMap { camera_id: CameraId },
    QueryObject { object_id: String },
    /// Administrative override of a runway's risk level (4.13: "command
    /// messages from the operator (set runway risk directly)").
    SetRunwayRisk { runway: RunwayId, level: RiskLevel },
}

/// Messages the server sends to a connected operator console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerToConsoleMessage {
    Snapshot { risk: RiskSnapshot },
    RiskChanged { update: RiskUpdate },
    /// Live per-batch telemetry (`ME_OD`), sent for every incoming detection
    /// batch regardless of whether any detection is newly observed.
    ObjectDetected { batch: DetectionBatch },
    /// A row the first-observation gate (4.12) just persisted.
    Event { event: PersistedEvent },
    CameraSelected { camera_id: CameraId, success: bool },
    MapModeSet { camera_id: CameraId, success: bool },
    QueryResult { object_id: String, event: Option<PersistedEvent> },
}

/// A bird-risk proposal from the bird-detection subsystem (4.13, 4.15). The
/// subsystem's physics model is out of scope (1); only its `BR_CHANGED`
/// proposal crosses the endpoint boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BirdToServerMessage {
    BirdRiskChanged { level: crate::risk::RiskLevel },
}

/// Queries the pilot-voice endpoint sends the server (4.15). Speech
/// recognition/synthesis is out of scope (1); this is the query surface
/// left once that chain is stripped away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PilotToServerMessage {
    BirdRiskInquiry,
    RunwayAStatus,
    RunwayBStatus,
    RunwayAvailabilityInquiry,
}

/// Runway availability, derived from both runways' current level (4.15).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunwayAvailability {
    All,
    AOnly,
    BOnly,
    None,
}

/// Replies the server sends back on the pilot-voice endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerToPilotMessage {
    BirdRisk { level: crate::risk::RiskLevel },
    RunwayStatus { level: crate::risk::RiskLevel },
    RunwayAvailability { availability: RunwayAvailability },
}
