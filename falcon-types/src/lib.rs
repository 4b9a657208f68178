pub mod camera;
pub mod class;
pub mod detection;
pub mod event;
pub mod message;
pub mod risk;

pub use camera::{CameraId, CameraIdError};
pub use class::ClassTag;
pub use detection::{BBox, Detection, DetectionBatch, Keypoint, RawDetection};
pub use event::{EventKind, PersistedEvent};
pub use message::{
    BirdToServerMessage, CameraMode, CameraToServerMessage, ConsoleToServerMessage, PilotToServerMessage,
    RunwayAvailability, RunwayId, ServerToCameraMessage, ServerToConsoleMessage, ServerToPilotMessage,
};
pub use risk::{RiskAxis, RiskLevel, RiskSnapshot, RiskUpdate, BIRD_AREA, RUNWAY_A, RUNWAY_B};
