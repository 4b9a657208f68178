use serde::{Deserialize, Serialize};

use crate::camera::CameraId;
use crate::class::ClassTag;
use crate::detection::BBox;

/// Why a `PersistedEvent` row exists: either the object's first observation
/// (4.12) or a rescue-level escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "FIRST_OBSERVATION")]
    FirstObservation,
    #[serde(rename = "RESCUE_ESCALATION")]
    RescueEscalation,
}

/// One row of the append-only event log (4.14).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEvent {
    pub object_id: String,
    pub camera_id: CameraId,
    pub class: ClassTag,
    pub kind: EventKind,
    pub area: Option<String>,
    pub bbox: BBox,
    pub rescue_level: Option<u32>,
    pub crop_path: Option<String>,
    pub instant_ms: i64,
}
