use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

use falcon_types::{CameraId, ServerToCameraMessage};
use tokio::sync::{mpsc, RwLock};

/// Maps a connected camera's id to its writer task's inbound channel, so an
/// operator console's mode-change command (4.15, `MC_MP`) can reach the
/// right camera pipeline connection.
pub type CameraRegistry = Arc<RwLock<HashMap<CameraId, mpsc::Sender<ServerToCameraMessage>>>>;

pub fn new_camera_registry() -> CameraRegistry {
    Arc::new(RwLock::new(HashMap::new()))
}

/// The set of operator-console UDP endpoints the overlay video sender (4.11)
/// fans annotated frames out to. Small and write-rarely (only on
/// connect/disconnect), so a plain `RwLock` is simpler than an owning-task
/// actor here.
pub type ConsoleVideoTargets = Arc<RwLock<HashSet<SocketAddr>>>;

pub fn new_console_video_targets() -> ConsoleVideoTargets {
    Arc::new(RwLock::new(HashSet::new()))
}
