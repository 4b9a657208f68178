use std::net::IpAddr;
use std::path::{Path, PathBuf};

use falcon_queue::OverflowPolicy;
use serde::Deserialize;

fn default_queue_capacity() -> usize {
    8
}

fn default_jpeg_quality() -> u8 {
    80
}

fn default_lost_threshold() -> u32 {
    15
}

fn default_rescue_max_level() -> u32 {
    5
}

fn default_capture_fps() -> f32 {
    10.0
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueuePolicy {
    Block,
    DropOldest,
}

impl From<QueuePolicy> for OverflowPolicy {
    fn from(p: QueuePolicy) -> Self {
        match p {
            QueuePolicy::Block => OverflowPolicy::Block,
            QueuePolicy::DropOldest => OverflowPolicy::DropOldest,
        }
    }
}

/// Configuration for one camera pipeline process (6). Real camera-hardware
/// discovery is out of scope (1); `source_dir` points at a directory of
/// JPEG frames the file-backed `FrameSource` plays back in order.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub camera_id: String,
    pub source_dir: PathBuf,
    #[serde(default = "default_capture_fps")]
    pub capture_fps: f32,

    pub server_host: IpAddr,
    pub server_stream_port: u16,
    pub server_video_port: u16,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub queue_policy: Option<QueuePolicy>,

    #[serde(default = "default_lost_threshold")]
    pub lost_threshold: u32,
    #[serde(default = "default_rescue_max_level")]
    pub rescue_max_level: u32,

    #[serde(default)]
    pub refiner: Option<RefinerSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HsvWindowSettings {
    pub h_min: f32,
    pub h_max: f32,
    pub s_min: f32,
    pub s_max: f32,
    pub v_min: f32,
    pub v_max: f32,
}

impl From<HsvWindowSettings> for falcon_refiner::HsvWindow {
    fn from(w: HsvWindowSettings) -> Self {
        falcon_refiner::HsvWindow {
            h_min: w.h_min,
            h_max: w.h_max,
            s_min: w.s_min,
            s_max: w.s_max,
            v_min: w.v_min,
            v_max: w.v_max,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefinerSettings {
    pub vest_window: HsvWindowSettings,
    pub vehicle_yellow_window: HsvWindowSettings,
    pub vehicle_black_window: HsvWindowSettings,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, crate::error::IdsError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    pub fn queue_policy(&self) -> OverflowPolicy {
        self.queue_policy.unwrap_or(QueuePolicy::DropOldest).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_yaml_with_defaults() {
        let yaml = "
camera_id: A
source_dir: /tmp/frames
server_host: 127.0.0.1
server_stream_port: 9001
server_video_port: 9002
";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.camera_id, "A");
        assert_eq!(cfg.jpeg_quality, 80);
        assert_eq!(cfg.queue_capacity, 8);
        assert_eq!(cfg.lost_threshold, 15);
    }
}
