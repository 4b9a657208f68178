use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_frame_buffer_max_age_ms() -> i64 {
    1_000
}

fn default_frame_buffer_max_gap_frames() -> u64 {
    5
}

fn default_first_observation_ttl_ms() -> i64 {
    30_000
}

fn default_overlay_font_scale() -> f32 {
    16.0
}

/// A named polygon area, read once at startup and handed to both the
/// in-memory `AreaMap` and the repository's `area` reference table (4.16).
#[derive(Debug, Clone, Deserialize)]
pub struct AreaConfig {
    pub name: String,
    pub polygon: Vec<(f32, f32)>,
}

/// Configuration for the dispatch core process (6). `db_path` absent means
/// an in-memory event log, useful for demos and tests.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: IpAddr,

    pub video_port: u16,
    pub ingest_port: u16,
    pub console_port: u16,
    pub bird_port: u16,
    pub pilot_port: u16,
    pub console_video_port: u16,

    pub img_dir: PathBuf,
    pub overlay_font_path: PathBuf,

    #[serde(default)]
    pub db_path: Option<PathBuf>,

    #[serde(default)]
    pub areas: Vec<AreaConfig>,

    #[serde(default = "default_frame_buffer_max_age_ms")]
    pub frame_buffer_max_age_ms: i64,
    #[serde(default = "default_frame_buffer_max_gap_frames")]
    pub frame_buffer_max_gap_frames: u64,
    #[serde(default = "default_first_observation_ttl_ms")]
    pub first_observation_ttl_ms: i64,
    #[serde(default = "default_overlay_font_scale")]
    pub overlay_font_scale: f32,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, crate::error::FalconServerError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_yaml_with_defaults() {
        let yaml = "
video_port: 9100
ingest_port: 9101
console_port: 9102
bird_port: 9103
pilot_port: 9104
console_video_port: 9105
img_dir: /tmp/img
overlay_font_path: /tmp/font.ttf
";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.video_port, 9100);
        assert_eq!(cfg.frame_buffer_max_age_ms, 1_000);
        assert!(cfg.db_path.is_none());
        assert!(cfg.areas.is_empty());
    }
}
