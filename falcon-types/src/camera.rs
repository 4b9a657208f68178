use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
#[error("invalid camera id {0:?}: must be 1-8 uppercase ASCII letters/digits")]
pub struct CameraIdError(String);

/// A short camera tag, e.g. `"A"` or `"CAM2"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CameraId([u8; 8], u8);

impl CameraId {
    pub fn new(s: &str) -> Result<Self, CameraIdError> {
        if s.is_empty() || s.len() > 8 || !s.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(CameraIdError(s.to_owned()));
        }
        let mut buf = [0u8; 8];
        buf[..s.len()].copy_from_slice(s.as_bytes());
        Ok(CameraId(buf, s.len() as u8))
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0[..self.1 as usize]).expect("ascii by construction")
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CameraId {
    type Err = CameraIdError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CameraId::new(s)
    }
}

impl Serialize for CameraId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CameraId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        CameraId::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let id = CameraId::new("A").unwrap();
        let j = serde_json::to_string(&id).unwrap();
        assert_eq!(j, "\"A\"");
        let back: CameraId = serde_json::from_str(&j).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn rejects_empty_and_lowercase_and_long() {
        assert!(CameraId::new("").is_err());
        assert!(CameraId::new("toolongid").is_err());
        assert!(CameraId::new("a b").is_err());
    }
}
