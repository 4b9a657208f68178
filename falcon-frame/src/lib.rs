use std::sync::Arc;

use falcon_types::CameraId;
use image::{ImageFormat, RgbImage};

#[derive(thiserror::Error, Debug)]
pub enum FrameCodecError {
    #[error("jpeg decode failed")]
    Decode(#[from] image::ImageError),
    #[error("malformed datagram header: {0}")]
    MalformedHeader(String),
    #[error("invalid camera id in header: {0}")]
    InvalidCameraId(#[from] falcon_types::CameraIdError),
}

/// An owned, cheaply-cloneable decoded frame. Clones share the pixel buffer
/// (4.1: "clones are cheap").
#[derive(Debug, Clone)]
pub struct Frame {
    pub camera_id: CameraId,
    pub frame_id: u64,
    image: Arc<RgbImage>,
}

impl Frame {
    pub fn new(camera_id: CameraId, frame_id: u64, image: RgbImage) -> Self {
        Frame {
            camera_id,
            frame_id,
            image: Arc::new(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn decode_jpeg(camera_id: CameraId, frame_id: u64, bytes: &[u8]) -> Result<Self, FrameCodecError> {
        let img = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)?.into_rgb8();
        Ok(Frame::new(camera_id, frame_id, img))
    }

    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, FrameCodecError> {
        encode_rgb_jpeg(&self.image, quality)
    }

    /// Returns a new `Frame` that owns a fresh, mutable copy of the pixels,
    /// for the overlay renderer (4.11) to draw into without mutating
    /// anything shared with the frame buffer (4.10).
    pub fn to_mutable(&self) -> RgbImage {
        (*self.image).clone()
    }
}

/// Encodes an arbitrary RGB image to JPEG, shared by [`Frame::encode_jpeg`]
/// and the first-observation gate's bbox crop encoding (4.12).
pub fn encode_rgb_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, FrameCodecError> {
    let mut out = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut out);
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
    encoder.write_image(image.as_raw(), image.width(), image.height(), image::ExtendedColorType::Rgb8)?;
    Ok(out)
}

/// Parses the UDP video-datagram header grammar (4.1/4.2):
/// `camera-id ':' frame-id ':' jpeg-bytes`.
///
/// Hand-scanned rather than via a generic parser, matching the two
/// `str.split`-once calls of the transport this is grounded on.
pub fn parse_datagram(datagram: &[u8]) -> Result<(CameraId, u64, &[u8]), FrameCodecError> {
    let first_colon = datagram
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| FrameCodecError::MalformedHeader("missing camera-id separator".into()))?;
    let camera_str = std::str::from_utf8(&datagram[..first_colon])
        .map_err(|_| FrameCodecError::MalformedHeader("camera id is not valid utf8".into()))?;
    let camera_id = CameraId::new(camera_str)?;

    let rest = &datagram[first_colon + 1..];
    let second_colon = rest
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| FrameCodecError::MalformedHeader("missing frame-id separator".into()))?;
    let frame_id_str = std::str::from_utf8(&rest[..second_colon])
        .map_err(|_| FrameCodecError::MalformedHeader("frame id is not valid utf8".into()))?;
    let frame_id: u64 = frame_id_str
        .parse()
        .map_err(|_| FrameCodecError::MalformedHeader(format!("frame id {frame_id_str:?} is not a u64")))?;

    let jpeg = &rest[second_colon + 1..];
    Ok((camera_id, frame_id, jpeg))
}

/// Builds the datagram wire format for one JPEG-encoded frame.
pub fn build_datagram(camera_id: CameraId, frame_id: u64, jpeg: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(jpeg.len() + 24);
    out.extend_from_slice(camera_id.as_str().as_bytes());
    out.push(b':');
    out.extend_from_slice(frame_id.to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(jpeg);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_jpeg(w: u32, h: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(w, h, image::Rgb([10, 20, 30]));
        let frame = Frame::new(CameraId::new("A").unwrap(), 1, img);
        frame.encode_jpeg(80).unwrap()
    }

    #[test]
    fn jpeg_round_trip_preserves_dimensions() {
        let jpeg = solid_jpeg(16, 12);
        let frame = Frame::decode_jpeg(CameraId::new("A").unwrap(), 1, &jpeg).unwrap();
        assert_eq!(frame.width(), 16);
        assert_eq!(frame.height(), 12);
    }

    #[test]
    fn datagram_round_trips_header_fields() {
        let jpeg = solid_jpeg(4, 4);
        let dgram = build_datagram(CameraId::new("CAM2").unwrap(), 42, &jpeg);
        let (cam, fid, payload) = parse_datagram(&dgram).unwrap();
        assert_eq!(cam.as_str(), "CAM2");
        assert_eq!(fid, 42);
        assert_eq!(payload, jpeg.as_slice());
    }

    #[test]
    fn rejects_missing_separators() {
        assert!(parse_datagram(b"nocolonatall").is_err());
        assert!(parse_datagram(b"A:onlyonecolon").is_err());
    }

    #[test]
    fn rejects_non_numeric_frame_id() {
        assert!(parse_datagram(b"A:notanumber:somejpegbytes").is_err());
    }
}
