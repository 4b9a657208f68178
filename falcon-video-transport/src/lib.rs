use std::collections::HashMap;
use std::net::SocketAddr;

use falcon_frame::{build_datagram, parse_datagram, Frame, FrameCodecError};
use falcon_types::CameraId;
use tokio::net::UdpSocket;

/// Largest payload this transport will put in one UDP datagram, matching
/// the original sender's step-down ceiling.
pub const MAX_UDP_PACKET_SIZE: usize = 65_000;

const QUALITY_START: i32 = 90;
const QUALITY_FLOOR: i32 = 10;
const QUALITY_STEP: i32 = 10;

#[derive(thiserror::Error, Debug)]
pub enum VideoTransportError {
    #[error("frame codec error")]
    Codec(#[from] FrameCodecError),
    #[error("socket I/O error")]
    Io(#[from] std::io::Error),
    #[error("could not encode frame under {MAX_UDP_PACKET_SIZE} bytes even at floor quality {QUALITY_FLOOR}")]
    TooLargeAtFloorQuality,
}

/// Encodes and sends one frame, stepping JPEG quality down from
/// [`QUALITY_START`] to [`QUALITY_FLOOR`] in steps of [`QUALITY_STEP`] until
/// the datagram fits [`MAX_UDP_PACKET_SIZE`]. Sends at floor quality even if
/// still oversized, logging a warning, matching the original sender's
/// "send what we have" fallback.
pub async fn send_frame(
    socket: &UdpSocket,
    dest: SocketAddr,
    frame: &Frame,
) -> Result<(), VideoTransportError> {
    let mut quality = QUALITY_START;
    let datagram = loop {
        let jpeg = frame.encode_jpeg(quality as u8)?;
        let datagram = build_datagram(frame.camera_id, frame.frame_id, &jpeg);
        if datagram.len() <= MAX_UDP_PACKET_SIZE || quality <= QUALITY_FLOOR {
            if datagram.len() > MAX_UDP_PACKET_SIZE {
                tracing::warn!(
                    camera_id = %frame.camera_id,
                    frame_id = frame.frame_id,
                    size = datagram.len(),
                    "sending oversized video datagram at floor quality"
                );
            }
            break datagram;
        }
        quality -= QUALITY_STEP;
    };
    socket.send_to(&datagram, dest).await?;
    Ok(())
}

/// Per-camera sequence gate for the datagram receiver (4.2): frames at or
/// below the last delivered frame id for their camera are discarded
/// silently.
#[derive(Debug, Default)]
pub struct FrameReceiver {
    last_delivered: HashMap<CameraId, u64>,
}

impl FrameReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses one raw UDP payload. Returns `Ok(None)` when the frame is a
    /// silently-discarded duplicate/out-of-order delivery, per 4.2.
    pub fn accept(&mut self, datagram: &[u8]) -> Result<Option<Frame>, VideoTransportError> {
        let (camera_id, frame_id, jpeg) = parse_datagram(datagram)?;
        let last = self.last_delivered.get(&camera_id).copied().unwrap_or(0);
        if frame_id <= last {
            tracing::debug!(%camera_id, frame_id, last, "discarding out-of-order video frame");
            return Ok(None);
        }
        let frame = Frame::decode_jpeg(camera_id, frame_id, jpeg)?;
        self.last_delivered.insert(camera_id, frame_id);
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn test_frame(camera: &str, frame_id: u64) -> Frame {
        let img = RgbImage::from_pixel(8, 8, image::Rgb([1, 2, 3]));
        Frame::new(CameraId::new(camera).unwrap(), frame_id, img)
    }

    #[test]
    fn receiver_discards_non_increasing_frame_ids() {
        let mut recv = FrameReceiver::new();
        let f1 = test_frame("A", 5);
        let jpeg = f1.encode_jpeg(80).unwrap();
        let dgram = falcon_frame::build_datagram(f1.camera_id, f1.frame_id, &jpeg);
        assert!(recv.accept(&dgram).unwrap().is_some());

        // A duplicate or earlier frame id is silently dropped.
        let dgram2 = falcon_frame::build_datagram(f1.camera_id, 5, &jpeg);
        assert!(recv.accept(&dgram2).unwrap().is_none());
        let dgram3 = falcon_frame::build_datagram(f1.camera_id, 3, &jpeg);
        assert!(recv.accept(&dgram3).unwrap().is_none());
    }

    #[test]
    fn receiver_tracks_cameras_independently() {
        let mut recv = FrameReceiver::new();
        let fa = test_frame("A", 10);
        let fb = test_frame("B", 1);
        let jpeg_a = fa.encode_jpeg(80).unwrap();
        let jpeg_b = fb.encode_jpeg(80).unwrap();
        let dgram_a = falcon_frame::build_datagram(fa.camera_id, fa.frame_id, &jpeg_a);
        let dgram_b = falcon_frame::build_datagram(fb.camera_id, fb.frame_id, &jpeg_b);
        assert!(recv.accept(&dgram_a).unwrap().is_some());
        assert!(recv.accept(&dgram_b).unwrap().is_some());
    }

    #[tokio::test]
    async fn send_frame_keeps_datagram_under_cap() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let dest_sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let dest = dest_sock.local_addr().unwrap();
        let frame = test_frame("A", 1);
        send_frame(&socket, dest, &frame).await.unwrap();
        let mut buf = vec![0u8; MAX_UDP_PACKET_SIZE + 1024];
        let (n, _) = dest_sock.recv_from(&mut buf).await.unwrap();
        assert!(n <= MAX_UDP_PACKET_SIZE);
    }
}
