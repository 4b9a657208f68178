#[derive(thiserror::Error, Debug)]
pub enum IdsError {
    #[error("configuration error")]
    Config(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    FrameCodec(#[from] falcon_frame::FrameCodecError),
    #[error(transparent)]
    Detector(#[from] falcon_detector::DetectorError),
    #[error(transparent)]
    VideoTransport(#[from] falcon_video_transport::VideoTransportError),
    #[error(transparent)]
    StreamTransport(#[from] falcon_stream_transport::StreamTransportError),
    #[error("invalid camera id in configuration")]
    InvalidCameraId(#[from] falcon_types::CameraIdError),
    #[error("frame source exhausted and cannot be restarted")]
    SourceExhausted,
}
