#[derive(thiserror::Error, Debug)]
pub enum FalconServerError {
    #[error("configuration error")]
    Config(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    FrameCodec(#[from] falcon_frame::FrameCodecError),
    #[error(transparent)]
    VideoTransport(#[from] falcon_video_transport::VideoTransportError),
    #[error(transparent)]
    StreamTransport(#[from] falcon_stream_transport::StreamTransportError),
    #[error(transparent)]
    Overlay(#[from] falcon_overlay::OverlayError),
    #[error(transparent)]
    Repo(#[from] falcon_repo::RepoError),
    #[error("invalid camera id in configuration")]
    InvalidCameraId(#[from] falcon_types::CameraIdError),
    #[error("could not bind listening port")]
    BindFailed(#[source] std::io::Error),
}
