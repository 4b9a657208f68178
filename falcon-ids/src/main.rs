mod config;
mod error;
mod pipeline;
mod source;

use clap::Parser;
use falcon_detector::{Detector, NullDetector};
use falcon_frame::Frame;
use falcon_queue::bounded as queue_bounded;
use falcon_refiner::RefinerConfig;
use falcon_rescue::RescueEstimator;
use falcon_stream_transport::{connect_with_backoff, LineCodec};
use falcon_tracker::Tracker;
use falcon_types::{CameraId, CameraMode, CameraToServerMessage, ServerToCameraMessage};
use futures::{SinkExt, StreamExt};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::config::Config;
use crate::error::IdsError;
use crate::source::{FileFrameSource, FrameSource};

#[derive(Parser, Debug)]
#[command(name = "falcon-ids", about = "FALCON camera pipeline process")]
struct Cli {
    #[arg(long)]
    config: std::path::PathBuf,
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Some(level) = &cli.log_level {
        std::env::set_var("RUST_LOG", level);
    }
    let _guard = env_tracing_logger::init();

    let config = Config::load(&cli.config)?;
    tracing::info!(camera_id = %config.camera_id, "starting falcon-ids");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(true);
    });

    run(config, shutdown_rx).await?;
    Ok(())
}

async fn run(config: Config, mut shutdown: watch::Receiver<bool>) -> Result<(), IdsError> {
    let camera_id = CameraId::new(&config.camera_id)?;
    let refiner_config = config
        .refiner
        .clone()
        .map(|r| RefinerConfig {
            vest_window: r.vest_window.into(),
            vehicle_yellow_window: r.vehicle_yellow_window.into(),
            vehicle_black_window: r.vehicle_black_window.into(),
            ..RefinerConfig::default()
        })
        .unwrap_or_default();

    let (capture_tx, capture_rx) = queue_bounded::<Frame>(config.queue_capacity, config.queue_policy());
    let (transport_tx, transport_rx) = queue_bounded::<(Frame, falcon_types::DetectionBatch)>(config.queue_capacity, config.queue_policy());

    let (mode_tx, mode_rx) = watch::channel(CameraMode::Object);

    let video_socket = UdpSocket::bind("0.0.0.0:0").await?;
    let video_dest = std::net::SocketAddr::new(config.server_host, config.server_video_port);
    let stream_dest = (config.server_host, config.server_stream_port);

    let stream = connect_with_backoff(stream_dest, shutdown.clone())
        .await
        .ok_or(IdsError::SourceExhausted)?;
    let (read_half, write_half) = stream.into_split();
    let mut reader: FramedRead<_, LineCodec<ServerToCameraMessage>> = FramedRead::new(read_half, LineCodec::new());
    let mut writer: FramedWrite<_, LineCodec<CameraToServerMessage>> = FramedWrite::new(write_half, LineCodec::new());

    let capture_handle = tokio::spawn(capture_task(config.clone(), camera_id, capture_tx, shutdown.clone()));
    let inference_handle = tokio::spawn(inference_task(
        config.clone(),
        camera_id,
        capture_rx,
        transport_tx,
        refiner_config,
        mode_rx,
        shutdown.clone(),
    ));
    let mut transport_shutdown = shutdown.clone();
    let transport_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                item = transport_rx.recv() => {
                    let Some((frame, batch)) = item else { break };
                    if let Err(e) = falcon_video_transport::send_frame(&video_socket, video_dest, &frame).await {
                        tracing::warn!(error = %e, "failed to send video frame");
                    }
                    if let Err(e) = writer.send(CameraToServerMessage::Detections { batch }).await {
                        tracing::warn!(error = %e, "failed to send detection batch");
                    }
                }
                _ = transport_shutdown.changed() => {
                    if *transport_shutdown.borrow() { break }
                }
            }
        }
    });

    loop {
        tokio::select! {
            msg = reader.next() => {
                match msg {
                    Some(Ok(ServerToCameraMessage::SetModeObject)) => {
                        let _ = mode_tx.send(CameraMode::Object);
                        tracing::info!("switched to object detection mode");
                    }
                    Some(Ok(ServerToCameraMessage::SetModeMap)) => {
                        let _ = mode_tx.send(CameraMode::Map);
                        tracing::info!("switched to map calibration mode");
                    }
                    Some(Err(e)) => tracing::warn!(error = %e, "malformed server command"),
                    None => break,
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() { break }
            }
        }
    }

    let _ = capture_handle.await;
    let _ = inference_handle.await;
    let _ = transport_handle.await;
    Ok(())
}

async fn capture_task(
    config: Config,
    camera_id: CameraId,
    tx: falcon_queue::Sender<Frame>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut source = match FileFrameSource::new(&config.source_dir, config.capture_fps) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "could not start frame source");
            return;
        }
    };
    let mut frame_id: u64 = 0;
    loop {
        tokio::select! {
            frame = source.next_frame() => {
                match frame {
                    Ok(img) => {
                        frame_id += 1;
                        let frame = Frame::new(camera_id, frame_id, img);
                        if tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "frame source failed");
                        break;
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() { break }
            }
        }
    }
}

async fn inference_task(
    config: Config,
    camera_id: CameraId,
    rx: falcon_queue::Receiver<Frame>,
    tx: falcon_queue::Sender<(Frame, falcon_types::DetectionBatch)>,
    refiner_config: RefinerConfig,
    mode_rx: watch::Receiver<CameraMode>,
    mut shutdown: watch::Receiver<bool>,
) {
    let detector: Box<dyn Detector> = Box::new(NullDetector::default());
    let mut tracker = Tracker::new(config.lost_threshold);
    let mut rescue = RescueEstimator::new(config.rescue_max_level);

    loop {
        tokio::select! {
            frame = rx.recv() => {
                let Some(frame) = frame else { break };
                if *mode_rx.borrow() != CameraMode::Object {
                    continue;
                }
                let raw = match detector.detect_objects(&frame) {
                    Ok(raw) => raw,
                    Err(e) => {
                        tracing::warn!(error = %e, "detector failure, dropping frame");
                        continue;
                    }
                };
                let instant_ms = chrono_now_ms();
                let batch = pipeline::process_raw_detections(
                    &mut tracker,
                    &mut rescue,
                    &refiner_config,
                    frame.image(),
                    camera_id,
                    frame.frame_id,
                    instant_ms,
                    raw,
                );
                let _ = config.jpeg_quality; // quality applied in the transport stage
                if tx.send((frame, batch)).await.is_err() {
                    break;
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() { break }
            }
        }
    }
}

fn chrono_now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
