mod bird;
mod config;
mod console;
mod error;
mod frame_buffer_task;
mod ingest;
mod persistence;
mod pilot;
mod registry;
mod video;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use falcon_overlay::{OverlayRenderer, OverlayStyle};
use falcon_repo::{AreaMap, EventRepo};
use falcon_stream_transport::Broadcaster;
use falcon_types::ServerToConsoleMessage;
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::watch;

use crate::config::Config;
use crate::error::FalconServerError;

#[derive(Parser, Debug)]
#[command(name = "falcon-server", about = "FALCON dispatch core process")]
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
    tracing::info!(host = %config.host, "starting falcon-server");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(true);
    });

    run(config, shutdown_rx).await?;
    Ok(())
}

async fn run(config: Config, shutdown: watch::Receiver<bool>) -> Result<(), FalconServerError> {
    let repo = match &config.db_path {
        Some(path) => EventRepo::open(path)?,
        None => EventRepo::open_in_memory()?,
    };

    let mut area_map = AreaMap::new();
    for area in &config.areas {
        area_map = area_map.with_area(area.name.clone(), area.polygon.clone());
        let polygon_json = serde_json::to_string(&area.polygon).unwrap_or_default();
        repo.register_area(&area.name, &polygon_json)?;
    }
    let area_map = Arc::new(area_map);

    let risk = falcon_risk::spawn();
    let frame_buffer = frame_buffer_task::spawn(config.frame_buffer_max_age_ms, config.frame_buffer_max_gap_frames);
    let persistence = persistence::spawn(repo, (*area_map).clone(), config.img_dir.clone(), config.first_observation_ttl_ms);

    let cameras = registry::new_camera_registry();
    let video_targets = registry::new_console_video_targets();
    let consoles: Broadcaster<ServerToConsoleMessage> = Broadcaster::new(256);

    let ingest_listener = bind_tcp(config.host, config.ingest_port).await?;
    let console_listener = bind_tcp(config.host, config.console_port).await?;
    let bird_listener = bind_tcp(config.host, config.bird_port).await?;
    let pilot_listener = bind_tcp(config.host, config.pilot_port).await?;
    let video_socket = bind_udp(config.host, config.video_port).await?;
    let video_send_socket = UdpSocket::bind((config.host, 0)).await.map_err(FalconServerError::BindFailed)?;

    let font_bytes = std::fs::read(&config.overlay_font_path)?;
    let style = OverlayStyle { font_scale: config.overlay_font_scale, ..OverlayStyle::default() };
    let overlay = OverlayRenderer::new(font_bytes, style)?;

    let ingest_handle = tokio::spawn(ingest::accept_loop(
        ingest_listener,
        frame_buffer.clone(),
        persistence.clone(),
        risk.clone(),
        area_map.clone(),
        consoles.clone(),
        cameras.clone(),
        shutdown.clone(),
    ));
    let console_handle = tokio::spawn(console::accept_loop(
        console_listener,
        risk.clone(),
        persistence.clone(),
        consoles.clone(),
        cameras.clone(),
        video_targets.clone(),
        config.console_video_port,
        shutdown.clone(),
    ));
    let bird_handle = tokio::spawn(bird::accept_loop(bird_listener, risk.clone(), shutdown.clone()));
    let pilot_handle = tokio::spawn(pilot::accept_loop(pilot_listener, risk.clone(), shutdown.clone()));
    let video_handle = tokio::spawn(video::run(
        video_socket,
        video_send_socket,
        overlay,
        frame_buffer.clone(),
        video_targets.clone(),
        shutdown.clone(),
    ));

    let _ = tokio::join!(ingest_handle, console_handle, bird_handle, pilot_handle, video_handle);
    Ok(())
}

async fn bind_tcp(host: std::net::IpAddr, port: u16) -> Result<TcpListener, FalconServerError> {
    let addr = SocketAddr::new(host, port);
    TcpListener::bind(addr).await.map_err(FalconServerError::BindFailed)
}

async fn bind_udp(host: std::net::IpAddr, port: u16) -> Result<UdpSocket, FalconServerError> {
    let addr = SocketAddr::new(host, port);
    UdpSocket::bind(addr).await.map_err(FalconServerError::BindFailed)
}
