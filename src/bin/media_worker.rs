//! Media Worker Application
//!
//! Runs the ingestion worker, starts configured boot streams and exposes
//! the HTTP command surface.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stream_ingest::{
    codec::DefaultCodecFactory,
    config::AppConfig,
    media::DecodedAudio,
    network::WsConnector,
    worker::{LogLevel, Worker, WorkerEvent},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting media worker");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load_or_default(config_path.as_deref())?;

    let (worker, handle, events) = Worker::new(
        &config,
        Arc::new(WsConnector),
        Arc::new(DefaultCodecFactory),
    );
    let worker_task = worker.spawn();
    tokio::spawn(log_events(events));

    for stream in &config.streams {
        let (port, audio) = mpsc::channel(config.worker.audio_port_capacity.max(1));
        tokio::spawn(drain_audio(stream.subscriber_id.clone(), audio));
        handle
            .init_stream(stream.subscriber_id.clone(), stream.media_url.clone(), Some(port))
            .await?;
        tracing::info!("Boot stream {} requested", stream.media_url);
    }

    #[cfg(feature = "http-ui")]
    if config.ui.enabled {
        let web_server = stream_ingest::ui::WebServer::new(config.ui.clone(), handle.clone());
        let _web_handle = web_server.start_background();
        tracing::info!("HTTP API available at http://{}:{}", config.ui.bind_address, config.ui.http_port);
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    handle.stop().await?;
    // Wait for stop to be processed before the runtime goes away
    handle.snapshot().await?;
    worker_task.abort();

    tracing::info!("Media worker stopped");
    Ok(())
}

/// Mirror worker events into the log
async fn log_events(mut events: mpsc::UnboundedReceiver<WorkerEvent>) {
    while let Some(event) = events.recv().await {
        match &event {
            WorkerEvent::Log {
                level,
                event,
                message,
                ..
            } => match level {
                LogLevel::Info => tracing::info!(event = %event, "{}", message),
                LogLevel::Warn => tracing::warn!(event = %event, "{}", message),
                LogLevel::Error => tracing::error!(event = %event, "{}", message),
            },
            WorkerEvent::Error { message, .. } => tracing::error!("{}", message),
            WorkerEvent::VideoData { .. } => tracing::trace!("videoData"),
            other => match other.to_json() {
                Ok(json) => tracing::debug!("{}", json),
                Err(e) => tracing::warn!("Unserializable event {}: {}", other.kind(), e),
            },
        }
    }
}

/// Consume a boot stream's decoded audio
async fn drain_audio(subscriber_id: String, mut audio: mpsc::Receiver<DecodedAudio>) {
    let mut frames: u64 = 0;
    while let Some(chunk) = audio.recv().await {
        frames += 1;
        if frames % 500 == 1 {
            tracing::debug!(
                subscriber_id = %subscriber_id,
                "Audio frame {} ({} ch @ {} Hz, ts {}us)",
                frames,
                chunk.number_of_channels,
                chunk.sample_rate,
                chunk.timestamp
            );
        }
    }
    tracing::info!(subscriber_id = %subscriber_id, "Audio channel closed after {} frames", frames);
}
