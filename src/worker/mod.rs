//! The worker task
//!
//! All stream state lives in one task. Commands, socket events, decoder
//! results and pacing ticks arrive on channels and are handled one at a time
//! in arrival order, so handlers never run concurrently.

pub mod command;
pub mod event;

use std::future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::codec::{CodecFactory, DecoderEvent};
use crate::config::AppConfig;
use crate::error::{Result, StreamError};
use crate::media::{AudioPort, PacingTick};
use crate::network::{Connector, SocketEnvelope};
use crate::streams::{RegistryChannels, StreamRegistry, StreamSettings, StreamStats};

pub use command::{Command, StreamConfig};
pub use event::{EventSink, LogLevel, WorkerEvent};

/// Cloneable sender for worker commands
#[derive(Clone)]
pub struct WorkerHandle {
    commands: mpsc::Sender<Command>,
}

impl WorkerHandle {
    pub async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| StreamError::WorkerGone.into())
    }

    pub async fn init_stream(
        &self,
        subscriber_id: impl Into<String>,
        media_url: impl Into<String>,
        port: Option<AudioPort>,
    ) -> Result<()> {
        self.send(Command::InitStream {
            subscriber_id: subscriber_id.into(),
            data: StreamConfig {
                media_url: media_url.into(),
            },
            port,
        })
        .await
    }

    /// Remove by stream id or subscriber id
    pub async fn remove_stream(&self, id: impl Into<String>) -> Result<()> {
        self.send(Command::RemoveStream {
            subscriber_id: id.into(),
        })
        .await
    }

    pub async fn reset(&self) -> Result<()> {
        self.send(Command::Reset).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(Command::Stop).await
    }

    pub async fn add_subscriber_channel_port(
        &self,
        subscriber_id: impl Into<String>,
        port: AudioPort,
    ) -> Result<()> {
        self.send(Command::AddSubscriberChannelPort {
            subscriber_id: subscriber_id.into(),
            port,
        })
        .await
    }

    pub async fn remove_subscriber_channel_port(&self, subscriber_id: impl Into<String>) -> Result<()> {
        self.send(Command::RemoveSubscriberChannelPort {
            subscriber_id: subscriber_id.into(),
        })
        .await
    }

    pub async fn snapshot(&self) -> Result<Vec<StreamStats>> {
        let (respond_to, response) = oneshot::channel();
        self.send(Command::Snapshot { respond_to }).await?;
        response.await.map_err(|_| StreamError::WorkerGone.into())
    }
}

/// Owns the registry and the receiving ends of every channel feeding it
pub struct Worker {
    registry: StreamRegistry,
    commands: mpsc::Receiver<Command>,
    sockets: mpsc::UnboundedReceiver<SocketEnvelope>,
    decoders: mpsc::UnboundedReceiver<DecoderEvent>,
    ticks: mpsc::UnboundedReceiver<PacingTick>,
    events: EventSink,
    stats_interval: Option<Duration>,
}

impl Worker {
    /// Build a worker, its command handle and the outbound event stream
    pub fn new(
        config: &AppConfig,
        connector: Arc<dyn Connector>,
        codecs: Arc<dyn CodecFactory>,
    ) -> (Self, WorkerHandle, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (commands_tx, commands) = mpsc::channel(config.worker.command_queue.max(1));
        let (sockets_tx, sockets) = mpsc::unbounded_channel();
        let (decoders_tx, decoders) = mpsc::unbounded_channel();
        let (ticks_tx, ticks) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let events = EventSink::new(events_tx);

        let registry = StreamRegistry::new(
            StreamSettings::from_config(config),
            connector,
            codecs,
            RegistryChannels {
                sockets: sockets_tx,
                decoders: decoders_tx,
                ticks: ticks_tx,
                events: events.clone(),
            },
        );

        let stats_interval =
            (config.worker.stats_interval_secs > 0).then(|| Duration::from_secs(config.worker.stats_interval_secs));

        let worker = Self {
            registry,
            commands,
            sockets,
            decoders,
            ticks,
            events,
            stats_interval,
        };
        (worker, WorkerHandle { commands: commands_tx }, events_rx)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until every [`WorkerHandle`] is dropped, then tear down all streams
    pub async fn run(mut self) {
        info!("Media worker started");
        let mut stats = self.stats_interval.map(|period| {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        info!("All worker handles dropped, shutting down");
                        break;
                    }
                },
                Some(envelope) = self.sockets.recv() => self.registry.on_socket_event(envelope),
                Some(event) = self.decoders.recv() => self.registry.on_decoder_event(event),
                Some(tick) = self.ticks.recv() => self.registry.on_pacing_tick(tick),
                _ = next_stats_tick(&mut stats) => self.registry.log_stats(),
            }
        }

        self.registry.stop_all();
        info!("Media worker stopped");
    }

    fn handle_command(&mut self, command: Command) {
        let name = command.name();
        let subscriber_id = command.subscriber_id().map(str::to_owned);
        debug!(command = name, subscriber_id = ?subscriber_id, "Handling command");

        if let Err(e) = self.dispatch(command) {
            error!(command = name, "Command failed: {}", e);
            self.events.emit(WorkerEvent::Error {
                message: format!("Error in {}: {}", name, e),
                error: None,
                stream_id: None,
                subscriber_id,
            });
        }
    }

    fn dispatch(&mut self, command: Command) -> Result<()> {
        match command {
            Command::InitStream {
                subscriber_id,
                data,
                port,
            } => {
                info!(subscriber_id = %subscriber_id, "Initializing stream");
                self.registry
                    .init_stream(&subscriber_id, &data.media_url, port)?;
            }
            Command::RemoveStream { subscriber_id } => {
                self.registry.remove_stream(&subscriber_id);
            }
            Command::Reset => {
                info!("Resetting all streams");
                self.registry.reset();
            }
            Command::Stop => {
                info!("Stopping all operations");
                self.registry.stop_all();
            }
            Command::AddSubscriberChannelPort {
                subscriber_id,
                port,
            } => {
                self.registry.add_subscriber_channel_port(&subscriber_id, port);
            }
            Command::RemoveSubscriberChannelPort { subscriber_id } => {
                if !self.registry.remove_subscriber_channel_port(&subscriber_id) {
                    debug!(subscriber_id = %subscriber_id, "No channel bound");
                }
            }
            Command::Snapshot { respond_to } => {
                if respond_to.send(self.registry.snapshot()).is_err() {
                    debug!("Snapshot requester went away");
                }
            }
        }
        Ok(())
    }
}

async fn next_stats_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending().await,
    }
}
