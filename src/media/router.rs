//! Routing of decoded audio to subscriber channels
//!
//! Decoded audio bypasses the worker's event stream: it is split per channel
//! and sent on a channel bound to the stream's subscriber, so an audio consumer
//! never has to parse control or video traffic.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::codec::AudioData;

/// Decoded audio split into one buffer per channel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedAudio {
    pub channel_data: Vec<Vec<f32>>,
    /// Microseconds
    pub timestamp: u64,
    pub sample_rate: u32,
    pub number_of_frames: usize,
    pub number_of_channels: u16,
}

impl From<AudioData> for DecodedAudio {
    fn from(audio: AudioData) -> Self {
        let channel_data = deinterleave(&audio.samples, audio.number_of_channels as usize);
        Self {
            channel_data,
            timestamp: audio.timestamp_us,
            sample_rate: audio.sample_rate,
            number_of_frames: audio.number_of_frames,
            number_of_channels: audio.number_of_channels,
        }
    }
}

/// Sending half of a subscriber's decoded-audio channel
pub type AudioPort = mpsc::Sender<DecodedAudio>;

/// Split interleaved samples into per-channel buffers
pub fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    if channels == 0 {
        return Vec::new();
    }
    let frames = samples.len() / channels;
    let mut planes = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (plane, sample) in planes.iter_mut().zip(frame) {
            plane.push(*sample);
        }
    }
    planes
}

/// What happened to one routed audio buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Delivered,
    /// The consumer is not keeping up; the buffer was dropped
    Full,
    /// The consumer went away
    Closed,
    /// No channel is bound for this subscriber
    NoChannel,
}

/// Subscriber → audio channel table
#[derive(Default)]
pub struct ChannelRouter {
    ports: HashMap<String, AudioPort>,
}

impl ChannelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a subscriber's channel, returning the binding it replaced
    pub fn register(&mut self, subscriber_id: impl Into<String>, port: AudioPort) -> Option<AudioPort> {
        self.ports.insert(subscriber_id.into(), port)
    }

    pub fn unregister(&mut self, subscriber_id: &str) -> Option<AudioPort> {
        self.ports.remove(subscriber_id)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Send to the subscriber's registered channel, else to `fallback`
    pub fn route(
        &self,
        subscriber_id: &str,
        fallback: Option<&AudioPort>,
        audio: DecodedAudio,
    ) -> RouteOutcome {
        let Some(port) = self.ports.get(subscriber_id).or(fallback) else {
            return RouteOutcome::NoChannel;
        };

        match port.try_send(audio) {
            Ok(()) => RouteOutcome::Delivered,
            Err(TrySendError::Full(_)) => RouteOutcome::Full,
            Err(TrySendError::Closed(_)) => RouteOutcome::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(samples: Vec<f32>, channels: u16) -> DecodedAudio {
        DecodedAudio::from(AudioData {
            timestamp_us: 5_000,
            sample_rate: 48000,
            number_of_channels: channels,
            number_of_frames: samples.len() / channels as usize,
            samples,
        })
    }

    #[test]
    fn test_deinterleave_stereo() {
        let planes = deinterleave(&[0.1, -0.1, 0.2, -0.2, 0.3, -0.3], 2);
        assert_eq!(planes, vec![vec![0.1, 0.2, 0.3], vec![-0.1, -0.2, -0.3]]);
    }

    #[test]
    fn test_deinterleave_zero_channels() {
        assert!(deinterleave(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn test_from_audio_data() {
        let decoded = audio(vec![1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(decoded.number_of_frames, 2);
        assert_eq!(decoded.channel_data[1], vec![2.0, 4.0]);
        assert_eq!(decoded.timestamp, 5_000);
    }

    #[test]
    fn test_registered_channel_preferred() {
        let mut router = ChannelRouter::new();
        let (registered, mut registered_rx) = mpsc::channel(4);
        let (fallback, mut fallback_rx) = mpsc::channel(4);
        router.register("sub-1", registered);

        let outcome = router.route("sub-1", Some(&fallback), audio(vec![0.0; 4], 2));
        assert_eq!(outcome, RouteOutcome::Delivered);
        assert!(registered_rx.try_recv().is_ok());
        assert!(fallback_rx.try_recv().is_err());
    }

    #[test]
    fn test_fallback_and_missing_channel() {
        let router = ChannelRouter::new();
        let (fallback, mut fallback_rx) = mpsc::channel(4);

        assert_eq!(
            router.route("sub-2", Some(&fallback), audio(vec![0.0; 2], 1)),
            RouteOutcome::Delivered
        );
        assert!(fallback_rx.try_recv().is_ok());
        assert_eq!(
            router.route("sub-2", None, audio(vec![0.0; 2], 1)),
            RouteOutcome::NoChannel
        );
    }

    #[test]
    fn test_full_and_closed_channels() {
        let mut router = ChannelRouter::new();
        let (port, rx) = mpsc::channel(1);
        router.register("sub-3", port);

        assert_eq!(router.route("sub-3", None, audio(vec![0.0], 1)), RouteOutcome::Delivered);
        assert_eq!(router.route("sub-3", None, audio(vec![0.0], 1)), RouteOutcome::Full);

        drop(rx);
        assert_eq!(router.route("sub-3", None, audio(vec![0.0], 1)), RouteOutcome::Closed);
    }

    #[test]
    fn test_unregister() {
        let mut router = ChannelRouter::new();
        let (port, _rx) = mpsc::channel(1);
        assert!(router.register("sub-4", port.clone()).is_none());
        assert!(router.register("sub-4", port).is_some());
        assert!(router.unregister("sub-4").is_some());
        assert!(router.is_empty());
    }
}
