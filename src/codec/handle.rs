//! Decoder handles and the per-stream decoder pair

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::codec::{
    CodecFactory, CodecSession, DecodedOutput, DecoderConfig, DecoderState, EncodedChunk,
    MediaKind,
};
use crate::error::CodecError;

/// Identifies which stream context a decoder belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderOrigin {
    pub stream_id: String,
    pub subscriber_id: String,
    /// Context instance; a re-initialised stream gets a new one
    pub instance: u64,
}

/// Result pushed by a decoder onto the worker's decoder channel
#[derive(Debug)]
pub struct DecoderEvent {
    pub origin: DecoderOrigin,
    pub kind: MediaKind,
    pub body: DecoderEventBody,
}

#[derive(Debug)]
pub enum DecoderEventBody {
    Output(DecodedOutput),
    Error(String),
}

/// One decoder with observable state
///
/// Synchronous misuse (decoding while unconfigured or closed) and chunks the
/// codec refuses without damage are returned to the caller. Other failures
/// inside the codec are delivered on the result channel and close the
/// decoder, mirroring an asynchronous error callback.
pub struct DecoderHandle {
    kind: MediaKind,
    session: Box<dyn CodecSession>,
    state: DecoderState,
    origin: DecoderOrigin,
    events: mpsc::UnboundedSender<DecoderEvent>,
}

impl DecoderHandle {
    pub fn new(
        kind: MediaKind,
        session: Box<dyn CodecSession>,
        origin: DecoderOrigin,
        events: mpsc::UnboundedSender<DecoderEvent>,
    ) -> Self {
        Self {
            kind,
            session,
            state: DecoderState::Unconfigured,
            origin,
            events,
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Configure the codec. A failed configuration leaves the state unchanged.
    pub fn configure(&mut self, config: &DecoderConfig) -> Result<(), CodecError> {
        if self.state == DecoderState::Closed {
            return Err(CodecError::Closed);
        }
        self.session.configure(config)?;
        self.state = DecoderState::Configured;
        Ok(())
    }

    /// Feed one chunk.
    pub fn decode(&mut self, chunk: &EncodedChunk) -> Result<(), CodecError> {
        match self.state {
            DecoderState::Unconfigured => return Err(CodecError::Unconfigured),
            DecoderState::Closed => return Err(CodecError::Closed),
            DecoderState::Configured => {}
        }

        match self.session.decode(chunk) {
            Ok(Some(output)) => self.emit(DecoderEventBody::Output(output)),
            Ok(None) => {}
            Err(e) if e.is_recoverable() => return Err(e),
            Err(e) => {
                warn!(
                    stream_id = %self.origin.stream_id,
                    kind = %self.kind,
                    "Decoder failed, closing: {}", e
                );
                self.state = DecoderState::Closed;
                if let Err(close_err) = self.session.close() {
                    debug!("Close after decode failure also failed: {}", close_err);
                }
                self.emit(DecoderEventBody::Error(e.to_string()));
            }
        }
        Ok(())
    }

    /// Drop the configuration; the decoder waits for a new one
    pub fn reset(&mut self) -> Result<(), CodecError> {
        if self.state == DecoderState::Closed {
            return Err(CodecError::Closed);
        }
        self.session.reset()?;
        self.state = DecoderState::Unconfigured;
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), CodecError> {
        if self.state == DecoderState::Closed {
            return Err(CodecError::Closed);
        }
        self.state = DecoderState::Closed;
        self.session.close()
    }

    fn emit(&self, body: DecoderEventBody) {
        let event = DecoderEvent {
            origin: self.origin.clone(),
            kind: self.kind,
            body,
        };
        if self.events.send(event).is_err() {
            debug!(stream_id = %self.origin.stream_id, "Decoder channel closed, dropping output");
        }
    }
}

/// Outcome of [`DecoderSet::ensure_open`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// The decoder was usable as-is
    Untouched,
    /// A closed decoder was replaced and the new one configured
    Recreated,
    /// A closed decoder was replaced but configuration failed or was unavailable
    RecreatedUnconfigured,
}

/// Video and audio decoders for one stream
pub struct DecoderSet {
    factory: Arc<dyn CodecFactory>,
    origin: DecoderOrigin,
    events: mpsc::UnboundedSender<DecoderEvent>,
    video: Option<DecoderHandle>,
    audio: Option<DecoderHandle>,
}

impl DecoderSet {
    pub fn new(
        factory: Arc<dyn CodecFactory>,
        origin: DecoderOrigin,
        events: mpsc::UnboundedSender<DecoderEvent>,
    ) -> Self {
        Self {
            factory,
            origin,
            events,
            video: None,
            audio: None,
        }
    }

    /// Create both decoders, unconfigured
    pub fn initialize(&mut self) -> Result<(), CodecError> {
        self.video = Some(self.create(MediaKind::Video)?);
        self.audio = Some(self.create(MediaKind::Audio)?);
        Ok(())
    }

    fn create(&self, kind: MediaKind) -> Result<DecoderHandle, CodecError> {
        let session = self.factory.create(kind)?;
        Ok(DecoderHandle::new(
            kind,
            session,
            self.origin.clone(),
            self.events.clone(),
        ))
    }

    fn slot(&mut self, kind: MediaKind) -> &mut Option<DecoderHandle> {
        match kind {
            MediaKind::Video => &mut self.video,
            MediaKind::Audio => &mut self.audio,
        }
    }

    pub fn get(&self, kind: MediaKind) -> Option<&DecoderHandle> {
        match kind {
            MediaKind::Video => self.video.as_ref(),
            MediaKind::Audio => self.audio.as_ref(),
        }
    }

    pub fn get_mut(&mut self, kind: MediaKind) -> Option<&mut DecoderHandle> {
        self.slot(kind).as_mut()
    }

    pub fn state(&self, kind: MediaKind) -> Option<DecoderState> {
        self.get(kind).map(DecoderHandle::state)
    }

    /// Configure `kind` only while it is unconfigured.
    ///
    /// Returns whether a configuration was applied.
    pub fn configure_if_unconfigured(
        &mut self,
        kind: MediaKind,
        config: &DecoderConfig,
    ) -> Result<bool, CodecError> {
        match self.get_mut(kind) {
            Some(decoder) if decoder.state() == DecoderState::Unconfigured => {
                decoder.configure(config)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Replace a closed decoder with a fresh one configured from `config`.
    pub fn ensure_open(
        &mut self,
        kind: MediaKind,
        config: Option<&DecoderConfig>,
    ) -> Result<Recovery, CodecError> {
        if self.state(kind) != Some(DecoderState::Closed) {
            return Ok(Recovery::Untouched);
        }

        let mut decoder = self.create(kind)?;
        let configured = match config {
            Some(config) => match decoder.configure(config) {
                Ok(()) => true,
                Err(e) => {
                    *self.slot(kind) = Some(decoder);
                    return Err(e);
                }
            },
            None => false,
        };
        *self.slot(kind) = Some(decoder);

        Ok(if configured {
            Recovery::Recreated
        } else {
            Recovery::RecreatedUnconfigured
        })
    }

    /// Reset both decoders, collecting failures
    pub fn reset_all(&mut self) -> Vec<(MediaKind, CodecError)> {
        self.for_each(DecoderHandle::reset)
    }

    /// Close both decoders, collecting failures
    pub fn close_all(&mut self) -> Vec<(MediaKind, CodecError)> {
        self.for_each(DecoderHandle::close)
    }

    fn for_each(
        &mut self,
        op: fn(&mut DecoderHandle) -> Result<(), CodecError>,
    ) -> Vec<(MediaKind, CodecError)> {
        [self.video.as_mut(), self.audio.as_mut()]
            .into_iter()
            .flatten()
            .filter_map(|decoder| op(decoder).err().map(|e| (decoder.kind(), e)))
            .collect()
    }
}
