// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The decoder session contract.

pub mod session;

use thiserror::Error;

use crate::backend::BackendError;
use crate::codec::InitParameters;
use crate::frame_pool::BufferError;
use crate::frame_pool::BufferHandle;
use crate::packet::CompressedPacket;
use crate::picture::DecodedPicture;
use crate::picture::DecodeResult;

pub use session::Session;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Constructed, `open` not called yet or failed.
    #[default]
    Uninitialized,
    /// Accepting input and producing pictures.
    Ready,
    /// The last `get_picture` ran out of input.
    AwaitingMoreInput,
    /// End of input was signalled; remaining pictures are being returned.
    Draining,
    /// Decoding failed; only `reset` recovers.
    Error,
    /// All pictures were returned after draining.
    Terminated,
}

impl SessionState {
    pub fn is_opened(&self) -> bool {
        !matches!(self, SessionState::Uninitialized)
    }

    pub fn accepts_input(&self) -> bool {
        matches!(self, SessionState::Ready | SessionState::AwaitingMoreInput)
    }
}

/// How the caller is expected to recover from a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Retry `open`/`reconfigure` with different parameters.
    Configuration,
    /// Drain output with `get_picture`, then retry.
    Backpressure,
    /// The session is in `Error` and needs a `reset`.
    Corruption,
    /// The host could not supply a picture buffer; the session needs a `reset`.
    BufferExhausted,
    /// The call is not valid right now.
    Usage,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("operation not valid in state {0:?}")]
    InvalidState(SessionState),
    #[error("unsupported stream configuration: {0}")]
    Unsupported(String),
    #[error("failed to apply stream configuration: {0}")]
    Configure(BackendError),
    #[error("input queue is full ({0} packets)")]
    QueueFull(usize),
    #[error("packet is encrypted but the stream was opened without a key system")]
    UnexpectedCrypto,
    #[error("decode failed: {0}")]
    Decode(#[from] BackendError),
    #[error("cannot obtain picture buffer: {0}")]
    Buffer(#[from] BufferError),
    #[error("cannot write picture: {0}")]
    PictureWrite(String),
    #[error("buffer {0:?} is not owned by the caller")]
    UnknownHandle(BufferHandle),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Unsupported(_) | SessionError::Configure(_) => ErrorKind::Configuration,
            SessionError::QueueFull(_) => ErrorKind::Backpressure,
            SessionError::Decode(_) | SessionError::PictureWrite(_) => ErrorKind::Corruption,
            SessionError::Buffer(_) => ErrorKind::BufferExhausted,
            SessionError::InvalidState(_)
            | SessionError::UnexpectedCrypto
            | SessionError::UnknownHandle(_) => ErrorKind::Usage,
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Overrides the backend name reported by `get_name`.
    pub name: Option<String>,
    /// Packets `add_data` accepts before pushing back on the caller.
    pub max_queued_packets: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { name: None, max_queued_packets: 16 }
    }
}

/// Counters kept over the lifetime of a session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub packets_queued: u64,
    pub packets_rejected: u64,
    pub pictures_delivered: u64,
    pub pictures_dropped: u64,
    pub errors: u64,
}

/// A video decoder bound to one compressed stream.
///
/// Calls are made sequentially by a single caller and return as soon as their result is known;
/// in particular `get_picture` never waits for input that has not been supplied.
pub trait DecoderSession {
    /// Validates `params` and prepares the decoder. Only valid once, on a fresh session.
    fn open(&mut self, params: &InitParameters) -> SessionResult<()>;

    /// Switches to new stream parameters mid-stream. On a rejected configuration the previous
    /// one stays active.
    fn reconfigure(&mut self, params: &InitParameters) -> SessionResult<()>;

    /// Queues a compressed packet. An empty packet signals the end of input.
    fn add_data(&mut self, packet: &CompressedPacket) -> SessionResult<()>;

    /// Produces at most one picture. `DROP` and `DRAIN` set in `picture.flags` by the caller
    /// request dropping and draining respectively.
    fn get_picture(&mut self, picture: &mut DecodedPicture) -> DecodeResult;

    fn get_name(&self) -> Option<&str>;

    /// Discards all pending input and pictures not yet delivered. A configuration the backend
    /// lost to a failed `reconfigure` is applied again.
    fn reset(&mut self);

    /// Returns a delivered picture's buffer to the host.
    fn release_frame_buffer(&mut self, handle: BufferHandle) -> SessionResult<()>;

    fn state(&self) -> SessionState;

    /// Kind of the failure that moved the session to `Error`, until the next `reset`.
    fn last_failure(&self) -> Option<ErrorKind>;
}

impl<S: DecoderSession + ?Sized> DecoderSession for Box<S> {
    fn open(&mut self, params: &InitParameters) -> SessionResult<()> {
        (**self).open(params)
    }

    fn reconfigure(&mut self, params: &InitParameters) -> SessionResult<()> {
        (**self).reconfigure(params)
    }

    fn add_data(&mut self, packet: &CompressedPacket) -> SessionResult<()> {
        (**self).add_data(packet)
    }

    fn get_picture(&mut self, picture: &mut DecodedPicture) -> DecodeResult {
        (**self).get_picture(picture)
    }

    fn get_name(&self) -> Option<&str> {
        (**self).get_name()
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn release_frame_buffer(&mut self, handle: BufferHandle) -> SessionResult<()> {
        (**self).release_frame_buffer(handle)
    }

    fn state(&self) -> SessionState {
        (**self).state()
    }

    fn last_failure(&self) -> Option<ErrorKind> {
        (**self).last_failure()
    }
}
