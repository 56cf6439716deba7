// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Codec backends wrapped by a decoder session.
//!
//! A backend performs the opaque decode step: it consumes one compressed access unit at a time
//! and yields pictures once their display order is settled. It never allocates host picture
//! memory; the session copies backend output into buffers obtained from the host.

#[cfg(feature = "dummy")]
pub mod dummy;

use thiserror::Error;

use crate::capabilities::DecoderCapability;
use crate::codec::InitParameters;
use crate::image_processing::I420Planes;
use crate::packet::PacketCryptoInfo;
use crate::picture::Plane;
use crate::Resolution;
use crate::VideoFormat;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("unsupported configuration: {0}")]
    Unsupported(String),
    #[error("corrupted bitstream: {0}")]
    Corrupted(String),
    #[error("backend is not configured")]
    NotConfigured,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// A decoded 4:2:0 picture held by the backend until the session copies it out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendPicture {
    pub timestamp: i64,
    pub resolution: Resolution,
    /// Tightly packed Y, U and V planes.
    pub planes: [Vec<u8>; Plane::MAX_PLANES],
    pub strides: [usize; Plane::MAX_PLANES],
    /// The backend decoded this picture for reference only; it is not meant to be shown.
    pub decode_only: bool,
}

impl BackendPicture {
    pub fn as_planes(&self) -> I420Planes<'_> {
        I420Planes {
            planes: [&self.planes[0], &self.planes[1], &self.planes[2]],
            strides: self.strides,
        }
    }
}

pub trait DecoderBackend {
    /// Human readable backend identifier.
    fn name(&self) -> &str;

    fn capabilities(&self) -> Vec<DecoderCapability>;

    /// Whether encrypted streams can be decoded, optionally inside a secure path.
    fn supports_crypto(&self, secure_decoder: bool) -> bool;

    /// Applies a new stream configuration, dropping all decoding state. `output_format` is the
    /// format negotiated with the host. After a failure the backend may be left unconfigured.
    fn configure(
        &mut self,
        params: &InitParameters,
        output_format: VideoFormat,
    ) -> BackendResult<()>;

    /// Decodes one access unit. `crypto` describes its encrypted subsamples, if any.
    fn decode(
        &mut self,
        timestamp: i64,
        bitstream: &[u8],
        crypto: Option<&PacketCryptoInfo>,
    ) -> BackendResult<()>;

    /// Signals the end of input; every held picture becomes available.
    fn flush(&mut self) -> BackendResult<()>;

    /// Next picture in display order, if one is ready.
    fn next_picture(&mut self) -> Option<BackendPicture>;

    /// Drops all decoding state but keeps the configuration.
    fn reset(&mut self);
}

impl<B: DecoderBackend + ?Sized> DecoderBackend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn capabilities(&self) -> Vec<DecoderCapability> {
        (**self).capabilities()
    }

    fn supports_crypto(&self, secure_decoder: bool) -> bool {
        (**self).supports_crypto(secure_decoder)
    }

    fn configure(
        &mut self,
        params: &InitParameters,
        output_format: VideoFormat,
    ) -> BackendResult<()> {
        (**self).configure(params, output_format)
    }

    fn decode(
        &mut self,
        timestamp: i64,
        bitstream: &[u8],
        crypto: Option<&PacketCryptoInfo>,
    ) -> BackendResult<()> {
        (**self).decode(timestamp, bitstream, crypto)
    }

    fn flush(&mut self) -> BackendResult<()> {
        (**self).flush()
    }

    fn next_picture(&mut self) -> Option<BackendPicture> {
        (**self).next_picture()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}
