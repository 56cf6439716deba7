// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! State machine driving a [`DecoderBackend`] on behalf of the host.

use std::collections::HashSet;
use std::collections::VecDeque;

use crate::backend::BackendPicture;
use crate::backend::DecoderBackend;
use crate::capabilities::negotiate;
use crate::codec::InitParameters;
use crate::decoder::DecoderSession;
use crate::decoder::ErrorKind;
use crate::decoder::SessionConfig;
use crate::decoder::SessionError;
use crate::decoder::SessionResult;
use crate::decoder::SessionState;
use crate::decoder::SessionStats;
use crate::frame_pool::BufferHandle;
use crate::frame_pool::BufferProvider;
use crate::image_processing::i420_to_picture;
use crate::packet::CompressedPacket;
use crate::packet::PacketCryptoInfo;
use crate::picture::DecodeResult;
use crate::picture::DecodedPicture;
use crate::picture::PictureFlags;
use crate::VideoFormat;

struct QueuedPacket {
    data: Vec<u8>,
    pts: i64,
    crypto: Option<PacketCryptoInfo>,
}

/// Copies a backend picture into the host buffer `handle`, laid out as `picture` says.
fn write_picture<P: BufferProvider>(
    provider: &mut P,
    decoded: &BackendPicture,
    picture: &DecodedPicture,
    handle: BufferHandle,
) -> SessionResult<()> {
    if !picture.layout_fits() {
        return Err(SessionError::PictureWrite(format!(
            "buffer {handle:?} of {} bytes cannot hold a {}x{} picture",
            picture.decoded_data_size, picture.width, picture.height
        )));
    }
    let dst = provider.map_mut(handle)?;
    if dst.len() < picture.decoded_data_size {
        return Err(SessionError::PictureWrite(format!(
            "buffer {handle:?} maps {} bytes, {} advertised",
            dst.len(),
            picture.decoded_data_size
        )));
    }
    i420_to_picture(&decoded.as_planes(), decoded.resolution, picture, dst)
        .map_err(SessionError::PictureWrite)
}

/// A decoder session over backend `B`, writing pictures into buffers from provider `P`.
pub struct Session<B: DecoderBackend, P: BufferProvider> {
    backend: B,
    provider: P,
    config: SessionConfig,
    state: SessionState,
    params: Option<InitParameters>,
    output_format: VideoFormat,
    input: VecDeque<QueuedPacket>,
    backend_flushed: bool,
    // Buffers handed to the caller and not released yet.
    outstanding: HashSet<BufferHandle>,
    last_pts: Option<i64>,
    // Kind of the failure that moved the session to `Error`.
    last_failure: Option<ErrorKind>,
    // The backend failed to apply a configuration and may have lost the active one.
    backend_stale: bool,
    stats: SessionStats,
}

impl<B: DecoderBackend, P: BufferProvider> Session<B, P> {
    pub fn new(backend: B, provider: P) -> Self {
        Self::with_config(backend, provider, Default::default())
    }

    pub fn with_config(backend: B, provider: P, config: SessionConfig) -> Self {
        Self {
            backend,
            provider,
            config,
            state: SessionState::Uninitialized,
            params: None,
            output_format: VideoFormat::Unknown,
            input: VecDeque::new(),
            backend_flushed: false,
            outstanding: HashSet::new(),
            last_pts: None,
            last_failure: None,
            backend_stale: false,
            stats: Default::default(),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Parameters of the active configuration.
    pub fn params(&self) -> Option<&InitParameters> {
        self.params.as_ref()
    }

    pub fn output_format(&self) -> VideoFormat {
        self.output_format
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn num_queued_packets(&self) -> usize {
        self.input.len()
    }

    /// Number of delivered buffers the caller has not released yet.
    pub fn num_outstanding_buffers(&self) -> usize {
        self.outstanding.len()
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            log::debug!("session state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    fn validate(&self, params: &InitParameters) -> SessionResult<VideoFormat> {
        let format =
            negotiate(&self.backend.capabilities(), params).map_err(SessionError::Unsupported)?;
        if let Some(crypto) = params.crypto.as_ref().filter(|crypto| crypto.is_encrypted()) {
            if !self.backend.supports_crypto(crypto.requires_secure_decoder()) {
                return Err(SessionError::Unsupported(format!(
                    "{:?} decryption (flags {:#x}) is not available",
                    crypto.key_system, crypto.flags
                )));
            }
        }
        Ok(format)
    }

    fn fail(&mut self, error: &SessionError) {
        self.stats.errors += 1;
        self.last_failure = Some(error.kind());
        self.set_state(SessionState::Error);
    }

    fn discard_pending(&mut self) {
        if !self.input.is_empty() {
            log::debug!("discarding {} queued packets", self.input.len());
        }
        self.input.clear();
        self.backend_flushed = false;
        self.last_pts = None;
    }

    fn deliver(
        &mut self,
        decoded: BackendPicture,
        picture: &mut DecodedPicture,
        discard: bool,
    ) -> SessionResult<()> {
        picture.video_format = self.output_format;
        picture.width = decoded.resolution.width;
        picture.height = decoded.resolution.height;
        picture.pts = decoded.timestamp;
        if self.state == SessionState::Draining {
            picture.flags.insert(PictureFlags::DRAIN);
        }
        if discard {
            picture.flags.insert(PictureFlags::DROP);
            self.stats.pictures_dropped += 1;
            return Ok(());
        }

        self.provider.get_frame_buffer(picture)?;
        let handle = picture.buffer.ok_or_else(|| {
            SessionError::PictureWrite("provider did not return a buffer handle".into())
        })?;
        if let Err(e) = write_picture(&mut self.provider, &decoded, picture, handle) {
            // Not handed out yet, so it goes straight back to the provider.
            if let Err(release_err) = self.provider.release_frame_buffer(handle) {
                log::warn!("failed to release unused buffer {handle:?}: {release_err}");
            }
            picture.buffer = None;
            return Err(e);
        }

        self.outstanding.insert(handle);
        self.stats.pictures_delivered += 1;
        Ok(())
    }

    fn try_get_picture(
        &mut self,
        picture: &mut DecodedPicture,
        discard: bool,
    ) -> SessionResult<DecodeResult> {
        loop {
            if let Some(decoded) = self.backend.next_picture() {
                if decoded.decode_only {
                    log::debug!("skipping decode-only picture at {}", decoded.timestamp);
                    continue;
                }
                if let Some(last) = self.last_pts.filter(|last| decoded.timestamp < *last) {
                    log::warn!(
                        "dropping picture at {} emitted after {}; display order violated",
                        decoded.timestamp,
                        last
                    );
                    self.stats.pictures_dropped += 1;
                    continue;
                }
                self.last_pts = Some(decoded.timestamp);
                self.deliver(decoded, picture, discard)?;
                if self.state != SessionState::Draining {
                    self.set_state(SessionState::Ready);
                }
                return Ok(DecodeResult::Picture);
            }

            if let Some(packet) = self.input.pop_front() {
                self.backend.decode(packet.pts, &packet.data, packet.crypto.as_ref())?;
                continue;
            }

            if self.state == SessionState::Draining {
                if !self.backend_flushed {
                    self.backend.flush()?;
                    self.backend_flushed = true;
                    continue;
                }
                self.set_state(SessionState::Terminated);
                return Ok(DecodeResult::EndOfStream);
            }

            self.set_state(SessionState::AwaitingMoreInput);
            return Ok(DecodeResult::NeedsMoreInput);
        }
    }
}

impl<B: DecoderBackend, P: BufferProvider> DecoderSession for Session<B, P> {
    fn open(&mut self, params: &InitParameters) -> SessionResult<()> {
        if self.state != SessionState::Uninitialized {
            log::warn!("open called on a session in state {:?}", self.state);
            return Err(SessionError::InvalidState(self.state));
        }
        let format = self.validate(params).map_err(|e| {
            log::warn!("rejecting stream configuration: {e}");
            e
        })?;
        if let Err(e) = self.backend.configure(params, format) {
            log::warn!("backend {} refused configuration: {e}", self.backend.name());
            self.backend.reset();
            return Err(SessionError::Configure(e));
        }

        log::debug!(
            "opened {} {} session, output {format}",
            params.codec,
            params.coded_size
        );
        self.params = Some(params.clone());
        self.output_format = format;
        self.discard_pending();
        self.set_state(SessionState::Ready);
        Ok(())
    }

    fn reconfigure(&mut self, params: &InitParameters) -> SessionResult<()> {
        match self.state {
            SessionState::Ready | SessionState::AwaitingMoreInput | SessionState::Draining => (),
            state => {
                log::warn!("reconfigure called on a session in state {state:?}");
                return Err(SessionError::InvalidState(state));
            }
        }
        let format = self.validate(params).map_err(|e| {
            log::warn!("rejecting new stream configuration, keeping the current one: {e}");
            e
        })?;
        if let Err(e) = self.backend.configure(params, format) {
            log::error!("backend {} failed to reconfigure: {e}", self.backend.name());
            let error = SessionError::Configure(e);
            self.backend_stale = true;
            self.fail(&error);
            return Err(error);
        }

        log::debug!("reconfigured to {} {}, output {format}", params.codec, params.coded_size);
        self.params = Some(params.clone());
        self.output_format = format;
        self.discard_pending();
        self.set_state(SessionState::Ready);
        Ok(())
    }

    fn add_data(&mut self, packet: &CompressedPacket) -> SessionResult<()> {
        if !self.state.accepts_input() {
            self.stats.packets_rejected += 1;
            log::warn!("add_data called on a session in state {:?}", self.state);
            return Err(SessionError::InvalidState(self.state));
        }
        if packet.is_end_of_stream() {
            log::debug!("end of input, {} packets still queued", self.input.len());
            self.set_state(SessionState::Draining);
            return Ok(());
        }
        let encrypted_stream =
            self.params.as_ref().map(InitParameters::is_encrypted).unwrap_or(false);
        if packet.crypto.is_some() && !encrypted_stream {
            self.stats.packets_rejected += 1;
            return Err(SessionError::UnexpectedCrypto);
        }
        if self.input.len() >= self.config.max_queued_packets {
            self.stats.packets_rejected += 1;
            return Err(SessionError::QueueFull(self.input.len()));
        }

        self.input.push_back(QueuedPacket {
            data: packet.data.to_vec(),
            pts: packet.pts,
            crypto: packet.crypto.cloned(),
        });
        self.stats.packets_queued += 1;
        self.set_state(SessionState::Ready);
        Ok(())
    }

    fn get_picture(&mut self, picture: &mut DecodedPicture) -> DecodeResult {
        let request = picture.flags;
        *picture = DecodedPicture::default();

        match self.state {
            SessionState::Uninitialized => return DecodeResult::NoOp,
            SessionState::Error => return DecodeResult::Error,
            SessionState::Terminated => return DecodeResult::EndOfStream,
            _ => (),
        }
        if request.contains(PictureFlags::DRAIN) && self.state.accepts_input() {
            log::debug!("drain requested by the caller");
            self.set_state(SessionState::Draining);
        }

        match self.try_get_picture(picture, request.contains(PictureFlags::DROP)) {
            Ok(result) => result,
            Err(e) => {
                log::error!("get_picture failed: {e}");
                *picture = DecodedPicture::default();
                self.fail(&e);
                DecodeResult::Error
            }
        }
    }

    fn get_name(&self) -> Option<&str> {
        self.config.name.as_deref().or(Some(self.backend.name()))
    }

    fn reset(&mut self) {
        if !self.state.is_opened() {
            return;
        }
        self.backend.reset();
        self.discard_pending();
        if self.backend_stale {
            if let Some(params) = self.params.as_ref() {
                if let Err(e) = self.backend.configure(params, self.output_format) {
                    log::error!(
                        "backend {} cannot restore its configuration: {e}",
                        self.backend.name()
                    );
                    self.fail(&SessionError::Configure(e));
                    return;
                }
            }
            log::debug!("restored the last accepted configuration");
            self.backend_stale = false;
        }
        self.last_failure = None;
        self.set_state(SessionState::Ready);
    }

    fn release_frame_buffer(&mut self, handle: BufferHandle) -> SessionResult<()> {
        if !self.outstanding.remove(&handle) {
            log::warn!("ignoring release of buffer {handle:?} not held by the caller");
            return Err(SessionError::UnknownHandle(handle));
        }
        self.provider.release_frame_buffer(handle).map_err(|e| {
            log::warn!("provider failed to release {handle:?}: {e}");
            SessionError::Buffer(e)
        })
    }

    fn state(&self) -> SessionState {
        self.state
    }

    fn last_failure(&self) -> Option<ErrorKind> {
        self.last_failure
    }
}

impl<B: DecoderBackend, P: BufferProvider> Drop for Session<B, P> {
    fn drop(&mut self) {
        if !self.outstanding.is_empty() {
            log::debug!(
                "session dropped with {} buffers still owned by the caller",
                self.outstanding.len()
            );
        }
    }
}
