// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The call table exposed to the host.
//!
//! Every entry point reports failure as a `bool` or a [`DecodeResult`]; the detailed
//! [`SessionError`](crate::decoder::SessionError) is logged and kept available through
//! [`VideoCodecInstance::last_error`].

use std::sync::Arc;

use thiserror::Error;

use crate::codec::InitParameters;
use crate::decoder::DecoderSession;
use crate::decoder::ErrorKind;
use crate::decoder::SessionResult;
use crate::decoder::SessionState;
use crate::frame_pool::BufferHandle;
use crate::packet::CompressedPacket;
use crate::picture::DecodeResult;
use crate::picture::DecodedPicture;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InstanceError {
    #[error("only one decoder instance may exist at a time")]
    AlreadyInstantiated,
    #[error("instance limit of {0} reached")]
    LimitReached(usize),
}

/// Limits applied when the host asks for a new decoder instance.
#[derive(Clone, Debug, Default)]
pub struct InstanceConfig {
    /// Refuse a second instance while one is alive.
    pub single_instance: bool,
    pub max_instances: Option<usize>,
}

/// Hands out [`VideoCodecInstance`]s while enforcing an [`InstanceConfig`].
#[derive(Debug)]
pub struct InstanceFactory {
    config: InstanceConfig,
    // Each live instance holds a clone.
    live: Arc<()>,
}

impl InstanceFactory {
    pub fn new(config: InstanceConfig) -> Self {
        Self { config, live: Arc::new(()) }
    }

    /// Number of instances created by this factory and not dropped yet.
    pub fn num_instances(&self) -> usize {
        Arc::strong_count(&self.live) - 1
    }

    pub fn create<S: DecoderSession>(
        &self,
        session: S,
    ) -> Result<VideoCodecInstance<S>, InstanceError> {
        let live = self.num_instances();
        if self.config.single_instance && live > 0 {
            log::warn!("refusing a second decoder instance");
            return Err(InstanceError::AlreadyInstantiated);
        }
        if let Some(max) = self.config.max_instances.filter(|max| live >= *max) {
            log::warn!("refusing decoder instance, {live} already alive");
            return Err(InstanceError::LimitReached(max));
        }
        Ok(VideoCodecInstance { session, last_error: None, _token: Arc::clone(&self.live) })
    }
}

impl Default for InstanceFactory {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

/// A decoder session seen through the host's call table.
pub struct VideoCodecInstance<S: DecoderSession = Box<dyn DecoderSession + Send>> {
    session: S,
    last_error: Option<ErrorKind>,
    _token: Arc<()>,
}

impl<S: DecoderSession> VideoCodecInstance<S> {
    fn check(&mut self, call: &str, result: SessionResult<()>) -> bool {
        match result {
            Ok(()) => {
                self.last_error = None;
                true
            }
            Err(e) => {
                log::warn!("{call} failed: {e}");
                self.last_error = Some(e.kind());
                false
            }
        }
    }

    pub fn open(&mut self, params: &InitParameters) -> bool {
        let result = self.session.open(params);
        self.check("open", result)
    }

    pub fn reconfigure(&mut self, params: &InitParameters) -> bool {
        let result = self.session.reconfigure(params);
        self.check("reconfigure", result)
    }

    pub fn add_data(&mut self, packet: &CompressedPacket) -> bool {
        let result = self.session.add_data(packet);
        self.check("add_data", result)
    }

    pub fn get_picture(&mut self, picture: &mut DecodedPicture) -> DecodeResult {
        let result = self.session.get_picture(picture);
        self.last_error = match result {
            DecodeResult::Error => self.session.last_failure().or(Some(ErrorKind::Corruption)),
            _ => None,
        };
        result
    }

    pub fn get_name(&self) -> Option<&str> {
        self.session.get_name()
    }

    pub fn reset(&mut self) {
        self.last_error = None;
        self.session.reset()
    }

    pub fn release_frame_buffer(&mut self, handle: BufferHandle) -> bool {
        let result = self.session.release_frame_buffer(handle);
        self.check("release_frame_buffer", result)
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// How the most recent failed call should be recovered from, if the last call failed.
    pub fn last_error(&self) -> Option<ErrorKind> {
        self.last_error
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backend::dummy::encode_frame;
    use crate::backend::dummy::DummyBackend;
    use crate::backend::dummy::FLAG_KEYFRAME;
    use crate::codec::Codec;
    use crate::decoder::Session;
    use crate::frame_pool::FramePool;
    use crate::Resolution;
    use crate::VideoFormat;

    fn session() -> Session<DummyBackend, FramePool> {
        Session::new(DummyBackend::default(), FramePool::new(4))
    }

    fn params() -> InitParameters {
        InitParameters::new(Codec::Vp9, Resolution::from((64, 32)), vec![VideoFormat::I420])
    }

    #[test]
    fn single_instance_is_enforced() {
        let config = InstanceConfig { single_instance: true, ..Default::default() };
        let factory = InstanceFactory::new(config);
        let first = factory.create(session()).unwrap();
        assert_eq!(factory.num_instances(), 1);
        assert_eq!(factory.create(session()).err(), Some(InstanceError::AlreadyInstantiated));

        drop(first);
        assert_eq!(factory.num_instances(), 0);
        assert!(factory.create(session()).is_ok());
    }

    #[test]
    fn instance_limit_is_enforced() {
        let config = InstanceConfig { max_instances: Some(2), ..Default::default() };
        let factory = InstanceFactory::new(config);
        let _a = factory.create(session()).unwrap();
        let _b = factory.create(session()).unwrap();
        assert_eq!(factory.create(session()).err(), Some(InstanceError::LimitReached(2)));
    }

    #[test]
    fn failures_map_to_false() {
        let factory = InstanceFactory::default();
        let mut instance = factory.create(session()).unwrap();
        assert!(!instance.add_data(&CompressedPacket::end_of_stream()));
        assert_eq!(instance.last_error(), Some(ErrorKind::Usage));

        assert!(instance.open(&params()));
        assert_eq!(instance.last_error(), None);
        assert!(!instance.open(&params()));
        assert!(!instance.release_frame_buffer(BufferHandle::new(0, 0)));
        assert_eq!(instance.get_name(), Some("dummy"));
    }

    #[test]
    fn boxed_sessions_go_through_the_same_table() {
        let factory = InstanceFactory::default();
        let boxed: Box<dyn DecoderSession + Send> = Box::new(session());
        let mut instance: VideoCodecInstance = factory.create(boxed).unwrap();
        assert!(instance.open(&params()));

        let frame = encode_frame(FLAG_KEYFRAME, &[1]);
        assert!(instance.add_data(&CompressedPacket::new(&frame, 0)));
        let mut picture = DecodedPicture::new();
        assert_eq!(instance.get_picture(&mut picture), DecodeResult::Picture);
        assert!(instance.release_frame_buffer(picture.buffer.unwrap()));
        assert_eq!(instance.state(), SessionState::Ready);
    }
}
