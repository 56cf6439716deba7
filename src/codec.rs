// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Stream parameters handed to a decoder session by `open` and `reconfigure`.

use std::fmt;

use crate::Resolution;
use crate::VideoFormat;

/// Compressed stream identities. Wire values are fixed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Codec {
    #[default]
    Unknown = 0,
    Vp8 = 1,
    H264 = 2,
    Vp9 = 3,
}

impl TryFrom<u32> for Codec {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Codec::Unknown),
            1 => Ok(Codec::Vp8),
            2 => Ok(Codec::H264),
            3 => Ok(Codec::Vp9),
            _ => Err(format!("invalid codec {value}")),
        }
    }
}

impl From<Codec> for u32 {
    fn from(codec: Codec) -> Self {
        codec as u32
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Codec::Unknown => write!(f, "unknown"),
            Codec::Vp8 => write!(f, "vp8"),
            Codec::H264 => write!(f, "h264"),
            Codec::Vp9 => write!(f, "vp9"),
        }
    }
}

/// Stream profiles as numbered by the host's stream codec description.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CodecProfile {
    #[default]
    Unknown = 0,
    NotNeeded = 1,
    H264Baseline = 2,
    H264Main = 3,
    H264Extended = 4,
    H264High = 5,
    H264High10 = 6,
    H264High422 = 7,
    H264High444Predictive = 8,
    Vp9Profile0 = 20,
    Vp9Profile1 = 21,
    Vp9Profile2 = 22,
    Vp9Profile3 = 23,
}

impl CodecProfile {
    /// Profiles that carry no constraint and are accepted by every backend.
    pub fn is_unconstrained(&self) -> bool {
        matches!(self, CodecProfile::Unknown | CodecProfile::NotNeeded)
    }
}

impl TryFrom<u32> for CodecProfile {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => CodecProfile::Unknown,
            1 => CodecProfile::NotNeeded,
            2 => CodecProfile::H264Baseline,
            3 => CodecProfile::H264Main,
            4 => CodecProfile::H264Extended,
            5 => CodecProfile::H264High,
            6 => CodecProfile::H264High10,
            7 => CodecProfile::H264High422,
            8 => CodecProfile::H264High444Predictive,
            20 => CodecProfile::Vp9Profile0,
            21 => CodecProfile::Vp9Profile1,
            22 => CodecProfile::Vp9Profile2,
            23 => CodecProfile::Vp9Profile3,
            _ => return Err(format!("invalid codec profile {value}")),
        })
    }
}

impl From<CodecProfile> for u32 {
    fn from(profile: CodecProfile) -> Self {
        profile as u32
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CryptoKeySystem {
    #[default]
    None = 0,
    Widevine = 1,
    PlayReady = 2,
    WisePlay = 3,
}

/// DRM metadata attached to a stream.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CryptoInfo {
    pub key_system: CryptoKeySystem,
    pub flags: u8,
    pub session_id: Vec<u8>,
}

impl CryptoInfo {
    /// Decrypted samples must never leave the secure decoder.
    pub const FLAG_SECURE_DECODER: u8 = 1;

    pub fn requires_secure_decoder(&self) -> bool {
        self.flags & Self::FLAG_SECURE_DECODER != 0
    }

    pub fn is_encrypted(&self) -> bool {
        self.key_system != CryptoKeySystem::None
    }
}

/// Parameters describing a compressed stream.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InitParameters {
    pub codec: Codec,
    pub profile: CodecProfile,
    /// Acceptable output formats in order of preference.
    pub video_formats: Vec<VideoFormat>,
    pub coded_size: Resolution,
    /// Codec configuration record (e.g. avcC), if any.
    pub extra_data: Vec<u8>,
    pub crypto: Option<CryptoInfo>,
}

impl InitParameters {
    pub fn new(codec: Codec, coded_size: Resolution, video_formats: Vec<VideoFormat>) -> Self {
        Self { codec, coded_size, video_formats, ..Default::default() }
    }

    pub fn with_profile(mut self, profile: CodecProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_extra_data(mut self, extra_data: &[u8]) -> Self {
        self.extra_data = extra_data.to_vec();
        self
    }

    pub fn with_crypto(mut self, crypto: CryptoInfo) -> Self {
        self.crypto = Some(crypto);
        self
    }

    /// Host-requested output formats, ignoring anything past an `Unknown` terminator.
    pub fn requested_formats(&self) -> impl Iterator<Item = VideoFormat> + '_ {
        self.video_formats.iter().copied().take_while(|f| *f != VideoFormat::Unknown)
    }

    pub fn is_encrypted(&self) -> bool {
        self.crypto.as_ref().map(CryptoInfo::is_encrypted).unwrap_or(false)
    }
}
