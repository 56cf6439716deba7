// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Decoder session and frame buffer protocol for video codec addons.
//!
//! A media host drives a [`decoder::DecoderSession`] implemented by the plugin: it opens the
//! session with [`codec::InitParameters`], feeds [`packet::CompressedPacket`]s and pulls
//! [`picture::DecodedPicture`]s. Picture storage always belongs to the host and is reached
//! through the [`frame_pool::BufferProvider`] trait, which hands out generation-checked
//! [`frame_pool::BufferHandle`]s instead of raw pointers.
//!
//! The [`instance`] module exposes the same operations as a flat call table returning plain
//! booleans and [`picture::DecodeResult`] codes, the shape the host binds against.

pub mod backend;
pub mod capabilities;
pub mod codec;
pub mod decoder;
pub mod frame_pool;
pub mod image_processing;
pub mod instance;
pub mod packet;
pub mod picture;

use std::fmt;

/// Output pixel formats. The numeric values are part of the host contract and must never
/// change; `Unknown` terminates format lists on the wire.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum VideoFormat {
    #[default]
    Unknown = 0,
    Yv12 = 1,
    I420 = 2,
}

impl VideoFormat {
    /// One past the largest valid wire value.
    pub const MAX: u32 = 3;

    /// Parses a wire format list, stopping at the first `Unknown` (zero) entry.
    ///
    /// Values that are not valid formats make the whole list invalid.
    pub fn list_from_wire(values: &[u32]) -> Option<Vec<VideoFormat>> {
        values
            .iter()
            .take_while(|v| **v != VideoFormat::Unknown as u32)
            .map(|v| VideoFormat::try_from(*v).ok())
            .collect()
    }

    /// Serializes `formats` in wire form, including the terminating `Unknown`.
    pub fn list_to_wire(formats: &[VideoFormat]) -> Vec<u32> {
        formats
            .iter()
            .filter(|f| **f != VideoFormat::Unknown)
            .map(|f| u32::from(*f))
            .chain(std::iter::once(VideoFormat::Unknown as u32))
            .collect()
    }
}

impl TryFrom<u32> for VideoFormat {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(VideoFormat::Unknown),
            1 => Ok(VideoFormat::Yv12),
            2 => Ok(VideoFormat::I420),
            _ => Err(format!("invalid video format {value}")),
        }
    }
}

impl From<VideoFormat> for u32 {
    fn from(format: VideoFormat) -> Self {
        format as u32
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VideoFormat::Unknown => write!(f, "unknown"),
            VideoFormat::Yv12 => write!(f, "YV12"),
            VideoFormat::I420 => write!(f, "I420"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Whether `self` fits within `other` in both dimensions.
    pub fn can_contain(&self, other: Self) -> bool {
        self.width >= other.width && self.height >= other.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<(u32, u32)> for Resolution {
    fn from(value: (u32, u32)) -> Self {
        Self { width: value.0, height: value.1 }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
