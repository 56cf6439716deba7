// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

/// Subsample encryption layout of a single packet.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PacketCryptoInfo {
    pub flags: u16,
    /// Bytes in the clear, one entry per subsample.
    pub clear_bytes: Vec<u16>,
    /// Encrypted bytes following each clear run.
    pub cipher_bytes: Vec<u32>,
    pub iv: [u8; 16],
    pub kid: [u8; 16],
}

impl PacketCryptoInfo {
    pub fn num_subsamples(&self) -> usize {
        self.clear_bytes.len()
    }
}

/// A compressed access unit as delivered by the demuxer.
///
/// The payload is borrowed for the duration of the call that receives the packet; a session
/// that needs the bytes later copies them.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompressedPacket<'a> {
    pub data: &'a [u8],
    /// Presentation timestamp in microseconds.
    pub pts: i64,
    /// Decode timestamp in microseconds.
    pub dts: i64,
    pub duration: i64,
    pub stream_id: i32,
    pub crypto: Option<&'a PacketCryptoInfo>,
}

impl<'a> CompressedPacket<'a> {
    pub fn new(data: &'a [u8], pts: i64) -> Self {
        Self { data, pts, dts: pts, ..Default::default() }
    }

    /// The empty packet signalling that no more input will follow.
    pub fn end_of_stream() -> Self {
        Self::default()
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.data.is_empty()
    }
}
