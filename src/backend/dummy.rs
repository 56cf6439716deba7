// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A backend that "decodes" a trivial framed bitstream.
//!
//! Each access unit is `b"VCDF"`, a flags byte, the CRC-32 of the payload as a little endian
//! u32, then the payload. The first three payload bytes give the Y, U and V fill values of the
//! picture. This is enough to drive the session protocol end to end: keyframe gating, picture
//! reordering, draining and corruption detection all behave like a real decoder's.

use std::collections::VecDeque;

use byteorder::ByteOrder;
use byteorder::LittleEndian;

use crate::backend::BackendError;
use crate::backend::BackendPicture;
use crate::backend::BackendResult;
use crate::backend::DecoderBackend;
use crate::capabilities::DecoderCapability;
use crate::codec::Codec;
use crate::codec::CodecProfile;
use crate::codec::InitParameters;
use crate::packet::PacketCryptoInfo;
use crate::picture::plane_size;
use crate::picture::Plane;
use crate::Resolution;
use crate::VideoFormat;

pub const MAGIC: &[u8; 4] = b"VCDF";
pub const HEADER_LEN: usize = 9;

/// The access unit can be decoded without references.
pub const FLAG_KEYFRAME: u8 = 1 << 0;
/// The picture is only used as a reference and never shown.
pub const FLAG_DECODE_ONLY: u8 = 1 << 1;

const DEFAULT_LUMA: u8 = 16;
const DEFAULT_CHROMA: u8 = 128;

/// Builds one access unit of the dummy bitstream.
pub fn encode_frame(flags: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0u8; HEADER_LEN];
    frame[0..4].copy_from_slice(MAGIC);
    frame[4] = flags;
    LittleEndian::write_u32(&mut frame[5..HEADER_LEN], crc32fast::hash(payload));
    frame.extend_from_slice(payload);
    frame
}

struct FrameHeader<'a> {
    flags: u8,
    payload: &'a [u8],
}

fn parse_frame(bitstream: &[u8]) -> BackendResult<FrameHeader<'_>> {
    if bitstream.len() < HEADER_LEN {
        return Err(BackendError::Corrupted(format!(
            "access unit of {} bytes is shorter than its header",
            bitstream.len()
        )));
    }
    if &bitstream[0..4] != MAGIC {
        return Err(BackendError::Corrupted(format!("bad magic {:02x?}", &bitstream[0..4])));
    }
    let payload = &bitstream[HEADER_LEN..];
    let expected = LittleEndian::read_u32(&bitstream[5..HEADER_LEN]);
    let actual = crc32fast::hash(payload);
    if expected != actual {
        return Err(BackendError::Corrupted(format!(
            "payload checksum mismatch: {actual:#010x} != {expected:#010x}"
        )));
    }
    Ok(FrameHeader { flags: bitstream[4], payload })
}

/// Checks that the subsample runs of `crypto` cover exactly `len` bytes.
///
/// An empty layout means the whole access unit is encrypted.
fn check_subsamples(crypto: &PacketCryptoInfo, len: usize) -> BackendResult<()> {
    if crypto.clear_bytes.len() != crypto.cipher_bytes.len() {
        return Err(BackendError::Corrupted(format!(
            "{} clear runs but {} encrypted runs",
            crypto.clear_bytes.len(),
            crypto.cipher_bytes.len()
        )));
    }
    let covered: usize = crypto
        .clear_bytes
        .iter()
        .zip(&crypto.cipher_bytes)
        .map(|(clear, cipher)| *clear as usize + *cipher as usize)
        .sum();
    if crypto.num_subsamples() > 0 && covered != len {
        return Err(BackendError::Corrupted(format!(
            "{} subsamples cover {covered} bytes of a {len} byte access unit",
            crypto.num_subsamples()
        )));
    }
    Ok(())
}

#[derive(Clone, Debug)]
pub struct DummyBackendOptions {
    pub codecs: Vec<Codec>,
    pub output_formats: Vec<VideoFormat>,
    /// Pictures held back for reordering. `None` picks a per-codec default.
    pub reorder_depth: Option<usize>,
    pub max_coded_size: Resolution,
    /// Accept encrypted streams; `secure_decoder` additionally allows secure-path streams.
    pub crypto: bool,
    pub secure_decoder: bool,
}

impl Default for DummyBackendOptions {
    fn default() -> Self {
        Self {
            codecs: vec![Codec::Vp8, Codec::H264, Codec::Vp9],
            output_formats: vec![VideoFormat::Yv12, VideoFormat::I420],
            reorder_depth: None,
            max_coded_size: Resolution::from((4096, 4096)),
            crypto: false,
            secure_decoder: false,
        }
    }
}

fn default_reorder_depth(codec: Codec, profile: CodecProfile) -> usize {
    match (codec, profile) {
        (Codec::H264, CodecProfile::H264Baseline) => 0,
        // B-frames force at least one picture of output delay.
        (Codec::H264, _) => 1,
        _ => 0,
    }
}

fn profiles_for(codec: Codec) -> Vec<CodecProfile> {
    match codec {
        Codec::H264 => vec![
            CodecProfile::H264Baseline,
            CodecProfile::H264Main,
            CodecProfile::H264Extended,
            CodecProfile::H264High,
        ],
        Codec::Vp9 => vec![CodecProfile::Vp9Profile0],
        _ => vec![],
    }
}

struct StreamConfig {
    coded_size: Resolution,
    reorder_depth: usize,
}

pub struct DummyBackend {
    options: DummyBackendOptions,
    config: Option<StreamConfig>,
    /// Decoded pictures whose display order is not settled yet.
    held: Vec<BackendPicture>,
    ready: VecDeque<BackendPicture>,
    seen_keyframe: bool,
    // Layout of the last encrypted access unit. The dummy stream itself is sent in the clear.
    last_crypto: Option<PacketCryptoInfo>,
}

impl DummyBackend {
    pub fn new(options: DummyBackendOptions) -> Self {
        Self {
            options,
            config: None,
            held: Vec::new(),
            ready: VecDeque::new(),
            seen_keyframe: false,
            last_crypto: None,
        }
    }

    /// Subsample layout of the most recent encrypted access unit.
    pub fn last_crypto(&self) -> Option<&PacketCryptoInfo> {
        self.last_crypto.as_ref()
    }

    /// Number of pictures decoded but not yet returned.
    pub fn num_pending(&self) -> usize {
        self.held.len() + self.ready.len()
    }

    fn bump(&mut self, keep: usize) {
        while self.held.len() > keep {
            let earliest = self
                .held
                .iter()
                .enumerate()
                .min_by_key(|(_, picture)| picture.timestamp)
                .map(|(index, _)| index);
            match earliest {
                Some(index) => self.ready.push_back(self.held.remove(index)),
                None => break,
            }
        }
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

impl DecoderBackend for DummyBackend {
    fn name(&self) -> &str {
        "dummy"
    }

    fn capabilities(&self) -> Vec<DecoderCapability> {
        self.options
            .codecs
            .iter()
            .map(|codec| DecoderCapability {
                codec: *codec,
                min_coded_size: Resolution::from((2, 2)),
                max_coded_size: self.options.max_coded_size,
                profiles: profiles_for(*codec),
                output_formats: self.options.output_formats.clone(),
            })
            .collect()
    }

    fn supports_crypto(&self, secure_decoder: bool) -> bool {
        self.options.crypto && (!secure_decoder || self.options.secure_decoder)
    }

    fn configure(
        &mut self,
        params: &InitParameters,
        output_format: VideoFormat,
    ) -> BackendResult<()> {
        if !self.options.codecs.contains(&params.codec) {
            return Err(BackendError::Unsupported(format!("codec {}", params.codec)));
        }
        if !self.options.output_formats.contains(&output_format) {
            return Err(BackendError::Unsupported(format!("output format {output_format}")));
        }
        let reorder_depth = self
            .options
            .reorder_depth
            .unwrap_or_else(|| default_reorder_depth(params.codec, params.profile));

        self.reset();
        self.config = Some(StreamConfig { coded_size: params.coded_size, reorder_depth });
        log::debug!(
            "dummy backend configured for {} {} (reorder depth {})",
            params.codec,
            params.coded_size,
            reorder_depth
        );
        Ok(())
    }

    fn decode(
        &mut self,
        timestamp: i64,
        bitstream: &[u8],
        crypto: Option<&PacketCryptoInfo>,
    ) -> BackendResult<()> {
        let config = self.config.as_ref().ok_or(BackendError::NotConfigured)?;
        if let Some(crypto) = crypto {
            if !self.options.crypto {
                return Err(BackendError::Unsupported("encrypted access unit".into()));
            }
            check_subsamples(crypto, bitstream.len())?;
            self.last_crypto = Some(crypto.clone());
        }
        let frame = parse_frame(bitstream)?;

        if frame.flags & FLAG_KEYFRAME != 0 {
            self.seen_keyframe = true;
        } else if !self.seen_keyframe {
            log::debug!("skipping access unit at {timestamp} until the first keyframe");
            return Ok(());
        }

        let resolution = config.coded_size;
        let fill = [
            frame.payload.first().copied().unwrap_or(DEFAULT_LUMA),
            frame.payload.get(1).copied().unwrap_or(DEFAULT_CHROMA),
            frame.payload.get(2).copied().unwrap_or(DEFAULT_CHROMA),
        ];
        let mut planes: [Vec<u8>; Plane::MAX_PLANES] = Default::default();
        let mut strides = [0usize; Plane::MAX_PLANES];
        for plane in Plane::ALL {
            let size = plane_size(resolution, plane);
            let index = plane as usize;
            strides[index] = size.width as usize;
            planes[index] = vec![fill[index]; size.width as usize * size.height as usize];
        }

        let depth = config.reorder_depth;
        self.held.push(BackendPicture {
            timestamp,
            resolution,
            planes,
            strides,
            decode_only: frame.flags & FLAG_DECODE_ONLY != 0,
        });
        self.bump(depth);
        Ok(())
    }

    fn flush(&mut self) -> BackendResult<()> {
        if self.config.is_none() {
            return Err(BackendError::NotConfigured);
        }
        self.bump(0);
        Ok(())
    }

    fn next_picture(&mut self) -> Option<BackendPicture> {
        self.ready.pop_front()
    }

    fn reset(&mut self) {
        self.held.clear();
        self.ready.clear();
        self.seen_keyframe = false;
        self.last_crypto = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured(reorder_depth: usize) -> DummyBackend {
        let mut backend = DummyBackend::new(DummyBackendOptions {
            reorder_depth: Some(reorder_depth),
            ..Default::default()
        });
        let params =
            InitParameters::new(Codec::Vp9, Resolution::from((8, 4)), vec![VideoFormat::I420]);
        backend.configure(&params, VideoFormat::I420).unwrap();
        backend
    }

    #[test]
    fn decodes_planes_from_payload() {
        let mut backend = configured(0);
        backend.decode(0, &encode_frame(FLAG_KEYFRAME, &[50, 60, 70]), None).unwrap();
        let picture = backend.next_picture().unwrap();
        assert_eq!(picture.resolution, Resolution::from((8, 4)));
        assert_eq!(picture.planes[0], vec![50; 32]);
        assert_eq!(picture.planes[1], vec![60; 8]);
        assert_eq!(picture.planes[2], vec![70; 8]);
        assert_eq!(picture.strides, [8, 4, 4]);
        assert!(backend.next_picture().is_none());
    }

    #[test]
    fn reorders_by_timestamp() {
        let mut backend = configured(2);
        for ts in [0, 3, 1, 2] {
            backend.decode(ts, &encode_frame(FLAG_KEYFRAME, &[]), None).unwrap();
        }
        assert_eq!(backend.next_picture().unwrap().timestamp, 0);
        assert_eq!(backend.next_picture().unwrap().timestamp, 1);
        assert!(backend.next_picture().is_none());

        backend.flush().unwrap();
        assert_eq!(backend.next_picture().unwrap().timestamp, 2);
        assert_eq!(backend.next_picture().unwrap().timestamp, 3);
        assert_eq!(backend.num_pending(), 0);
    }

    #[test]
    fn waits_for_keyframe() {
        let mut backend = configured(0);
        backend.decode(0, &encode_frame(0, &[]), None).unwrap();
        assert!(backend.next_picture().is_none());
        backend.decode(1, &encode_frame(FLAG_KEYFRAME, &[]), None).unwrap();
        backend.decode(2, &encode_frame(0, &[]), None).unwrap();
        assert_eq!(backend.next_picture().unwrap().timestamp, 1);
        assert_eq!(backend.next_picture().unwrap().timestamp, 2);

        backend.reset();
        backend.decode(3, &encode_frame(0, &[]), None).unwrap();
        assert!(backend.next_picture().is_none());
    }

    #[test]
    fn detects_corruption() {
        let mut backend = configured(0);
        let mut frame = encode_frame(FLAG_KEYFRAME, &[1, 2, 3]);
        frame[HEADER_LEN] ^= 0xff;
        assert!(matches!(backend.decode(0, &frame, None), Err(BackendError::Corrupted(_))));
        assert!(matches!(backend.decode(0, b"VCD", None), Err(BackendError::Corrupted(_))));
        assert!(matches!(
            backend.decode(0, b"XXXX\x01\0\0\0\0", None),
            Err(BackendError::Corrupted(_))
        ));
    }

    #[test]
    fn rejects_decode_before_configure() {
        let mut backend = DummyBackend::default();
        assert!(matches!(
            backend.decode(0, &encode_frame(FLAG_KEYFRAME, &[]), None),
            Err(BackendError::NotConfigured)
        ));
    }

    #[test]
    fn decode_only_pictures_are_marked() {
        let mut backend = configured(0);
        backend.decode(0, &encode_frame(FLAG_KEYFRAME | FLAG_DECODE_ONLY, &[]), None).unwrap();
        assert!(backend.next_picture().unwrap().decode_only);
    }

    #[test]
    fn h264_defaults_to_one_picture_of_delay() {
        assert_eq!(default_reorder_depth(Codec::H264, CodecProfile::Unknown), 1);
        assert_eq!(default_reorder_depth(Codec::H264, CodecProfile::H264Baseline), 0);
        assert_eq!(default_reorder_depth(Codec::Vp8, CodecProfile::Unknown), 0);
    }

    #[test]
    fn encrypted_units_need_a_matching_layout() {
        let mut backend = DummyBackend::new(DummyBackendOptions {
            crypto: true,
            ..Default::default()
        });
        let params =
            InitParameters::new(Codec::Vp9, Resolution::from((8, 4)), vec![VideoFormat::I420]);
        backend.configure(&params, VideoFormat::I420).unwrap();
        let frame = encode_frame(FLAG_KEYFRAME, &[1, 2, 3]);

        let short = PacketCryptoInfo {
            clear_bytes: vec![HEADER_LEN as u16],
            cipher_bytes: vec![1],
            ..Default::default()
        };
        assert!(matches!(
            backend.decode(0, &frame, Some(&short)),
            Err(BackendError::Corrupted(_))
        ));
        let unpaired = PacketCryptoInfo { clear_bytes: vec![1, 2], ..Default::default() };
        assert!(backend.decode(0, &frame, Some(&unpaired)).is_err());

        let exact = PacketCryptoInfo {
            clear_bytes: vec![HEADER_LEN as u16],
            cipher_bytes: vec![3],
            kid: [7; 16],
            ..Default::default()
        };
        backend.decode(0, &frame, Some(&exact)).unwrap();
        assert_eq!(backend.last_crypto(), Some(&exact));
        assert!(backend.next_picture().is_some());
    }

    #[test]
    fn encrypted_units_need_crypto_support() {
        let mut backend = configured(0);
        let frame = encode_frame(FLAG_KEYFRAME, &[]);
        let crypto = PacketCryptoInfo::default();
        assert!(matches!(
            backend.decode(0, &frame, Some(&crypto)),
            Err(BackendError::Unsupported(_))
        ));
    }
}
