// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Decoded picture descriptor shared between a session and its host.

use std::fmt;
use std::ops::BitOr;

use crate::frame_pool::BufferHandle;
use crate::Resolution;
use crate::VideoFormat;

/// Colour planes of a tri-planar picture, indexing `plane_offsets` and `strides`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    Y = 0,
    U = 1,
    V = 2,
}

impl Plane {
    pub const MAX_PLANES: usize = 3;
    pub const ALL: [Plane; Plane::MAX_PLANES] = [Plane::Y, Plane::U, Plane::V];
}

/// Picture control flags.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PictureFlags(u32);

impl PictureFlags {
    pub const NONE: PictureFlags = PictureFlags(0);
    /// The picture must be discarded without being displayed.
    pub const DROP: PictureFlags = PictureFlags(1 << 0);
    /// The picture is produced while flushing at end of stream.
    pub const DRAIN: PictureFlags = PictureFlags(1 << 1);

    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Keeps only the bits this crate knows about.
    pub const fn from_bits_truncate(bits: u32) -> Self {
        PictureFlags(bits & (Self::DROP.0 | Self::DRAIN.0))
    }

    pub const fn contains(&self, other: PictureFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: PictureFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: PictureFlags) {
        self.0 &= !other.0;
    }
}

impl BitOr for PictureFlags {
    type Output = PictureFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        PictureFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for PictureFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut names = vec![];
        if self.contains(Self::DROP) {
            names.push("DROP");
        }
        if self.contains(Self::DRAIN) {
            names.push("DRAIN");
        }
        write!(f, "PictureFlags({})", names.join(" | "))
    }
}

/// Result of a single `get_picture` call. Wire values are fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DecodeResult {
    /// Nothing happened.
    NoOp = 0,
    /// The in-flight operation failed; the session needs a reset.
    Error = 1,
    /// More compressed input is needed before another picture can be produced.
    NeedsMoreInput = 2,
    /// The picture descriptor has been populated.
    Picture = 3,
    /// All pictures have been returned after a flush.
    EndOfStream = 4,
}

impl From<DecodeResult> for u32 {
    fn from(result: DecodeResult) -> Self {
        result as u32
    }
}

impl TryFrom<u32> for DecodeResult {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, String> {
        match value {
            0 => Ok(DecodeResult::NoOp),
            1 => Ok(DecodeResult::Error),
            2 => Ok(DecodeResult::NeedsMoreInput),
            3 => Ok(DecodeResult::Picture),
            4 => Ok(DecodeResult::EndOfStream),
            _ => Err(format!("invalid decode result {value}")),
        }
    }
}

/// Byte layout of a tri-planar picture inside one buffer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    pub offsets: [u32; Plane::MAX_PLANES],
    pub strides: [u32; Plane::MAX_PLANES],
    pub size: usize,
}

fn align_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

/// Size in pixels of `plane` for a 4:2:0 picture of `resolution`.
pub fn plane_size(resolution: Resolution, plane: Plane) -> Resolution {
    match plane {
        Plane::Y => resolution,
        Plane::U | Plane::V => Resolution {
            width: resolution.width.div_ceil(2),
            height: resolution.height.div_ceil(2),
        },
    }
}

impl PlaneLayout {
    /// Computes a contiguous 4:2:0 layout with strides aligned to `stride_align`.
    ///
    /// I420 stores Y, U, V; YV12 stores Y, V, U. Offsets are always indexed by [`Plane`].
    pub fn new(format: VideoFormat, resolution: Resolution, stride_align: u32) -> Option<Self> {
        if resolution.is_empty() || stride_align == 0 {
            return None;
        }
        let storage_order = match format {
            VideoFormat::I420 => [Plane::Y, Plane::U, Plane::V],
            VideoFormat::Yv12 => [Plane::Y, Plane::V, Plane::U],
            VideoFormat::Unknown => return None,
        };

        let mut layout = PlaneLayout::default();
        let mut offset = 0usize;
        for plane in storage_order {
            let size = plane_size(resolution, plane);
            let stride = align_up(size.width, stride_align);
            layout.offsets[plane as usize] = u32::try_from(offset).ok()?;
            layout.strides[plane as usize] = stride;
            offset = offset.checked_add(stride as usize * size.height as usize)?;
        }
        layout.size = offset;
        Some(layout)
    }
}

/// A decoded picture as exchanged with the host.
///
/// `decoded_data_size`, `plane_offsets` and `strides` describe the storage behind `buffer`
/// and stay meaningful only until that buffer is released.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DecodedPicture {
    pub video_format: VideoFormat,
    pub flags: PictureFlags,
    pub width: u32,
    pub height: u32,
    pub decoded_data_size: usize,
    pub plane_offsets: [u32; Plane::MAX_PLANES],
    pub strides: [u32; Plane::MAX_PLANES],
    /// Presentation timestamp in microseconds.
    pub pts: i64,
    pub buffer: Option<BufferHandle>,
}

impl DecodedPicture {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn resolution(&self) -> Resolution {
        Resolution { width: self.width, height: self.height }
    }

    /// Whether the advertised layout holds every plane of this picture inside
    /// `decoded_data_size` bytes.
    pub fn layout_fits(&self) -> bool {
        Plane::ALL.iter().all(|plane| {
            let size = plane_size(self.resolution(), *plane);
            let stride = self.strides[*plane as usize] as usize;
            if stride < size.width as usize {
                return false;
            }
            let end = self.plane_offsets[*plane as usize] as usize
                + stride * (size.height as usize).saturating_sub(1)
                + size.width as usize;
            end <= self.decoded_data_size
        })
    }

    /// Borrows one plane out of the picture's backing storage.
    pub fn plane<'a>(&self, data: &'a [u8], plane: Plane) -> Option<&'a [u8]> {
        let size = plane_size(self.resolution(), plane);
        let start = self.plane_offsets[plane as usize] as usize;
        let len = self.strides[plane as usize] as usize * size.height as usize;
        data.get(start..start.checked_add(len)?)
    }
}
