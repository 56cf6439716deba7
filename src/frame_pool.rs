// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Host side of the picture buffer protocol.
//!
//! A [`BufferProvider`] owns all picture storage. Sessions ask for a buffer while producing a
//! picture and get back a [`BufferHandle`], which is an index into the provider's arena plus a
//! generation counter. Releasing a handle bumps the generation of its slot, so a stale or
//! repeated release is detected instead of freeing storage that has been handed out again.

use std::fmt;

use thiserror::Error;

use crate::picture::DecodedPicture;
use crate::picture::PlaneLayout;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle {
    index: u32,
    generation: u32,
}

impl BufferHandle {
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BufferHandle({}v{})", self.index, self.generation)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("no free picture buffer ({0} in use)")]
    Exhausted(usize),
    #[error("cannot lay out a {format} picture of {width}x{height}")]
    InvalidLayout { format: crate::VideoFormat, width: u32, height: u32 },
    #[error("unknown buffer handle {0:?}")]
    UnknownHandle(BufferHandle),
    #[error("buffer handle {0:?} was already released")]
    AlreadyReleased(BufferHandle),
}

/// Picture storage supplied by the host.
pub trait BufferProvider {
    /// Allocates storage for `picture`, whose `video_format`, `width` and `height` are already
    /// filled in. On success the provider sets `decoded_data_size`, `plane_offsets`,
    /// `strides` and `buffer`.
    fn get_frame_buffer(&mut self, picture: &mut DecodedPicture) -> Result<(), BufferError>;

    /// Pixel storage behind an acquired handle.
    fn map_mut(&mut self, handle: BufferHandle) -> Result<&mut [u8], BufferError>;

    /// Returns a buffer to the provider. The handle is invalid afterwards.
    fn release_frame_buffer(&mut self, handle: BufferHandle) -> Result<(), BufferError>;
}

impl<P: BufferProvider + ?Sized> BufferProvider for Box<P> {
    fn get_frame_buffer(&mut self, picture: &mut DecodedPicture) -> Result<(), BufferError> {
        (**self).get_frame_buffer(picture)
    }

    fn map_mut(&mut self, handle: BufferHandle) -> Result<&mut [u8], BufferError> {
        (**self).map_mut(handle)
    }

    fn release_frame_buffer(&mut self, handle: BufferHandle) -> Result<(), BufferError> {
        (**self).release_frame_buffer(handle)
    }
}

#[derive(Debug)]
struct Slot {
    data: Vec<u8>,
    generation: u32,
    in_use: bool,
}

/// Arena-backed [`BufferProvider`] with a fixed number of slots.
///
/// Slots are allocated lazily on first use and recycled on release, growing their storage when
/// a larger picture comes along.
#[derive(Debug)]
pub struct FramePool {
    slots: Vec<Slot>,
    free: Vec<usize>,
    max_buffers: usize,
    stride_align: u32,
}

impl FramePool {
    pub const DEFAULT_STRIDE_ALIGN: u32 = 16;

    pub fn new(max_buffers: usize) -> Self {
        Self::with_alignment(max_buffers, Self::DEFAULT_STRIDE_ALIGN)
    }

    pub fn with_alignment(max_buffers: usize, stride_align: u32) -> Self {
        Self { slots: Vec::new(), free: Vec::new(), max_buffers, stride_align: stride_align.max(1) }
    }

    pub fn num_in_use(&self) -> usize {
        self.slots.iter().filter(|s| s.in_use).count()
    }

    /// Number of slots allocated so far, in use or not.
    pub fn num_allocated(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, handle: BufferHandle) -> Result<&Slot, BufferError> {
        let slot = self.slots.get(handle.index()).ok_or(BufferError::UnknownHandle(handle))?;
        if slot.generation != handle.generation || !slot.in_use {
            return Err(BufferError::AlreadyReleased(handle));
        }
        Ok(slot)
    }

    fn slot_mut(&mut self, handle: BufferHandle) -> Result<&mut Slot, BufferError> {
        let slot = self.slots.get_mut(handle.index()).ok_or(BufferError::UnknownHandle(handle))?;
        if slot.generation != handle.generation || !slot.in_use {
            return Err(BufferError::AlreadyReleased(handle));
        }
        Ok(slot)
    }

    /// Read access for the host, e.g. to display a delivered picture.
    pub fn data(&self, handle: BufferHandle) -> Result<&[u8], BufferError> {
        self.slot(handle).map(|slot| slot.data.as_slice())
    }

    fn take_slot(&mut self, size: usize) -> Result<usize, BufferError> {
        let index = match self.free.pop() {
            Some(index) => index,
            None if self.slots.len() < self.max_buffers => {
                self.slots.push(Slot { data: Vec::new(), generation: 0, in_use: false });
                self.slots.len() - 1
            }
            None => return Err(BufferError::Exhausted(self.num_in_use())),
        };
        let slot = &mut self.slots[index];
        if slot.data.len() < size {
            slot.data.resize(size, 0);
        }
        slot.in_use = true;
        Ok(index)
    }
}

impl BufferProvider for FramePool {
    fn get_frame_buffer(&mut self, picture: &mut DecodedPicture) -> Result<(), BufferError> {
        let layout = PlaneLayout::new(picture.video_format, picture.resolution(), self.stride_align)
            .ok_or(BufferError::InvalidLayout {
                format: picture.video_format,
                width: picture.width,
                height: picture.height,
            })?;
        let index = self.take_slot(layout.size)?;

        picture.decoded_data_size = layout.size;
        picture.plane_offsets = layout.offsets;
        picture.strides = layout.strides;
        picture.buffer = Some(BufferHandle::new(index as u32, self.slots[index].generation));
        log::debug!("handing out frame buffer {:?} ({} bytes)", picture.buffer, layout.size);
        Ok(())
    }

    fn map_mut(&mut self, handle: BufferHandle) -> Result<&mut [u8], BufferError> {
        self.slot_mut(handle).map(|slot| slot.data.as_mut_slice())
    }

    fn release_frame_buffer(&mut self, handle: BufferHandle) -> Result<(), BufferError> {
        let slot = self.slot_mut(handle)?;
        slot.in_use = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VideoFormat;

    fn request(format: VideoFormat, width: u32, height: u32) -> DecodedPicture {
        DecodedPicture { video_format: format, width, height, ..Default::default() }
    }

    #[test]
    fn buffers_are_allocated_lazily() {
        let mut pool = FramePool::new(4);
        assert_eq!(pool.num_allocated(), 0);

        let mut picture = request(VideoFormat::I420, 64, 32);
        pool.get_frame_buffer(&mut picture).unwrap();
        assert_eq!(pool.num_allocated(), 1);
        assert_eq!(pool.num_in_use(), 1);
        assert_eq!(picture.decoded_data_size, 64 * 32 * 3 / 2);
        assert!(picture.layout_fits());

        let handle = picture.buffer.unwrap();
        assert_eq!(pool.map_mut(handle).unwrap().len(), picture.decoded_data_size);
    }

    #[test]
    fn exhaustion_is_reported() {
        let mut pool = FramePool::new(1);
        pool.get_frame_buffer(&mut request(VideoFormat::I420, 16, 16)).unwrap();
        assert_eq!(
            pool.get_frame_buffer(&mut request(VideoFormat::I420, 16, 16)),
            Err(BufferError::Exhausted(1))
        );
    }

    #[test]
    fn double_release_is_rejected() {
        let mut pool = FramePool::new(2);
        let mut picture = request(VideoFormat::Yv12, 16, 16);
        pool.get_frame_buffer(&mut picture).unwrap();
        let handle = picture.buffer.unwrap();

        pool.release_frame_buffer(handle).unwrap();
        assert_eq!(pool.release_frame_buffer(handle), Err(BufferError::AlreadyReleased(handle)));
        assert_eq!(pool.num_in_use(), 0);
    }

    #[test]
    fn stale_handle_does_not_reach_recycled_slot() {
        let mut pool = FramePool::new(1);
        let mut first = request(VideoFormat::I420, 16, 16);
        pool.get_frame_buffer(&mut first).unwrap();
        let stale = first.buffer.unwrap();
        pool.release_frame_buffer(stale).unwrap();

        let mut second = request(VideoFormat::I420, 32, 32);
        pool.get_frame_buffer(&mut second).unwrap();
        let fresh = second.buffer.unwrap();
        assert_eq!(fresh.index(), stale.index());
        assert_ne!(fresh.generation(), stale.generation());

        assert!(pool.map_mut(stale).is_err());
        assert!(pool.release_frame_buffer(stale).is_err());
        assert_eq!(pool.data(fresh).unwrap().len(), 32 * 32 * 3 / 2);
    }

    #[test]
    fn unknown_handle_is_rejected() {
        let mut pool = FramePool::new(1);
        let bogus = BufferHandle::new(7, 0);
        assert_eq!(pool.release_frame_buffer(bogus), Err(BufferError::UnknownHandle(bogus)));
    }

    #[test]
    fn unknown_format_cannot_be_laid_out() {
        let mut pool = FramePool::new(1);
        let mut picture = request(VideoFormat::Unknown, 16, 16);
        assert!(matches!(
            pool.get_frame_buffer(&mut picture),
            Err(BufferError::InvalidLayout { .. })
        ));
        assert_eq!(pool.num_allocated(), 0);
    }
}
