// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Plane copies between differently strided buffers.

use crate::picture::plane_size;
use crate::picture::DecodedPicture;
use crate::picture::Plane;
use crate::Resolution;

/// Copies a `width` x `height` block of bytes from `src` to `dst`, honouring both strides.
pub fn copy_plane(
    src: &[u8],
    src_stride: usize,
    dst: &mut [u8],
    dst_stride: usize,
    width: usize,
    height: usize,
) -> Result<(), String> {
    if height == 0 || width == 0 {
        return Ok(());
    }
    if src_stride < width || dst_stride < width {
        return Err(format!(
            "stride too small for width {width} (src {src_stride}, dst {dst_stride})"
        ));
    }
    let src_needed = src_stride * (height - 1) + width;
    let dst_needed = dst_stride * (height - 1) + width;
    if src.len() < src_needed || dst.len() < dst_needed {
        return Err(format!(
            "plane too small: src {} < {src_needed} or dst {} < {dst_needed}",
            src.len(),
            dst.len()
        ));
    }

    for y in 0..height {
        dst[(y * dst_stride)..(y * dst_stride + width)]
            .copy_from_slice(&src[(y * src_stride)..(y * src_stride + width)]);
    }
    Ok(())
}

/// Source planes of a 4:2:0 picture, in Y, U, V order.
pub struct I420Planes<'a> {
    pub planes: [&'a [u8]; Plane::MAX_PLANES],
    pub strides: [usize; Plane::MAX_PLANES],
}

/// Copies `src` into `dst` as laid out by `picture`.
///
/// `dst` is the whole buffer behind the picture; each plane lands at its advertised offset, so
/// the same source serves I420 and YV12 destinations.
pub fn i420_to_picture(
    src: &I420Planes,
    resolution: Resolution,
    picture: &DecodedPicture,
    dst: &mut [u8],
) -> Result<(), String> {
    for plane in Plane::ALL {
        let index = plane as usize;
        let size = plane_size(resolution, plane);
        let offset = picture.plane_offsets[index] as usize;
        let dst_plane = dst
            .get_mut(offset..)
            .ok_or_else(|| format!("{plane:?} plane offset {offset} out of bounds"))?;
        copy_plane(
            src.planes[index],
            src.strides[index],
            dst_plane,
            picture.strides[index] as usize,
            size.width as usize,
            size.height as usize,
        )?;
    }
    Ok(())
}
