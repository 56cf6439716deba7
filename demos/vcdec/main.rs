// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! vcdec, a small host for the decoder session call table.

use std::fs::File;
use std::io::Write;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Context;

use videocodec_addon::backend::dummy::encode_frame;
use videocodec_addon::backend::dummy::DummyBackend;
use videocodec_addon::backend::dummy::DummyBackendOptions;
use videocodec_addon::backend::dummy::FLAG_KEYFRAME;
use videocodec_addon::codec::InitParameters;
use videocodec_addon::decoder::Session;
use videocodec_addon::decoder::SessionConfig;
use videocodec_addon::frame_pool::FramePool;
use videocodec_addon::instance::InstanceFactory;
use videocodec_addon::instance::VideoCodecInstance;
use videocodec_addon::packet::CompressedPacket;
use videocodec_addon::picture::plane_size;
use videocodec_addon::picture::DecodeResult;
use videocodec_addon::picture::DecodedPicture;
use videocodec_addon::picture::Plane;
use videocodec_addon::Resolution;
use videocodec_addon::VideoFormat;

mod util;

use crate::util::Args;

const FRAME_DURATION_US: i64 = 33_333;

type Instance = VideoCodecInstance<Session<DummyBackend, FramePool>>;

/// Frame indices in decode order. With reordering, every group of three frames is sent as
/// the anchor first followed by the two pictures displayed before it.
fn decode_order(frames: u32, reorder: bool) -> Vec<u32> {
    let mut order: Vec<u32> = (0..frames).collect();
    if reorder && frames > 0 {
        // Frame 0 stays first so the stream starts on a keyframe.
        for group in order[1..].chunks_mut(3) {
            group.rotate_right(1);
        }
    }
    order
}

fn packet_for(index: u32) -> Vec<u8> {
    let luma = 16u8.wrapping_add(index.wrapping_mul(8) as u8);
    let chroma = 64u8.wrapping_add(index.wrapping_mul(4) as u8);
    encode_frame(FLAG_KEYFRAME, &[luma, chroma, 255 - chroma])
}

/// Appends the visible rows of a strided plane to `frame`.
fn pack_plane(
    src: &[u8],
    stride: usize,
    size: Resolution,
    frame: &mut Vec<u8>,
) -> anyhow::Result<()> {
    let width = size.width as usize;
    if stride == 0 || stride < width {
        bail!("stride {stride} cannot hold rows of {width} bytes");
    }
    for row in src.chunks(stride).take(size.height as usize) {
        let row = row.get(..width).ok_or_else(|| anyhow!("truncated row"))?;
        frame.extend_from_slice(row);
    }
    Ok(())
}

struct Sink {
    output: Option<File>,
    checksums: Vec<serde_json::Value>,
    frames: u32,
}

impl Sink {
    fn write(&mut self, instance: &Instance, picture: &DecodedPicture) -> anyhow::Result<()> {
        let handle = picture.buffer.ok_or_else(|| anyhow!("picture without a buffer"))?;
        let data = instance.session().provider().data(handle)?;

        // Planes are written tightly packed, in the storage order of the format.
        let order = match picture.video_format {
            VideoFormat::Yv12 => [Plane::Y, Plane::V, Plane::U],
            _ => [Plane::Y, Plane::U, Plane::V],
        };
        let mut frame = Vec::new();
        for plane in order {
            let src = picture.plane(data, plane).context("plane outside of buffer")?;
            pack_plane(
                src,
                picture.strides[plane as usize] as usize,
                plane_size(picture.resolution(), plane),
                &mut frame,
            )
            .with_context(|| format!("cannot read the {plane:?} plane"))?;
        }

        if let Some(output) = self.output.as_mut() {
            output.write_all(&frame).context("failed to write output frame")?;
        }
        self.checksums.push(serde_json::json!({
            "pts": picture.pts,
            "crc32": format!("{:08x}", crc32fast::hash(&frame)),
        }));
        self.frames += 1;
        Ok(())
    }
}

/// Pulls pictures until the session needs input or reaches the end of the stream.
fn drain_output(instance: &mut Instance, sink: &mut Sink) -> anyhow::Result<DecodeResult> {
    loop {
        let mut picture = DecodedPicture::new();
        match instance.get_picture(&mut picture) {
            DecodeResult::Picture => {
                sink.write(instance, &picture)?;
                if let Some(handle) = picture.buffer {
                    if !instance.release_frame_buffer(handle) {
                        bail!("session refused to take back {handle:?}");
                    }
                }
            }
            DecodeResult::Error => bail!("decoding failed ({:?})", instance.last_error()),
            result => return Ok(result),
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Args = argh::from_env();

    let options = DummyBackendOptions {
        reorder_depth: Some(args.reorder),
        ..Default::default()
    };
    let config = SessionConfig { name: Some("vcdec".into()), ..Default::default() };
    let session = Session::with_config(
        DummyBackend::new(options),
        FramePool::new(args.buffers),
        config,
    );
    let mut instance = InstanceFactory::default().create(session)?;

    let params = InitParameters::new(
        args.codec.0,
        Resolution::from((args.width, args.height)),
        vec![args.format.0],
    );
    if !instance.open(&params) {
        bail!("cannot open a {} {} session", params.codec, params.coded_size);
    }
    log::info!(
        "decoding {} frames with {}",
        args.frames,
        instance.get_name().unwrap_or("unnamed decoder")
    );

    let output = args
        .output
        .as_ref()
        .map(File::create)
        .transpose()
        .context("failed to create output file")?;
    let mut sink = Sink { output, checksums: Vec::new(), frames: 0 };

    for index in decode_order(args.frames, args.reorder > 0) {
        let data = packet_for(index);
        let packet = CompressedPacket::new(&data, i64::from(index) * FRAME_DURATION_US);
        while !instance.add_data(&packet) {
            // The input queue is full; make room by pulling pictures.
            if drain_output(&mut instance, &mut sink)? != DecodeResult::NeedsMoreInput {
                bail!("session stopped accepting input ({:?})", instance.state());
            }
        }
        drain_output(&mut instance, &mut sink)?;
    }

    if !instance.add_data(&CompressedPacket::end_of_stream()) {
        bail!("session refused end of stream");
    }
    let result = drain_output(&mut instance, &mut sink)?;
    if result != DecodeResult::EndOfStream {
        bail!("unexpected {result:?} while draining");
    }
    log::info!("decoded {} frames", sink.frames);

    if let Some(golden) = args.golden.as_ref() {
        let file = File::create(golden).context("failed to create golden file")?;
        serde_json::to_writer_pretty(file, &sink.checksums)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_order_rotates_groups() {
        assert_eq!(decode_order(7, true), [0, 3, 1, 2, 6, 4, 5]);
        assert_eq!(decode_order(3, false), [0, 1, 2]);
        assert!(decode_order(0, true).is_empty());
    }

    #[test]
    fn pack_plane_drops_row_padding() {
        let mut frame = vec![];
        pack_plane(&[1, 2, 0, 3, 4, 0], 3, Resolution::from((2, 2)), &mut frame).unwrap();
        assert_eq!(frame, [1, 2, 3, 4]);
    }

    #[test]
    fn pack_plane_rejects_bad_strides() {
        let mut frame = vec![];
        assert!(pack_plane(&[0; 8], 0, Resolution::from((2, 2)), &mut frame).is_err());
        assert!(pack_plane(&[0; 8], 1, Resolution::from((2, 2)), &mut frame).is_err());
        assert!(frame.is_empty());
    }
}
