// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::path::PathBuf;
use std::str::FromStr;

use argh::FromArgs;

use videocodec_addon::codec::Codec;
use videocodec_addon::VideoFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecArg(pub Codec);

impl FromStr for CodecArg {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vp8" => Ok(CodecArg(Codec::Vp8)),
            "h264" => Ok(CodecArg(Codec::H264)),
            "vp9" => Ok(CodecArg(Codec::Vp9)),
            _ => Err("unrecognized codec. Valid values: vp8, h264, vp9"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatArg(pub VideoFormat);

impl FromStr for FormatArg {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "i420" => Ok(FormatArg(VideoFormat::I420)),
            "yv12" => Ok(FormatArg(VideoFormat::Yv12)),
            _ => Err("unrecognized output format. Valid values: i420, yv12"),
        }
    }
}

/// Simple decoder driving a session over a generated dummy stream.
#[derive(Debug, FromArgs)]
pub struct Args {
    /// number of frames to generate
    #[argh(option, default = "30")]
    pub frames: u32,

    /// width of the stream
    #[argh(option, default = "320")]
    pub width: u32,

    /// height of the stream
    #[argh(option, default = "240")]
    pub height: u32,

    /// codec identity announced to the session (vp8, h264 or vp9)
    #[argh(option, default = "CodecArg(Codec::Vp9)")]
    pub codec: CodecArg,

    /// output format to request (i420 or yv12)
    #[argh(option, default = "FormatArg(VideoFormat::I420)")]
    pub format: FormatArg,

    /// emit frames in a B-frame like decode order and hold this many pictures for reordering
    #[argh(option, default = "0")]
    pub reorder: usize,

    /// picture buffers the host pool may allocate
    #[argh(option, default = "4")]
    pub buffers: usize,

    /// path to write the decoded raw frames to
    #[argh(option)]
    pub output: Option<PathBuf>,

    /// path to write per-frame CRC-32 checksums to, as JSON
    #[argh(option)]
    pub golden: Option<PathBuf>,
}
