// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::codec::Codec;
use crate::codec::CodecProfile;
use crate::codec::InitParameters;
use crate::Resolution;
use crate::VideoFormat;

// What a backend can decode for one codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderCapability {
    pub codec: Codec,
    pub min_coded_size: Resolution,
    pub max_coded_size: Resolution,
    pub profiles: Vec<CodecProfile>,
    pub output_formats: Vec<VideoFormat>,
}

impl DecoderCapability {
    pub fn supports_profile(&self, profile: CodecProfile) -> bool {
        profile.is_unconstrained() || self.profiles.contains(&profile)
    }

    pub fn supports_size(&self, size: Resolution) -> bool {
        !size.is_empty()
            && size.can_contain(self.min_coded_size)
            && self.max_coded_size.can_contain(size)
    }
}

/// Checks `params` against `caps` and picks the output format: the first entry of the host's
/// preference list that the backend can produce.
pub fn negotiate(
    caps: &[DecoderCapability],
    params: &InitParameters,
) -> Result<VideoFormat, String> {
    let cap = caps
        .iter()
        .find(|cap| cap.codec == params.codec)
        .ok_or_else(|| format!("codec {} is not supported", params.codec))?;

    if !cap.supports_profile(params.profile) {
        return Err(format!("profile {:?} is not supported for {}", params.profile, params.codec));
    }
    if !cap.supports_size(params.coded_size) {
        return Err(format!(
            "coded size {} outside {}..={} for {}",
            params.coded_size, cap.min_coded_size, cap.max_coded_size, params.codec
        ));
    }

    params
        .requested_formats()
        .find(|format| cap.output_formats.contains(format))
        .ok_or_else(|| {
            format!(
                "none of the requested formats {:?} can be produced for {}",
                params.requested_formats().collect::<Vec<_>>(),
                params.codec
            )
        })
}
