// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Drives the host call table end to end over the dummy backend.

#[cfg(test)]
mod tests {
    use videocodec_addon::backend::dummy::encode_frame;
    use videocodec_addon::backend::dummy::DummyBackend;
    use videocodec_addon::backend::dummy::DummyBackendOptions;
    use videocodec_addon::backend::dummy::FLAG_KEYFRAME;
    use videocodec_addon::codec::Codec;
    use videocodec_addon::codec::InitParameters;
    use videocodec_addon::decoder::ErrorKind;
    use videocodec_addon::decoder::Session;
    use videocodec_addon::decoder::SessionState;
    use videocodec_addon::frame_pool::FramePool;
    use videocodec_addon::instance::InstanceFactory;
    use videocodec_addon::instance::VideoCodecInstance;
    use videocodec_addon::packet::CompressedPacket;
    use videocodec_addon::picture::DecodeResult;
    use videocodec_addon::picture::DecodedPicture;
    use videocodec_addon::picture::PictureFlags;
    use videocodec_addon::picture::Plane;
    use videocodec_addon::Resolution;
    use videocodec_addon::VideoFormat;

    type Instance = VideoCodecInstance<Session<DummyBackend, FramePool>>;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn instance(options: DummyBackendOptions, max_buffers: usize) -> Instance {
        init_logging();
        let session = Session::new(DummyBackend::new(options), FramePool::new(max_buffers));
        InstanceFactory::default().create(session).unwrap()
    }

    fn frame(luma: u8) -> Vec<u8> {
        encode_frame(FLAG_KEYFRAME, &[luma, 128, 128])
    }

    fn pool(instance: &Instance) -> &FramePool {
        instance.session().provider()
    }

    #[test]
    fn h264_open_decode_drain() {
        let mut instance = instance(Default::default(), 4);
        let params = InitParameters::new(
            Codec::H264,
            Resolution::from((1920, 1080)),
            vec![VideoFormat::Yv12],
        );
        assert!(instance.open(&params));
        let mut picture = DecodedPicture::new();

        assert!(instance.add_data(&CompressedPacket::new(&frame(10), 0)));
        assert_eq!(instance.get_picture(&mut picture), DecodeResult::NeedsMoreInput);

        assert!(instance.add_data(&CompressedPacket::new(&frame(20), 33_000)));
        assert_eq!(instance.get_picture(&mut picture), DecodeResult::Picture);
        assert_eq!(picture.pts, 0);
        assert_eq!(picture.video_format, VideoFormat::Yv12);
        assert_eq!(picture.resolution(), Resolution::from((1920, 1080)));
        let data = pool(&instance).data(picture.buffer.unwrap()).unwrap();
        assert!(picture.plane(data, Plane::Y).unwrap()[..1920].iter().all(|b| *b == 10));
        assert!(instance.release_frame_buffer(picture.buffer.unwrap()));

        assert!(instance.add_data(&CompressedPacket::end_of_stream()));
        let mut drained = vec![];
        loop {
            match instance.get_picture(&mut picture) {
                DecodeResult::Picture => {
                    assert!(picture.flags.contains(PictureFlags::DRAIN));
                    drained.push(picture.pts);
                    assert!(instance.release_frame_buffer(picture.buffer.unwrap()));
                }
                DecodeResult::EndOfStream => break,
                other => panic!("unexpected {other:?} after end of stream"),
            }
        }
        assert_eq!(drained, [33_000]);
        assert_eq!(instance.state(), SessionState::Terminated);
        assert_eq!(pool(&instance).num_in_use(), 0);
    }

    #[test]
    fn buffer_exhaustion_needs_reset() {
        let mut instance = instance(Default::default(), 1);
        let params =
            InitParameters::new(Codec::Vp8, Resolution::from((64, 48)), vec![VideoFormat::I420]);
        assert!(instance.open(&params));

        let mut held = DecodedPicture::new();
        assert!(instance.add_data(&CompressedPacket::new(&frame(1), 0)));
        assert_eq!(instance.get_picture(&mut held), DecodeResult::Picture);

        let mut picture = DecodedPicture::new();
        assert!(instance.add_data(&CompressedPacket::new(&frame(2), 1)));
        assert_eq!(instance.get_picture(&mut picture), DecodeResult::Error);
        assert_eq!(picture.buffer, None);
        assert_eq!(instance.state(), SessionState::Error);
        assert_eq!(instance.last_error(), Some(ErrorKind::BufferExhausted));
        assert!(!instance.add_data(&CompressedPacket::new(&frame(3), 2)));
        assert_eq!(instance.last_error(), Some(ErrorKind::Usage));

        // The picture delivered before the failure still belongs to the caller.
        assert!(instance.release_frame_buffer(held.buffer.unwrap()));
        assert!(!instance.release_frame_buffer(held.buffer.unwrap()));

        instance.reset();
        assert_eq!(instance.state(), SessionState::Ready);
        assert!(instance.add_data(&CompressedPacket::new(&frame(4), 3)));
        assert_eq!(instance.get_picture(&mut picture), DecodeResult::Picture);
        assert_eq!(picture.pts, 3);
    }

    #[test]
    fn reordered_stream_comes_out_in_display_order() {
        let options = DummyBackendOptions { reorder_depth: Some(2), ..Default::default() };
        let mut instance = instance(options, 8);
        let params = InitParameters::new(
            Codec::H264,
            Resolution::from((32, 32)),
            vec![VideoFormat::I420],
        );
        assert!(instance.open(&params));

        // I P B B P B in decode order.
        let decode_order = [0, 3, 1, 2, 5, 4];
        let mut shown = vec![];
        let mut picture = DecodedPicture::new();
        for pts in decode_order {
            assert!(instance.add_data(&CompressedPacket::new(&frame(pts as u8), pts)));
            while instance.get_picture(&mut picture) == DecodeResult::Picture {
                shown.push(picture.pts);
                assert!(instance.release_frame_buffer(picture.buffer.unwrap()));
            }
        }
        assert!(instance.add_data(&CompressedPacket::end_of_stream()));
        while instance.get_picture(&mut picture) == DecodeResult::Picture {
            shown.push(picture.pts);
            assert!(instance.release_frame_buffer(picture.buffer.unwrap()));
        }
        assert_eq!(shown, [0, 1, 2, 3, 4, 5]);
        assert_eq!(instance.get_picture(&mut picture), DecodeResult::EndOfStream);
    }

    #[test]
    fn corrupted_packet_then_reset_behaves_like_open() {
        let mut instance = instance(Default::default(), 2);
        let params =
            InitParameters::new(Codec::Vp9, Resolution::from((16, 16)), vec![VideoFormat::I420]);
        assert!(instance.open(&params));

        assert!(instance.add_data(&CompressedPacket::new(b"garbage", 0)));
        let mut picture = DecodedPicture::new();
        assert_eq!(instance.get_picture(&mut picture), DecodeResult::Error);
        assert_eq!(instance.last_error(), Some(ErrorKind::Corruption));
        assert!(!instance.reconfigure(&params));

        instance.reset();
        assert_eq!(instance.get_picture(&mut picture), DecodeResult::NeedsMoreInput);
        assert!(instance.add_data(&CompressedPacket::new(&frame(9), 10)));
        assert_eq!(instance.get_picture(&mut picture), DecodeResult::Picture);
        assert_eq!(picture.pts, 10);
    }

    #[test]
    fn reconfigure_to_a_new_size() {
        let mut instance = instance(Default::default(), 4);
        let small =
            InitParameters::new(Codec::Vp9, Resolution::from((32, 16)), vec![VideoFormat::I420]);
        assert!(instance.open(&small));

        let too_big =
            InitParameters { coded_size: Resolution::from((8192, 8192)), ..small.clone() };
        assert!(!instance.reconfigure(&too_big));
        assert_eq!(instance.last_error(), Some(ErrorKind::Configuration));
        assert_eq!(instance.session().params(), Some(&small));

        let large = InitParameters { coded_size: Resolution::from((64, 32)), ..small };
        assert!(instance.reconfigure(&large));
        assert!(instance.add_data(&CompressedPacket::new(&frame(0), 0)));
        let mut picture = DecodedPicture::new();
        assert_eq!(instance.get_picture(&mut picture), DecodeResult::Picture);
        assert_eq!(picture.resolution(), Resolution::from((64, 32)));
    }
}
