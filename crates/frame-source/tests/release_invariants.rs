mod support;

use std::time::Duration;

use gstframe_common::error::FrameSourceError;
use gstframe_source::{
    FormatDescriptor, FrameGeometry, FrameRecord, FrameSource, PipelineDescription,
    SourceIdentity, SourceSpec, StreamConfig,
};
use proptest::prelude::*;
use support::{count, FakeBackend, Step};

fn run(
    frames: &[Vec<u8>],
    idles_between: usize,
) -> (FakeBackend, Vec<FrameRecord>, FrameSourceError) {
    let backend = FakeBackend::new();
    for frame in frames {
        for _ in 0..idles_between {
            backend.push(Step::Idle);
        }
        backend.push(Step::Frame(frame.clone()));
    }
    backend.push(Step::Fail("pipeline stopped"));

    let spec = SourceSpec {
        pipeline: PipelineDescription::parse("videotestsrc ! appsink").unwrap(),
        geometry: FrameGeometry::new(4, 2),
        format: FormatDescriptor::raw("rgb").unwrap(),
    };
    let mut src = FrameSource::new(
        SourceIdentity::new("gst_raw_video", "prop"),
        spec,
        Box::new(backend.clone()),
    )
    .with_config(StreamConfig {
        warm_up: Duration::ZERO,
        pull_timeout: Duration::from_millis(1),
    });

    let mut records = Vec::new();
    let err = src
        .generate_stream(&mut |record: FrameRecord| -> anyhow::Result<()> {
            records.push(record);
            Ok(())
        })
        .unwrap_err();
    (backend, records, err)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_grabbed_frame_is_released_exactly_once(
        frames in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..12),
        idles_between in 0usize..3,
    ) {
        let (backend, records, err) = run(&frames, idles_between);

        prop_assert!(matches!(err, FrameSourceError::FrameAcquisition { .. }), "{}", err);
        prop_assert_eq!(count(&backend.counters.leases), frames.len());
        prop_assert_eq!(count(&backend.counters.releases), frames.len());
        prop_assert_eq!(count(&backend.counters.stops), 1);

        // N good frames before the failure give exactly N records, in order.
        prop_assert_eq!(records.len(), frames.len());
        for (record, frame) in records.iter().zip(&frames) {
            prop_assert_eq!(&record.image, frame);
            prop_assert_eq!(record.color_model.as_deref(), Some("rgb"));
        }
    }
}
