//! GStreamer implementation of the pipeline capability.

use std::sync::OnceLock;
use std::time::Duration;

use gst::prelude::*;
use gstframe_common::error::{FrameSourceError, FrameSourceResult};
use gstreamer as gst;
use gstreamer_app as gst_app;

use crate::frame::{FrameLease, NativeFrame};
use crate::pipeline::{FramePipeline, PipelineBackend, PipelineDescription};

/// How long `start` waits for the pipeline to report its new state.
const STATE_CHANGE_TIMEOUT_SECS: u64 = 10;

/// Initialize GStreamer once for the whole process.
///
/// Pipeline construction calls this too; calling it early at startup just
/// moves the cost (and any failure) out of the first stream.
pub fn init() -> FrameSourceResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    let init_res = GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string()));
    match init_res {
        Ok(()) => Ok(()),
        Err(e) => Err(init_error(e)),
    }
}

/// Init failures carry no pipeline until one is being built.
fn init_error(reason: &str) -> FrameSourceError {
    FrameSourceError::construction(format!("Failed to initialize GStreamer: {reason}"), "")
}

/// Bounded pull timeout. `ClockTime::NONE` would block forever.
fn pull_timeout(timeout: Duration) -> gst::ClockTime {
    let nanos = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
    gst::ClockTime::from_nseconds(nanos.min(gst::ClockTime::MAX.nseconds()))
}

/// Whether an element factory with this name is registered.
pub fn element_available(name: &str) -> FrameSourceResult<bool> {
    init()?;
    Ok(gst::ElementFactory::find(name).is_some())
}

/// Builds pipelines with `gst::parse::launch`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GstBackend;

impl PipelineBackend for GstBackend {
    fn create(
        &self,
        description: &PipelineDescription,
    ) -> FrameSourceResult<Box<dyn FramePipeline>> {
        Ok(Box::new(GstFramePipeline::from_launch(description)?))
    }

    fn name(&self) -> &str {
        "gstreamer"
    }
}

pub struct GstFramePipeline {
    description: String,
    pipeline: gst::Pipeline,
    sink: gst_app::AppSink,
}

impl GstFramePipeline {
    pub fn from_launch(description: &PipelineDescription) -> FrameSourceResult<Self> {
        let launch = description.as_str();
        init().map_err(|e| match e {
            FrameSourceError::PipelineConstruction { message, .. } => {
                FrameSourceError::construction(message, launch)
            }
            other => other,
        })?;

        let element = gst::parse::launch(launch)
            .map_err(|e| FrameSourceError::construction(e.to_string(), launch))?;

        let pipeline = element.dynamic_cast::<gst::Pipeline>().map_err(|_| {
            FrameSourceError::construction("Launch string did not produce a pipeline", launch)
        })?;

        let sink = find_app_sink(&pipeline).ok_or_else(|| {
            FrameSourceError::construction("pipeline doesn't have an appsink", launch)
        })?;
        // Keep at most one frame in flight; upstream blocks until it is pulled.
        sink.set_max_buffers(1);
        sink.set_drop(false);

        Ok(Self {
            description: launch.to_string(),
            pipeline,
            sink,
        })
    }

    /// First error message waiting on the bus, if any.
    fn pending_error(&self) -> Option<String> {
        let bus = self.pipeline.bus()?;
        let msg = bus.pop_filtered(&[gst::MessageType::Error])?;
        match msg.view() {
            gst::MessageView::Error(err) => Some(match err.debug() {
                Some(debug) => format!("{} ({debug})", err.error()),
                None => err.error().to_string(),
            }),
            _ => None,
        }
    }
}

impl FramePipeline for GstFramePipeline {
    fn start(&mut self) -> FrameSourceResult<()> {
        if let Err(e) = self.pipeline.set_state(gst::State::Playing) {
            let message = self
                .pending_error()
                .unwrap_or_else(|| format!("Failed to start pipeline: {e:?}"));
            return Err(FrameSourceError::construction(message, &self.description));
        }

        // Live sources report NoPreroll and may never settle in Playing
        // before the first pull, so a timeout is only worth a warning.
        match self
            .pipeline
            .state(gst::ClockTime::from_seconds(STATE_CHANGE_TIMEOUT_SECS))
        {
            (Ok(_), gst::State::Playing, _) => {}
            (Ok(_), state, _) => {
                tracing::warn!(
                    pipeline = %self.description,
                    ?state,
                    "Pipeline did not reach Playing state within timeout"
                );
            }
            (Err(e), _, _) => {
                let message = self
                    .pending_error()
                    .unwrap_or_else(|| format!("Pipeline failed to reach Playing state: {e:?}"));
                return Err(FrameSourceError::construction(message, &self.description));
            }
        }
        Ok(())
    }

    fn grab_frame(&mut self, timeout: Duration) -> FrameSourceResult<Option<FrameLease>> {
        if let Some(message) = self.pending_error() {
            return Err(FrameSourceError::acquisition(message));
        }

        let Some(sample) = self.sink.try_pull_sample(pull_timeout(timeout)) else {
            if self.sink.is_eos() {
                return Err(FrameSourceError::acquisition(
                    "cannot grab next frame: end of stream",
                ));
            }
            return Ok(None);
        };

        let buffer = sample
            .buffer_owned()
            .ok_or_else(|| FrameSourceError::acquisition("sample carries no buffer"))?;
        let mapped = buffer
            .into_mapped_buffer_readable()
            .map_err(|_| FrameSourceError::acquisition("cannot map buffer for reading"))?;

        Ok(Some(FrameLease::new(GstFrame(mapped))))
    }

    fn stop(&mut self) -> FrameSourceResult<()> {
        self.pipeline.set_state(gst::State::Null).map_err(|e| {
            FrameSourceError::Other(anyhow::anyhow!(
                "Failed to stop pipeline {}: {e:?}",
                self.description
            ))
        })?;
        Ok(())
    }
}

/// A buffer mapped for reading. Dropping the mapping unmaps and unrefs it.
struct GstFrame(gst::MappedBuffer<gst::buffer::Readable>);

impl NativeFrame for GstFrame {
    fn data(&self) -> &[u8] {
        self.0.as_slice()
    }
}

fn find_app_sink(pipeline: &gst::Pipeline) -> Option<gst_app::AppSink> {
    pipeline
        .iterate_sinks()
        .into_iter()
        .filter_map(Result::ok)
        .find_map(|element| element.downcast::<gst_app::AppSink>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_element_is_a_construction_error() {
        let description = PipelineDescription::parse("nosuchelementxyz ! appsink").unwrap();
        let err = GstFramePipeline::from_launch(&description).err().unwrap();
        match err {
            FrameSourceError::PipelineConstruction { pipeline, .. } => {
                assert_eq!(pipeline, "nosuchelementxyz ! appsink");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    #[ignore = "requires GStreamer base plugins (videotestsrc)"]
    fn pulls_frames_from_videotestsrc() {
        let description = PipelineDescription::parse(
            "videotestsrc num-buffers=3 ! video/x-raw,format=BGR,width=64,height=48 ! appsink",
        )
        .unwrap();
        let mut pipeline = GstFramePipeline::from_launch(&description).unwrap();
        pipeline.start().unwrap();

        let frame = pipeline
            .grab_frame(Duration::from_secs(5))
            .unwrap()
            .expect("a frame within 5s");
        assert_eq!(frame.size(), 64 * 48 * 3);
        frame.release();

        pipeline.stop().unwrap();
    }

    #[test]
    fn init_failure_is_a_construction_error() {
        let err = init_error("no plugin registry");
        assert_eq!(err.kind(), "pipeline_construction");
        assert!(err.to_string().contains("no plugin registry"));
    }

    #[test]
    fn pull_timeout_saturates_instead_of_wrapping() {
        assert_eq!(
            pull_timeout(Duration::from_millis(100)),
            gst::ClockTime::from_mseconds(100)
        );
        assert_eq!(pull_timeout(Duration::ZERO), gst::ClockTime::ZERO);
        assert_eq!(pull_timeout(Duration::MAX), gst::ClockTime::MAX);
        // 2^64 ns + 1 ns wraps to 1 ns under a plain cast.
        let past_u64 = Duration::from_nanos(u64::MAX) + Duration::from_nanos(2);
        assert_eq!(pull_timeout(past_u64), gst::ClockTime::MAX);
    }

    #[test]
    #[ignore = "requires GStreamer base plugins (videotestsrc)"]
    fn end_of_stream_is_an_acquisition_error() {
        let description = PipelineDescription::parse(
            "videotestsrc num-buffers=1 ! video/x-raw,format=RGB,width=32,height=16 ! appsink",
        )
        .unwrap();
        let mut pipeline = GstFramePipeline::from_launch(&description).unwrap();
        pipeline.start().unwrap();

        let mut frames = 0;
        let err = loop {
            match pipeline.grab_frame(Duration::from_millis(100)) {
                Ok(Some(frame)) => {
                    frames += 1;
                    frame.release();
                }
                Ok(None) => {}
                Err(e) => break e,
            }
            assert!(frames <= 1, "more frames than num-buffers");
        };

        assert_eq!(frames, 1);
        match err {
            FrameSourceError::FrameAcquisition { message } => {
                assert!(message.contains("end of stream"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
        pipeline.stop().unwrap();
    }

    #[test]
    #[ignore = "requires GStreamer base plugins (videotestsrc)"]
    fn bus_error_fails_the_next_grab() {
        let description = PipelineDescription::parse(
            "videotestsrc is-live=true ! video/x-raw,format=RGB,width=32,height=16 ! appsink",
        )
        .unwrap();
        let mut pipeline = GstFramePipeline::from_launch(&description).unwrap();
        pipeline.start().unwrap();

        let bus = pipeline.pipeline.bus().unwrap();
        bus.post(
            gst::message::Error::builder(gst::CoreError::Failed, "camera unplugged")
                .src(&pipeline.pipeline)
                .build(),
        )
        .unwrap();

        match pipeline.grab_frame(Duration::from_millis(100)) {
            Err(FrameSourceError::FrameAcquisition { message }) => {
                assert!(message.contains("camera unplugged"), "{message}");
            }
            Ok(_) => panic!("grab succeeded despite a bus error"),
            Err(other) => panic!("unexpected error: {other}"),
        }
        pipeline.stop().unwrap();
    }

    #[test]
    #[ignore = "requires GStreamer base plugins (videotestsrc)"]
    fn caps_negotiation_failure_is_reported() {
        let description = PipelineDescription::parse(
            "videotestsrc ! video/x-raw,format=BGR ! video/x-raw,format=RGB ! appsink",
        )
        .unwrap();
        let mut pipeline = GstFramePipeline::from_launch(&description).unwrap();

        // Prerolling sources fail in start; the bus error is otherwise seen
        // by the next grab.
        let err = match pipeline.start() {
            Err(e) => e,
            Ok(()) => (0..50)
                .find_map(|_| match pipeline.grab_frame(Duration::from_millis(100)) {
                    Ok(Some(_)) => panic!("frame pulled through incompatible caps"),
                    Ok(None) => None,
                    Err(e) => Some(e),
                })
                .expect("negotiation error within 5s"),
        };

        let message = match err {
            FrameSourceError::PipelineConstruction { message, .. } => message,
            FrameSourceError::FrameAcquisition { message } => message,
            other => panic!("unexpected error: {other}"),
        };
        assert!(message.contains("not-negotiated"), "{message}");
        pipeline.stop().unwrap();
    }
}
