//! Pipeline descriptions and the handle that owns one running pipeline.
//!
//! The stream loop only talks to the [`FramePipeline`] capability
//! (start, pull, stop). The GStreamer implementation lives in
//! [`crate::gst_backend`]; tests plug in scripted fakes.

use std::fmt;
use std::time::Duration;

use gstframe_common::error::{FrameSourceError, FrameSourceResult};

use crate::frame::FrameLease;

/// Name prefix of the sink stage frames are pulled from.
pub const SINK_STAGE: &str = "appsink";

/// A `gst-launch-1.0` style description whose last stage is an appsink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDescription(String);

impl PipelineDescription {
    /// Check that the description is non-empty and ends in an appsink stage.
    pub fn parse(description: impl Into<String>) -> FrameSourceResult<Self> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(FrameSourceError::construction(
                "pipeline description is empty",
                description,
            ));
        }

        let last_stage = description.rsplit('!').next().unwrap_or_default().trim();
        if !last_stage.starts_with(SINK_STAGE) {
            return Err(FrameSourceError::construction(
                "pipeline must end with appsink",
                description,
            ));
        }

        Ok(Self(description))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PipelineDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A constructed media pipeline that frames can be pulled from.
pub trait FramePipeline: Send {
    /// Bring the pipeline to its running state.
    fn start(&mut self) -> FrameSourceResult<()>;

    /// Block for up to `timeout` waiting for the next frame.
    ///
    /// `Ok(None)` means the timeout elapsed with the pipeline still healthy.
    /// End of stream and native faults are errors.
    fn grab_frame(&mut self, timeout: Duration) -> FrameSourceResult<Option<FrameLease>>;

    /// Tear the pipeline down and release everything it holds.
    fn stop(&mut self) -> FrameSourceResult<()>;
}

/// Builds pipelines from descriptions.
pub trait PipelineBackend: Send + Sync {
    /// Instantiate (but do not start) a pipeline.
    fn create(&self, description: &PipelineDescription)
        -> FrameSourceResult<Box<dyn FramePipeline>>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Owns one running pipeline for exactly one streaming attempt.
///
/// The pipeline is stopped by [`destroy`](Self::destroy) or, on every other
/// exit path including unwinding, when the handle is dropped. A destroyed
/// handle cannot be restarted.
pub struct PipelineHandle {
    pipeline: Option<Box<dyn FramePipeline>>,
    description: PipelineDescription,
}

impl PipelineHandle {
    /// Instantiate the pipeline and bring it to the running state.
    pub fn create_and_start(
        backend: &dyn PipelineBackend,
        description: &PipelineDescription,
    ) -> FrameSourceResult<Self> {
        let pipeline = backend.create(description)?;
        let mut handle = Self {
            pipeline: Some(pipeline),
            description: description.clone(),
        };

        // A failed start drops the handle, which tears down whatever the
        // pipeline managed to set up.
        if let Some(pipeline) = handle.pipeline.as_mut() {
            pipeline.start()?;
        }

        tracing::debug!(pipeline = %description, backend = backend.name(), "Pipeline started");
        Ok(handle)
    }

    pub fn description(&self) -> &PipelineDescription {
        &self.description
    }

    pub fn is_destroyed(&self) -> bool {
        self.pipeline.is_none()
    }

    /// Pull the next frame, waiting at most `timeout`.
    pub fn grab_frame(&mut self, timeout: Duration) -> FrameSourceResult<Option<FrameLease>> {
        match self.pipeline.as_mut() {
            Some(pipeline) => pipeline.grab_frame(timeout),
            None => Err(FrameSourceError::acquisition(
                "pipeline has already been torn down",
            )),
        }
    }

    /// Stop the pipeline. Calling this again is a no-op.
    pub fn destroy(&mut self) -> FrameSourceResult<()> {
        match self.pipeline.take() {
            Some(mut pipeline) => {
                let result = pipeline.stop();
                tracing::debug!(pipeline = %self.description, "Pipeline torn down");
                result
            }
            None => Ok(()),
        }
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            tracing::warn!(
                pipeline = %self.description,
                error = %e,
                "Pipeline teardown failed"
            );
        }
    }
}

impl fmt::Debug for PipelineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineHandle")
            .field("description", &self.description)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[derive(Default)]
    struct Counters {
        starts: AtomicUsize,
        stops: AtomicUsize,
    }

    struct StubPipeline {
        counters: Arc<Counters>,
        fail_start: bool,
    }

    impl FramePipeline for StubPipeline {
        fn start(&mut self) -> FrameSourceResult<()> {
            self.counters.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail_start {
                return Err(FrameSourceError::construction("no such element", "stub"));
            }
            Ok(())
        }

        fn grab_frame(&mut self, _timeout: Duration) -> FrameSourceResult<Option<FrameLease>> {
            Ok(None)
        }

        fn stop(&mut self) -> FrameSourceResult<()> {
            self.counters.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct StubBackend {
        counters: Arc<Counters>,
        fail_start: bool,
    }

    impl PipelineBackend for StubBackend {
        fn create(
            &self,
            _description: &PipelineDescription,
        ) -> FrameSourceResult<Box<dyn FramePipeline>> {
            Ok(Box::new(StubPipeline {
                counters: self.counters.clone(),
                fail_start: self.fail_start,
            }))
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    #[test]
    fn description_requires_trailing_appsink() {
        assert!(PipelineDescription::parse("videotestsrc ! appsink").is_ok());
        assert!(PipelineDescription::parse("videotestsrc ! appsink name=out").is_ok());
        assert!(PipelineDescription::parse("appsink").is_ok());

        for bad in ["", "   ", "videotestsrc ! fakesink", "appsink ! fakesink"] {
            let err = PipelineDescription::parse(bad).unwrap_err();
            assert!(
                matches!(err, FrameSourceError::PipelineConstruction { .. }),
                "{bad:?} gave {err}"
            );
        }
    }

    #[test]
    fn destroy_is_idempotent_and_drop_does_not_stop_twice() {
        let counters = Arc::new(Counters::default());
        let backend = StubBackend {
            counters: counters.clone(),
            fail_start: false,
        };
        let description = PipelineDescription::parse("videotestsrc ! appsink").unwrap();

        let mut handle = PipelineHandle::create_and_start(&backend, &description).unwrap();
        handle.destroy().unwrap();
        handle.destroy().unwrap();
        assert!(handle.is_destroyed());
        assert!(handle.grab_frame(Duration::from_millis(1)).is_err());
        drop(handle);

        assert_eq!(counters.starts.load(Ordering::SeqCst), 1);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_start_still_tears_down() {
        let counters = Arc::new(Counters::default());
        let backend = StubBackend {
            counters: counters.clone(),
            fail_start: true,
        };
        let description = PipelineDescription::parse("videotestsrc ! appsink").unwrap();

        let err = PipelineHandle::create_and_start(&backend, &description).unwrap_err();
        assert!(matches!(err, FrameSourceError::PipelineConstruction { .. }));
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
    }
}
