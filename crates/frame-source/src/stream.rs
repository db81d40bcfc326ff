//! The frame stream loop.
//!
//! ```text
//! NotStarted ─► Starting ─► WarmingUp ─► Streaming ─┐
//!                  │            │            ▲      │ grab ─► copy ─► release
//!                  ▼            ▼            └──────┘ ─► infer geometry ─► emit
//!            Stopped(Error)  Stopped(Cancelled)  │
//!                                                ▼
//!                                   Stopped(Error | Cancelled)
//! ```
//!
//! A healthy stream never ends on its own: it runs until a step fails or a
//! stop is requested. The pipeline handle is torn down before
//! [`FrameSource::generate_stream`] returns on every path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use gstframe_common::config::StreamDefaults;
use gstframe_common::error::{FrameSourceError, FrameSourceResult};

use crate::decoder::infer_geometry;
use crate::options::SourceSpec;
use crate::pipeline::{PipelineBackend, PipelineHandle};
use crate::record::{FormatDescriptor, FrameGeometry, FrameRecord};
use crate::writer::RecordWriter;

/// Lifecycle of a source's current (or last) streaming attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    NotStarted,
    Starting,
    WarmingUp,
    Streaming,
    Stopped(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A stop was requested.
    Cancelled,
    /// A step failed; the error was returned to the caller.
    Error,
}

/// Timing knobs for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Delay after start before the first pull.
    pub warm_up: Duration,
    /// Longest single wait inside a pull.
    pub pull_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::from(&StreamDefaults::default())
    }
}

impl From<&StreamDefaults> for StreamConfig {
    fn from(defaults: &StreamDefaults) -> Self {
        Self {
            warm_up: defaults.warm_up(),
            pull_timeout: defaults.pull_timeout(),
        }
    }
}

/// Who is streaming, for logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIdentity {
    pub node_type: String,
    pub node_name: String,
}

impl SourceIdentity {
    pub fn new(node_type: impl Into<String>, node_name: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            node_name: node_name.into(),
        }
    }
}

/// Counters for the current streaming attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub frames_emitted: u64,
    pub bytes_copied: u64,
}

/// Requests a source to stop. Cheap to clone and safe to use from any thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
    emit_gate: Arc<Mutex<()>>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the source and wait for a record being emitted right now, if
    /// any, to finish. Once this returns no further record is emitted.
    ///
    /// Must not be called from inside [`RecordWriter::write`]; use
    /// [`request`](Self::request) there.
    pub fn stop(&self) {
        self.request();
        drop(self.lock_gate());
    }

    /// Ask the source to stop without waiting.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    fn lock_gate(&self) -> MutexGuard<'_, ()> {
        // The gate guards no data, so a poisoned lock is still usable.
        self.emit_gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A video source that turns a running pipeline into frame records.
pub struct FrameSource {
    identity: SourceIdentity,
    spec: SourceSpec,
    geometry: FrameGeometry,
    config: StreamConfig,
    backend: Box<dyn PipelineBackend>,
    stop: StopHandle,
    state: StreamState,
    stats: StreamStats,
}

impl FrameSource {
    pub fn new(
        identity: SourceIdentity,
        spec: SourceSpec,
        backend: Box<dyn PipelineBackend>,
    ) -> Self {
        Self {
            identity,
            geometry: spec.geometry,
            spec,
            config: StreamConfig::default(),
            backend,
            stop: StopHandle::new(),
            state: StreamState::NotStarted,
            stats: StreamStats::default(),
        }
    }

    /// A source backed by real GStreamer pipelines.
    #[cfg(feature = "gst")]
    pub fn gstreamer(identity: SourceIdentity, spec: SourceSpec) -> Self {
        Self::new(identity, spec, Box::new(crate::gst_backend::GstBackend))
    }

    pub fn with_config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    pub fn identity(&self) -> &SourceIdentity {
        &self.identity
    }

    pub fn spec(&self) -> &SourceSpec {
        &self.spec
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Geometry used for records; inferred values are cached here.
    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Request a stop; see [`StopHandle::stop`].
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Run one streaming attempt, writing a record per frame to `writer`.
    ///
    /// Returns `Ok(())` only after a stop request. Any failing step ends the
    /// attempt with its error. The pipeline is torn down in both cases.
    pub fn generate_stream(&mut self, writer: &mut dyn RecordWriter) -> FrameSourceResult<()> {
        self.stats = StreamStats::default();
        if self.stop.is_stop_requested() {
            self.state = StreamState::Stopped(StopReason::Cancelled);
            return Ok(());
        }

        self.state = StreamState::Starting;
        let description = self.spec.pipeline.clone();
        let mut handle =
            match PipelineHandle::create_and_start(self.backend.as_ref(), &description) {
                Ok(handle) => handle,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        kind = e.kind(),
                        pipeline = %description,
                        "Cannot create a pipeline"
                    );
                    self.state = StreamState::Stopped(StopReason::Error);
                    return Err(e);
                }
            };

        tracing::info!(
            pipeline = %description,
            node_type = %self.identity.node_type,
            node_name = %self.identity.node_name,
            "Start streaming"
        );

        let result = self.run(&mut handle, writer);
        let teardown = handle.destroy();

        self.state = StreamState::Stopped(match result {
            Ok(()) => StopReason::Cancelled,
            Err(_) => StopReason::Error,
        });
        tracing::info!(
            node_name = %self.identity.node_name,
            frames = self.stats.frames_emitted,
            bytes = self.stats.bytes_copied,
            "Stop streaming"
        );

        match (result, teardown) {
            (Err(e), Err(teardown_err)) => {
                tracing::warn!(
                    error = %teardown_err,
                    pipeline = %description,
                    "Pipeline teardown failed"
                );
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), teardown) => teardown,
        }
    }

    fn run(
        &mut self,
        handle: &mut PipelineHandle,
        writer: &mut dyn RecordWriter,
    ) -> FrameSourceResult<()> {
        self.state = StreamState::WarmingUp;
        if !self.warm_up() {
            return Ok(());
        }

        self.state = StreamState::Streaming;
        let mut last_raw_size: Option<usize> = None;

        loop {
            if self.stop.is_stop_requested() {
                return Ok(());
            }

            let lease = match handle.grab_frame(self.config.pull_timeout) {
                Ok(Some(lease)) => lease,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        kind = e.kind(),
                        pipeline = %handle.description(),
                        "Cannot grab a frame"
                    );
                    return Err(e);
                }
            };
            let image = lease.to_vec();
            lease.release();
            self.stats.bytes_copied += image.len() as u64;

            if matches!(self.spec.format, FormatDescriptor::Raw { .. }) {
                check_raw_size(&mut last_raw_size, image.len());
            }

            let record = self.assemble(image)?;

            let _gate = self.stop.lock_gate();
            if self.stop.is_stop_requested() {
                return Ok(());
            }
            writer.write(record).map_err(FrameSourceError::Downstream)?;
            self.stats.frames_emitted += 1;
        }
    }

    /// Sleep through the warm-up delay. Returns false if a stop was
    /// requested meanwhile.
    fn warm_up(&self) -> bool {
        let deadline = Instant::now() + self.config.warm_up;
        loop {
            if self.stop.is_stop_requested() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(self.config.pull_timeout));
        }
    }

    fn assemble(&mut self, image: Vec<u8>) -> FrameSourceResult<FrameRecord> {
        // All frames of a stream are assumed to share the geometry of the
        // first one; it is not re-validated per frame.
        if self.spec.format == FormatDescriptor::Jpeg && !self.geometry.is_known() {
            self.geometry = infer_geometry(&image)?;
            tracing::debug!(
                node_name = %self.identity.node_name,
                geometry = %self.geometry,
                "Inferred frame geometry"
            );
        }

        Ok(FrameRecord {
            image,
            width: self.geometry.width,
            height: self.geometry.height,
            format: self.spec.format.format(),
            color_model: self.spec.format.color_model().map(str::to_owned),
        })
    }
}

/// Warn when a raw frame's size differs from the previous frame's. The
/// frame is still emitted as received.
fn check_raw_size(last: &mut Option<usize>, size: usize) -> bool {
    match *last {
        None => {
            *last = Some(size);
            true
        }
        Some(expected) if expected == size => true,
        Some(expected) => {
            tracing::warn!(
                expected_bytes = expected,
                actual_bytes = size,
                "Raw frame size changed mid-stream; records keep the configured geometry"
            );
            // Report each new size once.
            *last = Some(size);
            false
        }
    }
}
