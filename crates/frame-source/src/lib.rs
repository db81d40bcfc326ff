//! gstframe Frame Source
//!
//! Drives a GStreamer pipeline that ends in an `appsink` and turns every
//! buffer it produces into a [`FrameRecord`] for a downstream
//! [`RecordWriter`].
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                        FrameSource                        │
//! │                                                           │
//! │  PipelineDescription ──► PipelineHandle (start / stop)    │
//! │                               │                           │
//! │                               ▼ grab_frame                │
//! │                          FrameLease ── copy ──► Vec<u8>   │
//! │                               │ release         │         │
//! │                               ▼                 ▼         │
//! │                        native buffer   infer_geometry     │
//! │                                          (JPEG only)      │
//! │                                                 │         │
//! │                                                 ▼         │
//! │                                   FrameRecord ──► writer  │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! The pipeline capability ([`FramePipeline`]) is a trait so the loop can
//! run against fakes; [`gst_backend`] provides the GStreamer one.

pub mod decoder;
pub mod frame;
#[cfg(feature = "gst")]
pub mod gst_backend;
pub mod options;
pub mod pipeline;
pub mod record;
pub mod stream;
pub mod writer;

pub use frame::{FrameLease, NativeFrame};
#[cfg(feature = "gst")]
pub use gst_backend::{init, GstBackend};
pub use options::{NvCameraOptions, RawSourceOptions, SourceSpec};
pub use pipeline::{FramePipeline, PipelineBackend, PipelineDescription, PipelineHandle};
pub use record::{FormatDescriptor, FrameFormat, FrameGeometry, FrameRecord};
pub use stream::{
    FrameSource, SourceIdentity, StopHandle, StopReason, StreamConfig, StreamState, StreamStats,
};
pub use writer::{CollectingWriter, DirectoryWriter, RecordWriter};
