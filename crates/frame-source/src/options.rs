//! Source options and the pipeline descriptions built from them.
//!
//! Two kinds of sources are supported:
//!
//! - `gst_raw_video`: the caller supplies the whole pipeline description.
//! - `gst_nvcamera`: the description is built for the Jetson camera module
//!   (`nvcamerasrc`). Values are not validated beyond what the template
//!   needs; GStreamer reports anything else at construction time, so check
//!   new settings with `gst-launch-1.0` first.

use gstframe_common::error::{FrameSourceError, FrameSourceResult};
use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineDescription;
use crate::record::{FormatDescriptor, FrameFormat, FrameGeometry};

/// Everything a [`FrameSource`](crate::FrameSource) needs to stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub pipeline: PipelineDescription,
    /// Zero sides are inferred from the first JPEG frame.
    pub geometry: FrameGeometry,
    pub format: FormatDescriptor,
}

/// Options of a `gst_raw_video` source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSourceOptions {
    /// Description passed to `gst-launch-1.0`, e.g.
    /// `videotestsrc ! video/x-raw,format=BGR,width=640,height=480 ! appsink`.
    pub pipeline: String,

    /// Required for raw frames. Inferred for JPEG when 0.
    pub width: u32,

    /// Required for raw frames. Inferred for JPEG when 0.
    pub height: u32,

    /// `raw` or `jpeg`.
    pub format: Option<FrameFormat>,

    /// Channel layout (e.g. "bgr", "rgb", "argb"). Only used for raw frames.
    pub color_model: String,
}

impl RawSourceOptions {
    pub fn into_spec(self) -> FrameSourceResult<SourceSpec> {
        if self.pipeline.trim().is_empty() {
            return Err(FrameSourceError::config("pipeline is required"));
        }
        let pipeline = PipelineDescription::parse(self.pipeline)?;

        let format = match self.format {
            Some(FrameFormat::Raw) => {
                if self.width == 0 || self.height == 0 {
                    return Err(FrameSourceError::config(
                        "width and height must be specified when the format is raw",
                    ));
                }
                FormatDescriptor::raw(self.color_model)?
            }
            Some(FrameFormat::Jpeg) => FormatDescriptor::Jpeg,
            None => return Err(FrameSourceError::config("format is required")),
        };

        Ok(SourceSpec {
            pipeline,
            geometry: FrameGeometry::new(self.width, self.height),
            format,
        })
    }
}

/// Options of a `gst_nvcamera` source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NvCameraOptions {
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
    /// `rgb` or `bgr`; only used for raw frames.
    pub color_model: String,
    /// GStreamer fraction, e.g. "30/1".
    pub framerate: String,
    /// `nvvidconv flip-method`. 2 suits the default camera mounting.
    pub flip_method: u32,
}

impl Default for NvCameraOptions {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            format: FrameFormat::Jpeg,
            color_model: "bgr".to_string(),
            framerate: "10/1".to_string(),
            flip_method: 2,
        }
    }
}

impl NvCameraOptions {
    /// Build the camera pipeline description.
    pub fn pipeline_description(&self) -> FrameSourceResult<PipelineDescription> {
        let mut stages = vec![
            "nvcamerasrc".to_string(),
            format!(
                "video/x-raw(memory:NVMM),format=I420,width={},height={},framerate={}",
                self.width, self.height, self.framerate
            ),
            format!("nvvidconv flip-method={}", self.flip_method),
        ];

        match self.format {
            FrameFormat::Jpeg => stages.push("nvjpegenc".to_string()),
            FrameFormat::Raw => {
                let color_model = self.checked_color_model()?;
                stages.push("video/x-raw".to_string());
                stages.push("videoconvert".to_string());
                stages.push(format!("video/x-raw,format={}", color_model.to_uppercase()));
            }
        }
        stages.push("appsink".to_string());

        PipelineDescription::parse(stages.join(" ! "))
    }

    pub fn into_spec(self) -> FrameSourceResult<SourceSpec> {
        let pipeline = self.pipeline_description()?;
        let format = match self.format {
            FrameFormat::Jpeg => FormatDescriptor::Jpeg,
            FrameFormat::Raw => FormatDescriptor::raw(self.checked_color_model()?)?,
        };
        Ok(SourceSpec {
            pipeline,
            geometry: FrameGeometry::new(self.width, self.height),
            format,
        })
    }

    fn checked_color_model(&self) -> FrameSourceResult<&str> {
        match self.color_model.as_str() {
            "rgb" | "bgr" => Ok(&self.color_model),
            other => Err(FrameSourceError::config(format!(
                "unsupported color_model: {other}"
            ))),
        }
    }
}
