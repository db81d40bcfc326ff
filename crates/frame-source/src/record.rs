//! Frame formats, geometry, and the record emitted per frame.

use std::fmt;
use std::str::FromStr;

use gstframe_common::error::{FrameSourceError, FrameSourceResult};
use serde::{Deserialize, Serialize};

/// Encoding of the bytes a pipeline hands to its sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    /// Uncompressed pixels with an explicit channel order.
    Raw,
    /// One JPEG picture per buffer.
    Jpeg,
}

impl FrameFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Jpeg => "jpeg",
        }
    }

    /// File extension used when frames are dumped to disk.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Jpeg => "jpg",
        }
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameFormat {
    type Err = FrameSourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Self::Raw),
            "jpeg" => Ok(Self::Jpeg),
            other => Err(FrameSourceError::config(format!(
                "unsupported format: {other}"
            ))),
        }
    }
}

/// Format of a source instance. Fixed for the lifetime of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatDescriptor {
    Raw { color_model: String },
    Jpeg,
}

impl FormatDescriptor {
    pub fn raw(color_model: impl Into<String>) -> FrameSourceResult<Self> {
        let color_model = color_model.into();
        if color_model.trim().is_empty() {
            return Err(FrameSourceError::config(
                "color_model is required when the format is raw",
            ));
        }
        Ok(Self::Raw { color_model })
    }

    pub fn format(&self) -> FrameFormat {
        match self {
            Self::Raw { .. } => FrameFormat::Raw,
            Self::Jpeg => FrameFormat::Jpeg,
        }
    }

    /// Channel layout tag; only raw frames carry one.
    pub fn color_model(&self) -> Option<&str> {
        match self {
            Self::Raw { color_model } => Some(color_model),
            Self::Jpeg => None,
        }
    }
}

/// Frame width and height in pixels. Zero means "not known yet".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    pub const UNKNOWN: Self = Self {
        width: 0,
        height: 0,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_known(&self) -> bool {
        self.width != 0 && self.height != 0
    }
}

impl fmt::Display for FrameGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One captured frame, owned by whoever receives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    pub image: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
    pub color_model: Option<String>,
}

impl FrameRecord {
    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry::new(self.width, self.height)
    }
}
