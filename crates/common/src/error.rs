//! Error types shared across gstframe crates.

/// Top-level error type for frame source operations.
///
/// Every variant terminates the streaming attempt that produced it. Nothing is
/// retried internally; restarting a source is left to whoever drives it.
#[derive(Debug, thiserror::Error)]
pub enum FrameSourceError {
    /// The pipeline description could not be turned into a running pipeline.
    #[error("Pipeline construction error: {message} (pipeline: {pipeline})")]
    PipelineConstruction { message: String, pipeline: String },

    /// Pulling a frame from a running pipeline failed.
    #[error("Frame acquisition error: {message}")]
    FrameAcquisition { message: String },

    /// A coded picture did not carry a readable header.
    #[error("Geometry inference error: {message}")]
    GeometryInference { message: String },

    /// The downstream writer rejected a record.
    #[error("Downstream error: {0}")]
    Downstream(#[source] anyhow::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using FrameSourceError.
pub type FrameSourceResult<T> = Result<T, FrameSourceError>;

impl FrameSourceError {
    pub fn construction(msg: impl Into<String>, pipeline: impl Into<String>) -> Self {
        Self::PipelineConstruction {
            message: msg.into(),
            pipeline: pipeline.into(),
        }
    }

    pub fn acquisition(msg: impl Into<String>) -> Self {
        Self::FrameAcquisition {
            message: msg.into(),
        }
    }

    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::GeometryInference {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn downstream(err: impl Into<anyhow::Error>) -> Self {
        Self::Downstream(err.into())
    }

    /// Short, stable name of the error class for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PipelineConstruction { .. } => "pipeline_construction",
            Self::FrameAcquisition { .. } => "frame_acquisition",
            Self::GeometryInference { .. } => "geometry_inference",
            Self::Downstream(_) => "downstream",
            Self::Config { .. } => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Other(_) => "other",
        }
    }
}
