//! Geometry recovery for JPEG frames.

use std::io::Cursor;

use gstframe_common::error::{FrameSourceError, FrameSourceResult};
use image::{ImageFormat, ImageReader};

use crate::record::FrameGeometry;

/// Read width and height from a JPEG header without decoding the pixels.
pub fn infer_geometry(image: &[u8]) -> FrameSourceResult<FrameGeometry> {
    let (width, height) = ImageReader::with_format(Cursor::new(image), ImageFormat::Jpeg)
        .into_dimensions()
        .map_err(|e| FrameSourceError::geometry(format!("frame is not a JPEG picture: {e}")))?;

    let geometry = FrameGeometry::new(width, height);
    if !geometry.is_known() {
        return Err(FrameSourceError::geometry(format!(
            "JPEG header reports an empty picture ({geometry})"
        )));
    }
    Ok(geometry)
}
