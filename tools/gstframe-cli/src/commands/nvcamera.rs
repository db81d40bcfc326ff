//! Run (or print) a `gst_nvcamera` source.

use gstframe_common::config::AppConfig;
use gstframe_source::{NvCameraOptions, SourceIdentity};

use crate::OutputArgs;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    config: &AppConfig,
    width: u32,
    height: u32,
    format: String,
    color_model: String,
    framerate: String,
    flip_method: u32,
    print: bool,
    output: OutputArgs,
) -> anyhow::Result<()> {
    let options = NvCameraOptions {
        width,
        height,
        format: format.parse()?,
        color_model,
        framerate,
        flip_method,
    };

    if print {
        println!("{}", options.pipeline_description()?);
        return Ok(());
    }

    let spec = options.into_spec()?;
    super::stream::stream_source(
        config,
        SourceIdentity::new("gst_nvcamera", "cli"),
        spec,
        output,
    )
    .await
}
