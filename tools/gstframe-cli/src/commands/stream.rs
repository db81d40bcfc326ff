//! Run a `gst_raw_video` source.

use std::time::Duration;

use anyhow::Context;
use gstframe_common::config::AppConfig;
use gstframe_source::{
    DirectoryWriter, FrameRecord, FrameSource, RawSourceOptions, RecordWriter, SourceIdentity,
    SourceSpec, StopHandle, StreamConfig, StreamStats,
};

use crate::OutputArgs;

pub async fn run(
    config: &AppConfig,
    pipeline: String,
    format: String,
    width: u32,
    height: u32,
    color_model: String,
    output: OutputArgs,
) -> anyhow::Result<()> {
    let options = RawSourceOptions {
        pipeline,
        width,
        height,
        format: Some(format.parse()?),
        color_model,
    };
    let spec = options.into_spec()?;

    stream_source(
        config,
        SourceIdentity::new("gst_raw_video", "cli"),
        spec,
        output,
    )
    .await
}

/// Stream until Ctrl+C, `--max-frames`, or a failure.
pub async fn stream_source(
    config: &AppConfig,
    identity: SourceIdentity,
    spec: SourceSpec,
    output: OutputArgs,
) -> anyhow::Result<()> {
    gstframe_source::init()?;

    let mut stream_config = StreamConfig::from(&config.stream);
    if let Some(ms) = output.warm_up_ms {
        stream_config.warm_up = Duration::from_millis(ms);
    }

    println!("Streaming from: {}", spec.pipeline);
    if let Some(dir) = &output.output {
        println!("  Output: {}", dir.display());
    }
    println!("Press Ctrl+C to stop...");
    println!();

    let mut source = FrameSource::gstreamer(identity, spec).with_config(stream_config);
    let stop = source.stop_handle();
    let mut sink = FrameSink::new(&output, stop.clone())?;

    let signal_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Stop requested");
            signal_stop.request();
        }
    });

    let (result, stats) = tokio::task::spawn_blocking(move || {
        let result = source.generate_stream(&mut sink);
        (result, source.stats())
    })
    .await
    .context("stream task panicked")?;

    print_stats(&stats);
    result?;
    Ok(())
}

fn print_stats(stats: &StreamStats) {
    println!();
    println!("Frames: {}", stats.frames_emitted);
    println!("Bytes:  {}", stats.bytes_copied);
}

/// Counts frames, optionally dumps them, and ends the stream at the limit.
struct FrameSink {
    dir: Option<DirectoryWriter>,
    max_frames: Option<u64>,
    seen: u64,
    stop: StopHandle,
}

impl FrameSink {
    fn new(output: &OutputArgs, stop: StopHandle) -> anyhow::Result<Self> {
        let dir = match &output.output {
            Some(path) => Some(
                DirectoryWriter::new(path)
                    .with_context(|| format!("cannot write frames to {}", path.display()))?,
            ),
            None => None,
        };
        Ok(Self {
            dir,
            max_frames: output.max_frames,
            seen: 0,
            stop,
        })
    }
}

impl RecordWriter for FrameSink {
    fn write(&mut self, record: FrameRecord) -> anyhow::Result<()> {
        if self.seen == 0 {
            tracing::info!(
                width = record.width,
                height = record.height,
                format = %record.format,
                "First frame"
            );
        }
        if let Some(dir) = self.dir.as_mut() {
            dir.write(record)?;
        }
        self.seen += 1;

        if self.max_frames.is_some_and(|max| self.seen >= max) {
            self.stop.request();
        }
        Ok(())
    }
}
