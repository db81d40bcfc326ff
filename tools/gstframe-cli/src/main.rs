//! gstframe CLI: stream frames out of GStreamer pipelines.
//!
//! Usage:
//!   gstframe stream [OPTIONS]     Run a `gst_raw_video` source
//!   gstframe nvcamera [OPTIONS]   Run (or print) a `gst_nvcamera` source
//!   gstframe check                Check GStreamer and the elements sources need

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use gstframe_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "gstframe",
    about = "Pull video frames out of GStreamer pipelines",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where frames go and when to stop.
#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Directory to dump frames and `frames.jsonl` into. Frames are only
    /// counted when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Delay between starting the pipeline and the first pull (ms)
    #[arg(long)]
    warm_up_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream frames from an arbitrary pipeline ending in appsink
    Stream {
        /// gst-launch-1.0 style pipeline, e.g. "videotestsrc ! jpegenc ! appsink"
        #[arg(short, long)]
        pipeline: String,

        /// Frame format: raw or jpeg
        #[arg(short, long)]
        format: String,

        /// Frame width (required for raw, inferred for jpeg when 0)
        #[arg(long, default_value = "0")]
        width: u32,

        /// Frame height (required for raw, inferred for jpeg when 0)
        #[arg(long, default_value = "0")]
        height: u32,

        /// Channel layout of raw frames, e.g. bgr
        #[arg(long, default_value = "")]
        color_model: String,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Stream frames from a Jetson camera module (nvcamerasrc)
    Nvcamera {
        #[arg(long, default_value = "1280")]
        width: u32,

        #[arg(long, default_value = "720")]
        height: u32,

        /// Frame format: raw or jpeg
        #[arg(long, default_value = "jpeg")]
        format: String,

        /// rgb or bgr (raw only)
        #[arg(long, default_value = "bgr")]
        color_model: String,

        /// GStreamer fraction, e.g. 30/1
        #[arg(long, default_value = "10/1")]
        framerate: String,

        /// nvvidconv flip-method
        #[arg(long, default_value = "2")]
        flip_method: u32,

        /// Only print the pipeline description
        #[arg(long)]
        print: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Check GStreamer and the elements sources rely on
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load();

    // Initialize logging
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    gstframe_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Stream {
            pipeline,
            format,
            width,
            height,
            color_model,
            output,
        } => {
            commands::stream::run(
                &config,
                pipeline,
                format,
                width,
                height,
                color_model,
                output,
            )
            .await
        }
        Commands::Nvcamera {
            width,
            height,
            format,
            color_model,
            framerate,
            flip_method,
            print,
            output,
        } => {
            commands::nvcamera::run(
                &config,
                width,
                height,
                format,
                color_model,
                framerate,
                flip_method,
                print,
                output,
            )
            .await
        }
        Commands::Check => commands::check::run(),
    }
}
