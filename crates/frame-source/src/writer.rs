//! Downstream writers that receive frame records.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use gstframe_common::error::FrameSourceResult;
use serde::Serialize;

use crate::record::{FrameFormat, FrameRecord};

/// Receives one record per frame, in pull order.
///
/// An error ends the stream. Implementations that want the stream to end
/// should call [`StopHandle::request`](crate::StopHandle::request), never
/// the blocking [`StopHandle::stop`](crate::StopHandle::stop).
pub trait RecordWriter {
    fn write(&mut self, record: FrameRecord) -> anyhow::Result<()>;
}

impl<F> RecordWriter for F
where
    F: FnMut(FrameRecord) -> anyhow::Result<()>,
{
    fn write(&mut self, record: FrameRecord) -> anyhow::Result<()> {
        self(record)
    }
}

/// Keeps every record in memory, in arrival order.
#[derive(Debug, Default)]
pub struct CollectingWriter(pub Vec<FrameRecord>);

impl CollectingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[FrameRecord] {
        &self.0
    }

    pub fn into_records(self) -> Vec<FrameRecord> {
        self.0
    }
}

impl RecordWriter for CollectingWriter {
    fn write(&mut self, record: FrameRecord) -> anyhow::Result<()> {
        self.0.push(record);
        Ok(())
    }
}

/// Index line written to `frames.jsonl` for every frame file.
#[derive(Debug, Serialize)]
struct FrameIndexEntry<'a> {
    index: u64,
    file: &'a str,
    width: u32,
    height: u32,
    format: FrameFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    color_model: Option<&'a str>,
    bytes: usize,
    written_at: String,
}

/// Dumps frames into a directory: one file per frame plus a JSONL index.
pub struct DirectoryWriter {
    dir: PathBuf,
    index: BufWriter<File>,
    frames_written: u64,
}

impl DirectoryWriter {
    pub const INDEX_FILE: &'static str = "frames.jsonl";

    /// Create the directory if needed and start a fresh index.
    pub fn new(dir: impl Into<PathBuf>) -> FrameSourceResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(dir.join(Self::INDEX_FILE))?;

        Ok(Self {
            dir,
            index: BufWriter::new(file),
            frames_written: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Flush the index to disk.
    pub fn flush(&mut self) -> FrameSourceResult<()> {
        self.index.flush()?;
        Ok(())
    }

    fn write_record(&mut self, record: &FrameRecord) -> FrameSourceResult<()> {
        let file = format!(
            "frame-{:06}.{}",
            self.frames_written,
            record.format.extension()
        );
        std::fs::write(self.dir.join(&file), &record.image)?;

        let entry = FrameIndexEntry {
            index: self.frames_written,
            file: &file,
            width: record.width,
            height: record.height,
            format: record.format,
            color_model: record.color_model.as_deref(),
            bytes: record.image.len(),
            written_at: chrono::Utc::now().to_rfc3339(),
        };
        serde_json::to_writer(&mut self.index, &entry)?;
        self.index.write_all(b"\n")?;
        self.frames_written += 1;

        if self.frames_written % 100 == 0 {
            self.flush()?;
        }
        Ok(())
    }
}

impl RecordWriter for DirectoryWriter {
    fn write(&mut self, record: FrameRecord) -> anyhow::Result<()> {
        self.write_record(&record)?;
        Ok(())
    }
}

impl Drop for DirectoryWriter {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(dir = %self.dir.display(), error = %e, "Failed to flush frame index");
        }
    }
}
