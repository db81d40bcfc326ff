//! Scripted pipeline backend for exercising the stream loop without GStreamer.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use gstframe_common::error::{FrameSourceError, FrameSourceResult};
use gstframe_source::{
    FrameLease, FramePipeline, NativeFrame, PipelineBackend, PipelineDescription, StopHandle,
};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

/// What the fake pipeline does on one `grab_frame` call.
pub enum Step {
    Frame(Vec<u8>),
    /// Pull timed out with nothing to deliver.
    Idle,
    /// Native pull failure.
    Fail(&'static str),
    /// Request a stop (as another thread would) and then time out.
    Cancel(StopHandle),
}

#[derive(Debug, Default)]
pub struct Counters {
    pub creates: AtomicUsize,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub grabs: AtomicUsize,
    pub leases: AtomicUsize,
    pub releases: AtomicUsize,
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    pub script: Arc<Mutex<VecDeque<Step>>>,
    pub counters: Arc<Counters>,
    pub fail_create: bool,
    pub fail_start: bool,
    pub started_at: Arc<Mutex<Option<Instant>>>,
    pub first_grab_at: Arc<Mutex<Option<Instant>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, step: Step) {
        self.script.lock().unwrap().push_back(step);
    }

    pub fn push_frames(&self, frames: impl IntoIterator<Item = Vec<u8>>) {
        for frame in frames {
            self.push(Step::Frame(frame));
        }
    }
}

impl PipelineBackend for FakeBackend {
    fn create(
        &self,
        description: &PipelineDescription,
    ) -> FrameSourceResult<Box<dyn FramePipeline>> {
        self.counters.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_create {
            return Err(FrameSourceError::construction(
                "no element \"nosuchsrc\"",
                description.as_str(),
            ));
        }
        Ok(Box::new(FakePipeline {
            backend: self.clone(),
            description: description.to_string(),
        }))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct FakePipeline {
    backend: FakeBackend,
    description: String,
}

impl FramePipeline for FakePipeline {
    fn start(&mut self) -> FrameSourceResult<()> {
        self.backend.counters.starts.fetch_add(1, Ordering::SeqCst);
        *self.backend.started_at.lock().unwrap() = Some(Instant::now());
        if self.backend.fail_start {
            return Err(FrameSourceError::construction(
                "state change failed",
                &self.description,
            ));
        }
        Ok(())
    }

    fn grab_frame(&mut self, timeout: Duration) -> FrameSourceResult<Option<FrameLease>> {
        let counters = &self.backend.counters;
        counters.grabs.fetch_add(1, Ordering::SeqCst);
        self.backend
            .first_grab_at
            .lock()
            .unwrap()
            .get_or_insert_with(Instant::now);

        let step = self.backend.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Frame(bytes)) => {
                counters.leases.fetch_add(1, Ordering::SeqCst);
                Ok(Some(FrameLease::new(FakeFrame {
                    bytes,
                    counters: counters.clone(),
                })))
            }
            Some(Step::Fail(message)) => Err(FrameSourceError::acquisition(message)),
            Some(Step::Cancel(stop)) => {
                stop.request();
                Ok(None)
            }
            Some(Step::Idle) | None => {
                std::thread::sleep(timeout.min(Duration::from_millis(5)));
                Ok(None)
            }
        }
    }

    fn stop(&mut self) -> FrameSourceResult<()> {
        self.backend.counters.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeFrame {
    bytes: Vec<u8>,
    counters: Arc<Counters>,
}

impl NativeFrame for FakeFrame {
    fn data(&self) -> &[u8] {
        &self.bytes
    }

    fn release(self: Box<Self>) {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let pixels = vec![200u8; (width * height * 3) as usize];
    let mut out = Vec::new();
    JpegEncoder::new(&mut out)
        .encode(&pixels, width, height, ExtendedColorType::Rgb8)
        .unwrap();
    out
}
