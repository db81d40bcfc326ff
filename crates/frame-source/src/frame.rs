//! Borrow, copy, release protocol for frames owned by a native pipeline.
//!
//! A [`FrameLease`] is handed out by [`FramePipeline::grab_frame`] and refers to
//! memory the pipeline still owns. The bytes must be copied out before the
//! lease is released, and the lease is released exactly once: either by
//! [`FrameLease::release`] or, on any other path, when it is dropped.
//!
//! [`FramePipeline::grab_frame`]: crate::pipeline::FramePipeline::grab_frame

use gstframe_common::error::{FrameSourceError, FrameSourceResult};

/// A buffer mapped for reading by a pipeline backend.
pub trait NativeFrame: Send {
    /// Mapped bytes. Valid until the frame is released.
    fn data(&self) -> &[u8];

    /// Hand the buffer back to the pipeline.
    fn release(self: Box<Self>) {}
}

/// Scoped access to one pulled frame.
pub struct FrameLease {
    frame: Option<Box<dyn NativeFrame>>,
}

impl FrameLease {
    pub fn new(frame: impl NativeFrame + 'static) -> Self {
        Self {
            frame: Some(Box::new(frame)),
        }
    }

    /// Byte length of the mapped region.
    pub fn size(&self) -> usize {
        self.data().len()
    }

    /// Copy exactly [`size`](Self::size) bytes into `dest`.
    pub fn copy_into(&self, dest: &mut [u8]) -> FrameSourceResult<()> {
        let data = self.data();
        if dest.len() != data.len() {
            return Err(FrameSourceError::acquisition(format!(
                "destination holds {} bytes but the frame has {}",
                dest.len(),
                data.len()
            )));
        }
        dest.copy_from_slice(data);
        Ok(())
    }

    /// Copy the frame into a freshly allocated buffer.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut image = vec![0u8; self.size()];
        image.copy_from_slice(self.data());
        image
    }

    /// Release the buffer now instead of at end of scope.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn data(&self) -> &[u8] {
        self.frame.as_ref().map(|f| f.data()).unwrap_or_default()
    }

    fn release_inner(&mut self) {
        if let Some(frame) = self.frame.take() {
            frame.release();
        }
    }
}

impl Drop for FrameLease {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl std::fmt::Debug for FrameLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLease")
            .field("size", &self.size())
            .field("released", &self.frame.is_none())
            .finish()
    }
}
